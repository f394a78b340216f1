pub mod admin;
pub mod cache;
pub mod cli;
pub mod collectors;
pub mod exporter;
pub mod plugin;
pub mod snapshot;
