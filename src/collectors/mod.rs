use crate::plugin::Plugin;
use anyhow::Result;
use futures::future::BoxFuture;
use prometheus::Registry;
use std::collections::HashMap;

#[macro_use]
mod register_macro;

pub trait Collector {
    fn name(&self) -> &'static str;

    /// Build and register this collector's metrics for the given plugin
    /// context with the prometheus registry.
    ///
    /// # Errors
    ///
    /// Returns an error if any metric fails to register.
    fn register_metrics(&self, plugin: &Plugin, registry: &Registry) -> Result<()>;

    fn collect<'a>(&'a self, plugin: &'a Plugin) -> BoxFuture<'a, Result<()>>;

    fn enabled_by_default(&self) -> bool {
        false
    }
}

register_collectors! {
    stats => StatsCollector,
    pools => PoolsCollector,
    version => VersionCollector,
    exporter => ExporterCollector,
}

pub mod registry;
