pub mod actions;
pub mod commands;
pub mod dispatch;

#[must_use]
pub fn start() -> clap::ArgMatches {
    commands::new().get_matches()
}
