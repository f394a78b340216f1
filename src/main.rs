use anyhow::Result;
use pgbouncer_exporter::cli;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let matches = cli::start();
    let action = cli::dispatch::handler(&matches)?;
    cli::actions::run::handle(action).await
}
