mod scraper;

pub use scraper::{ScrapeTimer, ScraperCollector};

use crate::collectors::Collector;
use crate::plugin::Plugin;
use anyhow::Result;
use futures::future::BoxFuture;
use prometheus::Registry;
use std::sync::Arc;
use tracing::instrument;

/// Exporter self-monitoring
#[derive(Clone)]
pub struct ExporterCollector {
    scraper: Arc<ScraperCollector>,
}

impl Default for ExporterCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl ExporterCollector {
    #[must_use]
    pub fn new() -> Self {
        Self {
            scraper: Arc::new(ScraperCollector::new()),
        }
    }

    #[must_use]
    pub const fn get_scraper(&self) -> &Arc<ScraperCollector> {
        &self.scraper
    }
}

impl Collector for ExporterCollector {
    fn name(&self) -> &'static str {
        "exporter"
    }

    #[instrument(
        skip(self, _plugin, registry),
        level = "info",
        err,
        fields(collector = "exporter")
    )]
    fn register_metrics(&self, _plugin: &Plugin, registry: &Registry) -> Result<()> {
        self.scraper.register(registry)
    }

    fn collect<'a>(&'a self, _plugin: &'a Plugin) -> BoxFuture<'a, Result<()>> {
        // The scrape metrics are recorded by the registry driving the other
        // collectors; nothing to fetch here.
        Box::pin(async move { Ok(()) })
    }

    fn enabled_by_default(&self) -> bool {
        false
    }
}
