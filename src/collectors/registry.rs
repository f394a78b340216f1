//! Holds the enabled collectors, their prometheus registry, and the
//! optional scrape-performance tracker.

use crate::collectors::exporter::ScraperCollector;
use crate::collectors::{Collector, CollectorType, all_factories};
use crate::plugin::Plugin;
use anyhow::{Result, anyhow};
use prometheus::Registry;
use std::sync::Arc;
use tracing::{debug, info_span, instrument};
use tracing_futures::Instrument as _;

pub struct CollectorRegistry {
    registry: Registry,
    collectors: Vec<CollectorType>,
    scraper: Option<Arc<ScraperCollector>>,
}

impl CollectorRegistry {
    /// Instantiate the named collectors and register their metrics.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown collector name or a registration
    /// failure.
    #[instrument(skip(plugin), level = "info", err)]
    pub fn new(enabled: &[String], plugin: &Plugin) -> Result<Self> {
        let factories = all_factories();
        let registry = Registry::new();
        let mut collectors = Vec::with_capacity(enabled.len());
        let mut scraper = None;

        for name in enabled {
            let factory = factories
                .get(name.as_str())
                .ok_or_else(|| anyhow!("unknown collector: {name}"))?;

            let collector = factory();
            collector.register_metrics(plugin, &registry)?;

            if let Some(s) = collector.get_scraper() {
                scraper = Some(s);
            }

            debug!(collector = collector.name(), "registered collector");
            collectors.push(collector);
        }

        Ok(Self {
            registry,
            collectors,
            scraper,
        })
    }

    #[must_use]
    pub const fn prometheus_registry(&self) -> &Registry {
        &self.registry
    }

    #[must_use]
    pub fn collector_names(&self) -> Vec<&'static str> {
        self.collectors.iter().map(Collector::name).collect()
    }

    /// Run every enabled collector once, recording per-collector scrape
    /// outcomes when the exporter collector is enabled.
    ///
    /// Collectors run sequentially: they all funnel into the same cached
    /// snapshot, so fan-out buys nothing here.
    ///
    /// # Errors
    ///
    /// Returns the first collector failure.
    pub async fn collect_all(&self, plugin: &Plugin) -> Result<()> {
        for collector in &self.collectors {
            let timer = self
                .scraper
                .as_ref()
                .map(|s| s.start_scrape(collector.name()));

            let span = info_span!("collector.collect", collector = %collector.name(), otel.kind = "internal");
            let result = collector.collect(plugin).instrument(span).await;

            match result {
                Ok(()) => {
                    if let Some(timer) = timer {
                        timer.success();
                    }
                }
                Err(e) => {
                    if let Some(timer) = timer {
                        timer.error();
                    }
                    return Err(e);
                }
            }
        }

        if let Some(scraper) = &self.scraper {
            scraper.increment_scrapes();
            let samples: usize = self
                .registry
                .gather()
                .iter()
                .map(|family| family.get_metric().len())
                .sum();
            scraper.update_metrics_count(i64::try_from(samples).unwrap_or(i64::MAX));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::testutil::sample_plugin;

    #[tokio::test]
    async fn test_new_with_all_collectors() {
        let plugin = sample_plugin();
        let enabled: Vec<String> = ["stats", "pools", "version", "exporter"]
            .iter()
            .map(ToString::to_string)
            .collect();

        let registry = CollectorRegistry::new(&enabled, &plugin);
        assert!(registry.is_ok());
    }

    #[tokio::test]
    #[allow(clippy::unwrap_used)]
    async fn test_scraper_extracted_when_exporter_enabled() {
        let plugin = sample_plugin();
        let enabled = vec!["exporter".to_string()];

        let registry = CollectorRegistry::new(&enabled, &plugin).unwrap();
        assert!(registry.scraper.is_some());
        assert_eq!(registry.collector_names(), vec!["exporter"]);
    }

    #[tokio::test]
    async fn test_unknown_collector_is_rejected() {
        let plugin = sample_plugin();
        let enabled = vec!["bogus".to_string()];

        assert!(CollectorRegistry::new(&enabled, &plugin).is_err());
    }

    #[tokio::test]
    async fn test_collect_all_fails_without_server() {
        let plugin = sample_plugin();
        let enabled = vec!["stats".to_string(), "exporter".to_string()];

        #[allow(clippy::unwrap_used)]
        let registry = CollectorRegistry::new(&enabled, &plugin).unwrap();

        // The lazy pool has nothing to connect to.
        assert!(registry.collect_all(&plugin).await.is_err());
    }
}
