use crate::collectors::Collector;
use crate::plugin::Plugin;
use crate::snapshot::{MetricId, StatsField};
use anyhow::Result;
use futures::future::BoxFuture;
use prometheus::{IntGaugeVec, Opts, Registry};
use std::collections::HashMap;
use tracing::instrument;

/// Per-database traffic metrics from `SHOW STATS` (default-on).
///
/// One gauge family per stats field, labeled by database: interval deltas
/// for the cumulative totals and pass-through values for the per-second
/// averages. Database names carry over verbatim as label values, so they
/// never need mangling into the metric name.
#[derive(Clone)]
pub struct StatsCollector {
    gauges: HashMap<StatsField, IntGaugeVec>,
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsCollector {
    #[must_use]
    #[allow(clippy::expect_used)]
    ///
    /// # Panics
    ///
    /// Panics if metric creation fails (should never happen with static names).
    pub fn new() -> Self {
        let gauges = StatsField::ALL
            .into_iter()
            .map(|field| {
                let gauge = IntGaugeVec::new(
                    Opts::new(format!("pgbouncer_stats_{}", field.key()), field.help()),
                    &["database"],
                )
                .expect("valid stats metric opts");
                (field, gauge)
            })
            .collect();

        Self { gauges }
    }
}

impl Collector for StatsCollector {
    fn name(&self) -> &'static str {
        "stats"
    }

    #[instrument(
        skip(self, plugin, registry),
        level = "info",
        err,
        fields(collector = "stats")
    )]
    fn register_metrics(&self, plugin: &Plugin, registry: &Registry) -> Result<()> {
        for gauge in self.gauges.values() {
            registry.register(Box::new(gauge.clone()))?;
        }

        // Seed a zeroed series per tracked database so every family shows
        // up from the first scrape.
        for descriptor in plugin.descriptors() {
            let MetricId::Stats { field, database } = &descriptor.id else {
                continue;
            };
            if let Some(gauge) = self.gauges.get(field) {
                gauge.with_label_values(&[database.as_str()]).set(0);
            }
        }

        Ok(())
    }

    #[instrument(skip(self, plugin), level = "info", err, fields(collector = "stats", otel.kind = "internal"))]
    fn collect<'a>(&'a self, plugin: &'a Plugin) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            for descriptor in plugin.descriptors() {
                let MetricId::Stats { field, database } = &descriptor.id else {
                    continue;
                };
                let Some(gauge) = self.gauges.get(field) else {
                    continue;
                };

                // Tracked databases are always present in the snapshot
                // (absent ones are zero-filled), so a lookup miss here is a
                // real defect.
                let value = plugin.metric_value(&descriptor.name).await?;
                gauge.with_label_values(&[database.as_str()]).set(value);
            }

            Ok(())
        })
    }

    fn enabled_by_default(&self) -> bool {
        true
    }
}
