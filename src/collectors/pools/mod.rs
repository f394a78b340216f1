use crate::collectors::Collector;
use crate::plugin::{Plugin, PluginError};
use crate::snapshot::{MetricId, PoolField};
use anyhow::Result;
use futures::future::BoxFuture;
use prometheus::{IntGaugeVec, Opts, Registry};
use std::collections::HashMap;
use tracing::{debug, instrument};

/// Per-pool connection gauges from `SHOW POOLS` (default-on).
///
/// One gauge family per pool field, labeled by database and user. A tracked
/// pool can be absent from a sample (PgBouncer drops idle pool entries), in
/// which case its labeled series simply keeps its previous value for the
/// cycle.
#[derive(Clone)]
pub struct PoolsCollector {
    gauges: HashMap<PoolField, IntGaugeVec>,
}

impl Default for PoolsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolsCollector {
    #[must_use]
    #[allow(clippy::expect_used)]
    ///
    /// # Panics
    ///
    /// Panics if metric creation fails (should never happen with static names).
    pub fn new() -> Self {
        let gauges = PoolField::ALL
            .into_iter()
            .map(|field| {
                let gauge = IntGaugeVec::new(
                    Opts::new(format!("pgbouncer_pool_{}", field.key()), field.help()),
                    &["database", "user"],
                )
                .expect("valid pool metric opts");
                (field, gauge)
            })
            .collect();

        Self { gauges }
    }
}

impl Collector for PoolsCollector {
    fn name(&self) -> &'static str {
        "pools"
    }

    #[instrument(
        skip(self, plugin, registry),
        level = "info",
        err,
        fields(collector = "pools")
    )]
    fn register_metrics(&self, plugin: &Plugin, registry: &Registry) -> Result<()> {
        for gauge in self.gauges.values() {
            registry.register(Box::new(gauge.clone()))?;
        }

        // Seed a zeroed series per tracked pool so every family shows up
        // from the first scrape.
        for descriptor in plugin.descriptors() {
            let MetricId::Pool { field, pool } = &descriptor.id else {
                continue;
            };
            if let Some(gauge) = self.gauges.get(field) {
                gauge
                    .with_label_values(&[pool.database.as_str(), pool.user.as_str()])
                    .set(0);
            }
        }

        Ok(())
    }

    #[instrument(skip(self, plugin), level = "info", err, fields(collector = "pools", otel.kind = "internal"))]
    fn collect<'a>(&'a self, plugin: &'a Plugin) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            for descriptor in plugin.descriptors() {
                let MetricId::Pool { field, pool } = &descriptor.id else {
                    continue;
                };
                let Some(gauge) = self.gauges.get(field) else {
                    continue;
                };

                match plugin.metric_value(&descriptor.name).await {
                    Ok(value) => {
                        gauge
                            .with_label_values(&[pool.database.as_str(), pool.user.as_str()])
                            .set(value);
                    }
                    Err(PluginError::UnknownMetric { .. }) => {
                        debug!(metric = %descriptor.name, "pool absent from current sample");
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            Ok(())
        })
    }

    fn enabled_by_default(&self) -> bool {
        true
    }
}
