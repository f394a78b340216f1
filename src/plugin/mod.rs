//! The plugin context: tracked sets, delta baselines, and the cached
//! snapshot fetch.
//!
//! All mutable polling state lives in one struct constructed at
//! initialization and shared behind an async mutex, so overlapping metric
//! handlers serialize through a single execution context instead of racing
//! on the cache and baselines.

use crate::admin;
use crate::cache::TtlCache;
use crate::snapshot::{DeltaBaselines, MetricId, PoolKey, Snapshot, build_snapshot};
use sqlx::PgPool;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{info, instrument};

pub mod descriptor;
mod error;

pub use descriptor::{MetricDescriptor, MetricGroup, ValueType};
pub use error::PluginError;

/// Snapshots older than this are recomputed; younger ones are served as-is,
/// including to overlapping callers.
pub const CACHE_EXPIRY: Duration = Duration::from_secs(30);

struct PluginState {
    cache: TtlCache<Snapshot>,
    baselines: DeltaBaselines,
}

/// Metrics-collection context for one PgBouncer admin console.
pub struct Plugin {
    pool: PgPool,
    tracked_databases: BTreeSet<String>,
    tracked_pools: BTreeSet<PoolKey>,
    descriptors: Vec<MetricDescriptor>,
    index: HashMap<String, MetricId>,
    state: Mutex<PluginState>,
}

impl Plugin {
    /// Discover the tracked sets from the admin console and build the
    /// context. `filter` restricts tracking to the named databases; an empty
    /// filter tracks everything the console reports.
    ///
    /// # Errors
    ///
    /// Returns an error if the discovery queries fail.
    #[instrument(skip(pool), level = "info", err)]
    pub async fn init(pool: PgPool, filter: &[String]) -> Result<Self, PluginError> {
        let keep = |database: &str| filter.is_empty() || filter.iter().any(|f| f == database);

        let tracked_databases: BTreeSet<String> = admin::show_databases(&pool)
            .await?
            .into_iter()
            .filter(|row| keep(&row.database))
            .map(|row| row.database)
            .collect();

        let tracked_pools: BTreeSet<PoolKey> = admin::show_pools(&pool)
            .await?
            .into_iter()
            .filter(|row| keep(&row.database))
            .map(|row| PoolKey::new(row.database, row.user))
            .collect();

        info!(
            databases = tracked_databases.len(),
            pools = tracked_pools.len(),
            "tracking discovered entities"
        );

        Self::with_tracked(pool, tracked_databases, tracked_pools)
    }

    /// Build the context from pre-determined tracked sets.
    ///
    /// # Errors
    ///
    /// Returns an error if two generated descriptors render to the same
    /// metric name.
    pub fn with_tracked(
        pool: PgPool,
        tracked_databases: BTreeSet<String>,
        tracked_pools: BTreeSet<PoolKey>,
    ) -> Result<Self, PluginError> {
        let descriptors = descriptor::generate(&tracked_databases, &tracked_pools);
        let index = descriptor::name_index(&descriptors)?;

        Ok(Self {
            pool,
            tracked_databases,
            tracked_pools,
            descriptors,
            index,
            state: Mutex::new(PluginState {
                cache: TtlCache::new(CACHE_EXPIRY),
                baselines: DeltaBaselines::new(),
            }),
        })
    }

    /// The generated descriptor list, in stable order.
    #[must_use]
    pub fn descriptors(&self) -> &[MetricDescriptor] {
        &self.descriptors
    }

    #[must_use]
    pub const fn tracked_databases(&self) -> &BTreeSet<String> {
        &self.tracked_databases
    }

    #[must_use]
    pub const fn tracked_pools(&self) -> &BTreeSet<PoolKey> {
        &self.tracked_pools
    }

    /// The shared admin-console pool, for collectors issuing their own
    /// statements (version info).
    #[must_use]
    pub const fn admin_pool(&self) -> &PgPool {
        &self.pool
    }

    /// Return the current snapshot, fetching from the admin console only
    /// when the cached one has expired.
    ///
    /// # Errors
    ///
    /// A connectivity or query failure is fatal for the cycle; no partial
    /// snapshot is produced and the stale value is not reused.
    pub async fn snapshot(&self) -> Result<Arc<Snapshot>, PluginError> {
        let mut state = self.state.lock().await;
        let PluginState { cache, baselines } = &mut *state;

        cache
            .get_or_refresh(Instant::now(), || async {
                let stats = admin::show_stats(&self.pool).await?;
                let pools = admin::show_pools(&self.pool).await?;
                Ok(build_snapshot(
                    &self.tracked_databases,
                    &self.tracked_pools,
                    &stats,
                    &pools,
                    baselines,
                ))
            })
            .await
    }

    /// The shared per-metric retrieval entry point every descriptor
    /// references: resolve one metric name against the (cached) snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::UnknownMetric`] for names outside the generated
    /// descriptor set or absent from the current snapshot (a pool omitted
    /// from this cycle), and [`PluginError::Admin`] if the fetch fails.
    pub async fn metric_value(&self, name: &str) -> Result<i64, PluginError> {
        let id = self
            .index
            .get(name)
            .ok_or_else(|| PluginError::unknown_metric(name))?;

        let snapshot = self.snapshot().await?;
        snapshot
            .get(id)
            .ok_or_else(|| PluginError::unknown_metric(name))
    }

    /// Teardown hook. Closes the admin-console pool; no other action is
    /// required at shutdown.
    pub async fn cleanup(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::AdminConfig;

    fn lazy_pool() -> PgPool {
        // connect_lazy never touches the network, so the context can be
        // exercised without a running PgBouncer.
        #[allow(clippy::expect_used)]
        let options = AdminConfig {
            host: "localhost".to_string(),
            port: 6432,
            user: "stats".to_string(),
            password: None,
            sslmode: "disable".to_string(),
        }
        .connect_options()
        .expect("valid connect options");

        sqlx::pool::PoolOptions::new()
            .acquire_timeout(Duration::from_millis(250))
            .connect_lazy_with(options)
    }

    #[allow(clippy::expect_used)]
    fn sample_plugin() -> Plugin {
        let databases = ["appdb"].iter().map(ToString::to_string).collect();
        let pools = [PoolKey::new("appdb", "web")].into_iter().collect();
        Plugin::with_tracked(lazy_pool(), databases, pools).expect("distinct descriptor names")
    }

    #[tokio::test]
    async fn test_descriptors_generated_for_tracked_sets() {
        let plugin = sample_plugin();
        assert_eq!(plugin.descriptors().len(), 16);
        assert_eq!(plugin.tracked_databases().len(), 1);
        assert_eq!(plugin.tracked_pools().len(), 1);
    }

    #[tokio::test]
    async fn test_with_tracked_rejects_colliding_pool_names() {
        let pools = [PoolKey::new("a.b", "c"), PoolKey::new("a", "b.c")]
            .into_iter()
            .collect();

        let result = Plugin::with_tracked(lazy_pool(), BTreeSet::new(), pools);
        assert!(matches!(
            result,
            Err(PluginError::DuplicateMetricName { .. })
        ));
    }

    #[tokio::test]
    async fn test_metric_value_unknown_name_is_lookup_error() {
        let plugin = sample_plugin();

        let result = plugin.metric_value("stats_total_request_nosuchdb").await;
        assert!(matches!(
            result,
            Err(PluginError::UnknownMetric { ref name }) if name == "stats_total_request_nosuchdb"
        ));
    }

    #[tokio::test]
    async fn test_metric_value_fetch_failure_is_admin_error() {
        let plugin = sample_plugin();

        // Known name, but the lazy pool cannot reach any server.
        let result = plugin.metric_value("stats_total_request_appdb").await;
        assert!(matches!(result, Err(PluginError::Admin(_))));
    }
}
