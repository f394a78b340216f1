//! Delta accounting for `SHOW STATS` counters and assembly of the per-cycle
//! snapshot.
//!
//! PgBouncer reports the four `total_*` columns as cumulative counters. Each
//! poll converts them to per-interval deltas against a per-database baseline:
//!
//! - First observation of a database seeds the baseline from the raw totals
//!   verbatim, yielding a zero delta for that interval. This avoids reporting
//!   an arbitrarily large delta when the counters already hold accumulated
//!   history.
//! - A tracked database missing from a poll is zero-filled for all eight
//!   fields and its baseline reset to zero, so a later reappearance with raw
//!   total `T` reports `T` rather than `T` minus a stale baseline.

use crate::admin::{PoolRow, StatsRow};
use crate::snapshot::{MetricId, PoolField, PoolKey, Snapshot, StatsField};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Raw cumulative totals for one database, as last observed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Totals {
    pub requests: i64,
    pub received: i64,
    pub sent: i64,
    pub query_time: i64,
}

impl Totals {
    #[must_use]
    pub const fn delta_since(self, baseline: Self) -> Self {
        Self {
            requests: self.requests - baseline.requests,
            received: self.received - baseline.received,
            sent: self.sent - baseline.sent,
            query_time: self.query_time - baseline.query_time,
        }
    }
}

impl From<&StatsRow> for Totals {
    fn from(row: &StatsRow) -> Self {
        Self {
            requests: row.total_requests,
            received: row.total_received,
            sent: row.total_sent,
            query_time: row.total_query_time,
        }
    }
}

/// Process-lifetime baseline state: last observed raw totals per database.
#[derive(Clone, Debug, Default)]
pub struct DeltaBaselines {
    totals: HashMap<String, Totals>,
}

impl DeltaBaselines {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, database: &str) -> Option<Totals> {
        self.totals.get(database).copied()
    }

    pub fn set(&mut self, database: &str, totals: Totals) {
        self.totals.insert(database.to_string(), totals);
    }
}

/// Build the full metric snapshot for one poll cycle.
///
/// Applies the tracked-set filters, computes counter deltas against
/// `baselines` (mutating them to the new raw totals), zero-fills tracked
/// databases absent from `stats`, and passes tracked pool gauges through
/// verbatim. Pools absent from `pools` are simply omitted for this cycle.
#[must_use]
pub fn build_snapshot(
    tracked_databases: &BTreeSet<String>,
    tracked_pools: &BTreeSet<PoolKey>,
    stats: &[StatsRow],
    pools: &[PoolRow],
    baselines: &mut DeltaBaselines,
) -> Snapshot {
    let mut snapshot = Snapshot::new();

    let mut seen = BTreeSet::new();
    for row in stats {
        if !tracked_databases.contains(&row.database) {
            debug!(database = %row.database, "skipping untracked database");
            continue;
        }
        seen.insert(row.database.clone());

        let current = Totals::from(row);
        let delta = match baselines.get(&row.database) {
            Some(previous) => current.delta_since(previous),
            // First observation: seed the baseline, report a zero delta.
            None => Totals::default(),
        };
        baselines.set(&row.database, current);

        insert_stats(&mut snapshot, &row.database, delta, row);
    }

    // Tracked databases missing from this poll had no activity: emit zeros
    // and reset their baseline.
    for database in tracked_databases {
        if seen.contains(database) {
            continue;
        }
        baselines.set(database, Totals::default());
        for field in StatsField::ALL {
            snapshot.insert(MetricId::stats(field, database.clone()), 0);
        }
    }

    for row in pools {
        let key = PoolKey::new(row.database.clone(), row.user.clone());
        if !tracked_pools.contains(&key) {
            continue;
        }
        insert_pool(&mut snapshot, &key, row);
    }

    snapshot
}

fn insert_stats(snapshot: &mut Snapshot, database: &str, delta: Totals, row: &StatsRow) {
    for field in StatsField::ALL {
        let value = match field {
            StatsField::TotalRequests => delta.requests,
            StatsField::TotalReceived => delta.received,
            StatsField::TotalSent => delta.sent,
            StatsField::TotalQueryTime => delta.query_time,
            StatsField::AvgReq => row.avg_req,
            StatsField::AvgRecv => row.avg_recv,
            StatsField::AvgSent => row.avg_sent,
            StatsField::AvgQuery => row.avg_query,
        };
        snapshot.insert(MetricId::stats(field, database), value);
    }
}

fn insert_pool(snapshot: &mut Snapshot, key: &PoolKey, row: &PoolRow) {
    for field in PoolField::ALL {
        let value = match field {
            PoolField::ClActive => row.cl_active,
            PoolField::ClWaiting => row.cl_waiting,
            PoolField::SvActive => row.sv_active,
            PoolField::SvIdle => row.sv_idle,
            PoolField::SvUsed => row.sv_used,
            PoolField::SvTested => row.sv_tested,
            PoolField::SvLogin => row.sv_login,
            PoolField::MaxWait => row.maxwait,
        };
        snapshot.insert(MetricId::pool(field, key.clone()), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats_row(database: &str, totals: (i64, i64, i64, i64)) -> StatsRow {
        StatsRow {
            database: database.to_string(),
            total_requests: totals.0,
            total_received: totals.1,
            total_sent: totals.2,
            total_query_time: totals.3,
            avg_req: 10,
            avg_recv: 20,
            avg_sent: 30,
            avg_query: 40,
        }
    }

    fn pool_row(database: &str, user: &str) -> PoolRow {
        PoolRow {
            database: database.to_string(),
            user: user.to_string(),
            cl_active: 5,
            cl_waiting: 1,
            sv_active: 3,
            sv_idle: 2,
            sv_used: 4,
            sv_tested: 0,
            sv_login: 1,
            maxwait: 7,
        }
    }

    fn tracked(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(ToString::to_string).collect()
    }

    fn get_stat(snapshot: &Snapshot, field: StatsField, database: &str) -> Option<i64> {
        snapshot.get(&MetricId::stats(field, database))
    }

    #[test]
    fn test_first_interval_zero_delta() {
        let databases = tracked(&["appdb"]);
        let pools = BTreeSet::new();
        let mut baselines = DeltaBaselines::new();

        let rows = [stats_row("appdb", (100, 5000, 4000, 2000))];
        let snapshot = build_snapshot(&databases, &pools, &rows, &[], &mut baselines);

        for field in [
            StatsField::TotalRequests,
            StatsField::TotalReceived,
            StatsField::TotalSent,
            StatsField::TotalQueryTime,
        ] {
            assert_eq!(get_stat(&snapshot, field, "appdb"), Some(0));
        }

        // Baseline seeded from the raw totals.
        assert_eq!(
            baselines.get("appdb"),
            Some(Totals {
                requests: 100,
                received: 5000,
                sent: 4000,
                query_time: 2000,
            })
        );
    }

    #[test]
    fn test_delta_correctness_across_polls() {
        let databases = tracked(&["appdb"]);
        let pools = BTreeSet::new();
        let mut baselines = DeltaBaselines::new();

        let first = [stats_row("appdb", (100, 5000, 4000, 2000))];
        let _ = build_snapshot(&databases, &pools, &first, &[], &mut baselines);

        let second = [stats_row("appdb", (150, 7000, 6000, 2500))];
        let snapshot = build_snapshot(&databases, &pools, &second, &[], &mut baselines);

        assert_eq!(get_stat(&snapshot, StatsField::TotalRequests, "appdb"), Some(50));
        assert_eq!(get_stat(&snapshot, StatsField::TotalReceived, "appdb"), Some(2000));
        assert_eq!(get_stat(&snapshot, StatsField::TotalSent, "appdb"), Some(2000));
        assert_eq!(get_stat(&snapshot, StatsField::TotalQueryTime, "appdb"), Some(500));

        assert_eq!(
            baselines.get("appdb"),
            Some(Totals {
                requests: 150,
                received: 7000,
                sent: 6000,
                query_time: 2500,
            })
        );
    }

    #[test]
    fn test_averages_pass_through_unmodified() {
        let databases = tracked(&["appdb"]);
        let pools = BTreeSet::new();
        let mut baselines = DeltaBaselines::new();

        let rows = [stats_row("appdb", (100, 5000, 4000, 2000))];
        let snapshot = build_snapshot(&databases, &pools, &rows, &[], &mut baselines);

        assert_eq!(get_stat(&snapshot, StatsField::AvgReq, "appdb"), Some(10));
        assert_eq!(get_stat(&snapshot, StatsField::AvgRecv, "appdb"), Some(20));
        assert_eq!(get_stat(&snapshot, StatsField::AvgSent, "appdb"), Some(30));
        assert_eq!(get_stat(&snapshot, StatsField::AvgQuery, "appdb"), Some(40));
    }

    #[test]
    fn test_missing_database_zero_fill_and_baseline_reset() {
        let databases = tracked(&["appdb"]);
        let pools = BTreeSet::new();
        let mut baselines = DeltaBaselines::new();

        let first = [stats_row("appdb", (100, 5000, 4000, 2000))];
        let _ = build_snapshot(&databases, &pools, &first, &[], &mut baselines);

        // appdb disappears from the poll entirely.
        let snapshot = build_snapshot(&databases, &pools, &[], &[], &mut baselines);

        for field in StatsField::ALL {
            assert_eq!(get_stat(&snapshot, field, "appdb"), Some(0));
        }
        assert_eq!(baselines.get("appdb"), Some(Totals::default()));

        // Reappearance reports the full raw totals, not raw minus stale.
        let third = [stats_row("appdb", (130, 6000, 5000, 2200))];
        let snapshot = build_snapshot(&databases, &pools, &third, &[], &mut baselines);
        assert_eq!(get_stat(&snapshot, StatsField::TotalRequests, "appdb"), Some(130));
        assert_eq!(get_stat(&snapshot, StatsField::TotalReceived, "appdb"), Some(6000));
        assert_eq!(get_stat(&snapshot, StatsField::TotalSent, "appdb"), Some(5000));
        assert_eq!(get_stat(&snapshot, StatsField::TotalQueryTime, "appdb"), Some(2200));
    }

    #[test]
    fn test_untracked_database_rows_skipped() {
        let databases = tracked(&["appdb"]);
        let pools = BTreeSet::new();
        let mut baselines = DeltaBaselines::new();

        let rows = [
            stats_row("appdb", (100, 5000, 4000, 2000)),
            stats_row("otherdb", (999, 999, 999, 999)),
        ];
        let snapshot = build_snapshot(&databases, &pools, &rows, &[], &mut baselines);

        assert_eq!(snapshot.len(), 8);
        assert_eq!(get_stat(&snapshot, StatsField::TotalRequests, "otherdb"), None);
        assert_eq!(baselines.get("otherdb"), None);
    }

    #[test]
    fn test_pool_filtering_and_verbatim_values() {
        let databases = BTreeSet::new();
        let mut pools = BTreeSet::new();
        pools.insert(PoolKey::new("appdb", "web"));
        let mut baselines = DeltaBaselines::new();

        let rows = [pool_row("appdb", "web"), pool_row("appdb", "batch")];
        let snapshot = build_snapshot(&databases, &pools, &[], &rows, &mut baselines);

        // Only the tracked pool appears, all eight fields verbatim.
        assert_eq!(snapshot.len(), 8);
        let key = PoolKey::new("appdb", "web");
        assert_eq!(snapshot.get(&MetricId::pool(PoolField::ClActive, key.clone())), Some(5));
        assert_eq!(snapshot.get(&MetricId::pool(PoolField::ClWaiting, key.clone())), Some(1));
        assert_eq!(snapshot.get(&MetricId::pool(PoolField::SvActive, key.clone())), Some(3));
        assert_eq!(snapshot.get(&MetricId::pool(PoolField::SvIdle, key.clone())), Some(2));
        assert_eq!(snapshot.get(&MetricId::pool(PoolField::SvUsed, key.clone())), Some(4));
        assert_eq!(snapshot.get(&MetricId::pool(PoolField::SvTested, key.clone())), Some(0));
        assert_eq!(snapshot.get(&MetricId::pool(PoolField::SvLogin, key.clone())), Some(1));
        assert_eq!(snapshot.get(&MetricId::pool(PoolField::MaxWait, key.clone())), Some(7));

        let untracked = PoolKey::new("appdb", "batch");
        assert_eq!(snapshot.get(&MetricId::pool(PoolField::ClActive, untracked)), None);
    }

    #[test]
    fn test_missing_pool_omitted_not_zero_filled() {
        let databases = BTreeSet::new();
        let mut pools = BTreeSet::new();
        pools.insert(PoolKey::new("appdb", "web"));
        let mut baselines = DeltaBaselines::new();

        let snapshot = build_snapshot(&databases, &pools, &[], &[], &mut baselines);
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_database_first_seen_after_zero_fill_cycle() {
        let databases = tracked(&["appdb", "latedb"]);
        let pools = BTreeSet::new();
        let mut baselines = DeltaBaselines::new();

        // latedb absent on the first poll: zero-filled, baseline zeroed.
        let first = [stats_row("appdb", (100, 5000, 4000, 2000))];
        let snapshot = build_snapshot(&databases, &pools, &first, &[], &mut baselines);
        assert_eq!(get_stat(&snapshot, StatsField::TotalRequests, "latedb"), Some(0));
        assert_eq!(baselines.get("latedb"), Some(Totals::default()));

        // On first appearance the full totals count against the zero baseline.
        let second = [
            stats_row("appdb", (100, 5000, 4000, 2000)),
            stats_row("latedb", (40, 400, 300, 200)),
        ];
        let snapshot = build_snapshot(&databases, &pools, &second, &[], &mut baselines);
        assert_eq!(get_stat(&snapshot, StatsField::TotalRequests, "latedb"), Some(40));
        assert_eq!(get_stat(&snapshot, StatsField::TotalRequests, "appdb"), Some(0));
    }
}
