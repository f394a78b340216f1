//! Typed metric identifiers and the per-cycle snapshot.
//!
//! Metric values are keyed by a structured [`MetricId`] internally; the flat
//! `<category>_<field>_<entity>` string form is rendered only at the exporter
//! boundary so key composition stays deterministic and collision-free.

use std::collections::HashMap;
use std::fmt;

pub mod reconcile;

pub use reconcile::{DeltaBaselines, Totals, build_snapshot};

/// Per-database fields reported by `SHOW STATS`.
///
/// The four `Total*` fields are cumulative counters on the PgBouncer side and
/// are converted into per-interval deltas; the four `Avg*` fields are already
/// interval averages and pass through unmodified.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatsField {
    TotalRequests,
    TotalReceived,
    TotalSent,
    TotalQueryTime,
    AvgReq,
    AvgRecv,
    AvgSent,
    AvgQuery,
}

impl StatsField {
    pub const ALL: [Self; 8] = [
        Self::TotalRequests,
        Self::TotalReceived,
        Self::TotalSent,
        Self::TotalQueryTime,
        Self::AvgReq,
        Self::AvgRecv,
        Self::AvgSent,
        Self::AvgQuery,
    ];

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::TotalRequests => "total_request",
            Self::TotalReceived => "total_received",
            Self::TotalSent => "total_sent",
            Self::TotalQueryTime => "total_query_time",
            Self::AvgReq => "avg_req",
            Self::AvgRecv => "avg_recv",
            Self::AvgSent => "avg_sent",
            Self::AvgQuery => "avg_query",
        }
    }

    #[must_use]
    pub const fn units(self) -> &'static str {
        match self {
            Self::TotalRequests => "SQL requests",
            Self::TotalReceived | Self::TotalSent => "Bytes",
            Self::TotalQueryTime => "microseconds",
            Self::AvgReq => "SQL requests/second",
            Self::AvgRecv | Self::AvgSent => "Bytes/second",
            Self::AvgQuery => "milliseconds",
        }
    }

    #[must_use]
    pub const fn help(self) -> &'static str {
        match self {
            Self::TotalRequests => {
                "Number of SQL requests pooled by pgbouncer since last access"
            }
            Self::TotalReceived => {
                "Volume in bytes of network traffic received by pgbouncer since last access"
            }
            Self::TotalSent => {
                "Volume in bytes of network traffic sent by pgbouncer since last access"
            }
            Self::TotalQueryTime => {
                "Microseconds spent by pgbouncer actively connected to PostgreSQL since last access"
            }
            Self::AvgReq => "Average requests per second in last stat period",
            Self::AvgRecv => "Average received (from clients) bytes per second",
            Self::AvgSent => "Average sent (to clients) bytes per second",
            Self::AvgQuery => "Average query duration in milliseconds",
        }
    }

    /// Cumulative counter fields, reported as deltas since the last poll.
    #[must_use]
    pub const fn is_total(self) -> bool {
        matches!(
            self,
            Self::TotalRequests | Self::TotalReceived | Self::TotalSent | Self::TotalQueryTime
        )
    }
}

/// Per-pool fields reported by `SHOW POOLS`. All are instantaneous gauges.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PoolField {
    ClActive,
    ClWaiting,
    SvActive,
    SvIdle,
    SvUsed,
    SvTested,
    SvLogin,
    MaxWait,
}

impl PoolField {
    pub const ALL: [Self; 8] = [
        Self::ClActive,
        Self::ClWaiting,
        Self::SvActive,
        Self::SvIdle,
        Self::SvUsed,
        Self::SvTested,
        Self::SvLogin,
        Self::MaxWait,
    ];

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::ClActive => "cl_active",
            Self::ClWaiting => "cl_waiting",
            Self::SvActive => "sv_active",
            Self::SvIdle => "sv_idle",
            Self::SvUsed => "sv_used",
            Self::SvTested => "sv_tested",
            Self::SvLogin => "sv_login",
            Self::MaxWait => "maxwait",
        }
    }

    #[must_use]
    pub const fn units(self) -> &'static str {
        match self {
            Self::MaxWait => "seconds",
            _ => "connections",
        }
    }

    #[must_use]
    pub const fn help(self) -> &'static str {
        match self {
            Self::ClActive => "Count of currently active client connections",
            Self::ClWaiting => "Count of currently waiting client connections",
            Self::SvActive => "Count of currently active server connections",
            Self::SvIdle => "Count of currently idle server connections",
            Self::SvUsed => "Count of currently used server connections",
            Self::SvTested => "Count of currently tested server connections",
            Self::SvLogin => "Count of server connections currently logged into PostgreSQL",
            Self::MaxWait => "How long the first (oldest) client in queue has waited, in seconds",
        }
    }
}

/// Identity of one pool: the (database, user) pair PgBouncer keys pools by.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolKey {
    pub database: String,
    pub user: String,
}

impl PoolKey {
    #[must_use]
    pub fn new(database: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            user: user.into(),
        }
    }
}

/// Structured metric identifier: a field plus the entity it belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum MetricId {
    Stats { field: StatsField, database: String },
    Pool { field: PoolField, pool: PoolKey },
}

impl MetricId {
    #[must_use]
    pub fn stats(field: StatsField, database: impl Into<String>) -> Self {
        Self::Stats {
            field,
            database: database.into(),
        }
    }

    #[must_use]
    pub const fn pool(field: PoolField, pool: PoolKey) -> Self {
        Self::Pool { field, pool }
    }
}

impl fmt::Display for MetricId {
    /// Renders the stable `<category>_<field>_<entity-key>` metric name.
    ///
    /// The pool entity key joins database and user with a dot. Underscores
    /// are common in Postgres identifiers, so joining with `_` would render
    /// distinct pools identically (`a_b`/`c` vs `a`/`b_c`).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stats { field, database } => {
                write!(f, "stats_{}_{database}", field.key())
            }
            Self::Pool { field, pool } => {
                write!(f, "pool_{}_{}.{}", field.key(), pool.database, pool.user)
            }
        }
    }
}

/// Flat mapping from metric identity to numeric value, rebuilt from scratch
/// on every cache miss. Never partially updated.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    values: HashMap<MetricId, i64>,
}

impl Snapshot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: MetricId, value: i64) {
        self.values.insert(id, value);
    }

    #[must_use]
    pub fn get(&self, id: &MetricId) -> Option<i64> {
        self.values.get(id).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MetricId, i64)> {
        self.values.iter().map(|(id, v)| (id, *v))
    }
}
