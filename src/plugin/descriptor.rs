//! Static metric descriptors, generated once at initialization.
//!
//! Every tracked database contributes eight descriptors (four counter deltas,
//! four averages) and every tracked pool contributes eight gauge descriptors.
//! Each descriptor's name round-trips through the shared retrieval entry
//! point [`crate::plugin::Plugin::metric_value`].

use crate::plugin::{CACHE_EXPIRY, PluginError};
use crate::snapshot::{MetricId, PoolField, PoolKey, StatsField};
use std::collections::{BTreeSet, HashMap};

/// Grouping label exposed alongside each metric.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetricGroup {
    Stats,
    Pools,
}

impl MetricGroup {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Stats => "pgBouncer Stats",
            Self::Pools => "pgBouncer Pools",
        }
    }
}

/// Value type/format hint for the host daemon.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueType {
    Uint,
}

impl ValueType {
    #[must_use]
    pub const fn format(self) -> &'static str {
        match self {
            Self::Uint => "%u",
        }
    }
}

/// Static metadata describing one exposed metric.
#[derive(Clone, Debug)]
pub struct MetricDescriptor {
    pub id: MetricId,
    pub name: String,
    pub units: &'static str,
    pub description: &'static str,
    pub group: MetricGroup,
    pub value_type: ValueType,
    /// Polling-interval ceiling in seconds; matches the cache expiry.
    pub time_max: u64,
}

/// Generate the full descriptor list for the tracked sets.
#[must_use]
pub fn generate(
    tracked_databases: &BTreeSet<String>,
    tracked_pools: &BTreeSet<PoolKey>,
) -> Vec<MetricDescriptor> {
    let mut descriptors =
        Vec::with_capacity(8 * tracked_databases.len() + 8 * tracked_pools.len());

    for database in tracked_databases {
        for field in StatsField::ALL {
            let id = MetricId::stats(field, database.clone());
            descriptors.push(MetricDescriptor {
                name: id.to_string(),
                id,
                units: field.units(),
                description: field.help(),
                group: MetricGroup::Stats,
                value_type: ValueType::Uint,
                time_max: CACHE_EXPIRY.as_secs(),
            });
        }
    }

    for pool in tracked_pools {
        for field in PoolField::ALL {
            let id = MetricId::pool(field, pool.clone());
            descriptors.push(MetricDescriptor {
                name: id.to_string(),
                id,
                units: field.units(),
                description: field.help(),
                group: MetricGroup::Pools,
                value_type: ValueType::Uint,
                time_max: CACHE_EXPIRY.as_secs(),
            });
        }
    }

    descriptors
}

/// Index from rendered metric name back to its structured identifier.
///
/// # Errors
///
/// Returns [`PluginError::DuplicateMetricName`] if two descriptors render
/// to the same name; silently collapsing them would make one entity's
/// values overwrite the other's.
pub fn name_index(
    descriptors: &[MetricDescriptor],
) -> Result<HashMap<String, MetricId>, PluginError> {
    let mut index = HashMap::with_capacity(descriptors.len());
    for descriptor in descriptors {
        if index
            .insert(descriptor.name.clone(), descriptor.id.clone())
            .is_some()
        {
            return Err(PluginError::DuplicateMetricName {
                name: descriptor.name.clone(),
            });
        }
    }
    Ok(index)
}
