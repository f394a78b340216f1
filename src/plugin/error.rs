use thiserror::Error;

/// Failures at the plugin boundary.
///
/// A fatal fetch failure for the current poll cycle (no retry, no partial
/// snapshot), a lookup miss that indicates a mismatch between the generated
/// descriptors and the fetch logic or a pool omitted from the current cycle,
/// or a rendered-name clash detected while building the descriptor index.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("admin console query failed: {0}")]
    Admin(#[from] sqlx::Error),

    #[error("unknown metric: {name}")]
    UnknownMetric { name: String },

    #[error("duplicate metric name: {name}")]
    DuplicateMetricName { name: String },
}

impl PluginError {
    #[must_use]
    pub fn unknown_metric(name: impl Into<String>) -> Self {
        Self::UnknownMetric { name: name.into() }
    }
}
