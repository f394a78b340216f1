use crate::admin;
use crate::collectors::Collector;
use crate::plugin::Plugin;
use anyhow::{Result, anyhow};
use futures::future::BoxFuture;
use prometheus::{IntGauge, IntGaugeVec, Opts, Registry};
use regex::Regex;
use tracing::instrument;

/// Handles PgBouncer version metrics
#[derive(Clone)]
pub struct VersionCollector {
    version_info: IntGaugeVec,
    version_num: IntGauge,
    version_regex: Regex,
}

impl Default for VersionCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionCollector {
    #[must_use]
    #[allow(clippy::expect_used)]
    ///
    /// # Panics
    ///
    /// Panics if metric creation fails.
    pub fn new() -> Self {
        let version_info = IntGaugeVec::new(
            Opts::new(
                "pgbouncer_version_info",
                "PgBouncer version information with labels for version details.",
            ),
            &["version", "short_version"],
        )
        .expect("valid pgbouncer_version_info metric opts");

        let version_num = IntGauge::new(
            "pgbouncer_version_num",
            "PgBouncer version number formatted as major*10000 + minor*100 + patch",
        )
        .expect("valid pgbouncer_version_num metric opts");

        let version_regex = Regex::new(r"((\d+)(\.\d+)?(\.\d+)?)").expect("valid version regex");

        Self {
            version_info,
            version_num,
            version_regex,
        }
    }

    fn normalize_version(&self, version: &str) -> Result<(String, i64)> {
        if let Some(captures) = self.version_regex.captures(version)
            && let Some(version_match) = captures.get(1)
        {
            let parts: Vec<&str> = version_match.as_str().split('.').collect();
            let major = parts
                .first()
                .and_then(|s| s.parse::<i64>().ok())
                .unwrap_or(0);
            let minor = parts.get(1).and_then(|s| s.parse::<i64>().ok()).unwrap_or(0);
            let patch = parts.get(2).and_then(|s| s.parse::<i64>().ok()).unwrap_or(0);

            let normalized = match parts.len() {
                1 => format!("{major}.0.0"),
                2 => format!("{major}.{minor}.0"),
                _ => version_match.as_str().to_string(),
            };

            let version_num = major * 10000 + minor * 100 + patch;

            return Ok((normalized, version_num));
        }

        Err(anyhow!(
            "could not parse version from server response: {version}"
        ))
    }
}

impl Collector for VersionCollector {
    fn name(&self) -> &'static str {
        "version"
    }

    #[instrument(
        skip(self, _plugin, registry),
        level = "info",
        err,
        fields(collector = "version")
    )]
    fn register_metrics(&self, _plugin: &Plugin, registry: &Registry) -> Result<()> {
        registry.register(Box::new(self.version_info.clone()))?;
        registry.register(Box::new(self.version_num.clone()))?;
        Ok(())
    }

    #[instrument(skip(self, plugin), level = "info", err, fields(collector = "version", otel.kind = "internal"))]
    fn collect<'a>(&'a self, plugin: &'a Plugin) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            // Banner looks like "PgBouncer 1.12.0".
            let banner = admin::show_version(plugin.admin_pool()).await?;

            let (short_version, version_num) = self.normalize_version(&banner)?;

            self.version_info
                .with_label_values(&[banner.trim(), &short_version])
                .set(1);
            self.version_num.set(version_num);

            Ok(())
        })
    }

    fn enabled_by_default(&self) -> bool {
        true
    }
}
