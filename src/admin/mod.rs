//! PgBouncer admin-console client.
//!
//! The console is the reserved `pgbouncer` database, spoken over the regular
//! PostgreSQL wire protocol. Each `SHOW` statement is a single synchronous
//! round trip returning a fixed, ordered column tuple per row.

use anyhow::{Result, anyhow};
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::{PgPool, Row};
use std::time::Duration;
use tracing::info_span;
use tracing_futures::Instrument as _;

/// PgBouncer exposes its admin console on this reserved database name.
pub const ADMIN_DATABASE: &str = "pgbouncer";

/// Connection parameters for the admin console.
#[derive(Clone, Debug)]
pub struct AdminConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<SecretString>,
    pub sslmode: String,
}

impl AdminConfig {
    /// Build connect options targeting the admin console.
    ///
    /// The statement cache is disabled: the console rejects reuse of named
    /// prepared statements across its internal connection handling.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured sslmode is not recognized.
    pub fn connect_options(&self) -> Result<PgConnectOptions> {
        let mut options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .database(ADMIN_DATABASE)
            .ssl_mode(parse_sslmode(&self.sslmode)?)
            .statement_cache_capacity(0);

        if let Some(password) = &self.password {
            options = options.password(password.expose_secret());
        }

        Ok(options)
    }

    /// Open a small shared pool to the admin console.
    ///
    /// # Errors
    ///
    /// Returns an error if the sslmode is invalid or the connection fails.
    pub async fn connect(&self) -> Result<PgPool> {
        let options = self.connect_options()?;
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .min_connections(0)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await?;
        Ok(pool)
    }
}

fn parse_sslmode(value: &str) -> Result<PgSslMode> {
    match value.to_ascii_lowercase().as_str() {
        "disable" => Ok(PgSslMode::Disable),
        "allow" => Ok(PgSslMode::Allow),
        "prefer" => Ok(PgSslMode::Prefer),
        "require" => Ok(PgSslMode::Require),
        "verify-ca" => Ok(PgSslMode::VerifyCa),
        "verify-full" => Ok(PgSslMode::VerifyFull),
        other => Err(anyhow!("unrecognized sslmode: {other}")),
    }
}

/// One row of `SHOW STATS`: four cumulative totals and four averages.
#[derive(Clone, Debug)]
pub struct StatsRow {
    pub database: String,
    pub total_requests: i64,
    pub total_received: i64,
    pub total_sent: i64,
    pub total_query_time: i64,
    pub avg_req: i64,
    pub avg_recv: i64,
    pub avg_sent: i64,
    pub avg_query: i64,
}

/// One row of `SHOW POOLS`: instantaneous client/server connection gauges.
#[derive(Clone, Debug)]
pub struct PoolRow {
    pub database: String,
    pub user: String,
    pub cl_active: i64,
    pub cl_waiting: i64,
    pub sv_active: i64,
    pub sv_idle: i64,
    pub sv_used: i64,
    pub sv_tested: i64,
    pub sv_login: i64,
    pub maxwait: i64,
}

/// One row of `SHOW DATABASES` (only the field the exporter needs).
#[derive(Clone, Debug)]
pub struct DatabaseRow {
    pub database: String,
}

/// Fetch all `SHOW STATS` rows.
///
/// # Errors
///
/// Returns an error if the query or row decoding fails.
pub async fn show_stats(pool: &PgPool) -> Result<Vec<StatsRow>, sqlx::Error> {
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SHOW",
        db.statement = "SHOW STATS",
        otel.kind = "client"
    );

    let rows = sqlx::query("SHOW STATS")
        .fetch_all(pool)
        .instrument(span)
        .await?;

    rows.iter()
        .map(|row| {
            Ok(StatsRow {
                database: row.try_get("database")?,
                total_requests: row.try_get("total_requests")?,
                total_received: row.try_get("total_received")?,
                total_sent: row.try_get("total_sent")?,
                total_query_time: row.try_get("total_query_time")?,
                avg_req: row.try_get("avg_req")?,
                avg_recv: row.try_get("avg_recv")?,
                avg_sent: row.try_get("avg_sent")?,
                avg_query: row.try_get("avg_query")?,
            })
        })
        .collect()
}

/// Fetch all `SHOW POOLS` rows.
///
/// # Errors
///
/// Returns an error if the query or row decoding fails.
pub async fn show_pools(pool: &PgPool) -> Result<Vec<PoolRow>, sqlx::Error> {
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SHOW",
        db.statement = "SHOW POOLS",
        otel.kind = "client"
    );

    let rows = sqlx::query("SHOW POOLS")
        .fetch_all(pool)
        .instrument(span)
        .await?;

    rows.iter()
        .map(|row| {
            // The console declares the pool gauges as 4-byte integers.
            Ok(PoolRow {
                database: row.try_get("database")?,
                user: row.try_get("user")?,
                cl_active: i64::from(row.try_get::<i32, _>("cl_active")?),
                cl_waiting: i64::from(row.try_get::<i32, _>("cl_waiting")?),
                sv_active: i64::from(row.try_get::<i32, _>("sv_active")?),
                sv_idle: i64::from(row.try_get::<i32, _>("sv_idle")?),
                sv_used: i64::from(row.try_get::<i32, _>("sv_used")?),
                sv_tested: i64::from(row.try_get::<i32, _>("sv_tested")?),
                sv_login: i64::from(row.try_get::<i32, _>("sv_login")?),
                maxwait: i64::from(row.try_get::<i32, _>("maxwait")?),
            })
        })
        .collect()
}

/// Fetch all `SHOW DATABASES` rows.
///
/// # Errors
///
/// Returns an error if the query or row decoding fails.
pub async fn show_databases(pool: &PgPool) -> Result<Vec<DatabaseRow>, sqlx::Error> {
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SHOW",
        db.statement = "SHOW DATABASES",
        otel.kind = "client"
    );

    let rows = sqlx::query("SHOW DATABASES")
        .fetch_all(pool)
        .instrument(span)
        .await?;

    rows.iter()
        .map(|row| {
            Ok(DatabaseRow {
                database: row.try_get("database")?,
            })
        })
        .collect()
}

/// Fetch the PgBouncer version banner, e.g. `PgBouncer 1.12.0`.
///
/// # Errors
///
/// Returns an error if the query fails.
pub async fn show_version(pool: &PgPool) -> Result<String, sqlx::Error> {
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SHOW",
        db.statement = "SHOW VERSION",
        otel.kind = "client"
    );

    sqlx::query_scalar::<_, String>("SHOW VERSION")
        .fetch_one(pool)
        .instrument(span)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sslmode_known_values() {
        assert!(matches!(parse_sslmode("disable"), Ok(PgSslMode::Disable)));
        assert!(matches!(parse_sslmode("require"), Ok(PgSslMode::Require)));
        assert!(matches!(
            parse_sslmode("Verify-Full"),
            Ok(PgSslMode::VerifyFull)
        ));
    }

    #[test]
    fn test_parse_sslmode_rejects_unknown() {
        assert!(parse_sslmode("mystery").is_err());
    }

    #[test]
    fn test_connect_options_target_admin_database() {
        let config = AdminConfig {
            host: "localhost".to_string(),
            port: 6432,
            user: "stats".to_string(),
            password: Some(SecretString::from("hunter2")),
            sslmode: "disable".to_string(),
        };

        assert!(config.connect_options().is_ok());
    }

    #[test]
    fn test_connect_options_invalid_sslmode() {
        let config = AdminConfig {
            host: "localhost".to_string(),
            port: 6432,
            user: "stats".to_string(),
            password: None,
            sslmode: "bogus".to_string(),
        };

        assert!(config.connect_options().is_err());
    }
}
