//! HTTP surface: `/metrics` and `/health`.

use crate::admin::AdminConfig;
use crate::collectors::registry::CollectorRegistry;
use crate::plugin::Plugin;
use anyhow::Result;
use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

#[derive(Clone)]
struct AppState {
    plugin: Arc<Plugin>,
    collectors: Arc<CollectorRegistry>,
}

/// Start the exporter: connect to the admin console, discover tracked
/// entities, register the enabled collectors and serve until shutdown.
///
/// # Errors
///
/// Returns an error if the admin connection, discovery, metric
/// registration, or socket bind fails.
pub async fn new(
    port: u16,
    listen: Option<String>,
    admin: AdminConfig,
    databases: Vec<String>,
    collectors: Vec<String>,
) -> Result<()> {
    let pool = admin.connect().await?;
    let plugin = Arc::new(Plugin::init(pool, &databases).await?);
    let registry = Arc::new(CollectorRegistry::new(&collectors, &plugin)?);

    info!(collectors = ?registry.collector_names(), "starting exporter");

    let state = AppState {
        plugin: Arc::clone(&plugin),
        collectors: registry,
    };

    let app = Router::new()
        .route("/metrics", get(metrics))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = bind(listen.as_deref(), port).await?;
    info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    plugin.cleanup().await;

    Ok(())
}

async fn bind(listen: Option<&str>, port: u16) -> Result<TcpListener> {
    match listen {
        Some(host) => {
            let addr = if host.contains(':') {
                format!("[{host}]:{port}")
            } else {
                format!("{host}:{port}")
            };
            Ok(TcpListener::bind(addr).await?)
        }
        None => {
            // Prefer a dual-stack IPv6 socket, fall back on IPv4-only hosts.
            match TcpListener::bind(format!("[::]:{port}")).await {
                Ok(listener) => Ok(listener),
                Err(e) => {
                    warn!(error = %e, "IPv6 bind failed, falling back to IPv4");
                    Ok(TcpListener::bind(format!("0.0.0.0:{port}")).await?)
                }
            }
        }
    }
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    if let Err(e) = state.collectors.collect_all(&state.plugin).await {
        error!(error = %e, "metrics collection failed");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("collection failed: {e}"),
        )
            .into_response();
    }

    let metric_families = state.collectors.prometheus_registry().gather();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to encode metrics: {e}"),
        )
            .into_response();
    }

    (
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_explicit_ipv4() {
        let listener = bind(Some("127.0.0.1"), 0).await;
        assert!(listener.is_ok());
    }

    #[tokio::test]
    #[allow(clippy::unwrap_used)]
    async fn test_bind_auto_detect() {
        let listener = bind(None, 0).await;
        assert!(listener.is_ok());
        assert_ne!(listener.unwrap().local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn test_bind_ipv6_host_is_bracketed() {
        // Binding "::1" must not be parsed as host ":" + port "1".
        let listener = bind(Some("::1"), 0).await;

        // IPv6 loopback may be unavailable in some environments; either way
        // the address must have parsed.
        if let Ok(listener) = listener {
            #[allow(clippy::unwrap_used)]
            let addr = listener.local_addr().unwrap();
            assert!(addr.is_ipv6());
        }
    }
}
