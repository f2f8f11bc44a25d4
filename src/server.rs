//! HTTP server for the probe endpoint.
//!
//! This module provides an Axum-based HTTP server that serves the `/probe`
//! endpoint for Prometheus multi-target scraping, the exporter's own
//! `/metrics`, and a `/health` endpoint for health checks.

use crate::error::Result;
use crate::metrics::ExporterMetrics;
use crate::prober::{ProbeQuery, Prober};
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Shared application state.
#[derive(Clone)]
struct AppState {
    prober: Arc<Prober>,
    exporter_metrics: Arc<ExporterMetrics>,
}

/// Build the exporter router.
pub fn router(prober: Prober, exporter_metrics: ExporterMetrics) -> Router {
    let state = AppState {
        prober: Arc::new(prober),
        exporter_metrics: Arc::new(exporter_metrics),
    };

    Router::new()
        .route("/probe", get(probe_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/", get(root_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
///
/// # Arguments
///
/// * `listen_address` - Address to bind to (e.g., "0.0.0.0:9141")
/// * `prober` - Prober answering `/probe` requests
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use vmware_exporter::client::HttpConnector;
/// use vmware_exporter::config::Settings;
/// use vmware_exporter::credentials::{Credentials, StaticCredentials};
/// use vmware_exporter::prober::Prober;
/// use vmware_exporter::server::start_server;
///
/// #[tokio::main]
/// async fn main() {
///     let settings = Settings::default();
///     let prober = Prober::new(
///         Arc::new(HttpConnector::new(&settings.vcenter)),
///         Arc::new(StaticCredentials::new(Credentials::new("monitor@vsphere.local", "secret"))),
///         443,
///         Duration::from_secs(30),
///     );
///     start_server("0.0.0.0:9141", prober).await.unwrap();
/// }
/// ```
pub async fn start_server(listen_address: &str, prober: Prober) -> Result<()> {
    let app = router(prober, ExporterMetrics::new()?);

    info!("Starting HTTP server on {}", listen_address);

    let listener = TcpListener::bind(listen_address).await?;

    axum::serve(listener, app)
        .await
        .map_err(|e| crate::error::VcenterError::Server(e.to_string()))?;

    Ok(())
}

/// Handler for /probe endpoint.
///
/// Parameters are read as raw pairs so a repeated `target` or `dc` resolves
/// to its first value instead of failing extraction.
async fn probe_handler(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let start = Instant::now();
    let query = ProbeQuery::from_pairs(pairs);
    let target = query.target.as_deref().unwrap_or_default();
    let dc = query.dc.as_deref().unwrap_or_default();

    let result = state.prober.probe(&query).await;
    let elapsed = start.elapsed();
    state.exporter_metrics.observe(result.is_ok(), elapsed);

    let metrics = match result {
        Ok(metrics) => metrics,
        Err(e) => {
            let seconds = elapsed.as_secs_f64();
            if e.is_client_error() {
                warn!(vcenter = target, dc = dc, request_duration_seconds = seconds, err_msg = %e, "Rejected probe request");
            } else {
                error!(vcenter = target, dc = dc, request_duration_seconds = seconds, err_msg = %e, "VMware probe failed");
            }
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    info!(
        vcenter = target,
        dc = dc,
        request_duration_seconds = elapsed.as_secs_f64(),
        "VMware probe succeeded"
    );

    encoded(metrics.encode())
}

/// Handler for /metrics endpoint.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    encoded(state.exporter_metrics.encode())
}

fn encoded(body: Result<String>) -> Response {
    match body {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            body,
        )
            .into_response(),
        Err(e) => {
            warn!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
                .into_response()
        }
    }
}

/// Handler for /health endpoint.
async fn health_handler() -> Response {
    (StatusCode::OK, "OK").into_response()
}

/// Handler for root endpoint.
async fn root_handler() -> Html<&'static str> {
    Html(
        r#"<html>
<head><title>VMware Exporter</title></head>
<body>
<h1>VMware Exporter</h1>
<p>Scrape a datacenter with <code>/probe?target=&lt;vcenter&gt;&amp;dc=&lt;datacenter&gt;</code></p>
<p><a href="/metrics">Exporter metrics</a></p>
</body>
</html>
"#,
    )
}
