//! ==============================================================================
//! server.rs - web dashboard, json api and metrics scrape
//! ==============================================================================
//!
//! routes:
//!     GET /              chart.js dashboard of the recent history
//!     GET /api/?n=30     {"historical": <chart projection>}
//!     GET /api/now/      {"current": {"measurement": <reading>}}
//!     GET /metrics       prometheus text exposition of a live reading
//!     GET /health        liveness plus whether history is enabled
//!
//! relationships:
//!     - uses: query.rs (QueryService), projector.rs, metrics.rs
//!     - started by: main.rs (shares the shutdown token with the sampler)
//!
//! ==============================================================================

use crate::error::{CoreError, Result};
use crate::metrics::SensorMetrics;
use crate::projector;
use crate::query::QueryService;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

// ==============================================================================
// shared state
// ==============================================================================
// cloned into every handler. QueryService and SensorMetrics are cheap handles
// (Arc / pool inside), so there is no lock here.

#[derive(Clone)]
pub struct AppState {
    pub query: QueryService,
    pub metrics: SensorMetrics,
    /// history length when the request does not give one
    pub default_len: usize,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(dashboard_handler))
        .route("/api", get(api_handler))
        .route("/api/", get(api_handler))
        .route("/api/now", get(api_now_handler))
        .route("/api/now/", get(api_now_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run_server(
    state: AppState,
    addr: SocketAddr,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Dashboard live");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await?;
    Ok(())
}

#[derive(Deserialize)]
struct HistoryParams {
    n: Option<usize>,
}

/// html dashboard, chart data embedded in the page
async fn dashboard_handler(State(state): State<AppState>) -> Response {
    if !state.query.history_enabled() {
        return (StatusCode::NOT_FOUND, "history disabled, no UI available").into_response();
    }

    let chart = match state.query.historical(state.default_len).await {
        Ok(readings) => projector::to_chart(&readings),
        Err(e) => return (e.status(), Html(error_page(&e))).into_response(),
    };

    match serde_json::to_string(&chart) {
        Ok(json) => Html(dashboard_page(&json)).into_response(),
        Err(e) => CoreError::from(e).into_response(),
    }
}

/// json api endpoint: recent history projected for chart.js
async fn api_handler(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<serde_json::Value>> {
    let n = params.n.unwrap_or(state.default_len);
    let readings = state.query.historical(n).await?;
    Ok(Json(serde_json::json!({ "historical": projector::to_chart(&readings) })))
}

/// json api endpoint: one live reading straight from the sensor
async fn api_now_handler(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    let reading = state.query.current().await?;
    Ok(Json(serde_json::json!({ "current": { "measurement": reading } })))
}

/// prometheus scrape: live reading -> gauges -> text format
async fn metrics_handler(State(state): State<AppState>) -> Result<Response> {
    let reading = state.query.current().await?;
    let gauges = projector::to_gauges(&reading)?;

    match state.metrics.render(&gauges) {
        Ok(body) => Ok(([(header::CONTENT_TYPE, state.metrics.content_type())], body).into_response()),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            Ok((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response())
        }
    }
}

async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "history": state.query.history_enabled(),
    }))
}

// ==============================================================================
// html
// ==============================================================================

fn dashboard_page(chart_json: &str) -> String {
    // keep "</script>" inside the data from closing the tag
    let data = chart_json.replace("</", "<\\/");
    format!(
        r#"<!doctype html>
<html>
<head>
    <meta charset="utf-8">
    <title>air quality</title>
    <script src="https://cdn.jsdelivr.net/npm/chart.js@4"></script>
</head>
<body style="font-family: system-ui; padding: 2rem; background: #f5f5f5; color: #181d27;">
    <h1>air quality</h1>
    <canvas id="history" height="120"></canvas>
    <script>
        const historical = {data};
        new Chart(document.getElementById("history"), {{
            type: "line",
            data: {{
                labels: historical.labels,
                datasets: [historical.aqi, historical.pm10, historical.pm2].map(s => ({{ ...s, fill: false }})),
            }},
        }});
    </script>
</body>
</html>"#
    )
}

fn error_page(error: &CoreError) -> String {
    format!(
        r#"<!doctype html>
<html>
<head><title>error</title></head>
<body style="font-family: system-ui; padding: 2rem; background: #1a1a2e; color: #eee;">
    <h1 style="color: #ff6b6b;">⚠️ dashboard error</h1>
    <p>failed to load the measurement history:</p>
    <pre style="background: #16213e; padding: 1rem; border-radius: 8px; overflow-x: auto;">{}</pre>
</body>
</html>"#,
        html_escape(&error.to_string())
    )
}

/// escape html special characters to prevent xss
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
     .replace('<', "&lt;")
     .replace('>', "&gt;")
     .replace('"', "&quot;")
}
