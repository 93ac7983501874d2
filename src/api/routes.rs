use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::latency::{
    HistoryError, LatencyEngine, LatencyStats, PairKey, SnapshotMode, SnapshotSummary, TimeWindow,
};
use crate::models::{LatencyLink, LatencySample, Venue};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<LatencyEngine>,
}

/// Create the API router
pub fn create_router(engine: Arc<LatencyEngine>) -> Router {
    let state = AppState { engine };

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/api/latency", get(get_latency))
        .route("/api/history", get(get_history))
        .route("/api/history/all", get(get_all_history))
        .route("/api/history/refresh", post(refresh_history))
        .route("/api/stats", get(get_stats))
        .route("/api/venues", get(get_venues))
        .with_state(state)
}

// ===== Route Handlers =====

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        mode: state.engine.mode(),
    })
}

/// Diagnostic counters in Prometheus text format
async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.engine.diagnostics().to_prometheus(),
    )
}

/// Generate a fresh latency snapshot
async fn get_latency(State(state): State<AppState>) -> Json<LatencyResponse> {
    let snapshot = state.engine.generate_snapshot().await;
    let summary = snapshot.summary();

    Json(LatencyResponse {
        data: snapshot.links,
        mode: snapshot.mode,
        timestamp: snapshot.timestamp,
        summary,
    })
}

async fn get_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let range = params.range();
    let data = state.engine.query_history(&params.from, &params.to, &range)?;

    Ok(Json(HistoryResponse {
        pair: PairKey::new(&params.from, &params.to),
        range,
        count: data.len(),
        data,
    }))
}

async fn get_stats(
    State(state): State<AppState>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<StatsResponse>, ApiError> {
    let range = params.range();
    let stats = state.engine.get_stats(&params.from, &params.to, &range)?;

    Ok(Json(StatsResponse {
        pair: PairKey::new(&params.from, &params.to),
        range,
        stats,
    }))
}

async fn get_all_history(
    State(state): State<AppState>,
) -> Json<BTreeMap<PairKey, Vec<LatencySample>>> {
    Json(state.engine.get_all_history())
}

/// Rebuild pair history from the monitors' response-time samples
async fn refresh_history(State(state): State<AppState>) -> Json<RefreshResponse> {
    let pairs_updated = state.engine.refresh_history().await;
    Json(RefreshResponse { pairs_updated })
}

async fn get_venues(State(state): State<AppState>) -> Json<Vec<Venue>> {
    Json(state.engine.venues().to_vec())
}

// ===== Request/Response Types =====

#[derive(Deserialize)]
struct HistoryQuery {
    from: String,
    to: String,
    /// "1h", "24h", "7d" or "30d"; defaults to "24h"
    range: Option<String>,
}

impl HistoryQuery {
    fn range(&self) -> String {
        self.range
            .clone()
            .unwrap_or_else(|| TimeWindow::default().as_str().to_string())
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    mode: SnapshotMode,
}

#[derive(Serialize)]
struct LatencyResponse {
    data: Vec<LatencyLink>,
    mode: SnapshotMode,
    timestamp: i64,
    summary: SnapshotSummary,
}

#[derive(Serialize)]
struct HistoryResponse {
    pair: PairKey,
    range: String,
    count: usize,
    data: Vec<LatencySample>,
}

#[derive(Serialize)]
struct StatsResponse {
    pair: PairKey,
    range: String,
    #[serde(flatten)]
    stats: LatencyStats,
}

#[derive(Serialize)]
struct RefreshResponse {
    pairs_updated: usize,
}

// ===== Error Handling =====

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
}

impl From<HistoryError> for ApiError {
    fn from(err: HistoryError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        };

        let body = Json(json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}
