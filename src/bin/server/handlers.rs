//! HTTP Handlers for the status server

use super::types::*;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use hitmanstat::cache::MemoryCache;
use hitmanstat::config::AppConfig;
use hitmanstat::gate::{DebounceGate, HITMAN_FORUM};
use hitmanstat::reports::ReportService;
use hitmanstat::services::{ServiceManager, StatusBoard};
use hitmanstat::storage::EventSink;
use hitmanstat::types::now_millis;
use std::sync::Arc;
use tracing::error;

// =============================================================================
// Application State
// =============================================================================

/// Shared application state
pub struct AppState {
    pub config: AppConfig,
    pub board: Arc<StatusBoard>,
    pub gate: Arc<DebounceGate>,
    pub cache: Arc<MemoryCache>,
    pub events: Arc<dyn EventSink>,
    pub reports: ReportService,
    pub services: Arc<ServiceManager>,
}

// =============================================================================
// Health & Metrics Handlers
// =============================================================================

/// Health check endpoint
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let services = state
        .services
        .status()
        .into_iter()
        .map(|(name, status)| ServiceHealthEntry {
            name,
            status: format!("{status:?}").to_lowercase(),
        })
        .collect();

    Json(HealthResponse {
        status: if state.services.is_healthy() {
            "healthy"
        } else {
            "degraded"
        },
        version: env!("CARGO_PKG_VERSION"),
        services,
    })
}

/// Prometheus metrics endpoint
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let gate = state.gate.stats();
    let cache = state.cache.stats();
    let metrics = format!(
        "# HELP hitmanstat_gate_isolated_total Observations held back as isolated\n\
         # TYPE hitmanstat_gate_isolated_total counter\n\
         hitmanstat_gate_isolated_total {}\n\
         # HELP hitmanstat_gate_persisted_total Submissions that opened a lockout window\n\
         # TYPE hitmanstat_gate_persisted_total counter\n\
         hitmanstat_gate_persisted_total {}\n\
         # HELP hitmanstat_gate_locked_total Observations dropped during a lockout\n\
         # TYPE hitmanstat_gate_locked_total counter\n\
         hitmanstat_gate_locked_total {}\n\
         # HELP hitmanstat_gate_ignored_total Observations ignored\n\
         # TYPE hitmanstat_gate_ignored_total counter\n\
         hitmanstat_gate_ignored_total {}\n\
         # HELP hitmanstat_gate_all_clear_total All-clear resets\n\
         # TYPE hitmanstat_gate_all_clear_total counter\n\
         hitmanstat_gate_all_clear_total {}\n\
         # HELP hitmanstat_gate_write_failures_total Failed event writes\n\
         # TYPE hitmanstat_gate_write_failures_total counter\n\
         hitmanstat_gate_write_failures_total {}\n\
         # HELP hitmanstat_gate_cache_failures_total Failed cache operations\n\
         # TYPE hitmanstat_gate_cache_failures_total counter\n\
         hitmanstat_gate_cache_failures_total {}\n\
         # HELP hitmanstat_cache_entries Live cache entries\n\
         # TYPE hitmanstat_cache_entries gauge\n\
         hitmanstat_cache_entries {}\n\
         # HELP hitmanstat_cache_hits_total Cache hits\n\
         # TYPE hitmanstat_cache_hits_total counter\n\
         hitmanstat_cache_hits_total {}\n\
         # HELP hitmanstat_cache_misses_total Cache misses\n\
         # TYPE hitmanstat_cache_misses_total counter\n\
         hitmanstat_cache_misses_total {}\n",
        gate.isolated,
        gate.persisted,
        gate.locked,
        gate.ignored,
        gate.all_clear,
        gate.write_failures,
        gate.cache_failures,
        cache.entries,
        cache.hits,
        cache.misses,
    );
    (StatusCode::OK, [("content-type", "text/plain")], metrics)
}

// =============================================================================
// Status Handlers
// =============================================================================

/// Game services status
pub async fn hitman_status(State(state): State<Arc<AppState>>) -> Response {
    let game = state.board.game();
    if game.last_check.is_none() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::new("Status not checked yet")),
        )
            .into_response();
    }
    Json(game).into_response()
}

/// Forum status
pub async fn forum_status(State(state): State<Arc<AppState>>) -> Response {
    match state.board.endpoint(HITMAN_FORUM) {
        Some(forum) => Json(EndpointResponse {
            state: forum.state,
            status: forum.status,
            last_check: forum.last_check,
        })
        .into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::new("Status not checked yet")),
        )
            .into_response(),
    }
}

/// Recent events, newest first
pub async fn recent_events(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EventsParams>,
) -> Response {
    let limit = params.limit.clamp(1, MAX_EVENTS_LIMIT);
    match state.events.recent_events(limit).await {
        Ok(events) => Json(events).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to read events");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(e.to_string())),
            )
                .into_response()
        }
    }
}

// =============================================================================
// Report Handlers
// =============================================================================

/// Submit a user report
pub async fn submit_report(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReportRequest>,
) -> impl IntoResponse {
    Json(state.reports.submit(&req.reference, &req.fingerprint).await)
}

/// Hourly report chart
pub async fn report_chart(State(state): State<Arc<AppState>>) -> Response {
    match state
        .reports
        .chart(now_millis(), state.config.reports.chart_hours)
        .await
    {
        Ok(chart) => Json(chart).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to build report chart");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(e.to_string())),
            )
                .into_response()
        }
    }
}
