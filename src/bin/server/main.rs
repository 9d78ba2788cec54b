//! hitmanstat HTTP Server
//!
//! Runs the background pollers and serves the dashboard API.
//!
//! # Endpoints
//!
//! ## Status
//! - `GET /status/hitman` - Game services, maintenance windows and elusive targets
//! - `GET /status/hitmanforum` - Forum availability
//! - `GET /events` - Recent recorded incidents
//!
//! ## Reports
//! - `POST /reports` - Submit a user outage report
//! - `GET /reports/chart` - Hourly report counts
//!
//! ## Admin
//! - `GET /health` - Health check
//! - `GET /metrics` - Prometheus metrics
//!
//! # Configuration
//!
//! The server reads configuration from:
//! 1. `HITMANSTAT_CONFIG` environment variable (path to TOML file)
//! 2. `./hitmanstat.toml` in current directory
//! 3. Default configuration
//!
//! # Example
//!
//! ```bash
//! # Start with custom config
//! HITMANSTAT_CONFIG=/etc/hitmanstat.toml ./server
//!
//! # Report an issue
//! curl -X POST http://localhost:8080/reports \
//!   -H "Content-Type: application/json" \
//!   -d '{"reference": "h2pc", "fingerprint": "3f9a"}'
//! ```

mod handlers;
mod types;

use axum::{
    routing::{get, post},
    Router,
};
use handlers::AppState;
use hitmanstat::{
    cache::MemoryCache,
    config::{load_config, AppConfig},
    gate::{DebounceGate, KeyTable, HITMAN_FORUM},
    health::{HttpEndpointProbe, HttpHealthSource},
    reports::ReportService,
    services::{
        CacheJanitor, EndpointPoller, GameStatusConfig, GameStatusPoller, ServiceManager,
        StatusBoard,
    },
    storage::SqliteStore,
};
use std::{net::SocketAddr, sync::Arc};
use tokio::signal;
use tracing::{error, info};

// =============================================================================
// Server Initialization
// =============================================================================

/// Wire the store, cache, gate and background services
fn init_state(config: AppConfig) -> Result<Arc<AppState>, Box<dyn std::error::Error>> {
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = Arc::new(SqliteStore::open(&config.database_path)?);
    let cache = Arc::new(MemoryCache::new());

    let gate = Arc::new(DebounceGate::new(
        config.gate.clone(),
        KeyTable::standard(),
        cache.clone(),
        store.clone(),
    ));
    let board = Arc::new(StatusBoard::new());

    let source = Arc::new(HttpHealthSource::new(
        config.upstream.status_url.clone(),
        config.upstream.timeout(),
    )?);
    let forum = Arc::new(HttpEndpointProbe::new(
        HITMAN_FORUM,
        config.upstream.forum_url.clone(),
        config.upstream.timeout(),
    )?);

    let services = Arc::new(ServiceManager::new());
    services.register(Arc::new(GameStatusPoller::new(
        GameStatusConfig {
            poll_interval: config.upstream.status_interval(),
        },
        source,
        gate.clone(),
        board.clone(),
    )));
    services.register(Arc::new(EndpointPoller::new(
        config.upstream.forum_interval(),
        forum,
        gate.clone(),
        board.clone(),
    )));
    services.register(Arc::new(CacheJanitor::new(
        cache.clone(),
        config.upstream.cache_sweep(),
    )));

    let reports = ReportService::new(cache.clone(), store.clone(), config.reports.cooldown());

    Ok(Arc::new(AppState {
        config,
        board,
        gate,
        cache,
        events: store,
        reports,
        services,
    }))
}

/// Build the router with all endpoints
fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health and metrics
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        // Status
        .route("/status/hitman", get(handlers::hitman_status))
        .route("/status/hitmanforum", get(handlers::forum_status))
        .route("/events", get(handlers::recent_events))
        // Reports
        .route("/reports", post(handlers::submit_report))
        .route("/reports/chart", get(handlers::report_chart))
        .with_state(state)
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("hitmanstat=info".parse()?)
                .add_directive("server=info".parse()?),
        )
        .init();

    info!("hitmanstat server starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = load_config();
    info!("Database: {:?}", config.database_path);
    info!("Listen address: {}", config.listen_addr);

    let addr: SocketAddr = config.listen_addr.parse()?;
    let state = init_state(config)?;

    // Start pollers
    let services = state.services.clone();
    services.start_all();

    let app = build_router(state);

    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Start server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    services.shutdown().await;
    info!("Server shutdown complete");
    Ok(())
}
