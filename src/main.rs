//! RouteMonk - pick two map points, see the live route, and score a
//! perishable delivery against travel time and weather.
//!
//! Serves the session API for the map front end.
//!
//! # API Endpoints
//!
//! - `GET /session` - Current points, route, result and history
//! - `POST /points` - Map click (start, then end)
//! - `POST /points/:role` - Set a specific point
//! - `POST /reset` - Clear points and route
//! - `PUT /vehicle` - Set the vehicle type
//! - `POST /optimize` - Submit the optimize form
//! - `POST /history/refresh` - Reload history
//! - `GET /health` - Health check
//! - `GET /health/backend` - Backend reachability

use std::env;
use std::net::SocketAddr;

use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use routemonk::api::{AppState, router};
use routemonk::config::Config;
use routemonk::history::RefreshOutcome;
use routemonk::orchestrator::Orchestrator;

/// Default port if not specified via environment variable.
const DEFAULT_PORT: u16 = 3000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("routemonk=info".parse()?))
        .init();

    let port: u16 = env::var("ROUTEMONK_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);

    let config = Config::from_env()?;
    info!(
        port,
        backend = %config.backend_base_url,
        routing = %config.routing_base_url,
        timeout_secs = config.request_timeout.as_secs(),
        "Starting RouteMonk"
    );

    let orchestrator = Orchestrator::new(&config)?;

    // Initial history load; the session stays usable if it fails.
    match orchestrator.refresh_history().await {
        RefreshOutcome::Replaced { records } => info!(records, "History loaded"),
        RefreshOutcome::Failed(e) => warn!(error = %e, "History unavailable at startup"),
        RefreshOutcome::Superseded => {}
    }

    let app = router(AppState { orchestrator }).layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;

    info!(%addr, "RouteMonk is listening");

    axum::serve(listener, app).await?;

    Ok(())
}
