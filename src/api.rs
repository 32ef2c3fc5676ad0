//! HTTP API for the presentation layer.
//!
//! Exposes the user-facing surface of a session: map clicks, reset, the
//! optimize form, the vehicle selector and the history list. The browser (or
//! any other client) renders [`SessionView`] and never touches the routing
//! provider or backend directly.
//!
//! Route requests triggered by a click run in a spawned task so the click
//! returns immediately; poll `GET /session` to see the route arrive.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::error::{OptimizeErrorKind, SubmitError};
use crate::history::RefreshOutcome;
use crate::model::{GeoPoint, OptimizeResult, Role, VehicleType};
use crate::orchestrator::{Orchestrator, SessionView};
use crate::routing::RouteTicket;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
}

/// Request body for the optimize form.
#[derive(Debug, Deserialize)]
pub struct OptimizeForm {
    /// Perishability from 1 (robust) to 10 (highly perishable).
    pub perishability: i32,

    /// Optional city for the weather lookup.
    #[serde(default)]
    pub city: Option<String>,
}

/// Request body for the vehicle selector.
#[derive(Debug, Deserialize)]
pub struct VehicleForm {
    pub vehicle: VehicleType,
}

/// Error body returned by every failing handler.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub message: String,
}

/// Response for `POST /history/refresh`.
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub records: usize,
}

fn error_response(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            kind,
            message: message.into(),
        }),
    )
        .into_response()
}

/// Build the router with every session endpoint.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/backend", get(backend_health))
        .route("/session", get(get_session))
        .route("/points", post(post_click))
        .route("/points/:role", post(post_pick))
        .route("/reset", post(post_reset))
        .route("/vehicle", put(put_vehicle))
        .route("/optimize", post(post_optimize))
        .route("/history/refresh", post(post_history_refresh))
        .with_state(state)
}

/// Run a route request off the request path.
fn spawn_route_fetch(orchestrator: &Orchestrator, ticket: RouteTicket) {
    let orchestrator = orchestrator.clone();
    tokio::spawn(async move {
        orchestrator.fetch_route(ticket).await;
    });
}

/// GET /health - Simple health check endpoint.
pub async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

/// GET /health/backend - Check that the optimize backend answers.
#[instrument(skip(state))]
pub async fn backend_health(State(state): State<AppState>) -> Response {
    match state.orchestrator.ping_backend().await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => {
            warn!(error = %e, "Backend health check failed");
            error_response(StatusCode::BAD_GATEWAY, "backend_unreachable", e.to_string())
        }
    }
}

/// GET /session - Current read model.
pub async fn get_session(State(state): State<AppState>) -> Json<SessionView> {
    Json(state.orchestrator.view().await)
}

/// POST /points - A map click.
///
/// # Request Body
///
/// ```json
/// { "lat": 12.97, "lng": 77.59 }
/// ```
///
/// Fills the start, then the end; further clicks are ignored until reset.
/// Returns `202 Accepted` with the session view.
#[instrument(skip(state))]
pub async fn post_click(
    State(state): State<AppState>,
    Json(point): Json<GeoPoint>,
) -> impl IntoResponse {
    if let Some(ticket) = state.orchestrator.click(point).await {
        spawn_route_fetch(&state.orchestrator, ticket);
    }

    (StatusCode::ACCEPTED, Json(state.orchestrator.view().await))
}

/// POST /points/:role - Fill a specific slot (`start` or `end`).
///
/// Returns `409 Conflict` if the slot is already set or the end is picked
/// before the start.
#[instrument(skip(state))]
pub async fn post_pick(
    State(state): State<AppState>,
    Path(role): Path<String>,
    Json(point): Json<GeoPoint>,
) -> Response {
    let Some(role) = Role::parse(&role) else {
        warn!(role = %role, "Invalid role");
        return error_response(
            StatusCode::BAD_REQUEST,
            "invalid_role",
            format!("unknown role {role:?}, expected start or end"),
        );
    };

    match state.orchestrator.pick(point, role).await {
        Ok(ticket) => {
            if let Some(ticket) = ticket {
                spawn_route_fetch(&state.orchestrator, ticket);
            }
            (StatusCode::ACCEPTED, Json(state.orchestrator.view().await)).into_response()
        }
        Err(e) => error_response(StatusCode::CONFLICT, "illegal_transition", e.to_string()),
    }
}

/// POST /reset - Clear the selection and route; keep result and history.
pub async fn post_reset(State(state): State<AppState>) -> Json<SessionView> {
    state.orchestrator.reset().await;
    Json(state.orchestrator.view().await)
}

/// PUT /vehicle - Set the informational vehicle type.
pub async fn put_vehicle(
    State(state): State<AppState>,
    Json(form): Json<VehicleForm>,
) -> Json<SessionView> {
    state.orchestrator.select_vehicle(form.vehicle).await;
    Json(state.orchestrator.view().await)
}

/// POST /optimize - Submit the optimize form.
///
/// # Request Body
///
/// ```json
/// { "perishability": 5, "city": "Bengaluru" }
/// ```
///
/// # Response
///
/// `200` with the optimize result. Failures carry `{kind, message}`:
///
/// - `400` validation (missing points, perishability outside 1-10)
/// - `409` a submission is already outstanding
/// - `422` the backend rejected the input
/// - `502` backend fault or unexpected response
/// - `503` backend unreachable
#[instrument(skip(state))]
pub async fn post_optimize(
    State(state): State<AppState>,
    Json(form): Json<OptimizeForm>,
) -> Result<Json<OptimizeResult>, Response> {
    match state
        .orchestrator
        .submit(form.perishability, form.city.as_deref())
        .await
    {
        Ok(result) => {
            info!(score = result.final_score, "Optimize form submitted");
            Ok(Json(result))
        }
        Err(SubmitError::Validation(e)) => Err(error_response(
            StatusCode::BAD_REQUEST,
            "validation",
            e.to_string(),
        )),
        Err(SubmitError::Illegal(e)) => Err(error_response(
            StatusCode::CONFLICT,
            "illegal_transition",
            e.to_string(),
        )),
        Err(SubmitError::Request(e)) => {
            let (status, kind) = match e.kind {
                OptimizeErrorKind::InvalidInput => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_input"),
                OptimizeErrorKind::Server => (StatusCode::BAD_GATEWAY, "server"),
                OptimizeErrorKind::Network => (StatusCode::SERVICE_UNAVAILABLE, "network"),
                OptimizeErrorKind::Unknown => (StatusCode::BAD_GATEWAY, "unknown"),
            };
            Err(error_response(status, kind, e.message))
        }
    }
}

/// POST /history/refresh - Reload the history list from the backend.
#[instrument(skip(state))]
pub async fn post_history_refresh(State(state): State<AppState>) -> Response {
    match state.orchestrator.refresh_history().await {
        RefreshOutcome::Replaced { records } => Json(RefreshResponse { records }).into_response(),
        RefreshOutcome::Superseded => {
            let records = state.orchestrator.view().await.history.len();
            Json(RefreshResponse { records }).into_response()
        }
        RefreshOutcome::Failed(e) => {
            error_response(StatusCode::BAD_GATEWAY, "history_fetch", e.to_string())
        }
    }
}
