//! Session orchestrator.
//!
//! Wires map clicks into the point store and route fetcher, form submissions
//! into the optimize submitter and history store, and exposes one read model.
//! Rules live in the components; this module only sequences them.
//!
//! The session lock is never held across a network call, so a reset can land
//! while a route or optimize request is outstanding. Results are checked
//! against the epoch or refresh tag they were issued under before they are
//! applied.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::backend::BackendClient;
use crate::config::{Config, ConfigError};
use crate::error::{HistoryFetchError, OptimizeRequestError, RouteFetchError, SubmitError};
use crate::history::{HistoryStore, RefreshOutcome};
use crate::model::{GeoPoint, HistoryRecord, OptimizeResult, Role, VehicleType};
use crate::phase::{IllegalTransition, Phase, Transition};
use crate::points::PointStore;
use crate::routing::{LoadedRoute, RouteFetcher, RouteOutcome, RouteTicket, RoutingClient};
use crate::submit::OptimizeSubmitter;

/// Mutable session state, guarded by one lock.
#[derive(Debug, Default)]
struct Session {
    phase: Phase,
    points: PointStore,
    route: RouteFetcher,
    submitter: OptimizeSubmitter,
    history: HistoryStore,
    vehicle: VehicleType,
}

impl Session {
    fn apply(&mut self, transition: Transition) -> Result<Phase, IllegalTransition> {
        let next = self.phase.advance(transition)?;
        if next != self.phase {
            debug!(from = ?self.phase, to = ?next, ?transition, "Phase changed");
        }
        self.phase = next;
        Ok(next)
    }
}

/// Read-only snapshot handed to the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub phase: Phase,
    pub start: Option<GeoPoint>,
    pub end: Option<GeoPoint>,
    pub selection_epoch: u64,
    pub route: Option<LoadedRoute>,
    pub route_error: Option<RouteFetchError>,
    pub vehicle: VehicleType,
    pub result: Option<OptimizeResult>,
    pub submit_error: Option<OptimizeRequestError>,
    pub history: Vec<HistoryRecord>,
    pub history_error: Option<HistoryFetchError>,
}

/// Root of a delivery session.
#[derive(Clone)]
pub struct Orchestrator {
    routing: RoutingClient,
    backend: BackendClient,
    session: Arc<Mutex<Session>>,
}

impl Orchestrator {
    /// Build a session from configuration.
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let client = config.http_client()?;

        Ok(Self::with_clients(
            RoutingClient::with_base_url(
                client.clone(),
                &config.routing_base_url,
                &config.routing_api_key,
            ),
            BackendClient::with_base_url(client, &config.backend_base_url),
        ))
    }

    /// Build a session around existing clients.
    pub fn with_clients(routing: RoutingClient, backend: BackendClient) -> Self {
        Self {
            routing,
            backend,
            session: Arc::new(Mutex::new(Session::default())),
        }
    }

    /// Handle a map click: fill start, then end, then ignore until reset.
    ///
    /// Returns the route request to run when the click completed the pair.
    #[instrument(skip(self))]
    pub async fn click(&self, point: GeoPoint) -> Option<RouteTicket> {
        let mut session = self.session.lock().await;

        let Some(role) = session.points.next_role() else {
            debug!("Both points set; click ignored until reset");
            return None;
        };

        match Self::pick_locked(&mut session, point, role) {
            Ok(ticket) => ticket,
            Err(e) => {
                warn!(error = %e, "Click ignored");
                None
            }
        }
    }

    /// Fill a specific slot.
    ///
    /// Picking a filled slot, or the end before the start, is illegal and
    /// leaves the selection unchanged.
    #[instrument(skip(self))]
    pub async fn pick(
        &self,
        point: GeoPoint,
        role: Role,
    ) -> Result<Option<RouteTicket>, IllegalTransition> {
        let mut session = self.session.lock().await;
        Self::pick_locked(&mut session, point, role)
    }

    fn pick_locked(
        session: &mut Session,
        point: GeoPoint,
        role: Role,
    ) -> Result<Option<RouteTicket>, IllegalTransition> {
        let transition = match role {
            Role::Start => Transition::PickStart,
            Role::End => Transition::PickEnd,
        };

        session.phase.advance(transition)?;
        if !session.points.pick(point, role) {
            return Err(IllegalTransition {
                from: session.phase,
                transition,
            });
        }
        session.apply(transition)?;

        info!(?role, %point, epoch = session.points.selection_epoch(), "Point picked");

        Ok(session.route.begin(&session.points))
    }

    /// Run a route request and apply its result if still current.
    #[instrument(skip(self), fields(epoch = ticket.epoch))]
    pub async fn fetch_route(&self, ticket: RouteTicket) -> RouteOutcome {
        let result = self.routing.calculate_route(ticket.start, ticket.end).await;

        let mut session = self.session.lock().await;
        let current_epoch = session.points.selection_epoch();
        let outcome = session.route.complete(ticket, result, current_epoch);

        if matches!(outcome, RouteOutcome::Applied(_)) {
            if let Err(e) = session.apply(Transition::RouteLoaded) {
                warn!(error = %e, "Route applied outside a complete selection");
            }
        }

        outcome
    }

    /// Clear both points and the route; results and history are kept.
    ///
    /// Returns the new selection epoch.
    #[instrument(skip(self))]
    pub async fn reset(&self) -> u64 {
        let mut session = self.session.lock().await;

        let epoch = session.points.reset();
        session.route.clear();
        // Reset is legal from every phase.
        let _ = session.apply(Transition::Reset);

        info!(epoch, "Selection reset");
        epoch
    }

    /// Record the vehicle type shown on the form.
    pub async fn select_vehicle(&self, vehicle: VehicleType) {
        self.session.lock().await.vehicle = vehicle;
    }

    /// Validate and submit an optimize request, then refresh history.
    ///
    /// Validation failures never reach the network. History is refreshed
    /// exactly once after a success, and only after it.
    ///
    /// A completion that is not from the newest submission never moves the
    /// phase, and one older than a result already shown is dropped.
    #[instrument(skip(self, city))]
    pub async fn submit(
        &self,
        perishability: i32,
        city: Option<&str>,
    ) -> Result<OptimizeResult, SubmitError> {
        let (request, submission) = {
            let mut session = self.session.lock().await;
            let request = session
                .submitter
                .prepare(&session.points, perishability, city)?;
            session.apply(Transition::Submit)?;
            let submission = session.submitter.begin(&request);
            (request, submission)
        };

        let result = self.backend.optimize(&request).await;

        {
            let mut session = self.session.lock().await;
            let outcome = session.submitter.complete(submission, &result);

            // Only the newest submission may leave `Submitting`.
            if outcome.is_current() {
                let transition = if result.is_ok() {
                    Transition::SubmitSucceeded
                } else {
                    Transition::SubmitFailed
                };
                let next = session.apply(transition)?;

                if next == Phase::BothPoints && session.route.route().is_some() {
                    session.apply(Transition::RouteLoaded)?;
                }
            } else {
                debug!(
                    submission,
                    ?outcome,
                    phase = ?session.phase,
                    "Phase left to newer submission"
                );
            }
        }

        let optimized = result?;
        self.refresh_history().await;
        Ok(optimized)
    }

    /// Replace the history list with the backend's current one.
    ///
    /// Failures are recorded on the store and returned as an outcome.
    #[instrument(skip(self))]
    pub async fn refresh_history(&self) -> RefreshOutcome {
        let ticket = self.session.lock().await.history.begin_refresh();

        let result = self.backend.fetch_history().await;

        self.session.lock().await.history.complete(ticket, result)
    }

    /// Check that the backend is reachable.
    pub async fn ping_backend(&self) -> anyhow::Result<()> {
        self.backend.ping().await
    }

    /// Snapshot the session.
    pub async fn view(&self) -> SessionView {
        let session = self.session.lock().await;

        SessionView {
            phase: session.phase,
            start: session.points.start(),
            end: session.points.end(),
            selection_epoch: session.points.selection_epoch(),
            route: session.route.route().cloned(),
            route_error: session.route.last_error().cloned(),
            vehicle: session.vehicle,
            result: session.submitter.result().cloned(),
            submit_error: session.submitter.last_error().cloned(),
            history: session.history.records().to_vec(),
            history_error: session.history.last_error().cloned(),
        }
    }
}
