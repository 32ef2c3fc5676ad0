//! Routing provider client and route fetch state.
//!
//! The provider is the TomTom Routing API (`calculateRoute`). A route is
//! requested once per complete point pair; the request is tagged with the
//! selection epoch it was issued for, and a response whose epoch no longer
//! matches the point store is dropped instead of applied.
//!
//! # API Reference
//!
//! See: <https://developer.tomtom.com/routing-api/documentation/routing/calculate-route>

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::DEFAULT_ROUTING_URL;
use crate::error::RouteFetchError;
use crate::model::{ColorClass, GeoPoint, RouteSummary};
use crate::points::PointStore;

/// Client for the routing provider.
#[derive(Clone)]
pub struct RoutingClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RoutingClient {
    /// Create a client against the public TomTom endpoint.
    pub fn new(api_key: &str) -> Self {
        Self::with_base_url(reqwest::Client::new(), DEFAULT_ROUTING_URL, api_key)
    }

    /// Create a client against a custom base URL (for testing or proxies).
    pub fn with_base_url(client: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Build the request URL for a point pair.
    fn route_url(&self, start: GeoPoint, end: GeoPoint) -> String {
        format!(
            "{}/calculateRoute/{}:{}/json?traffic=true&key={}",
            self.base_url,
            start,
            end,
            urlencoding::encode(&self.api_key)
        )
    }

    /// Request the fastest route between two points.
    pub async fn calculate_route(
        &self,
        start: GeoPoint,
        end: GeoPoint,
    ) -> Result<RouteSummary, RouteFetchError> {
        let url = self.route_url(start, end);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RouteFetchError::Network(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RouteFetchError::Status(status.as_u16()));
        }

        let data = response
            .json::<CalculateRouteResponse>()
            .await
            .map_err(|e| RouteFetchError::Malformed(e.without_url().to_string()))?;

        data.into_summary()
    }
}

// ============================================================================
// Response types
// ============================================================================

/// Response from the `calculateRoute` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculateRouteResponse {
    /// Candidate routes, best first.
    #[serde(default)]
    pub routes: Vec<ProviderRoute>,
}

/// A single route returned by the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRoute {
    pub summary: ProviderSummary,

    /// Route legs; one per pair of consecutive waypoints.
    #[serde(default)]
    pub legs: Vec<ProviderLeg>,
}

/// Summary block of a provider route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSummary {
    #[serde(rename = "lengthInMeters")]
    pub length_in_meters: f64,

    #[serde(rename = "travelTimeInSeconds")]
    pub travel_time_in_seconds: u64,
}

/// One leg of a provider route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderLeg {
    #[serde(default)]
    pub points: Vec<ProviderPoint>,
}

/// A polyline vertex as the provider spells it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProviderPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl CalculateRouteResponse {
    /// Reduce the provider payload to the first route's summary and path.
    pub fn into_summary(self) -> Result<RouteSummary, RouteFetchError> {
        let route = self.routes.into_iter().next().ok_or(RouteFetchError::NoRoute)?;

        let path = route
            .legs
            .iter()
            .flat_map(|leg| leg.points.iter())
            .map(|p| {
                GeoPoint::new(p.latitude, p.longitude)
                    .map_err(|e| RouteFetchError::Malformed(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if path.is_empty() {
            return Err(RouteFetchError::EmptyPath);
        }

        Ok(RouteSummary {
            travel_time_in_seconds: route.summary.travel_time_in_seconds,
            length_in_meters: route.summary.length_in_meters,
            path,
        })
    }
}

// ============================================================================
// Route fetcher
// ============================================================================

/// Identity of one outbound route request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteTicket {
    pub start: GeoPoint,
    pub end: GeoPoint,
    pub epoch: u64,
}

/// A route currently on display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadedRoute {
    pub summary: RouteSummary,
    pub color: ColorClass,
}

/// What happened to a completed route request.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    /// The route is now displayed.
    Applied(LoadedRoute),
    /// The request failed; any earlier route stays displayed.
    Failed(RouteFetchError),
    /// The response belonged to an earlier selection and was dropped.
    Stale,
}

/// Route state for the current selection cycle.
#[derive(Debug, Clone, Default)]
pub struct RouteFetcher {
    latest: Option<RouteTicket>,
    route: Option<LoadedRoute>,
    last_error: Option<RouteFetchError>,
}

impl RouteFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a ticket if the selection is complete and not yet requested.
    ///
    /// At most one ticket is issued per `(start, end, epoch)`.
    pub fn begin(&mut self, points: &PointStore) -> Option<RouteTicket> {
        let (start, end) = points.pair()?;
        let ticket = RouteTicket {
            start,
            end,
            epoch: points.selection_epoch(),
        };

        if self.latest == Some(ticket) {
            return None;
        }

        debug!(epoch = ticket.epoch, "Route request issued");
        self.latest = Some(ticket);
        Some(ticket)
    }

    /// Apply the result of a ticket's request, unless it has gone stale.
    pub fn complete(
        &mut self,
        ticket: RouteTicket,
        result: Result<RouteSummary, RouteFetchError>,
        current_epoch: u64,
    ) -> RouteOutcome {
        if ticket.epoch != current_epoch || self.latest != Some(ticket) {
            debug!(
                ticket_epoch = ticket.epoch,
                current_epoch, "Dropping stale route response"
            );
            return RouteOutcome::Stale;
        }

        match result {
            Ok(summary) => {
                let loaded = LoadedRoute {
                    color: summary.color(),
                    summary,
                };
                info!(
                    epoch = ticket.epoch,
                    travel_time = loaded.summary.travel_time_in_seconds,
                    length = loaded.summary.length_in_meters,
                    color = ?loaded.color,
                    "Route loaded"
                );
                self.route = Some(loaded.clone());
                self.last_error = None;
                RouteOutcome::Applied(loaded)
            }
            Err(e) => {
                warn!(epoch = ticket.epoch, error = %e, "Route fetch failed");
                self.last_error = Some(e.clone());
                RouteOutcome::Failed(e)
            }
        }
    }

    /// Forget the route and any pending request; used on reset.
    pub fn clear(&mut self) {
        self.latest = None;
        self.route = None;
        self.last_error = None;
    }

    pub fn route(&self) -> Option<&LoadedRoute> {
        self.route.as_ref()
    }

    pub fn last_error(&self) -> Option<&RouteFetchError> {
        self.last_error.as_ref()
    }
}
