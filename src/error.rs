//! Error taxonomy.
//!
//! Every failure is recovered at the boundary of the component that owns it
//! and surfaced to the orchestrator as one of these values. All of them are
//! `Clone` so the read model can keep the last error of each component.

use serde::Serialize;
use thiserror::Error;

use crate::phase::IllegalTransition;

/// Client-side rejection; no network call is made.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    /// No start point has been picked.
    #[error("please select a start point on the map")]
    MissingStart,

    /// No destination has been picked.
    #[error("please select a destination on the map")]
    MissingEnd,

    /// Perishability must lie in `[1, 10]`.
    #[error("perishability must be between 1 and 10, got {0}")]
    PerishabilityOutOfRange(i32),

    /// A coordinate was not finite or out of range.
    #[error("invalid coordinate ({lat}, {lng})")]
    InvalidCoordinate { lat: f64, lng: f64 },
}

/// The routing provider could not produce a route.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum RouteFetchError {
    /// No response was received.
    #[error("routing provider unreachable: {0}")]
    Network(String),

    /// The provider answered with a non-2xx status.
    #[error("routing provider returned HTTP {0}")]
    Status(u16),

    /// The body did not match the expected shape.
    #[error("malformed routing response: {0}")]
    Malformed(String),

    /// The response contained no route.
    #[error("no route found between the selected points")]
    NoRoute,

    /// The first route carried no path points.
    #[error("route has an empty path")]
    EmptyPath,
}

/// Classification of a failed optimize call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizeErrorKind {
    /// HTTP 422, the backend rejected the request body.
    InvalidInput,
    /// HTTP 5xx, or a success status whose body reports an error.
    Server,
    /// No response (connection refused, DNS, timeout).
    Network,
    /// Any other status, or an unreadable success body.
    Unknown,
}

impl OptimizeErrorKind {
    /// Classify a non-success status code.
    pub fn from_status(status: u16) -> Self {
        match status {
            422 => OptimizeErrorKind::InvalidInput,
            500..=599 => OptimizeErrorKind::Server,
            _ => OptimizeErrorKind::Unknown,
        }
    }

    /// Short label used in messages.
    pub fn label(&self) -> &'static str {
        match self {
            OptimizeErrorKind::InvalidInput => "invalid input",
            OptimizeErrorKind::Server => "server error",
            OptimizeErrorKind::Network => "backend unreachable",
            OptimizeErrorKind::Unknown => "unexpected response",
        }
    }
}

/// The backend rejected or failed an optimize call.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[error("optimization failed ({}): {message}", .kind.label())]
pub struct OptimizeRequestError {
    /// Failure class.
    pub kind: OptimizeErrorKind,

    /// HTTP status, when a response was received.
    pub status: Option<u16>,

    /// Human-readable description.
    pub message: String,
}

impl OptimizeRequestError {
    pub fn new(kind: OptimizeErrorKind, status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            kind,
            status,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(OptimizeErrorKind::Network, None, message)
    }
}

/// A history refresh failed; the previous list stays in place.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum HistoryFetchError {
    /// No response was received.
    #[error("history unavailable: {0}")]
    Network(String),

    /// The backend answered with a non-2xx status.
    #[error("history request returned HTTP {0}")]
    Status(u16),

    /// The payload could not be normalized.
    #[error("malformed history payload: {0}")]
    Malformed(String),
}

/// Everything that can stop a submission.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Illegal(#[from] IllegalTransition),

    #[error(transparent)]
    Request(#[from] OptimizeRequestError),
}
