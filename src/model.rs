//! Data models for a delivery session.
//!
//! Points, routes and optimize payloads are plain values. Anything that
//! arrives from outside (map clicks, provider payloads, backend records) is
//! validated or normalized into these types at the boundary, so the rest of
//! the crate never sees an unchecked coordinate or a legacy record shape.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Smallest accepted perishability.
pub const MIN_PERISHABILITY: i32 = 1;

/// Largest accepted perishability.
pub const MAX_PERISHABILITY: i32 = 10;

/// A WGS84 coordinate picked on the map.
///
/// Immutable once built: a re-pick replaces the whole point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPoint")]
pub struct GeoPoint {
    lat: f64,
    lng: f64,
}

#[derive(Deserialize)]
struct RawPoint {
    lat: f64,
    lng: f64,
}

impl TryFrom<RawPoint> for GeoPoint {
    type Error = ValidationError;

    fn try_from(raw: RawPoint) -> Result<Self, Self::Error> {
        GeoPoint::new(raw.lat, raw.lng)
    }
}

impl GeoPoint {
    /// Validate and build a point.
    ///
    /// Rejects non-finite values, latitudes outside `[-90, 90]` and
    /// longitudes outside `[-180, 180]`.
    pub fn new(lat: f64, lng: f64) -> Result<Self, ValidationError> {
        let valid = lat.is_finite()
            && lng.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lng);

        if valid {
            Ok(Self { lat, lng })
        } else {
            Err(ValidationError::InvalidCoordinate { lat, lng })
        }
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lng(&self) -> f64 {
        self.lng
    }
}

/// Renders as `lat,lng`, the form both the backend and the routing provider expect.
impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lng)
    }
}

/// Which slot of the selection a point fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Start,
    End,
}

impl Role {
    /// Parse a role from a path segment.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "start" | "origin" => Some(Role::Start),
            "end" | "destination" => Some(Role::End),
            _ => None,
        }
    }
}

/// Vehicle chosen on the form.
///
/// Informational only; never part of the optimize request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleType {
    Bike,
    #[default]
    Van,
    Truck,
}

/// Route colour derived from the ETA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorClass {
    /// ETA under 20 minutes.
    Green,
    /// ETA from 20 to 45 minutes inclusive.
    Orange,
    /// ETA over 45 minutes.
    Red,
}

impl ColorClass {
    /// Classify an ETA given in seconds.
    ///
    /// # Thresholds
    ///
    /// - `green`: eta < 20 min
    /// - `orange`: 20 min <= eta <= 45 min
    /// - `red`: eta > 45 min
    pub fn from_travel_time(travel_time_secs: u64) -> Self {
        if travel_time_secs < 20 * 60 {
            ColorClass::Green
        } else if travel_time_secs <= 45 * 60 {
            ColorClass::Orange
        } else {
            ColorClass::Red
        }
    }
}

/// A route as returned by the routing provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteSummary {
    /// Estimated travel time with live traffic.
    pub travel_time_in_seconds: u64,

    /// Route length.
    pub length_in_meters: f64,

    /// Polyline from start to end.
    pub path: Vec<GeoPoint>,
}

impl RouteSummary {
    pub fn color(&self) -> ColorClass {
        ColorClass::from_travel_time(self.travel_time_in_seconds)
    }
}

/// A validated optimize request.
///
/// Can only be built once both points are picked and perishability is in range.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizeRequest {
    pub start: GeoPoint,
    pub end: GeoPoint,
    pub perishability: u8,
    pub city: Option<String>,
}

impl OptimizeRequest {
    /// Validate the inputs of a submission.
    ///
    /// A blank city is treated as absent.
    pub fn new(
        start: Option<GeoPoint>,
        end: Option<GeoPoint>,
        perishability: i32,
        city: Option<&str>,
    ) -> Result<Self, ValidationError> {
        let start = start.ok_or(ValidationError::MissingStart)?;
        let end = end.ok_or(ValidationError::MissingEnd)?;

        let perishability = u8::try_from(perishability)
            .ok()
            .filter(|p| (MIN_PERISHABILITY..=MAX_PERISHABILITY).contains(&i32::from(*p)))
            .ok_or(ValidationError::PerishabilityOutOfRange(perishability))?;

        let city = city
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        Ok(Self {
            start,
            end,
            perishability,
            city,
        })
    }
}

/// Score returned by the backend for one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizeResult {
    /// City the weather was looked up for.
    #[serde(default)]
    pub city: String,

    /// Travel time the backend scored against.
    pub travel_time_sec: i64,

    /// Weather description, if the backend could fetch one.
    #[serde(default)]
    pub weather: Option<String>,

    /// Temperature in degrees Celsius, if reported.
    #[serde(default)]
    pub temperature: Option<f64>,

    /// Combined score.
    pub final_score: f64,
}

/// A past optimization, in its one canonical shape.
///
/// Built only by [`crate::history::normalize_history`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRecord {
    pub id: i64,
    pub city: Option<String>,
    pub perishability: i64,
    pub travel_time_sec: i64,
    pub weather: Option<String>,
    pub final_score: f64,
    pub created_at: Option<DateTime<Utc>>,
}
