//! History normalization and store.
//!
//! The backend has served history in several shapes: a bare array or an
//! object wrapping it under `history`, and records as objects or as
//! positional rows (`id, city, perishability, travel_time_sec, weather,
//! final_score, created_at`). [`normalize_history`] is the one place that
//! knows about these shapes; everything downstream sees [`HistoryRecord`].

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::HistoryFetchError;
use crate::model::HistoryRecord;

// ============================================================================
// Normalization
// ============================================================================

/// Top-level history payload.
#[derive(Deserialize)]
#[serde(untagged)]
enum HistoryPayload {
    Bare(Vec<Value>),
    Wrapped { history: Vec<Value> },
}

#[derive(Deserialize)]
struct StructuredRecord {
    id: i64,
    #[serde(default)]
    city: Option<String>,
    perishability: i64,
    travel_time_sec: i64,
    #[serde(default)]
    weather: Option<String>,
    final_score: f64,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    created_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct PositionalRecord(
    i64,
    Option<String>,
    i64,
    i64,
    Option<String>,
    f64,
    #[serde(default, deserialize_with = "deserialize_timestamp")] Option<DateTime<Utc>>,
);

impl From<StructuredRecord> for HistoryRecord {
    fn from(r: StructuredRecord) -> Self {
        HistoryRecord {
            id: r.id,
            city: r.city,
            perishability: r.perishability,
            travel_time_sec: r.travel_time_sec,
            weather: r.weather,
            final_score: r.final_score,
            created_at: r.created_at,
        }
    }
}

impl From<PositionalRecord> for HistoryRecord {
    fn from(row: PositionalRecord) -> Self {
        let PositionalRecord(
            id,
            city,
            perishability,
            travel_time_sec,
            weather,
            final_score,
            created_at,
        ) = row;
        HistoryRecord {
            id,
            city,
            perishability,
            travel_time_sec,
            weather,
            final_score,
            created_at,
        }
    }
}

/// Parse a timestamp that may be RFC 3339, naive ISO 8601 (taken as UTC), or null.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    raw.map(|s| {
        parse_timestamp(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp {s:?}")))
    })
    .transpose()
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Normalize a single record, whatever its shape.
pub fn normalize_record(value: Value) -> Result<HistoryRecord, HistoryFetchError> {
    let parsed = match &value {
        Value::Object(_) => {
            serde_json::from_value::<StructuredRecord>(value.clone()).map(HistoryRecord::from)
        }
        Value::Array(_) => {
            serde_json::from_value::<PositionalRecord>(value.clone()).map(HistoryRecord::from)
        }
        _ => {
            return Err(HistoryFetchError::Malformed(format!(
                "history record must be an object or an array: {value}"
            )));
        }
    };

    parsed.map_err(|e| HistoryFetchError::Malformed(format!("{e} in record {value}")))
}

/// Normalize a full history payload.
///
/// Any record that fits neither shape fails the whole payload, so a refresh
/// never half-applies.
pub fn normalize_history(payload: Value) -> Result<Vec<HistoryRecord>, HistoryFetchError> {
    let records = match serde_json::from_value::<HistoryPayload>(payload) {
        Ok(HistoryPayload::Bare(records)) | Ok(HistoryPayload::Wrapped { history: records }) => {
            records
        }
        Err(_) => {
            return Err(HistoryFetchError::Malformed(
                "expected an array or an object with a `history` array".to_string(),
            ));
        }
    };

    records.into_iter().map(normalize_record).collect()
}

// ============================================================================
// Store
// ============================================================================

/// Tag of one history refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RefreshTicket(u64);

/// What happened to a completed refresh.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// The store now holds exactly the fetched records.
    Replaced { records: usize },
    /// The fetch failed; the previous list is untouched.
    Failed(HistoryFetchError),
    /// A newer refresh already landed; this one was dropped.
    Superseded,
}

/// The list of past optimizations, always a whole backend snapshot.
#[derive(Debug, Clone, Default)]
pub struct HistoryStore {
    records: Vec<HistoryRecord>,
    issued: u64,
    applied: u64,
    last_error: Option<HistoryFetchError>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag a new refresh.
    pub fn begin_refresh(&mut self) -> RefreshTicket {
        self.issued += 1;
        RefreshTicket(self.issued)
    }

    /// Apply a refresh result.
    ///
    /// Success replaces the list wholesale. A result older than one already
    /// applied is dropped.
    pub fn complete(
        &mut self,
        ticket: RefreshTicket,
        result: Result<Vec<HistoryRecord>, HistoryFetchError>,
    ) -> RefreshOutcome {
        if ticket.0 <= self.applied {
            debug!(ticket = ticket.0, applied = self.applied, "Dropping superseded history");
            return RefreshOutcome::Superseded;
        }

        match result {
            Ok(records) => {
                info!(records = records.len(), "History refreshed");
                self.applied = ticket.0;
                self.records = records;
                self.last_error = None;
                RefreshOutcome::Replaced {
                    records: self.records.len(),
                }
            }
            Err(e) => {
                warn!(error = %e, "History refresh failed");
                self.last_error = Some(e.clone());
                RefreshOutcome::Failed(e)
            }
        }
    }

    pub fn records(&self) -> &[HistoryRecord] {
        &self.records
    }

    pub fn last_error(&self) -> Option<&HistoryFetchError> {
        self.last_error.as_ref()
    }
}
