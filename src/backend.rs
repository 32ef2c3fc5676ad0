//! Optimize/history backend client.
//!
//! The optimize contract is pinned to one variant: a JSON body
//! `{start: "lat,lng", end: "lat,lng", perishability, city?}` posted to
//! `/optimize/`. History comes from `GET /history/` and goes straight
//! through [`normalize_history`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::DEFAULT_BACKEND_URL;
use crate::error::{HistoryFetchError, OptimizeErrorKind, OptimizeRequestError};
use crate::history::normalize_history;
use crate::model::{HistoryRecord, OptimizeRequest, OptimizeResult};

/// Client for the optimize/history backend.
#[derive(Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
}

impl Default for BackendClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Wire form of an optimize request.
#[derive(Debug, Serialize)]
struct OptimizeBody<'a> {
    start: String,
    end: String,
    perishability: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    city: Option<&'a str>,
}

impl<'a> From<&'a OptimizeRequest> for OptimizeBody<'a> {
    fn from(request: &'a OptimizeRequest) -> Self {
        Self {
            start: request.start.to_string(),
            end: request.end.to_string(),
            perishability: request.perishability,
            city: request.city.as_deref(),
        }
    }
}

/// FastAPI-style validation error body.
#[derive(Debug, Deserialize)]
struct ValidationBody {
    detail: Value,
}

#[derive(Debug, Deserialize)]
struct ValidationIssue {
    #[serde(default)]
    loc: Vec<Value>,
    msg: String,
}

impl BackendClient {
    /// Create a client against the default local backend.
    pub fn new() -> Self {
        Self::with_base_url(reqwest::Client::new(), DEFAULT_BACKEND_URL)
    }

    /// Create a client with a custom base URL.
    pub fn with_base_url(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Submit one optimize request.
    ///
    /// Failures are classified by status: 422 is `InvalidInput`, 5xx is
    /// `Server`, no response is `Network`, anything else is `Unknown`. A
    /// success status whose body carries an `error` field is `Server`.
    pub async fn optimize(
        &self,
        request: &OptimizeRequest,
    ) -> Result<OptimizeResult, OptimizeRequestError> {
        let url = format!("{}/optimize/", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&OptimizeBody::from(request))
            .send()
            .await
            .map_err(|e| OptimizeRequestError::network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| OptimizeRequestError::network(e.to_string()))?;

        if !status.is_success() {
            let kind = OptimizeErrorKind::from_status(status.as_u16());
            let message = match kind {
                OptimizeErrorKind::InvalidInput => describe_validation_error(&body),
                _ => describe_failure(status, &body),
            };
            return Err(OptimizeRequestError::new(kind, Some(status.as_u16()), message));
        }

        parse_optimize_body(status.as_u16(), &body)
    }

    /// Fetch and normalize the full history list.
    pub async fn fetch_history(&self) -> Result<Vec<HistoryRecord>, HistoryFetchError> {
        let url = format!("{}/history/", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| HistoryFetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HistoryFetchError::Status(status.as_u16()));
        }

        let payload = response
            .json::<Value>()
            .await
            .map_err(|e| HistoryFetchError::Malformed(e.to_string()))?;

        normalize_history(payload)
    }

    /// Check that the backend root answers with a success status.
    pub async fn ping(&self) -> anyhow::Result<()> {
        let url = format!("{}/", self.base_url);
        self.client.get(&url).send().await?.error_for_status()?;
        Ok(())
    }
}

/// Parse a success body, catching the legacy `{"error": ...}` reply.
fn parse_optimize_body(status: u16, body: &str) -> Result<OptimizeResult, OptimizeRequestError> {
    let value: Value = serde_json::from_str(body).map_err(|e| {
        OptimizeRequestError::new(
            OptimizeErrorKind::Unknown,
            Some(status),
            format!("unreadable response: {e}"),
        )
    })?;

    if let Some(error) = value.get("error") {
        let message = error
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(OptimizeRequestError::new(
            OptimizeErrorKind::Server,
            Some(status),
            message,
        ));
    }

    serde_json::from_value::<OptimizeResult>(value).map_err(|e| {
        OptimizeRequestError::new(
            OptimizeErrorKind::Unknown,
            Some(status),
            format!("unexpected response shape: {e}"),
        )
    })
}

/// Flatten a 422 body into `field: message` lines.
fn describe_validation_error(body: &str) -> String {
    let Ok(parsed) = serde_json::from_str::<ValidationBody>(body) else {
        return format!("request rejected: {}", body.trim());
    };

    match parsed.detail {
        Value::String(message) => message,
        Value::Array(items) => {
            let lines: Vec<String> = items
                .into_iter()
                .filter_map(|item| serde_json::from_value::<ValidationIssue>(item).ok())
                .map(|issue| {
                    let field = issue
                        .loc
                        .iter()
                        .filter_map(Value::as_str)
                        .filter(|segment| *segment != "body")
                        .collect::<Vec<_>>()
                        .join(".");
                    if field.is_empty() {
                        issue.msg
                    } else {
                        format!("{}: {}", field, issue.msg)
                    }
                })
                .collect();

            if lines.is_empty() {
                "request rejected".to_string()
            } else {
                lines.join("; ")
            }
        }
        other => other.to_string(),
    }
}

fn describe_failure(status: reqwest::StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("HTTP {}: {}", status.as_u16(), body)
    }
}
