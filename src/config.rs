//! Runtime configuration.
//!
//! Every outbound endpoint is held in an explicitly constructed [`Config`]
//! that is handed to the [`Orchestrator`](crate::orchestrator::Orchestrator)
//! at startup. Nothing is read from module-level globals.

use std::env;
use std::time::Duration;

use thiserror::Error;

/// Default optimize/history backend.
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";

/// Default routing provider (TomTom Routing API v1).
pub const DEFAULT_ROUTING_URL: &str = "https://api.tomtom.com/routing/1";

/// Default timeout applied to every outbound request.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

const ENV_BACKEND_URL: &str = "ROUTEMONK_BACKEND_URL";
const ENV_ROUTING_API_KEY: &str = "ROUTEMONK_ROUTING_API_KEY";
const ENV_ROUTING_URL: &str = "ROUTEMONK_ROUTING_URL";
const ENV_TIMEOUT_SECS: &str = "ROUTEMONK_HTTP_TIMEOUT_SECS";

/// Errors raised while assembling a [`Config`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable was absent or blank.
    #[error("missing required setting {0}")]
    Missing(&'static str),

    /// A URL setting did not parse as an absolute http(s) URL.
    #[error("{var} is not a valid http(s) URL: {value}")]
    InvalidUrl { var: &'static str, value: String },

    /// A numeric setting did not parse.
    #[error("{var} must be a positive integer, got {value}")]
    InvalidNumber { var: &'static str, value: String },

    /// The shared HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Endpoints and credentials for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base URL of the optimize/history backend.
    pub backend_base_url: String,

    /// API key for the routing provider.
    pub routing_api_key: String,

    /// Base URL of the routing provider.
    pub routing_base_url: String,

    /// Timeout for every outbound request.
    pub request_timeout: Duration,
}

impl Config {
    /// Build a config with default URLs and timeout around a routing key.
    pub fn new(routing_api_key: &str) -> Self {
        Self {
            backend_base_url: DEFAULT_BACKEND_URL.to_string(),
            routing_api_key: routing_api_key.to_string(),
            routing_base_url: DEFAULT_ROUTING_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Override the backend base URL.
    pub fn with_backend_url(mut self, url: &str) -> Self {
        self.backend_base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Override the routing provider base URL.
    pub fn with_routing_url(mut self, url: &str) -> Self {
        self.routing_base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Override the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary lookup function.
    ///
    /// Blank values are treated as absent.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let routing_api_key = get(ENV_ROUTING_API_KEY).ok_or(ConfigError::Missing(ENV_ROUTING_API_KEY))?;

        let backend_base_url = match get(ENV_BACKEND_URL) {
            Some(url) => validate_url(ENV_BACKEND_URL, &url)?,
            None => DEFAULT_BACKEND_URL.to_string(),
        };

        let routing_base_url = match get(ENV_ROUTING_URL) {
            Some(url) => validate_url(ENV_ROUTING_URL, &url)?,
            None => DEFAULT_ROUTING_URL.to_string(),
        };

        let request_timeout = match get(ENV_TIMEOUT_SECS) {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidNumber {
                        var: ENV_TIMEOUT_SECS,
                        value: raw,
                    });
                }
            },
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        Ok(Self {
            backend_base_url,
            routing_api_key,
            routing_base_url,
            request_timeout,
        })
    }

    /// Build the HTTP client shared by every outbound call of a session.
    pub fn http_client(&self) -> Result<reqwest::Client, ConfigError> {
        reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))
    }
}

fn validate_url(var: &'static str, value: &str) -> Result<String, ConfigError> {
    let invalid = || ConfigError::InvalidUrl {
        var,
        value: value.to_string(),
    };

    let parsed = reqwest::Url::parse(value).map_err(|_| invalid())?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid());
    }

    Ok(value.trim_end_matches('/').to_string())
}
