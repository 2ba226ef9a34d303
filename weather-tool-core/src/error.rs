//! Failure envelope returned by every stage of the dispatch pipeline.

use std::time::Duration;

use serde::{Serialize, Serializer, ser::SerializeStruct};
use thiserror::Error;

use crate::transport::TransportError;

/// Flat tag identifying the class of a [`ToolError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    UnknownFunction,
    MissingParameter,
    InvalidType,
    InvalidValue,
    OutOfRange,
    MissingLocation,
    LocationNotFound,
    AuthenticationError,
    RateLimited,
    UpstreamError,
    NetworkError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnknownFunction => "UnknownFunction",
            ErrorKind::MissingParameter => "MissingParameter",
            ErrorKind::InvalidType => "InvalidType",
            ErrorKind::InvalidValue => "InvalidValue",
            ErrorKind::OutOfRange => "OutOfRange",
            ErrorKind::MissingLocation => "MissingLocation",
            ErrorKind::LocationNotFound => "LocationNotFound",
            ErrorKind::AuthenticationError => "AuthenticationError",
            ErrorKind::RateLimited => "RateLimited",
            ErrorKind::UpstreamError => "UpstreamError",
            ErrorKind::NetworkError => "NetworkError",
        }
    }

    /// Whether this kind is raised before any network call is attempted.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            ErrorKind::UnknownFunction
                | ErrorKind::MissingParameter
                | ErrorKind::InvalidType
                | ErrorKind::InvalidValue
                | ErrorKind::OutOfRange
                | ErrorKind::MissingLocation
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced by a tool invocation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ToolError {
    #[error("Unknown function '{name}'. Supported functions: current_conditions, hourly_forecast, daily_forecast.")]
    UnknownFunction { name: String },

    #[error("Missing required parameter '{name}'")]
    MissingParameter { name: &'static str },

    #[error("Parameter '{name}' must be of type {expected}, got {actual}")]
    InvalidType {
        name: &'static str,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Parameter '{name}' must be one of: {}", .allowed.join(", "))]
    InvalidValue {
        name: &'static str,
        allowed: &'static [&'static str],
    },

    #[error("Parameter '{name}' must be between {min} and {max}")]
    OutOfRange {
        name: &'static str,
        min: f64,
        max: f64,
    },

    #[error("Missing location: {reason}")]
    MissingLocation { reason: String },

    #[error("Could not find a location matching '{query}'")]
    LocationNotFound { query: String },

    #[error("Provider rejected the credentials (status {status}): {message}")]
    Authentication { status: u16, message: String },

    #[error("Provider rate limit exceeded{}: {message}", retry_hint(.retry_after))]
    RateLimited {
        retry_after: Option<Duration>,
        message: String,
    },

    #[error("Upstream provider error{}: {message}", status_hint(.status))]
    Upstream { status: Option<u16>, message: String },

    #[error("Network error: {0}")]
    Network(#[from] TransportError),
}

fn retry_hint(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(d) => format!(" (retry after {}s)", whole_secs(*d)),
        None => String::new(),
    }
}

/// Whole seconds, rounded up.
fn whole_secs(d: Duration) -> u64 {
    d.as_secs().saturating_add(u64::from(d.subsec_nanos() > 0))
}

fn status_hint(status: &Option<u16>) -> String {
    match status {
        Some(s) => format!(" (status {s})"),
        None => String::new(),
    }
}

impl ToolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ToolError::UnknownFunction { .. } => ErrorKind::UnknownFunction,
            ToolError::MissingParameter { .. } => ErrorKind::MissingParameter,
            ToolError::InvalidType { .. } => ErrorKind::InvalidType,
            ToolError::InvalidValue { .. } => ErrorKind::InvalidValue,
            ToolError::OutOfRange { .. } => ErrorKind::OutOfRange,
            ToolError::MissingLocation { .. } => ErrorKind::MissingLocation,
            ToolError::LocationNotFound { .. } => ErrorKind::LocationNotFound,
            ToolError::Authentication { .. } => ErrorKind::AuthenticationError,
            ToolError::RateLimited { .. } => ErrorKind::RateLimited,
            ToolError::Upstream { .. } => ErrorKind::UpstreamError,
            ToolError::Network(_) => ErrorKind::NetworkError,
        }
    }

    /// Upstream HTTP status, when the failure came from a provider response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ToolError::Authentication { status, .. } => Some(*status),
            ToolError::RateLimited { .. } => Some(429),
            ToolError::Upstream { status, .. } => *status,
            _ => None,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ToolError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub fn missing_location(reason: impl Into<String>) -> Self {
        Self::MissingLocation {
            reason: reason.into(),
        }
    }

    pub fn upstream(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            message: message.into(),
        }
    }
}

/// Serializes as the host-facing envelope `{kind, message, status, retry_after_secs}`.
impl Serialize for ToolError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("ToolError", 4)?;
        s.serialize_field("kind", &self.kind())?;
        s.serialize_field("message", &self.to_string())?;
        s.serialize_field("status", &self.status())?;
        s.serialize_field("retry_after_secs", &self.retry_after().map(whole_secs))?;
        s.end()
    }
}

/// Errors raised while building a [`ToolConfig`](crate::ToolConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse tool configuration: {0}")]
    Parse(String),

    #[error("'api_key' must not be empty")]
    MissingApiKey,

    #[error("'{field}' must be an http(s) URL, got '{value}'")]
    InvalidUrl { field: &'static str, value: String },

    #[error("'language' must not be empty")]
    EmptyLanguage,

    #[error("'timeout_secs' must be greater than zero")]
    InvalidTimeout,
}
