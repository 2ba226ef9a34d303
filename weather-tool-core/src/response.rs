use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::{error::ToolError, transport::HttpResponse};

/// Which upstream produced a response; 404 means different things for each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint<'a> {
    Weather,
    Geocoding { query: &'a str },
}

/// Translate a provider response into its JSON payload, or the matching error.
pub fn map_response(endpoint: Endpoint<'_>, response: &HttpResponse) -> Result<Value, ToolError> {
    let status = response.status;

    if response.is_success() {
        return serde_json::from_str(&response.body).map_err(|e| {
            ToolError::upstream(
                Some(status),
                format!("provider returned a malformed body: {e}"),
            )
        });
    }

    let message = error_message(&response.body);

    match (status, endpoint) {
        (401 | 403, _) => Err(ToolError::Authentication { status, message }),
        (404, Endpoint::Geocoding { query }) => Err(ToolError::LocationNotFound {
            query: query.to_string(),
        }),
        (429, _) => Err(ToolError::RateLimited {
            retry_after: retry_after(response, Utc::now()),
            message,
        }),
        _ => Err(ToolError::upstream(Some(status), message)),
    }
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    error: GoogleError,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    message: Option<String>,
    #[serde(default)]
    details: Vec<GoogleErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorDetail {
    #[serde(rename = "retryDelay")]
    retry_delay: Option<String>,
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<GoogleErrorBody>(body)
        .ok()
        .and_then(|b| b.error.message)
        .unwrap_or_else(|| truncate_body(body))
}

/// `Retry-After` (seconds or HTTP-date), else a `RetryInfo.retryDelay` such as `"30s"`.
///
/// Values that do not fit a [`Duration`] are dropped rather than trusted.
fn retry_after(response: &HttpResponse, now: DateTime<Utc>) -> Option<Duration> {
    if let Some(delay) = response
        .header("retry-after")
        .and_then(|v| header_delay(v.trim(), now))
    {
        return Some(delay);
    }

    let body: GoogleErrorBody = serde_json::from_str(&response.body).ok()?;
    body.error
        .details
        .iter()
        .filter_map(|d| d.retry_delay.as_deref())
        .find_map(parse_delay)
}

fn header_delay(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    if let Some(delay) = seconds(value) {
        return Some(delay);
    }
    // A date in the past means the wait is already over.
    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}

fn parse_delay(delay: &str) -> Option<Duration> {
    seconds(delay.trim().strip_suffix('s')?)
}

fn seconds(value: &str) -> Option<Duration> {
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let secs: f64 = value.parse().ok()?;
    if secs.is_sign_negative() {
        return None;
    }
    Duration::try_from_secs_f64(secs).ok()
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() > MAX {
        format!("{}...", body.chars().take(MAX).collect::<String>())
    } else if body.trim().is_empty() {
        "empty response body".to_string()
    } else {
        body.to_string()
    }
}
