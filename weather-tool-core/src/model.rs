use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ToolError;

/// Unit systems accepted by the weather provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitsSystem {
    #[default]
    Imperial,
    Metric,
}

impl UnitsSystem {
    pub const ALLOWED: &'static [&'static str] = &["imperial", "metric"];

    pub fn as_str(&self) -> &'static str {
        match self {
            UnitsSystem::Imperial => "imperial",
            UnitsSystem::Metric => "metric",
        }
    }
}

impl std::fmt::Display for UnitsSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for UnitsSystem {
    type Error = ToolError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "imperial" => Ok(UnitsSystem::Imperial),
            "metric" => Ok(UnitsSystem::Metric),
            _ => Err(ToolError::InvalidValue {
                name: "unitsSystem",
                allowed: Self::ALLOWED,
            }),
        }
    }
}

/// The callable functions exposed by the tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionName {
    CurrentConditions,
    HourlyForecast,
    DailyForecast,
}

impl FunctionName {
    pub fn as_str(&self) -> &'static str {
        match self {
            FunctionName::CurrentConditions => "current_conditions",
            FunctionName::HourlyForecast => "hourly_forecast",
            FunctionName::DailyForecast => "daily_forecast",
        }
    }

    pub const fn all() -> &'static [FunctionName] {
        &[
            FunctionName::CurrentConditions,
            FunctionName::HourlyForecast,
            FunctionName::DailyForecast,
        ]
    }
}

impl std::fmt::Display for FunctionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for FunctionName {
    type Error = ToolError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "current_conditions" => Ok(FunctionName::CurrentConditions),
            "hourly_forecast" => Ok(FunctionName::HourlyForecast),
            "daily_forecast" => Ok(FunctionName::DailyForecast),
            _ => Err(ToolError::UnknownFunction {
                name: value.to_string(),
            }),
        }
    }
}

/// A validated latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    latitude: f64,
    longitude: f64,
}

impl Coordinates {
    pub const LATITUDE_RANGE: (f64, f64) = (-90.0, 90.0);
    pub const LONGITUDE_RANGE: (f64, f64) = (-180.0, 180.0);

    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ToolError> {
        check_range("latitude", latitude, Self::LATITUDE_RANGE)?;
        check_range("longitude", longitude, Self::LONGITUDE_RANGE)?;
        Ok(Self {
            latitude,
            longitude,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Parse a `"lat,lon"` literal such as `"47.6062, -122.3321"`.
    ///
    /// Returns `None` when the text doesn't look like a coordinate pair.
    pub fn parse_pair(text: &str) -> Option<Result<Self, ToolError>> {
        let (lat, lon) = text.split_once(',')?;
        let lat = parse_decimal(lat)?;
        let lon = parse_decimal(lon)?;
        Some(Self::new(lat, lon))
    }
}

fn parse_decimal(text: &str) -> Option<f64> {
    let text = text.trim();
    let digits = text.strip_prefix(['+', '-']).unwrap_or(text);
    let plausible = !digits.is_empty()
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.chars().any(|c| c.is_ascii_digit());
    if !plausible {
        return None;
    }
    text.parse().ok()
}

fn check_range(name: &'static str, value: f64, (min, max): (f64, f64)) -> Result<(), ToolError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ToolError::OutOfRange { name, min, max })
    }
}

/// A raw call as received from the host.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationRequest {
    pub function: String,
    pub arguments: Map<String, Value>,
}

impl InvocationRequest {
    pub fn new(function: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            function: function.into(),
            arguments,
        }
    }

    /// Build a request from an arbitrary JSON value; `null` means "no arguments".
    pub fn from_value(function: impl Into<String>, arguments: Value) -> Result<Self, ToolError> {
        match arguments {
            Value::Object(map) => Ok(Self::new(function, map)),
            Value::Null => Ok(Self::new(function, Map::new())),
            other => Err(ToolError::InvalidType {
                name: "arguments",
                expected: "object",
                actual: json_type_name(&other),
            }),
        }
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Where the caller said the forecast is for, before any geocoding.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationInput {
    Coordinates(Coordinates),
    Address(String),
}

/// Units and language after defaults have been applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Locale {
    #[serde(rename = "unitsSystem")]
    pub units: UnitsSystem,
    pub language: String,
}

/// A fully validated, resolved and normalized request.
///
/// This is the only input the request builder accepts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRequest {
    pub function: FunctionName,
    pub coordinates: Coordinates,
    #[serde(flatten)]
    pub locale: Locale,
    /// Number of hours or days requested, for forecast functions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    /// The address that was geocoded into `coordinates`, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_address: Option<String>,
}

/// Uniform success envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResult {
    pub function: FunctionName,
    pub request: NormalizedRequest,
    /// Provider payload, passed through untouched.
    pub payload: Value,
    pub retrieved_at: DateTime<Utc>,
}
