use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::{
    config::ToolConfig,
    error::ToolError,
    model::{Coordinates, LocationInput},
    request,
    response::{self, Endpoint},
    transport::{HttpResponse, HttpTransport},
};

/// Final coordinates for an invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLocation {
    pub coordinates: Coordinates,
    /// Set when the coordinates came from a geocoding lookup.
    pub address: Option<String>,
}

/// Turns a [`LocationInput`] into coordinates, geocoding addresses when allowed.
#[derive(Debug, Clone, Copy)]
pub struct GeocodingResolver<'a> {
    config: &'a ToolConfig,
    transport: &'a dyn HttpTransport,
}

impl<'a> GeocodingResolver<'a> {
    pub fn new(config: &'a ToolConfig, transport: &'a dyn HttpTransport) -> Self {
        Self { config, transport }
    }

    /// Makes at most one geocoding call and never retries.
    pub async fn resolve(&self, input: LocationInput) -> Result<ResolvedLocation, ToolError> {
        let address = match input {
            LocationInput::Coordinates(coordinates) => {
                return Ok(ResolvedLocation {
                    coordinates,
                    address: None,
                });
            }
            LocationInput::Address(address) => address,
        };

        if let Some(parsed) = Coordinates::parse_pair(&address) {
            debug!("Address is a coordinate literal, skipping geocoding");
            return Ok(ResolvedLocation {
                coordinates: parsed?,
                address: None,
            });
        }

        if !self.config.geocoding_enabled {
            return Err(ToolError::missing_location(
                "geocoding is disabled; provide latitude and longitude",
            ));
        }
        let key = self.config.geocoding_key().ok_or_else(|| {
            ToolError::missing_location(
                "no geocoding_api_key is configured; provide latitude and longitude",
            )
        })?;

        let req = request::geocoding_request(self.config, key, &address);
        debug!("Geocoding address '{}'", address);

        let res = self.transport.get(&req).await?;
        let coordinates = interpret(&address, &res)?;

        debug!(
            "Geocoded '{}' to ({}, {})",
            address,
            coordinates.latitude(),
            coordinates.longitude()
        );

        Ok(ResolvedLocation {
            coordinates,
            address: Some(address),
        })
    }
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: Option<String>,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: GeocodeGeometry,
}

#[derive(Debug, Deserialize)]
struct GeocodeGeometry {
    location: GeocodeLatLng,
}

#[derive(Debug, Deserialize)]
struct GeocodeLatLng {
    lat: f64,
    lng: f64,
}

fn interpret(query: &str, res: &HttpResponse) -> Result<Coordinates, ToolError> {
    let payload: Value = response::map_response(Endpoint::Geocoding { query }, res)
        .map_err(|err| match err {
            ToolError::LocationNotFound { .. } | ToolError::Network(_) => err,
            other => wrap(other.status(), &other.to_string()),
        })?;

    let parsed: GeocodeResponse = serde_json::from_value(payload)
        .map_err(|e| wrap(Some(res.status), &format!("unexpected response shape: {e}")))?;

    match parsed.status.as_deref() {
        None | Some("OK") => {}
        Some("ZERO_RESULTS") => {
            return Err(ToolError::LocationNotFound {
                query: query.to_string(),
            });
        }
        Some(status) => {
            let detail = parsed.error_message.unwrap_or_default();
            return Err(wrap(
                Some(res.status),
                format!("provider status {status} {detail}").trim_end(),
            ));
        }
    }

    if parsed.results.len() > 1 {
        debug!(
            "Geocoding returned {} candidates for '{}', using the first",
            parsed.results.len(),
            query
        );
    }

    let first = parsed
        .results
        .first()
        .ok_or_else(|| ToolError::LocationNotFound {
            query: query.to_string(),
        })?;

    let location = &first.geometry.location;
    Coordinates::new(location.lat, location.lng)
        .map_err(|e| wrap(Some(res.status), &format!("invalid coordinates: {e}")))
}

fn wrap(status: Option<u16>, detail: &str) -> ToolError {
    ToolError::upstream(status, format!("geocoding failed: {detail}"))
}
