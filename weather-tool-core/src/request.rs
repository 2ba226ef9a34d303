//! Builds the concrete upstream calls. Everything here is pure.

use crate::{config::ToolConfig, model::NormalizedRequest, schema::FunctionSpec};

pub const USER_AGENT: &str = concat!("weather-tool/", env!("CARGO_PKG_VERSION"));

/// A fully described GET request, ready for an [`HttpTransport`](crate::HttpTransport).
#[derive(Clone, PartialEq, Eq)]
pub struct UpstreamRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl UpstreamRequest {
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// The `key` query parameter is redacted.
impl std::fmt::Debug for UpstreamRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let query: Vec<(&str, &str)> = self
            .query
            .iter()
            .map(|(k, v)| {
                if k == "key" {
                    (k.as_str(), "[REDACTED]")
                } else {
                    (k.as_str(), v.as_str())
                }
            })
            .collect();
        f.debug_struct("UpstreamRequest")
            .field("url", &self.url)
            .field("query", &query)
            .field("headers", &self.headers)
            .finish()
    }
}

fn default_headers() -> Vec<(String, String)> {
    vec![
        ("Accept".to_string(), "application/json".to_string()),
        ("User-Agent".to_string(), USER_AGENT.to_string()),
    ]
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

/// Weather endpoint call for a normalized request.
pub fn weather_request(
    config: &ToolConfig,
    spec: &FunctionSpec,
    request: &NormalizedRequest,
) -> UpstreamRequest {
    let mut query = vec![
        ("key".to_string(), config.api_key.clone()),
        (
            "location.latitude".to_string(),
            request.coordinates.latitude().to_string(),
        ),
        (
            "location.longitude".to_string(),
            request.coordinates.longitude().to_string(),
        ),
        (
            "unitsSystem".to_string(),
            request.locale.units.as_str().to_string(),
        ),
        ("languageCode".to_string(), request.locale.language.clone()),
    ];

    if let (Some(param), Some(count)) = (spec.count, request.count) {
        query.push((param.name.to_string(), count.to_string()));
    }

    UpstreamRequest {
        url: join_url(&config.base_url, spec.endpoint),
        query,
        headers: default_headers(),
    }
}

/// Geocoding call for a free-text address.
pub fn geocoding_request(config: &ToolConfig, key: &str, address: &str) -> UpstreamRequest {
    UpstreamRequest {
        url: config.geocoding_base_url.trim_end_matches('/').to_string(),
        query: vec![
            ("address".to_string(), address.to_string()),
            ("key".to_string(), key.to_string()),
        ],
        headers: default_headers(),
    }
}
