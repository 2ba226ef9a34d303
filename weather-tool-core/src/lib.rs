//! Core library for the weather tool.
//!
//! This crate defines:
//! - The static function/parameter schema and its validator
//! - Geocoding, unit/locale normalization and upstream request building
//! - Mapping of provider responses into a uniform result/error envelope
//! - The [`WeatherTool`] dispatcher tying these together over an [`HttpTransport`]
//!
//! It is used by `weather-tool-cli`, but any host can embed it.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod geocode;
pub mod model;
pub mod normalize;
pub mod request;
pub mod response;
pub mod schema;
pub mod transport;

#[cfg(test)]
mod testing;

pub use config::ToolConfig;
pub use dispatch::WeatherTool;
pub use error::{ConfigError, ErrorKind, ToolError};
pub use model::{
    Coordinates, FunctionName, InvocationRequest, NormalizedRequest, ToolResult, UnitsSystem,
};
pub use request::UpstreamRequest;
pub use schema::{FunctionSpec, ParameterSpec};
pub use transport::{HttpResponse, HttpTransport, ReqwestTransport, TransportError};
