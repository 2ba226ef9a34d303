use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::{
    config::ToolConfig,
    error::ToolError,
    geocode::GeocodingResolver,
    model::{InvocationRequest, NormalizedRequest, ToolResult},
    normalize::Normalizer,
    request,
    response::{self, Endpoint},
    schema,
    transport::{HttpTransport, ReqwestTransport, TransportError},
};

/// The tool dispatcher: one configured weather tool.
///
/// Holds no per-call state, so a single instance can serve any number of
/// concurrent invocations.
#[derive(Debug, Clone)]
pub struct WeatherTool {
    config: ToolConfig,
    transport: Arc<dyn HttpTransport>,
}

impl WeatherTool {
    pub fn new(config: ToolConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self { config, transport }
    }

    /// Build a tool backed by [`ReqwestTransport`] with the configured timeout.
    pub fn with_reqwest(config: ToolConfig) -> Result<Self, TransportError> {
        let transport = ReqwestTransport::from_config(&config)?;
        Ok(Self::new(config, Arc::new(transport)))
    }

    pub async fn invoke_request(&self, request: &InvocationRequest) -> Result<ToolResult, ToolError> {
        self.invoke(&request.function, &request.arguments).await
    }

    /// Run one function call end to end.
    ///
    /// Stages run strictly in order and the first failure is returned.
    #[instrument(skip_all, fields(function = %function))]
    pub async fn invoke(
        &self,
        function: &str,
        args: &Map<String, Value>,
    ) -> Result<ToolResult, ToolError> {
        let outcome = self.run(function, args).await;

        match &outcome {
            Ok(result) => info!(
                "{} succeeded for ({}, {})",
                result.function,
                result.request.coordinates.latitude(),
                result.request.coordinates.longitude()
            ),
            Err(err) if err.kind().is_local() => info!("Rejected invocation: {}", err),
            Err(err) => warn!("Invocation failed [{}]: {}", err.kind(), err),
        }

        outcome
    }

    async fn run(&self, function: &str, args: &Map<String, Value>) -> Result<ToolResult, ToolError> {
        let spec = schema::lookup(function)?;
        let validated = spec.validate(args)?;
        let location = validated.location()?;
        let count = validated.count()?;
        debug!("Arguments validated");

        let resolved = GeocodingResolver::new(&self.config, self.transport.as_ref())
            .resolve(location)
            .await?;

        let locale = Normalizer::new(&self.config)
            .normalize(validated.text("unitsSystem"), validated.text("language"))?;

        let normalized = NormalizedRequest {
            function: spec.name,
            coordinates: resolved.coordinates,
            locale,
            count,
            resolved_address: resolved.address,
        };

        let upstream = request::weather_request(&self.config, spec, &normalized);
        debug!("Calling {}", upstream.url);

        let res = self.transport.get(&upstream).await?;
        let payload = response::map_response(Endpoint::Weather, &res)?;

        Ok(ToolResult {
            function: spec.name,
            request: normalized,
            payload,
            retrieved_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ErrorKind,
        model::{FunctionName, UnitsSystem},
        testing::{MockTransport, json_response},
        transport::HttpResponse,
    };
    use serde_json::json;
    use std::time::Duration;

    const BASE_URL: &str = "https://weather.googleapis.com/v1";

    fn config() -> ToolConfig {
        ToolConfig::new("WEATHER_KEY", BASE_URL).with_geocoding_api_key("GEO_KEY")
    }

    fn args(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("test arguments must be an object"),
        }
    }

    fn weather_ok() -> HttpResponse {
        json_response(200, json!({"forecastHours": [], "timeZone": {"id": "America/Los_Angeles"}}))
    }

    fn geocode_ok(lat: f64, lng: f64) -> HttpResponse {
        json_response(
            200,
            json!({"status": "OK", "results": [{"geometry": {"location": {"lat": lat, "lng": lng}}}]}),
        )
    }

    fn tool_with(config: ToolConfig, transport: &Arc<MockTransport>) -> WeatherTool {
        WeatherTool::new(config, transport.clone())
    }

    fn san_francisco() -> Map<String, Value> {
        args(json!({"latitude": 37.7749, "longitude": -122.4194}))
    }

    #[tokio::test]
    async fn unknown_function_makes_no_network_call() {
        let transport = Arc::new(MockTransport::respond(weather_ok()));
        let tool = tool_with(config(), &transport);

        for name in ["weekly_forecast", "", "CURRENT_CONDITIONS", "current-conditions"] {
            let err = tool.invoke(name, &san_francisco()).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::UnknownFunction, "{name}");
        }
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn missing_location_is_reported_locally() {
        let transport = Arc::new(MockTransport::respond(weather_ok()));
        let tool = tool_with(config(), &transport);

        for function in ["current_conditions", "hourly_forecast", "daily_forecast"] {
            let err = tool.invoke(function, &Map::new()).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MissingLocation);

            let err = tool
                .invoke(function, &args(json!({"longitude": 3.0})))
                .await
                .unwrap_err();
            assert_eq!(err, ToolError::MissingParameter { name: "latitude" });
        }
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn current_conditions_with_coordinates() {
        let transport = Arc::new(MockTransport::respond(weather_ok()));
        let tool = tool_with(config(), &transport);

        let result = tool.invoke("current_conditions", &san_francisco()).await.unwrap();

        assert_eq!(result.function, FunctionName::CurrentConditions);
        assert_eq!(result.payload["timeZone"]["id"], "America/Los_Angeles");
        assert_eq!(result.request.count, None);

        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].url, format!("{BASE_URL}/currentConditions:lookup"));
        assert_eq!(calls[0].query_param("key"), Some("WEATHER_KEY"));
        assert_eq!(calls[0].query_param("location.latitude"), Some("37.7749"));
        assert_eq!(calls[0].query_param("location.longitude"), Some("-122.4194"));
    }

    #[tokio::test]
    async fn coordinates_skip_geocoding() {
        let transport = Arc::new(MockTransport::routed(geocode_ok(1.0, 1.0), weather_ok()));
        let tool = tool_with(config(), &transport);

        let mut raw = san_francisco();
        raw.insert("address".into(), json!("ignored when coordinates are present"));
        tool.invoke("daily_forecast", &raw).await.unwrap();

        assert_eq!(transport.calls_to("geocode"), 0);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn hours_limit() {
        let transport = Arc::new(MockTransport::respond(weather_ok()));
        let tool = tool_with(config(), &transport);

        let mut raw = san_francisco();
        raw.insert("hours".into(), json!(49));
        let err = tool.invoke("hourly_forecast", &raw).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfRange);
        assert_eq!(transport.call_count(), 0);

        raw.insert("hours".into(), json!(48));
        let result = tool.invoke("hourly_forecast", &raw).await.unwrap();
        assert_eq!(result.request.count, Some(48));
        assert_eq!(transport.calls()[0].url, format!("{BASE_URL}/forecast/hours:lookup"));
        assert_eq!(transport.calls()[0].query_param("hours"), Some("48"));
    }

    #[tokio::test]
    async fn days_limit() {
        let transport = Arc::new(MockTransport::respond(weather_ok()));
        let tool = tool_with(config(), &transport);

        let mut raw = san_francisco();
        raw.insert("days".into(), json!(11));
        let err = tool.invoke("daily_forecast", &raw).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfRange);
        assert_eq!(transport.call_count(), 0);

        raw.insert("days".into(), json!(10));
        tool.invoke("daily_forecast", &raw).await.unwrap();
        assert_eq!(transport.calls()[0].url, format!("{BASE_URL}/forecast/days:lookup"));
        assert_eq!(transport.calls()[0].query_param("days"), Some("10"));
    }

    #[tokio::test]
    async fn forecast_counts_default() {
        let transport = Arc::new(MockTransport::respond(weather_ok()));
        let tool = tool_with(config(), &transport);

        tool.invoke("hourly_forecast", &san_francisco()).await.unwrap();
        tool.invoke("daily_forecast", &san_francisco()).await.unwrap();

        let calls = transport.calls();
        assert_eq!(calls[0].query_param("hours"), Some("24"));
        assert_eq!(calls[1].query_param("days"), Some("10"));
    }

    #[tokio::test]
    async fn address_is_geocoded_before_weather_call() {
        let transport = Arc::new(MockTransport::routed(geocode_ok(37.422, -122.084), weather_ok()));
        let tool = tool_with(config(), &transport);

        let result = tool
            .invoke(
                "current_conditions",
                &args(json!({"address": "1600 Amphitheatre Pkwy"})),
            )
            .await
            .unwrap();

        assert_eq!(result.request.resolved_address.as_deref(), Some("1600 Amphitheatre Pkwy"));
        assert_eq!(result.request.coordinates.latitude(), 37.422);

        let calls = transport.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].url.contains("geocode"));
        assert_eq!(calls[1].query_param("location.latitude"), Some("37.422"));
        assert_eq!(calls[1].query_param("location.longitude"), Some("-122.084"));
    }

    #[tokio::test]
    async fn address_with_geocoding_disabled_is_missing_location() {
        let transport = Arc::new(MockTransport::routed(geocode_ok(1.0, 1.0), weather_ok()));
        let tool = tool_with(config().with_geocoding_enabled(false), &transport);

        let err = tool
            .invoke(
                "current_conditions",
                &args(json!({"address": "1600 Amphitheatre Pkwy"})),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MissingLocation);
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn zero_geocoding_results_is_location_not_found() {
        let transport = Arc::new(MockTransport::routed(
            json_response(200, json!({"status": "ZERO_RESULTS", "results": []})),
            weather_ok(),
        ));
        let tool = tool_with(config(), &transport);

        let err = tool
            .invoke("hourly_forecast", &args(json!({"location": "Atlantis"})))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ToolError::LocationNotFound {
                query: "Atlantis".into()
            }
        );
        assert_eq!(transport.calls_to("geocode"), 1);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn rate_limit_carries_retry_hint() {
        let transport = Arc::new(MockTransport::respond(
            json_response(429, json!({"error": {"code": 429, "message": "Quota exceeded"}}))
                .with_header("Retry-After", "42"),
        ));
        let tool = tool_with(config(), &transport);

        let err = tool.invoke("current_conditions", &san_francisco()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::RateLimited);
        assert_eq!(err.retry_after(), Some(Duration::from_secs(42)));
        assert_eq!(err.status(), Some(429));
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn oversized_retry_delay_is_rate_limited_without_hint() {
        let transport = Arc::new(MockTransport::respond(json_response(
            429,
            json!({"error": {"details": [{"retryDelay": "1e20s"}]}}),
        )));
        let tool = tool_with(config(), &transport);

        let err = tool.invoke("current_conditions", &san_francisco()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::RateLimited);
        assert_eq!(err.retry_after(), None);
    }

    #[tokio::test]
    async fn upstream_failures_are_terminal() {
        let cases = [
            (HttpResponse::new(401, ""), ErrorKind::AuthenticationError),
            (HttpResponse::new(403, ""), ErrorKind::AuthenticationError),
            (HttpResponse::new(404, ""), ErrorKind::UpstreamError),
            (HttpResponse::new(500, "boom"), ErrorKind::UpstreamError),
            (HttpResponse::new(200, "not json"), ErrorKind::UpstreamError),
        ];

        for (response, kind) in cases {
            let transport = Arc::new(MockTransport::respond(response));
            let tool = tool_with(config(), &transport);

            let err = tool.invoke("current_conditions", &san_francisco()).await.unwrap_err();
            assert_eq!(err.kind(), kind);
            assert_eq!(transport.call_count(), 1, "no retries expected");
        }
    }

    #[tokio::test]
    async fn transport_timeout_is_network_error() {
        let transport = Arc::new(MockTransport::fail(TransportError::Timeout));
        let tool = tool_with(config(), &transport);

        let err = tool.invoke("current_conditions", &san_francisco()).await.unwrap_err();

        assert_eq!(err, ToolError::Network(TransportError::Timeout));
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn identical_calls_issue_identical_requests() {
        let transport = Arc::new(MockTransport::routed(geocode_ok(48.85, 2.35), weather_ok()));
        let tool = tool_with(config(), &transport);
        let raw = args(json!({"address": "Paris", "days": 5, "language": "fr"}));

        tool.invoke("daily_forecast", &raw).await.unwrap();
        tool.invoke("daily_forecast", &raw).await.unwrap();

        let calls = transport.calls();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[0], calls[2]);
        assert_eq!(calls[1], calls[3]);
    }

    #[tokio::test]
    async fn config_defaults_reach_the_request() {
        let transport = Arc::new(MockTransport::respond(weather_ok()));
        let cfg = config()
            .with_units_system(UnitsSystem::Metric)
            .with_language("pt-BR");
        let tool = tool_with(cfg, &transport);

        let result = tool.invoke("current_conditions", &san_francisco()).await.unwrap();

        let call = &transport.calls()[0];
        assert_eq!(call.query_param("unitsSystem"), Some("metric"));
        assert_eq!(call.query_param("languageCode"), Some("pt-BR"));
        assert_eq!(result.request.locale.units, UnitsSystem::Metric);
        assert_eq!(result.request.locale.language, "pt-BR");
    }

    #[tokio::test]
    async fn explicit_units_and_language_override_defaults() {
        let transport = Arc::new(MockTransport::respond(weather_ok()));
        let tool = tool_with(config(), &transport);

        let mut raw = san_francisco();
        raw.insert("unitsSystem".into(), json!("metric"));
        raw.insert("language".into(), json!("ja"));
        tool.invoke("current_conditions", &raw).await.unwrap();

        let call = &transport.calls()[0];
        assert_eq!(call.query_param("unitsSystem"), Some("metric"));
        assert_eq!(call.query_param("languageCode"), Some("ja"));
    }

    #[tokio::test]
    async fn invalid_units_fail_before_network() {
        let transport = Arc::new(MockTransport::routed(geocode_ok(1.0, 1.0), weather_ok()));
        let tool = tool_with(config(), &transport);

        let err = tool
            .invoke(
                "current_conditions",
                &args(json!({"address": "Paris", "unitsSystem": "standard"})),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidValue);
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn invoke_request_ignores_extra_arguments() {
        let transport = Arc::new(MockTransport::respond(weather_ok()));
        let tool = tool_with(config(), &transport);

        let mut raw = san_francisco();
        raw.insert("action".into(), json!("current_conditions"));
        raw.insert("verbose".into(), json!(true));
        let request = InvocationRequest::new("current_conditions", raw);

        assert!(tool.invoke_request(&request).await.is_ok());
    }

    #[tokio::test]
    async fn result_serializes_with_request_echo() {
        let transport = Arc::new(MockTransport::respond(weather_ok()));
        let tool = tool_with(config(), &transport);

        let result = tool.invoke("hourly_forecast", &san_francisco()).await.unwrap();
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["function"], "hourly_forecast");
        assert_eq!(json["request"]["count"], 24);
        assert_eq!(json["request"]["unitsSystem"], "imperial");
        assert_eq!(json["request"]["language"], "en");
        assert!(json["payload"]["forecastHours"].is_array());
        assert!(json["retrieved_at"].is_string());
        assert!(!json.to_string().contains("WEATHER_KEY"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_invocations_are_independent() {
        let transport = Arc::new(MockTransport::new(|req| {
            let lat = req.query_param("location.latitude").unwrap_or_default();
            Ok(json_response(200, json!({ "lat": lat })))
        }));
        let tool = Arc::new(tool_with(config(), &transport));

        let mut handles = Vec::new();
        for i in 0..16 {
            let tool = tool.clone();
            handles.push(tokio::spawn(async move {
                let raw = args(json!({"latitude": i, "longitude": 0}));
                tool.invoke("current_conditions", &raw).await
            }));
        }

        for (i, handle) in handles.into_iter().enumerate() {
            let result = handle.await.unwrap().unwrap();
            assert_eq!(result.payload["lat"], i.to_string());
        }
        assert_eq!(transport.call_count(), 16);
    }
}
