//! Recording transport used by the unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    request::UpstreamRequest,
    transport::{HttpResponse, HttpTransport, TransportError},
};

type Responder = dyn Fn(&UpstreamRequest) -> Result<HttpResponse, TransportError> + Send + Sync;

pub(crate) struct MockTransport {
    responder: Box<Responder>,
    calls: Mutex<Vec<UpstreamRequest>>,
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("calls", &self.call_count())
            .finish()
    }
}

impl MockTransport {
    pub(crate) fn new(
        responder: impl Fn(&UpstreamRequest) -> Result<HttpResponse, TransportError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answers every request with the same response.
    pub(crate) fn respond(response: HttpResponse) -> Self {
        Self::new(move |_| Ok(response.clone()))
    }

    /// Fails every request at the transport level.
    pub(crate) fn fail(error: TransportError) -> Self {
        Self::new(move |_| Err(error.clone()))
    }

    /// Routes geocoding calls to `geocode` and everything else to `weather`.
    pub(crate) fn routed(geocode: HttpResponse, weather: HttpResponse) -> Self {
        Self::new(move |req| {
            if req.url.contains("geocode") {
                Ok(geocode.clone())
            } else {
                Ok(weather.clone())
            }
        })
    }

    pub(crate) fn calls(&self) -> Vec<UpstreamRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub(crate) fn calls_to(&self, fragment: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|req| req.url.contains(fragment))
            .count()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn get(&self, request: &UpstreamRequest) -> Result<HttpResponse, TransportError> {
        self.calls.lock().unwrap().push(request.clone());
        (self.responder)(request)
    }
}

pub(crate) fn json_response(status: u16, body: Value) -> HttpResponse {
    HttpResponse::new(status, body.to_string()).with_header("Content-Type", "application/json")
}
