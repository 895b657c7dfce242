use std::{collections::VecDeque, sync::Arc};

use bytes::Bytes;
use courier::{
    Cancellation, RequestDescriptor, ResponseDescriptor, Transport, TransportError,
    http::{HeaderMap, HeaderValue, StatusCode, header::CONTENT_TYPE},
};
use log::debug;
use parking_lot::Mutex;

#[derive(Default)]
struct State {
    requests: Vec<RequestDescriptor>,
    responses: VecDeque<(StatusCode, HeaderMap, Bytes)>,
}

/// Transport that keeps every request and answers from a queue of canned
/// responses. An empty queue answers `200` with an empty body.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    state: Arc<Mutex<State>>,
    hang: bool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// a transport whose requests never complete
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::default()
        }
    }

    pub fn respond(&self, status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) {
        self.state
            .lock()
            .responses
            .push_back((status, headers, body.into()));
    }

    pub fn respond_json(&self, status: StatusCode, body: serde_json::Value) {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.respond(status, headers, body.to_string());
    }

    pub fn requests(&self) -> Vec<RequestDescriptor> {
        self.state.lock().requests.clone()
    }

    pub fn last_request(&self) -> Option<RequestDescriptor> {
        self.state.lock().requests.last().cloned()
    }
}

impl Transport for MemoryTransport {
    async fn send(
        &self,
        request: RequestDescriptor,
        _cancel: &Cancellation,
    ) -> Result<ResponseDescriptor, TransportError> {
        debug!("memory transport got {} {}", request.method, request.url);
        let next = {
            let mut state = self.state.lock();
            state.requests.push(request);
            state.responses.pop_front()
        };
        if self.hang {
            std::future::pending::<()>().await;
        }
        let (status, headers, body) =
            next.unwrap_or((StatusCode::OK, HeaderMap::new(), Bytes::new()));
        Ok(ResponseDescriptor::new(status, headers, body))
    }
}
