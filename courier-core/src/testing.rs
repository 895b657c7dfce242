//! In-memory transport for unit tests.

use std::{collections::VecDeque, sync::Arc};

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use parking_lot::Mutex;

use crate::{
    cancel::Cancellation,
    descriptor::RequestDescriptor,
    response::{ResponseBody, ResponseDescriptor},
    transport::{Transport, TransportError},
};

#[derive(Default)]
struct Recorded {
    requests: Vec<RequestDescriptor>,
    responses: VecDeque<(StatusCode, HeaderMap, Bytes)>,
}

/// Records every request and answers with queued responses, or `200` with an
/// empty body once the queue is drained. A hanging transport never answers;
/// a stalling one answers `200` with a body that never delivers a chunk.
#[derive(Clone, Default)]
pub(crate) struct RecordingTransport {
    state: Arc<Mutex<Recorded>>,
    hang: bool,
    stall: bool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::default()
        }
    }

    pub fn stalling() -> Self {
        Self {
            stall: true,
            ..Self::default()
        }
    }

    pub fn respond(&self, status: StatusCode, headers: HeaderMap, body: &str) {
        self.state.lock().responses.push_back((
            status,
            headers,
            Bytes::copy_from_slice(body.as_bytes()),
        ));
    }

    pub fn requests(&self) -> Vec<RequestDescriptor> {
        self.state.lock().requests.clone()
    }
}

impl Transport for RecordingTransport {
    async fn send(
        &self,
        request: RequestDescriptor,
        _cancel: &Cancellation,
    ) -> Result<ResponseDescriptor, TransportError> {
        let next = {
            let mut state = self.state.lock();
            state.requests.push(request);
            state.responses.pop_front()
        };
        if self.hang {
            futures::future::pending::<()>().await;
        }
        if self.stall {
            let body = ResponseBody::from_stream(futures::stream::pending());
            return Ok(ResponseDescriptor::new(StatusCode::OK, HeaderMap::new(), body));
        }
        let (status, headers, body) =
            next.unwrap_or((StatusCode::OK, HeaderMap::new(), Bytes::new()));
        Ok(ResponseDescriptor::new(status, headers, body))
    }
}
