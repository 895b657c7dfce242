use futures::TryStreamExt;
use http::{HeaderValue, header::CONTENT_TYPE};

use courier_core::{
    Cancellation, RequestDescriptor, ResponseBody, ResponseDescriptor, Transport, TransportError,
};

/// [Transport] backed by a `reqwest` client. The response body is streamed.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: RequestDescriptor,
        _cancel: &Cancellation,
    ) -> Result<ResponseDescriptor, TransportError> {
        let mut headers = request
            .headers
            .to_header_map()
            .map_err(TransportError::from_source)?;
        if let Some(content_type) = request.body.content_type() {
            if !headers.contains_key(CONTENT_TYPE) {
                let value =
                    HeaderValue::from_str(&content_type).map_err(TransportError::from_source)?;
                headers.insert(CONTENT_TYPE, value);
            }
        }
        let body = request
            .body
            .to_bytes()
            .map_err(TransportError::from_source)?;

        let response = self
            .client
            .request(request.method, &request.url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(TransportError::from_source)?;

        let status = response.status();
        let headers = response.headers().clone();
        let stream = response.bytes_stream().map_err(TransportError::from_source);
        Ok(ResponseDescriptor::new(
            status,
            headers,
            ResponseBody::from_stream(stream),
        ))
    }
}
