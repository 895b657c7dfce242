//! Response side of an exchange: the descriptor handed back by a
//! [crate::Transport], and the rules for turning it into a value or an error.

use std::fmt::Debug;

use bytes::Bytes;
use futures::{Stream, StreamExt, stream::BoxStream};
use http::{HeaderMap, StatusCode, header::CONTENT_TYPE};
use log::debug;
use serde::de::DeserializeOwned;

use crate::{
    error::{ApiError, Error, HttpError, Result},
    transport::TransportError,
};

enum BodyInner {
    Full(Bytes),
    Stream(BoxStream<'static, std::result::Result<Bytes, TransportError>>),
}

/// A response body that can be read exactly once.
pub struct ResponseBody {
    inner: BodyInner,
}

impl ResponseBody {
    pub fn empty() -> Self {
        Self::from(Bytes::new())
    }

    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = std::result::Result<Bytes, TransportError>> + Send + 'static,
    {
        Self {
            inner: BodyInner::Stream(stream.boxed()),
        }
    }

    /// Reads the whole body.
    pub async fn bytes(self) -> std::result::Result<Bytes, TransportError> {
        match self.inner {
            BodyInner::Full(b) => Ok(b),
            BodyInner::Stream(mut s) => {
                let mut buf = Vec::new();
                while let Some(chunk) = s.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                Ok(Bytes::from(buf))
            }
        }
    }

    pub async fn text(self) -> std::result::Result<String, TransportError> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl Debug for ResponseBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            BodyInner::Full(b) => write!(f, "ResponseBody({} bytes)", b.len()),
            BodyInner::Stream(_) => f.write_str("ResponseBody(stream)"),
        }
    }
}

impl From<Bytes> for ResponseBody {
    fn from(value: Bytes) -> Self {
        Self {
            inner: BodyInner::Full(value),
        }
    }
}

impl From<Vec<u8>> for ResponseBody {
    fn from(value: Vec<u8>) -> Self {
        Self::from(Bytes::from(value))
    }
}

impl From<String> for ResponseBody {
    fn from(value: String) -> Self {
        Self::from(Bytes::from(value))
    }
}

impl From<&'static str> for ResponseBody {
    fn from(value: &'static str) -> Self {
        Self::from(Bytes::from_static(value.as_bytes()))
    }
}

#[derive(Debug)]
pub struct ResponseDescriptor {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ResponseBody,
}

impl ResponseDescriptor {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<ResponseBody>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }
}

/// Status line and headers of a successful response, without the body.
#[derive(Debug, Clone)]
pub struct ResponseMeta {
    pub url: String,
    pub status: StatusCode,
    pub headers: HeaderMap,
}

/// Return types that want to see the response metadata next to the decoded
/// body. The pipeline creates a default instance, decodes [Self::Model]
/// from the body and hands both to [Self::initialize].
pub trait FromApiResponse: Default {
    type Model: DeserializeOwned;

    fn initialize(&mut self, meta: ResponseMeta, model: Self::Model);
}

/// A decoded model together with the status and headers it came with.
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    status: StatusCode,
    headers: HeaderMap,
    model: Option<T>,
}

impl<T> Default for ApiResponse<T> {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            model: None,
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// `None` when the body was empty or JSON `null`
    pub fn model(&self) -> Option<&T> {
        self.model.as_ref()
    }

    pub fn into_model(self) -> Option<T> {
        self.model
    }
}

impl<T: DeserializeOwned> FromApiResponse for ApiResponse<T> {
    type Model = Option<T>;

    fn initialize(&mut self, meta: ResponseMeta, model: Self::Model) {
        self.status = meta.status;
        self.headers = meta.headers;
        self.model = model;
    }
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            let media_type = v.split(';').next().unwrap_or_default().trim();
            media_type.eq_ignore_ascii_case("application/json")
                || media_type.to_ascii_lowercase().ends_with("+json")
        })
        .unwrap_or(false)
}

fn status_error(url: &str, status: StatusCode, headers: &HeaderMap, body: &[u8]) -> Error {
    let http = HttpError {
        path: url.to_string(),
        status,
        message: String::from_utf8_lossy(body).into_owned(),
    };
    if is_json(headers) {
        if let Ok(details) = serde_json::from_slice(body) {
            return Error::Api(ApiError { http, details });
        }
    }
    Error::Http(http)
}

/// Consumes the whole response body, then maps non-success statuses to
/// [Error::Http] or [Error::Api].
pub async fn read_response(
    response: ResponseDescriptor,
    url: &str,
) -> Result<(ResponseMeta, Bytes)> {
    let ResponseDescriptor {
        status,
        headers,
        body,
    } = response;
    let bytes = body.bytes().await?;
    debug!("{url} answered {status} with {} bytes", bytes.len());

    if !status.is_success() {
        return Err(status_error(url, status, &headers, &bytes));
    }
    let meta = ResponseMeta {
        url: url.to_string(),
        status,
        headers,
    };
    Ok((meta, bytes))
}

/// JSON-decodes a body; an empty body decodes like `null`.
pub fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    let body = if body.iter().all(u8::is_ascii_whitespace) {
        &b"null"[..]
    } else {
        body
    };
    serde_json::from_slice(body).map_err(Error::Decode)
}

pub fn decode_initializing<T: FromApiResponse>(meta: ResponseMeta, body: &[u8]) -> Result<T> {
    let mut value = T::default();
    let model = decode::<T::Model>(body)?;
    value.initialize(meta, model);
    Ok(value)
}

#[cfg(test)]
mod tests {
    use futures::stream;
    use http::HeaderValue;
    use serde_json::json;
    use test_log::test;

    use super::*;

    fn json_headers() -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json; charset=utf-8"),
        );
        h
    }

    #[test(tokio::test)]
    async fn streamed_body_is_collected() {
        let chunks: Vec<Result<Bytes, TransportError>> =
            vec![Ok(Bytes::from_static(b"ab")), Ok(Bytes::from_static(b"cd"))];
        let body = ResponseBody::from_stream(stream::iter(chunks));
        assert_eq!("abcd", body.text().await.unwrap());
    }

    #[test(tokio::test)]
    async fn json_error_payload_becomes_api_error() {
        let response = ResponseDescriptor::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            json_headers(),
            r#"{"field":"name"}"#,
        );
        let err = read_response(response, "http://h/x").await.unwrap_err();
        match err {
            Error::Api(api) => {
                assert_eq!(json!({"field": "name"}), api.details);
                assert_eq!(StatusCode::UNPROCESSABLE_ENTITY, api.status());
                assert_eq!("http://h/x", api.path());
            }
            other => panic!("api error expected, found {other:?}"),
        }
    }

    #[test(tokio::test)]
    async fn unparseable_json_error_is_http_error() {
        let response =
            ResponseDescriptor::new(StatusCode::BAD_GATEWAY, json_headers(), "<html>oops</html>");
        let err = read_response(response, "/x").await.unwrap_err();
        assert!(matches!(err, Error::Http(HttpError { ref message, .. }) if message == "<html>oops</html>"));
    }

    #[test(tokio::test)]
    async fn plain_text_error_is_http_error() {
        let response = ResponseDescriptor::new(StatusCode::NOT_FOUND, HeaderMap::new(), "{}");
        let err = read_response(response, "/x").await.unwrap_err();
        assert!(matches!(err, Error::Http(_)));
    }

    #[test(tokio::test)]
    async fn stream_failure_surfaces_as_transport_error() {
        let chunks: Vec<Result<Bytes, TransportError>> = vec![
            Ok(Bytes::from_static(b"ab")),
            Err(TransportError::new("connection reset")),
        ];
        let response = ResponseDescriptor::new(
            StatusCode::OK,
            HeaderMap::new(),
            ResponseBody::from_stream(stream::iter(chunks)),
        );
        let err = read_response(response, "/x").await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[test]
    fn empty_body_decodes_as_null() {
        decode::<()>(b"").unwrap();
        assert_eq!(None, decode::<Option<i32>>(b" ").unwrap());
        assert_eq!(7, decode::<i32>(b"7").unwrap());
        assert!(matches!(decode::<i32>(b"x"), Err(Error::Decode(_))));
    }

    #[test]
    fn api_response_is_initialized_with_meta() {
        let meta = ResponseMeta {
            url: "/x".to_string(),
            status: StatusCode::CREATED,
            headers: json_headers(),
        };
        let r: ApiResponse<Vec<i32>> = decode_initializing(meta, b"[1,2]").unwrap();
        assert_eq!(StatusCode::CREATED, r.status());
        assert_eq!(Some(&vec![1, 2]), r.model());
        assert!(r.header("content-type").is_some());
    }
}
