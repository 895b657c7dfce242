use std::fmt::Display;

use http::StatusCode;
use thiserror::Error;

use crate::transport::TransportError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can go wrong while describing, sending or decoding a request.
#[derive(Debug, Error)]
pub enum Error {
    /// Misuse of the request builder, e.g. setting the body twice.
    #[error("{0}")]
    Argument(String),

    /// Malformed or incomplete interface metadata.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A header that was added with validation turned on is not well-formed.
    #[error("invalid header '{name}': {reason}")]
    HeaderValidation { name: String, reason: String },

    /// Non-success response whose body is not a JSON error payload.
    #[error(transparent)]
    Http(HttpError),

    /// Non-success response carrying a parsed JSON error payload.
    #[error(transparent)]
    Api(ApiError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to decode response body: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("failed to serialize value: {0}")]
    Serialize(String),

    #[error("request was cancelled")]
    Cancelled,
}

impl Error {
    /// Both [Error::Http] and [Error::Api] are HTTP errors; an API error
    /// is an HTTP error with parsed details attached.
    pub fn as_http(&self) -> Option<&HttpError> {
        match self {
            Error::Http(e) => Some(e),
            Error::Api(e) => Some(&e.http),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.as_http().map(|e| e.status)
    }

    pub(crate) fn header(name: &str, reason: impl Display) -> Self {
        Error::HeaderValidation {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// A request ended with a non-success status code.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Status: {status}, Error = {message}\nUrl: {path}")]
pub struct HttpError {
    /// the URL of the request that failed
    pub path: String,
    pub status: StatusCode,
    /// raw response body, decoded lossily as UTF-8
    pub message: String,
}

/// An [HttpError] whose body was a JSON document; the parsed
/// document is available verbatim as `details`.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{http}\n{}", pretty(.details))]
pub struct ApiError {
    pub http: HttpError,
    pub details: serde_json::Value,
}

impl ApiError {
    pub fn path(&self) -> &str {
        &self.http.path
    }

    pub fn status(&self) -> StatusCode {
        self.http.status
    }

    pub fn message(&self) -> &str {
        &self.http.message
    }
}

fn pretty(details: &serde_json::Value) -> String {
    serde_json::to_string_pretty(details).unwrap_or_else(|_| details.to_string())
}
