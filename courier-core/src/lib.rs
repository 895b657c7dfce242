//! Runtime of the courier REST client.
//!
//! Two pieces do the work: [RequestBuilder], an immutable chain of deferred
//! steps that resolves into a [RequestDescriptor], and [ServiceProxy], which
//! turns calls on an interface described by [InterfaceMetadata] into builder
//! chains, sends them through a [Transport] and decodes the answers.

mod builder;
mod cancel;
mod config;
mod descriptor;
mod error;
mod form;
mod invoke;
mod metadata;
mod observer;
mod param;
mod pipeline;
mod proxy;
mod response;
mod transport;
mod url;

#[cfg(test)]
mod testing;

pub use builder::{BodyStep, RequestBuilder, Step};
pub use cancel::{Cancellation, Cancelled};
pub use config::{ClientConfig, JsonOptions};
pub use descriptor::{
    Body, DEFAULT_FILE_NAME, Headers, JSON_CONTENT_TYPE, Multipart, Part, PartContent,
    RequestDescriptor, StreamOpener, TEXT_CONTENT_TYPE,
};
pub use error::{ApiError, Error, HttpError, Result};
pub use form::{FORM_CONTENT_TYPE, FormEncoder};
pub use metadata::{
    InterfaceMetadata, MetadataBuilder, MethodBuilder, MethodId, MethodMeta, ParamMeta,
    ParamSpec, PropertyMeta, Role, cached_for, method_identity,
};
pub use observer::{LogObserver, Observer};
pub use param::{Argument, ParamValue};
pub use proxy::{Binding, Interface, ProxyRegistry, ServiceProxy};
pub use response::{
    ApiResponse, FromApiResponse, ResponseBody, ResponseDescriptor, ResponseMeta, decode,
    decode_initializing, read_response,
};
pub use transport::{Transport, TransportError};
pub use url::{Escaped, escape_component, escape_path_value, join_url};
