//! The seam to whatever actually talks to the network.

use std::{future::Future, pin::pin, sync::Arc};

use bytes::Bytes;
use futures::future::{Either, select};
use log::debug;
use thiserror::Error;

use crate::{
    cancel::Cancellation,
    descriptor::RequestDescriptor,
    error::{Error, Result},
    response::{self, ResponseDescriptor, ResponseMeta},
};

/// Sends a fully built request and hands back the response. Pooling, TLS,
/// retries and timeouts are the implementor's business.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        request: RequestDescriptor,
        cancel: &Cancellation,
    ) -> impl Future<Output = std::result::Result<ResponseDescriptor, TransportError>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn send(
        &self,
        request: RequestDescriptor,
        cancel: &Cancellation,
    ) -> impl Future<Output = std::result::Result<ResponseDescriptor, TransportError>> + Send {
        (**self).send(request, cancel)
    }
}

impl<T: Transport> Transport for &T {
    fn send(
        &self,
        request: RequestDescriptor,
        cancel: &Cancellation,
    ) -> impl Future<Output = std::result::Result<ResponseDescriptor, TransportError>> + Send {
        (**self).send(request, cancel)
    }
}

#[derive(Debug, Error)]
#[error("{message}")]
pub struct TransportError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn from_source<E>(source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let source = source.into();
        Self {
            message: source.to_string(),
            source: Some(source),
        }
    }
}

/// Drives `work` until it finishes or `cancel` fires. A cancelled call drops
/// `work` together with whatever it holds, such as a half-read body stream.
pub(crate) async fn until_cancelled<F, R>(work: F, cancel: &Cancellation) -> Result<R>
where
    F: Future<Output = Result<R>>,
{
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    let work = pin!(work);
    let cancelled = pin!(cancel.cancelled());
    match select(work, cancelled).await {
        Either::Left((result, _)) => result,
        Either::Right(((), _)) => {
            debug!("call cancelled");
            Err(Error::Cancelled)
        }
    }
}

/// Sends `request`, racing the transport against `cancel`.
pub(crate) async fn dispatch<T: Transport>(
    transport: &T,
    request: RequestDescriptor,
    cancel: &Cancellation,
) -> Result<ResponseDescriptor> {
    debug!("sending {} {}", request.method, request.url);
    let send = async { transport.send(request, cancel).await.map_err(Error::from) };
    until_cancelled(send, cancel).await
}

/// Sends `request` and reads the whole response, both under `cancel`.
pub(crate) async fn exchange<T: Transport>(
    transport: &T,
    request: RequestDescriptor,
    cancel: &Cancellation,
) -> Result<(ResponseMeta, Bytes)> {
    let url = request.url.clone();
    let response = dispatch(transport, request, cancel).await?;
    until_cancelled(response::read_response(response, &url), cancel).await
}
