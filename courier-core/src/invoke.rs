//! The single data-driven routine every generated interface method funnels
//! into: look up the method, build the request from its arguments, send it
//! and decode the answer.

use bytes::Bytes;
use log::debug;
use serde::de::DeserializeOwned;

use crate::{
    builder::RequestBuilder,
    cancel::Cancellation,
    descriptor::RequestDescriptor,
    error::{Error, Result},
    metadata::Role,
    observer::notify,
    param::Argument,
    proxy::ServiceProxy,
    response::{self, FromApiResponse, ResponseMeta},
    transport::{self, Transport},
    url::join_url,
};

impl<T> ServiceProxy<T> {
    /// Turns a call of method `id` with `args` (in declaration order) into a
    /// request builder, including property and configured default headers.
    pub fn prepare(&self, id: &str, args: &[Argument]) -> Result<RequestBuilder> {
        let metadata = self.metadata();
        let method = metadata.method(id).ok_or_else(|| {
            Error::Configuration(format!("{} has no method '{id}'", metadata.name()))
        })?;
        if args.len() != method.params.len() {
            return Err(Error::Argument(format!(
                "'{id}' takes {} arguments, got {}",
                method.params.len(),
                args.len()
            )));
        }

        let base_url = self.config().base_url.as_deref().or(metadata.base_url());
        let url = join_url(base_url, &method.path_template);
        let mut builder = RequestBuilder::request(method.verb.clone(), url);

        for (param, arg) in method.params.iter().zip(args) {
            builder = match param.role {
                Role::Path => builder.path(&param.name, arg),
                Role::Query => builder.query(&param.name, arg),
                Role::Header => builder.header(&param.name, arg),
                Role::Body if arg.is_absent() => builder,
                Role::Body => builder.body_with(arg.value(), &self.config().json),
            };
        }
        for (header, value) in self.property_headers() {
            builder = builder.header(&header, value);
        }
        for (name, value) in &self.config().default_headers {
            builder = builder.header(name, value);
        }
        Ok(builder)
    }

    /// Builds the request of a call without sending it.
    pub fn request(&self, id: &str, args: &[Argument]) -> Result<RequestDescriptor> {
        self.prepare(id, args)?.build()
    }

    /// Sends a call through an explicit transport and reads the whole
    /// response. Non-success statuses become [Error::Http] or [Error::Api].
    /// Both the call token and the proxy's own token cancel the exchange,
    /// including reading the body.
    pub async fn invoke_via<X: Transport>(
        &self,
        transport: &X,
        id: &str,
        args: &[Argument],
        cancel: Option<&Cancellation>,
    ) -> Result<(ResponseMeta, Bytes)> {
        let request = self.request(id, args)?;
        debug!("invoking {id} as {} {}", request.method, request.url);
        notify(self.observers(), |o| o.on_request(&request));

        let proxy_cancel = self.cancellation();
        let call_cancel = cancel.unwrap_or(proxy_cancel);
        let url = request.url.clone();
        let exchange = async {
            let response = transport::dispatch(transport, request, call_cancel).await?;
            notify(self.observers(), |o| {
                o.on_response(&url, response.status, &response.headers)
            });
            transport::until_cancelled(response::read_response(response, &url), call_cancel)
                .await
        };
        match cancel {
            Some(_) => transport::until_cancelled(exchange, proxy_cancel).await,
            None => exchange.await,
        }
    }
}

impl<T: Transport> ServiceProxy<T> {
    fn bound_transport(&self) -> Result<&T> {
        self.transport().ok_or_else(|| {
            Error::Configuration(format!(
                "{} is not bound to a transport",
                self.metadata().name()
            ))
        })
    }

    /// Like [ServiceProxy::invoke_via], using the bound transport.
    pub async fn invoke_raw(
        &self,
        id: &str,
        args: &[Argument],
        cancel: Option<&Cancellation>,
    ) -> Result<(ResponseMeta, Bytes)> {
        let transport = self.bound_transport()?;
        self.invoke_via(transport, id, args, cancel).await
    }

    /// Invokes method `id` and JSON-decodes the response body into `R`.
    /// Empty bodies decode like `null`.
    pub async fn invoke<R: DeserializeOwned>(
        &self,
        id: &str,
        args: &[Argument],
        cancel: Option<&Cancellation>,
    ) -> Result<R> {
        let (_, body) = self.invoke_raw(id, args, cancel).await?;
        response::decode(&body)
    }

    /// Invokes method `id` for a return type that wants to see the response
    /// status and headers, such as [crate::ApiResponse].
    pub async fn invoke_initializing<R: FromApiResponse>(
        &self,
        id: &str,
        args: &[Argument],
        cancel: Option<&Cancellation>,
    ) -> Result<R> {
        let (meta, body) = self.invoke_raw(id, args, cancel).await?;
        response::decode_initializing(meta, &body)
    }
}
