//! Immutable, branchable construction of [RequestDescriptor]s.
//!
//! Every builder method returns a new builder with one more [Step]; nothing
//! is evaluated until [RequestBuilder::build], which folds the steps in the
//! order they were appended. Builders are cheap to clone and can be shared
//! between threads.
//!
//! ```
//! use courier_core::RequestBuilder;
//!
//! let products = RequestBuilder::get("https://shop.example.com/products/{id}");
//! let request = products
//!     .path("id", 42)
//!     .query("expand", "reviews")
//!     .header("accept", "application/json")
//!     .build()
//!     .unwrap();
//! assert_eq!("https://shop.example.com/products/42?expand=reviews", request.url);
//! // the original builder is untouched
//! assert!(products.build().unwrap().url.ends_with("{id}"));
//! ```

use bytes::Bytes;
use http::{HeaderName, HeaderValue, Method};
use log::trace;
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    cancel::Cancellation,
    config::JsonOptions,
    descriptor::{
        Body, DEFAULT_FILE_NAME, JSON_CONTENT_TYPE, Part, PartContent, RequestDescriptor,
        TEXT_CONTENT_TYPE,
    },
    error::{Error, Result},
    param::ParamValue,
    pipeline::{self, Pipeline},
    response::{self, FromApiResponse, ResponseDescriptor},
    transport::{self, Transport},
    url::{self, escape_component, escape_path_value},
};

/// The body a [Step::Body] sets. JSON serialization happens when the step is
/// appended; a failure is kept and reported by `build`.
#[derive(Debug, Clone)]
pub enum BodyStep {
    Json(std::result::Result<Bytes, String>),
    Raw { bytes: Bytes, content_type: String },
}

/// A single deferred change to a request.
#[derive(Debug, Clone)]
pub enum Step {
    Start { method: Method, url: String },
    Method(Method),
    Query { name: String, value: String, encode: bool },
    Path { name: String, value: Option<String>, encode: bool },
    Header { name: String, value: String, validate: bool },
    Body(BodyStep),
    Form { name: String, value: String, encode: bool },
    Multipart(Part),
    Host { host: String, port: Option<u16> },
    Scheme(String),
}

impl pipeline::Step<RequestDescriptor> for Step {
    fn apply(&self, input: Option<RequestDescriptor>) -> Result<RequestDescriptor> {
        trace!("applying {self:?}");
        let mut request = match (self, input) {
            (Step::Start { method, url }, _) => {
                return Ok(RequestDescriptor::new(method.clone(), url.clone()));
            }
            (_, Some(request)) => request,
            (_, None) => {
                return Err(Error::Argument(
                    "request pipeline does not start with a method and url".to_string(),
                ));
            }
        };

        match self {
            Step::Start { .. } => {}
            Step::Method(method) => request.method = method.clone(),
            Step::Query {
                name,
                value,
                encode,
            } => {
                let value = if *encode {
                    escape_component(value)
                } else {
                    value.clone()
                };
                let separator = if request.url.contains('?') { '&' } else { '?' };
                request.url = format!(
                    "{}{separator}{}={value}",
                    request.url,
                    escape_component(name)
                );
            }
            Step::Path {
                name,
                value,
                encode,
            } => {
                let value = match value.as_deref() {
                    Some(v) if *encode && !v.is_empty() => escape_path_value(v),
                    Some(v) => v.to_string(),
                    None => String::new(),
                };
                request.url = request.url.replace(&format!("{{{name}}}"), &value);
            }
            Step::Header {
                name,
                value,
                validate,
            } => {
                if *validate {
                    HeaderName::from_bytes(name.as_bytes()).map_err(|e| Error::header(name, e))?;
                    HeaderValue::from_str(value).map_err(|e| Error::header(name, e))?;
                }
                request.headers.append(name, value.clone());
            }
            Step::Body(BodyStep::Json(json)) => {
                let bytes = json.clone().map_err(Error::Serialize)?;
                request.set_body(Body::Raw {
                    bytes,
                    content_type: JSON_CONTENT_TYPE.to_string(),
                })?;
            }
            Step::Body(BodyStep::Raw {
                bytes,
                content_type,
            }) => request.set_body(Body::Raw {
                bytes: bytes.clone(),
                content_type: content_type.clone(),
            })?,
            Step::Form {
                name,
                value,
                encode,
            } => request.form_mut()?.add(name, value, *encode),
            Step::Multipart(part) => request.multipart_mut()?.add(part.clone()),
            Step::Host { host, port } => request.url = url::with_host(&request.url, host, *port)?,
            Step::Scheme(scheme) => request.url = url::with_scheme(&request.url, scheme)?,
        }
        Ok(request)
    }
}

#[derive(Debug, Clone)]
pub struct RequestBuilder {
    steps: Pipeline<Step>,
}

impl RequestBuilder {
    pub fn request(method: Method, url: impl Into<String>) -> Self {
        Self {
            steps: Pipeline::new().append(Step::Start {
                method,
                url: url.into(),
            }),
        }
    }

    /// Same as [RequestBuilder::get].
    pub fn new(url: impl Into<String>) -> Self {
        Self::get(url)
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::request(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::request(Method::POST, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::request(Method::PUT, url)
    }

    pub fn patch(url: impl Into<String>) -> Self {
        Self::request(Method::PATCH, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::request(Method::DELETE, url)
    }

    fn append(&self, step: Step) -> Self {
        Self {
            steps: self.steps.append(step),
        }
    }

    /// the steps of this builder, oldest first
    pub fn steps(&self) -> Vec<&Step> {
        self.steps.steps()
    }

    /// Changes the verb of the request.
    pub fn with_method(&self, method: Method) -> Self {
        self.append(Step::Method(method))
    }

    /// Appends `name=value` to the URL. Absent values add nothing.
    pub fn query(&self, name: &str, value: impl ParamValue) -> Self {
        match value.to_param() {
            Some(v) => self.query_raw(name, &v, value.needs_escaping()),
            None => self.clone(),
        }
    }

    pub fn query_raw(&self, name: &str, value: &str, encode: bool) -> Self {
        self.append(Step::Query {
            name: name.to_string(),
            value: value.to_string(),
            encode,
        })
    }

    /// Replaces the literal `{name}` token in the URL with `value`, or with
    /// nothing if the value is absent. The value is inserted as is.
    pub fn path(&self, name: &str, value: impl ParamValue) -> Self {
        self.append(Step::Path {
            name: name.to_string(),
            value: value.to_param(),
            encode: false,
        })
    }

    /// Like [RequestBuilder::path], but percent-encodes the value with
    /// spaces as `+`.
    pub fn path_encoded(&self, name: &str, value: impl ParamValue) -> Self {
        self.append(Step::Path {
            name: name.to_string(),
            value: value.to_param(),
            encode: true,
        })
    }

    /// Appends a header without checking that it is well-formed.
    pub fn header(&self, name: &str, value: impl ParamValue) -> Self {
        match value.to_param() {
            Some(v) => self.append(Step::Header {
                name: name.to_string(),
                value: v,
                validate: false,
            }),
            None => self.clone(),
        }
    }

    /// Appends a header; `build` fails with [Error::HeaderValidation] if the
    /// name or value is malformed.
    pub fn header_validated(&self, name: &str, value: &str) -> Self {
        self.append(Step::Header {
            name: name.to_string(),
            value: value.to_string(),
            validate: true,
        })
    }

    /// Sets a JSON body. Setting a body twice makes `build` fail.
    pub fn body<T: Serialize + ?Sized>(&self, value: &T) -> Self {
        self.body_with(value, &JsonOptions::default())
    }

    pub fn body_with<T: Serialize + ?Sized>(&self, value: &T, options: &JsonOptions) -> Self {
        let json = options
            .to_vec(value)
            .map(Bytes::from)
            .map_err(|e| e.to_string());
        self.append(Step::Body(BodyStep::Json(json)))
    }

    /// Sets a `text/plain` body.
    pub fn text(&self, text: impl Into<String>) -> Self {
        self.bytes(text.into(), TEXT_CONTENT_TYPE)
    }

    pub fn bytes(&self, bytes: impl Into<Bytes>, content_type: &str) -> Self {
        self.append(Step::Body(BodyStep::Raw {
            bytes: bytes.into(),
            content_type: content_type.to_string(),
        }))
    }

    /// Adds a form field; repeated names are all kept. Absent values add
    /// nothing.
    pub fn form(&self, name: &str, value: impl ParamValue) -> Self {
        match value.to_param() {
            Some(v) => self.form_raw(name, &v, value.needs_escaping()),
            None => self.clone(),
        }
    }

    pub fn form_raw(&self, name: &str, value: &str, encode: bool) -> Self {
        self.append(Step::Form {
            name: name.to_string(),
            value: value.to_string(),
            encode,
        })
    }

    /// Adds a text part to a multipart body.
    pub fn multipart(&self, name: &str, value: impl Into<String>) -> Self {
        self.append(Step::Multipart(Part {
            name: name.to_string(),
            content: PartContent::Text(value.into()),
            file_name: None,
            content_type: None,
        }))
    }

    /// Adds a file part to a multipart body. The file name defaults to
    /// `file.dat`; `content_type` applies to this part only.
    pub fn multipart_file(
        &self,
        name: &str,
        content: PartContent,
        file_name: Option<&str>,
        content_type: Option<&str>,
    ) -> Self {
        self.append(Step::Multipart(Part {
            name: name.to_string(),
            content,
            file_name: Some(file_name.unwrap_or(DEFAULT_FILE_NAME).to_string()),
            content_type: content_type.map(str::to_string),
        }))
    }

    pub fn host(&self, host: &str, port: Option<u16>) -> Self {
        self.append(Step::Host {
            host: host.to_string(),
            port,
        })
    }

    pub fn scheme(&self, scheme: &str) -> Self {
        self.append(Step::Scheme(scheme.to_string()))
    }

    /// Runs all steps and returns the resulting request. The builder is not
    /// consumed; every call starts from scratch.
    pub fn build(&self) -> Result<RequestDescriptor> {
        let request: RequestDescriptor = self.steps.fold()?;
        if let Body::Form(form) = &request.body {
            // render now so the produced request carries its final encoding
            form.bytes();
        }
        Ok(request)
    }

    /// Builds the request and sends it.
    pub async fn send<T: Transport>(
        &self,
        transport: &T,
        cancel: &Cancellation,
    ) -> Result<ResponseDescriptor> {
        let request = self.build()?;
        transport::dispatch(transport, request, cancel).await
    }

    /// Builds and sends the request, then decodes a successful JSON response.
    /// Non-success responses become [Error::Http] or [Error::Api]. `cancel`
    /// covers reading the body as well.
    pub async fn fetch<R: DeserializeOwned, T: Transport>(
        &self,
        transport: &T,
        cancel: &Cancellation,
    ) -> Result<R> {
        let (_, body) = transport::exchange(transport, self.build()?, cancel).await?;
        response::decode(&body)
    }

    /// Like [RequestBuilder::fetch] for results that want the status and
    /// headers too, such as [crate::ApiResponse].
    pub async fn fetch_initializing<R: FromApiResponse, T: Transport>(
        &self,
        transport: &T,
        cancel: &Cancellation,
    ) -> Result<R> {
        let (meta, body) = transport::exchange(transport, self.build()?, cancel).await?;
        response::decode_initializing(meta, &body)
    }
}

#[cfg(test)]
mod tests {
    use http::{HeaderMap, StatusCode};
    use serde::Serialize;
    use test_log::test;

    use super::*;
    use crate::testing::RecordingTransport;

    fn body_text(request: &RequestDescriptor) -> String {
        String::from_utf8(request.body.to_bytes().unwrap().to_vec()).unwrap()
    }

    #[test]
    fn header() {
        let post = RequestBuilder::post("/");
        assert!(post.header("a", "b").build().unwrap().headers.contains("a"));
        assert!(!post.build().unwrap().headers.contains("a"));

        let request = post.header("a", "b").build().unwrap();
        assert_eq!(Some("b"), request.headers.get("a"));
    }

    #[test]
    fn query() {
        let post = RequestBuilder::post("/");
        let r = post.query("a", "b").build().unwrap();
        assert!(r.url.contains("/?a=b"));
        assert!(!post.build().unwrap().url.contains("/?a=b"));
    }

    #[test]
    fn later_query_parameters_use_ampersand() {
        let r = RequestBuilder::get("/search")
            .query("q", "red shoes")
            .query("page", 2)
            .query("strict", true)
            .query("min", 1.5)
            .query("skip", None::<i32>)
            .build()
            .unwrap();
        assert_eq!("/search?q=red+shoes&page=2&strict=true&min=1.5", r.url);
    }

    #[test]
    fn raw_query_values_are_not_escaped() {
        let r = RequestBuilder::get("/")
            .query_raw("filter", "a%2Cb", false)
            .query_raw("a b", "c d", true)
            .build()
            .unwrap();
        assert_eq!("/?filter=a%2Cb&a+b=c+d", r.url);
    }

    #[test]
    fn path() {
        let post = RequestBuilder::post("/{a}");
        assert!(post.path("a", "b").build().unwrap().url.contains("/b"));
        assert!(!post.build().unwrap().url.contains("/b"));
        assert!(post.build().unwrap().url.contains("{a}"));
    }

    #[test]
    fn path_edge_cases() {
        let b = RequestBuilder::get("/{a}/{b}/{a}");
        assert_eq!(
            "/x/{b}/x",
            b.path("a", "x").path("missing", "y").build().unwrap().url
        );
        assert_eq!("//{b}/", b.path("a", None::<&str>).build().unwrap().url);
        assert_eq!(
            "/a+b%2Fc/{b}/a+b%2Fc",
            b.path_encoded("a", "a b/c").build().unwrap().url
        );
    }

    #[test]
    fn steps_apply_in_append_order() {
        // the query value contains the placeholder text; resolving the path
        // first leaves the query untouched
        let r = RequestBuilder::get("/{a}")
            .path("a", "x")
            .query_raw("q", "{a}", false)
            .build()
            .unwrap();
        assert_eq!("/x?q={a}", r.url);

        let r = RequestBuilder::get("/{a}")
            .query_raw("q", "{a}", false)
            .path("a", "x")
            .build()
            .unwrap();
        assert_eq!("/x?q=x", r.url);
    }

    #[test]
    fn body() {
        let post = RequestBuilder::post("/a");
        let request = post.body("body").build().unwrap();
        assert_eq!("\"body\"", body_text(&request));
        assert_eq!(Some(JSON_CONTENT_TYPE.to_string()), request.body.content_type());
        assert!(post.build().unwrap().body.is_empty());
    }

    #[test]
    fn body_twice_fails() {
        let err = RequestBuilder::post("/a")
            .body("one")
            .body("two")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Argument(ref m) if m == "Body is already set"));

        let err = RequestBuilder::post("/a")
            .text("one")
            .form("a", "b")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Argument(_)));
    }

    #[test]
    fn body_serialization_failure_is_reported_by_build() {
        struct Broken;
        impl Serialize for Broken {
            fn serialize<S: serde::Serializer>(&self, _: S) -> std::result::Result<S::Ok, S::Error> {
                Err(serde::ser::Error::custom("broken"))
            }
        }
        let err = RequestBuilder::post("/").body(&Broken).build().unwrap_err();
        assert!(matches!(err, Error::Serialize(_)));
    }

    #[test]
    fn form() {
        let post = RequestBuilder::post("/a");
        let request = post.form("a", "b").form("a", "b").build().unwrap();
        match &request.body {
            Body::Form(form) => assert!(form.is_rendered()),
            other => panic!("form body expected, found {other:?}"),
        }
        assert_eq!("a=b&a=b", body_text(&request));
        assert!(post.build().unwrap().body.is_empty());
    }

    #[test]
    fn typed_form_values() {
        let request = RequestBuilder::post("/a")
            .form("n", 10)
            .form("ok", false)
            .form("x", 0.25)
            .form("note", "a&b")
            .build()
            .unwrap();
        assert_eq!("n=10&ok=false&x=0.25&note=a%26b", body_text(&request));
    }

    #[test]
    fn multipart_parts_accumulate() {
        let request = RequestBuilder::post("/upload")
            .multipart("title", "cat")
            .multipart_file(
                "image",
                PartContent::bytes(vec![1u8, 2, 3]),
                None,
                Some("image/png"),
            )
            .build()
            .unwrap();
        let Body::Multipart(m) = &request.body else {
            panic!("multipart body expected, found {:?}", request.body);
        };
        assert_eq!(2, m.parts().len());
        assert_eq!(Some("file.dat"), m.parts()[1].file_name.as_deref());
        assert_eq!(Some("image/png"), m.parts()[1].content_type.as_deref());
        assert!(m.parts()[0].file_name.is_none());
    }

    #[test]
    fn validated_headers() {
        let ok = RequestBuilder::get("/").header_validated("x-ok", "fine").build();
        assert!(ok.is_ok());

        let err = RequestBuilder::get("/")
            .header_validated("x-bad", "a\r\nb")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::HeaderValidation { ref name, .. } if name == "x-bad"));

        // the unvalidated variant accepts anything
        let r = RequestBuilder::get("/").header("x-bad", "a\r\nb").build().unwrap();
        assert_eq!(Some("a\r\nb"), r.headers.get("x-bad"));
    }

    #[test]
    fn host_and_scheme() {
        let r = RequestBuilder::get("http://example.com/a/{id}")
            .host("internal", Some(8080))
            .scheme("https")
            .path("id", 1)
            .build()
            .unwrap();
        assert_eq!("https://internal:8080/a/1", r.url);
    }

    #[test]
    fn method_rewrite() {
        let b = RequestBuilder::new("/a");
        assert_eq!(Method::GET, b.build().unwrap().method);
        assert_eq!(Method::PATCH, b.with_method(Method::PATCH).build().unwrap().method);
    }

    #[test]
    fn building_twice_is_idempotent() {
        let b = RequestBuilder::put("/p/{id}")
            .path("id", 3)
            .query("v", "x")
            .header("h", "1")
            .body(&serde_json::json!({"k": "v"}));
        let first = b.build().unwrap();
        let second = b.build().unwrap();
        assert_eq!(first.method, second.method);
        assert_eq!(first.url, second.url);
        assert_eq!(first.headers, second.headers);
        assert_eq!(first.body.to_bytes().unwrap(), second.body.to_bytes().unwrap());
    }

    #[test]
    fn extending_after_build_leaves_original_alone() {
        let b = RequestBuilder::post("/");
        let _ = b.build().unwrap();
        let extended = b.header("a", "b");
        assert!(extended.build().unwrap().headers.contains("a"));
        assert!(!b.build().unwrap().headers.contains("a"));
        assert_eq!(1, b.steps().len());
        assert_eq!(2, extended.steps().len());
    }

    #[test]
    fn builders_are_shareable_between_threads() {
        let b = RequestBuilder::get("/{x}").path("x", "y");
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let b = b.clone();
                std::thread::spawn(move || b.build().unwrap().url)
            })
            .collect();
        for h in handles {
            assert_eq!("/y", h.join().unwrap());
        }
    }

    #[test(tokio::test)]
    async fn fetch_decodes_json() {
        let transport = RecordingTransport::new();
        transport.respond(StatusCode::OK, HeaderMap::new(), "[1,2,3]");
        let values: Vec<i32> = RequestBuilder::get("http://h/numbers")
            .fetch(&transport, &Cancellation::new())
            .await
            .unwrap();
        assert_eq!(vec![1, 2, 3], values);
        assert_eq!("http://h/numbers", transport.requests()[0].url);
    }

    #[test(tokio::test)]
    async fn send_returns_raw_response() {
        let transport = RecordingTransport::new();
        transport.respond(StatusCode::NO_CONTENT, HeaderMap::new(), "");
        let response = RequestBuilder::delete("/a/1")
            .send(&transport, &Cancellation::new())
            .await
            .unwrap();
        assert_eq!(StatusCode::NO_CONTENT, response.status);
        assert_eq!(Method::DELETE, transport.requests()[0].method);
    }

    #[test(tokio::test)]
    async fn fetch_initializing_sees_status_and_headers() {
        let transport = RecordingTransport::new();
        let mut headers = HeaderMap::new();
        headers.insert("location", http::HeaderValue::from_static("/numbers/4"));
        transport.respond(StatusCode::CREATED, headers, "[4]");
        let response: crate::ApiResponse<Vec<i32>> = RequestBuilder::post("http://h/numbers")
            .body(&4)
            .fetch_initializing(&transport, &Cancellation::new())
            .await
            .unwrap();
        assert_eq!(StatusCode::CREATED, response.status());
        assert_eq!(Some("/numbers/4"), response.header("location"));
        assert_eq!(Some(&vec![4]), response.model());
    }

    #[test(tokio::test)]
    async fn fetch_cancelled_while_reading_body() {
        let cancel = Cancellation::new();
        let remote = cancel.clone();
        let transport = RecordingTransport::stalling();
        let builder = RequestBuilder::get("http://h/numbers");
        let fetch = builder.fetch::<Vec<i32>, _>(&transport, &cancel);
        let canceller = async move {
            tokio::task::yield_now().await;
            remote.cancel();
        };
        let (result, ()) = futures::future::join(fetch, canceller).await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
