//! The concrete request produced at the end of a [crate::RequestBuilder]
//! pipeline.

use std::{fmt::Debug, io::Read, sync::Arc};

use bytes::{BufMut, Bytes, BytesMut};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use indexmap::IndexMap;

use crate::{
    error::{Error, Result},
    form::{FORM_CONTENT_TYPE, FormEncoder},
};

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";
pub const DEFAULT_FILE_NAME: &str = "file.dat";

/// Ordered header multi-map. Names compare case-insensitively and are stored
/// lowercased; values are kept in insertion order and are not validated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: IndexMap<String, Vec<String>>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        self.entries
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into());
    }

    /// Replaces all values of `name`.
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.entries
            .insert(name.to_ascii_lowercase(), vec![value.into()]);
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        self.entries.shift_remove(&name.to_ascii_lowercase())
    }

    /// first value of `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).first().map(String::as_str)
    }

    pub fn get_all(&self, name: &str) -> &[String] {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    /// number of distinct header names
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .flat_map(|(k, vs)| vs.iter().map(move |v| (k.as_str(), v.as_str())))
    }

    /// Converts into an `http` header map, which requires every name and
    /// value to be well-formed.
    pub fn to_header_map(&self) -> Result<HeaderMap> {
        let mut map = HeaderMap::with_capacity(self.entries.len());
        for (name, value) in self.iter() {
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| Error::header(name, e))?;
            let header_value = HeaderValue::from_str(value).map_err(|e| Error::header(name, e))?;
            map.append(header_name, header_value);
        }
        Ok(map)
    }
}

/// Opens a fresh reader for a streamed multipart file every time the body
/// is rendered.
pub type StreamOpener = dyn Fn() -> std::io::Result<Box<dyn Read + Send>> + Send + Sync;

#[derive(Clone)]
pub enum PartContent {
    Text(String),
    Bytes(Bytes),
    Stream(Arc<StreamOpener>),
}

impl PartContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn bytes(bytes: impl Into<Bytes>) -> Self {
        Self::Bytes(bytes.into())
    }

    pub fn stream<F, R>(open: F) -> Self
    where
        F: Fn() -> std::io::Result<R> + Send + Sync + 'static,
        R: Read + Send + 'static,
    {
        Self::Stream(Arc::new(move || {
            open().map(|r| Box::new(r) as Box<dyn Read + Send>)
        }))
    }

    fn read(&self) -> Result<Bytes> {
        match self {
            PartContent::Text(t) => Ok(Bytes::copy_from_slice(t.as_bytes())),
            PartContent::Bytes(b) => Ok(b.clone()),
            PartContent::Stream(open) => {
                let mut buf = Vec::new();
                open()
                    .and_then(|mut r| r.read_to_end(&mut buf))
                    .map_err(|e| Error::Argument(format!("failed to read multipart stream: {e}")))?;
                Ok(Bytes::from(buf))
            }
        }
    }
}

impl Debug for PartContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(t) => f.debug_tuple("Text").field(t).finish(),
            Self::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            Self::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// One named part of a multipart body.
#[derive(Debug, Clone)]
pub struct Part {
    pub name: String,
    pub content: PartContent,
    pub file_name: Option<String>,
    /// applies to this part only
    pub content_type: Option<String>,
}

impl Part {
    fn effective_content_type(&self) -> Option<&str> {
        match (&self.content_type, &self.content) {
            (Some(ct), _) => Some(ct),
            (None, PartContent::Text(_)) => Some(TEXT_CONTENT_TYPE),
            (None, _) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Multipart {
    boundary: String,
    parts: Vec<Part>,
}

impl Default for Multipart {
    fn default() -> Self {
        Self::new()
    }
}

impl Multipart {
    pub fn new() -> Self {
        Self {
            boundary: uuid::Uuid::new_v4().simple().to_string(),
            parts: Vec::new(),
        }
    }

    pub fn add(&mut self, part: Part) {
        self.parts.push(part);
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary=\"{}\"", self.boundary)
    }

    /// Renders the `multipart/form-data` body, reading stream parts.
    pub fn render(&self) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        for part in &self.parts {
            buf.put_slice(format!("--{}\r\n", self.boundary).as_bytes());
            let mut disposition = format!(
                "Content-Disposition: form-data; name=\"{}\"",
                quote_field(&part.name)
            );
            if let Some(file_name) = &part.file_name {
                disposition.push_str(&format!("; filename=\"{}\"", quote_field(file_name)));
            }
            buf.put_slice(disposition.as_bytes());
            buf.put_slice(b"\r\n");
            if let Some(ct) = part.effective_content_type() {
                buf.put_slice(format!("Content-Type: {ct}\r\n").as_bytes());
            }
            buf.put_slice(b"\r\n");
            buf.put_slice(&part.content.read()?);
            buf.put_slice(b"\r\n");
        }
        buf.put_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        Ok(buf.freeze())
    }
}

/// Makes a part name or file name safe inside a quoted header parameter.
fn quote_field(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

#[derive(Debug, Clone, Default)]
pub enum Body {
    #[default]
    Empty,
    Raw {
        bytes: Bytes,
        content_type: String,
    },
    Form(FormEncoder),
    Multipart(Multipart),
}

impl Body {
    pub fn is_empty(&self) -> bool {
        matches!(self, Body::Empty)
    }

    pub fn content_type(&self) -> Option<String> {
        match self {
            Body::Empty => None,
            Body::Raw { content_type, .. } => Some(content_type.clone()),
            Body::Form(_) => Some(FORM_CONTENT_TYPE.to_string()),
            Body::Multipart(m) => Some(m.content_type()),
        }
    }

    /// The encoded body as sent over the wire.
    pub fn to_bytes(&self) -> Result<Bytes> {
        match self {
            Body::Empty => Ok(Bytes::new()),
            Body::Raw { bytes, .. } => Ok(bytes.clone()),
            Body::Form(form) => Ok(form.bytes().clone()),
            Body::Multipart(m) => m.render(),
        }
    }
}

/// A fully described HTTP request.
///
/// `url` may still contain `{name}` tokens while the pipeline runs; tokens
/// that no step resolved are left as they are.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    pub url: String,
    pub headers: Headers,
    pub body: Body,
}

impl RequestDescriptor {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Headers::new(),
            body: Body::Empty,
        }
    }

    /// Sets a single-valued body, which is only allowed once.
    pub fn set_body(&mut self, body: Body) -> Result<()> {
        if !self.body.is_empty() {
            return Err(Error::Argument("Body is already set".to_string()));
        }
        self.body = body;
        Ok(())
    }

    /// Switches the body to a form encoder unless it already is one.
    pub fn form_mut(&mut self) -> Result<&mut FormEncoder> {
        if self.body.is_empty() {
            self.body = Body::Form(FormEncoder::new());
        }
        match &mut self.body {
            Body::Form(form) => Ok(form),
            _ => Err(Error::Argument("Body is already set".to_string())),
        }
    }

    /// Switches the body to a multipart container unless it already is one.
    pub fn multipart_mut(&mut self) -> Result<&mut Multipart> {
        if self.body.is_empty() {
            self.body = Body::Multipart(Multipart::new());
        }
        match &mut self.body {
            Body::Multipart(m) => Ok(m),
            _ => Err(Error::Argument("Body is already set".to_string())),
        }
    }
}
