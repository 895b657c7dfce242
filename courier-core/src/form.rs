use std::sync::OnceLock;

use bytes::Bytes;

use crate::url::escape_component;

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Accumulates `application/x-www-form-urlencoded` pairs in call order.
///
/// The encoded bytes are rendered on first access and memoized on this
/// instance; adding another pair drops the memoized rendering.
#[derive(Debug, Clone, Default)]
pub struct FormEncoder {
    pairs: Vec<(String, String)>,
    rendered: OnceLock<Bytes>,
}

impl FormEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one pair. The name is always escaped, the value only when
    /// `encode` is set. Duplicate names are kept.
    pub fn add(&mut self, name: &str, value: &str, encode: bool) {
        let value = if encode {
            escape_component(value)
        } else {
            value.to_string()
        };
        self.pairs.push((escape_component(name), value));
        self.rendered = OnceLock::new();
    }

    /// the already escaped pairs
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn is_rendered(&self) -> bool {
        self.rendered.get().is_some()
    }

    pub fn bytes(&self) -> &Bytes {
        self.rendered.get_or_init(|| self.render())
    }

    /// Length of the encoded content in bytes.
    pub fn content_length(&self) -> usize {
        self.bytes().len()
    }

    fn render(&self) -> Bytes {
        let encoded = self
            .pairs
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        Bytes::from(encoded)
    }
}
