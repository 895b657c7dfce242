use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// How request bodies are serialized to JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonOptions {
    /// emit indented JSON
    pub pretty: bool,
}

impl JsonOptions {
    pub(crate) fn to_vec<T: Serialize + ?Sized>(&self, value: &T) -> serde_json::Result<Vec<u8>> {
        if self.pretty {
            serde_json::to_vec_pretty(value)
        } else {
            serde_json::to_vec(value)
        }
    }
}

/// Per-client settings. Deserializable so it can come straight out of an
/// application's configuration file.
///
/// ```
/// # use courier_core::ClientConfig;
/// let config: ClientConfig = serde_json::from_str(
///     r#"{ "base_url": "https://api.example.com", "default_headers": { "x-client": "courier" } }"#,
/// ).unwrap();
/// assert_eq!(Some("https://api.example.com"), config.base_url.as_deref());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// prefix for every path template; overrides the interface's own base URL
    pub base_url: Option<String>,
    /// headers added to every request, after header properties
    pub default_headers: IndexMap<String, String>,
    pub json: JsonOptions,
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }

    pub fn json(mut self, json: JsonOptions) -> Self {
        self.json = json;
        self
    }
}
