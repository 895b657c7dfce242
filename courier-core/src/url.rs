//! Escaping rules for query, form and path values, and the small amount of
//! URL surgery needed by `Host`/`Scheme` steps.
//!
//! URLs handled here may still contain `{name}` placeholders, so they are never
//! run through a full URI parser; only the scheme and authority parts are
//! validated, using the `http` crate's `uri` types.

use std::{borrow::Cow, fmt::Display, str::FromStr};

use http::uri::{Authority, Scheme};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

use crate::error::{Error, Result};

/// RFC 3986 "unreserved" characters stay as they are, everything else is escaped
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Escapes a query or form component. The input is percent-decoded first so
/// that values which are already escaped are not escaped a second time;
/// spaces come out as `+`.
pub fn escape_component(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    let decoded = percent_decode_str(value).decode_utf8_lossy();
    encode_plus(&decoded)
}

/// Escapes a value substituted into a path template, spaces as `+`.
pub fn escape_path_value(value: &str) -> String {
    encode_plus(value)
}

fn encode_plus(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT)
        .to_string()
        .replace("%20", "+")
}

/// A value that renders in escaped form when displayed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Escaped(pub String);

impl Escaped {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn raw(&self) -> &str {
        &self.0
    }
}

impl Display for Escaped {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&escape_component(&self.0))
    }
}

impl From<&str> for Escaped {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Escaped {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<f64> for Escaped {
    fn from(value: f64) -> Self {
        Self(value.to_string())
    }
}

impl From<f32> for Escaped {
    fn from(value: f32) -> Self {
        Self(value.to_string())
    }
}

/** The three parts of a URL we care about when rewriting scheme or host */
#[derive(Debug, PartialEq)]
struct UrlParts<'a> {
    scheme: Option<&'a str>,
    authority: Option<&'a str>,
    rest: &'a str,
}

fn split_url(url: &str) -> UrlParts<'_> {
    let (scheme, after_scheme) = match url.find("://") {
        Some(idx)
            if idx > 0
                && url[..idx]
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) =>
        {
            (Some(&url[..idx]), Some(&url[idx + 3..]))
        }
        _ => (None, url.strip_prefix("//")),
    };

    match after_scheme {
        Some(s) => {
            let end = s.find(['/', '?', '#']).unwrap_or(s.len());
            UrlParts {
                scheme,
                authority: Some(&s[..end]),
                rest: &s[end..],
            }
        }
        None => UrlParts {
            scheme: None,
            authority: None,
            rest: url,
        },
    }
}

fn join_parts(scheme: &str, authority: &str, rest: &str) -> String {
    let separator = if rest.is_empty() || rest.starts_with(['/', '?', '#']) {
        ""
    } else {
        "/"
    };
    format!("{scheme}://{authority}{separator}{rest}")
}

/// Replaces the host (and optionally the port) of `url`, keeping path and
/// query. A port already present is kept when `port` is `None`. Relative
/// URLs become absolute `http` URLs.
pub(crate) fn with_host(url: &str, host: &str, port: Option<u16>) -> Result<String> {
    let parts = split_url(url);
    let existing_port = parts
        .authority
        .and_then(|a| Authority::from_str(a).ok())
        .and_then(|a| a.port_u16());

    let authority = match port.or(existing_port) {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    Authority::from_str(&authority)
        .map_err(|e| Error::Argument(format!("invalid host '{authority}': {e}")))?;

    let scheme = parts.scheme.unwrap_or("http");
    Ok(join_parts(scheme, &authority, parts.rest))
}

/// Replaces the scheme of an absolute `url`.
pub(crate) fn with_scheme(url: &str, scheme: &str) -> Result<String> {
    Scheme::from_str(scheme)
        .map_err(|e| Error::Argument(format!("invalid scheme '{scheme}': {e}")))?;

    let parts = split_url(url);
    let authority = parts.authority.ok_or_else(|| {
        Error::Argument(format!("cannot set scheme '{scheme}' on relative url '{url}'"))
    })?;
    Ok(join_parts(scheme, authority, parts.rest))
}

/// Joins a base URL and a path template with exactly one `/` in between.
pub fn join_url<'a>(base: Option<&str>, path: &'a str) -> Cow<'a, str> {
    match base {
        Some(base) if !base.is_empty() => Cow::Owned(format!(
            "{}/{}",
            base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )),
        _ => Cow::Borrowed(path),
    }
}
