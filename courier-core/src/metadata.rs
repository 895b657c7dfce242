//! Per-interface tables describing how each method maps onto an HTTP request.
//!
//! Metadata is registered through [InterfaceMetadata::builder], validated
//! once, and then shared read-only. [cached_for] keeps one instance per
//! interface type for the lifetime of the process.

use std::{
    any::TypeId,
    borrow::Borrow,
    collections::HashMap,
    fmt::Display,
    sync::Arc,
};

use http::{HeaderName, Method};
use indexmap::IndexMap;
use lazy_static::lazy_static;
use log::{debug, warn};
use parking_lot::RwLock;
use regex::Regex;

use crate::error::{Error, Result};

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r"\{([^{}/?]+)\}").unwrap();
    static ref SCALAR: Regex = Regex::new(
        r"^(&('[a-z_]+)?)?(Option<(&('[a-z_]+)?)?)?(i8|i16|i32|i64|i128|isize|u8|u16|u32|u64|u128|usize|f32|f64|bool|char|str|String)>?$"
    )
    .unwrap();
    static ref CACHE: RwLock<HashMap<TypeId, Arc<InterfaceMetadata>>> =
        RwLock::new(HashMap::new());
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Body,
    Query,
    Path,
    Header,
}

/// Identifies a method by name and parameter types, e.g. `update(i64,Product)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId(String);

impl MethodId {
    pub fn new(name: &str, param_types: &[&str]) -> Self {
        Self(method_identity(name, param_types))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for MethodId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Display for MethodId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Renders a method identity. Whitespace in type names is dropped so that
/// `Option < i32 >` and `Option<i32>` name the same type.
pub fn method_identity(name: &str, param_types: &[&str]) -> String {
    let types = param_types
        .iter()
        .map(|t| t.split_whitespace().collect::<String>())
        .collect::<Vec<_>>()
        .join(",");
    format!("{name}({types})")
}

fn is_scalar(type_name: &str) -> bool {
    let compact: String = type_name.split_whitespace().collect();
    SCALAR.is_match(&compact)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamMeta {
    /// the name used on the wire: query key, placeholder or header name
    pub name: String,
    pub type_name: String,
    /// zero-based position among the method's request parameters
    pub ordinal: usize,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodMeta {
    pub id: MethodId,
    pub name: String,
    pub verb: Method,
    pub path_template: String,
    pub params: Vec<ParamMeta>,
    /// declared return type, informational only
    pub returns: Option<String>,
}

impl MethodMeta {
    pub fn body_param(&self) -> Option<&ParamMeta> {
        self.params.iter().find(|p| p.role == Role::Body)
    }
}

/// A client-level default sent as header `header` on every request, taken
/// from the proxy's backing slot for `name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyMeta {
    pub name: String,
    pub header: String,
}

#[derive(Debug, Clone)]
pub struct InterfaceMetadata {
    name: String,
    base_url: Option<String>,
    methods: IndexMap<MethodId, MethodMeta>,
    properties: IndexMap<String, PropertyMeta>,
}

impl InterfaceMetadata {
    pub fn builder(name: impl Into<String>) -> MetadataBuilder {
        MetadataBuilder {
            name: name.into(),
            base_url: None,
            methods: Vec::new(),
            properties: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn method(&self, id: &str) -> Option<&MethodMeta> {
        self.methods.get(id)
    }

    pub fn methods(&self) -> impl Iterator<Item = &MethodMeta> {
        self.methods.values()
    }

    pub fn property(&self, name: &str) -> Option<&PropertyMeta> {
        self.properties.get(name)
    }

    pub fn properties(&self) -> impl Iterator<Item = &PropertyMeta> {
        self.properties.values()
    }
}

/// Describes one parameter before validation.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    name: String,
    type_name: String,
    roles: Vec<Role>,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            roles: Vec::new(),
        }
    }

    /// Annotates the parameter. A parameter may carry at most one role;
    /// adding a second one fails when the metadata is built.
    pub fn role(mut self, role: Role) -> Self {
        self.roles.push(role);
        self
    }
}

#[derive(Debug, Clone)]
pub struct MethodBuilder {
    name: String,
    routes: Vec<(Method, String)>,
    params: Vec<ParamSpec>,
    returns: Option<String>,
}

impl MethodBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            routes: Vec::new(),
            params: Vec::new(),
            returns: None,
        }
    }

    pub fn route(mut self, verb: Method, path_template: impl Into<String>) -> Self {
        self.routes.push((verb, path_template.into()));
        self
    }

    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    pub fn returns(mut self, type_name: impl Into<String>) -> Self {
        self.returns = Some(type_name.into());
        self
    }

    fn build(self) -> Result<MethodMeta> {
        let type_names: Vec<&str> = self.params.iter().map(|p| p.type_name.as_str()).collect();
        let id = MethodId::new(&self.name, &type_names);

        let mut routes = self.routes.into_iter();
        let (verb, path_template) = routes.next().ok_or_else(|| {
            Error::Configuration(format!("method '{id}' has no HTTP verb and path"))
        })?;
        if routes.next().is_some() {
            return Err(Error::Configuration(format!(
                "method '{id}' declares more than one HTTP verb"
            )));
        }

        let mut params = Vec::with_capacity(self.params.len());
        for (ordinal, spec) in self.params.into_iter().enumerate() {
            let role = match spec.roles.as_slice() {
                [] if is_scalar(&spec.type_name) => Role::Query,
                [] => {
                    return Err(Error::Configuration(format!(
                        "parameter '{}' of '{id}' has type {} and needs a role",
                        spec.name, spec.type_name
                    )));
                }
                [role] => *role,
                _ => {
                    return Err(Error::Configuration(format!(
                        "parameter '{}' of '{id}' has more than one role",
                        spec.name
                    )));
                }
            };
            if role == Role::Header {
                HeaderName::from_bytes(spec.name.as_bytes()).map_err(|e| {
                    Error::Configuration(format!(
                        "parameter '{}' of '{id}' is not a valid header name: {e}",
                        spec.name
                    ))
                })?;
            }
            params.push(ParamMeta {
                name: spec.name,
                type_name: spec.type_name,
                ordinal,
                role,
            });
        }

        if params.iter().filter(|p| p.role == Role::Body).count() > 1 {
            return Err(Error::Configuration(format!(
                "method '{id}' has more than one body parameter"
            )));
        }

        for placeholder in PLACEHOLDER.captures_iter(&path_template) {
            let name = &placeholder[1];
            if !params.iter().any(|p| p.role == Role::Path && p.name == name) {
                warn!("'{{{name}}}' in path of '{id}' has no path parameter and is sent verbatim");
            }
        }
        for p in params.iter().filter(|p| p.role == Role::Path) {
            if !path_template.contains(&format!("{{{}}}", p.name)) {
                warn!("path parameter '{}' of '{id}' has no placeholder", p.name);
            }
        }

        Ok(MethodMeta {
            id,
            name: self.name,
            verb,
            path_template,
            params,
            returns: self.returns,
        })
    }
}

#[derive(Debug, Clone)]
pub struct MetadataBuilder {
    name: String,
    base_url: Option<String>,
    methods: Vec<MethodBuilder>,
    properties: Vec<PropertyMeta>,
}

impl MetadataBuilder {
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn method(mut self, method: MethodBuilder) -> Self {
        self.methods.push(method);
        self
    }

    /// Registers a header-backed property.
    pub fn property(mut self, name: impl Into<String>, header: impl Into<String>) -> Self {
        self.properties.push(PropertyMeta {
            name: name.into(),
            header: header.into(),
        });
        self
    }

    pub fn build(self) -> Result<InterfaceMetadata> {
        let mut methods = IndexMap::with_capacity(self.methods.len());
        for method in self.methods {
            let meta = method.build()?;
            if methods.contains_key(&meta.id) {
                return Err(Error::Configuration(format!(
                    "method '{}' is declared twice in {}",
                    meta.id, self.name
                )));
            }
            methods.insert(meta.id.clone(), meta);
        }

        let mut properties = IndexMap::with_capacity(self.properties.len());
        for property in self.properties {
            HeaderName::from_bytes(property.header.as_bytes()).map_err(|e| {
                Error::Configuration(format!(
                    "property '{}' uses invalid header name '{}': {e}",
                    property.name, property.header
                ))
            })?;
            if properties.contains_key(&property.name) {
                return Err(Error::Configuration(format!(
                    "property '{}' is declared twice in {}",
                    property.name, self.name
                )));
            }
            properties.insert(property.name.clone(), property);
        }

        debug!(
            "built metadata for {} with {} methods and {} properties",
            self.name,
            methods.len(),
            properties.len()
        );
        Ok(InterfaceMetadata {
            name: self.name,
            base_url: self.base_url,
            methods,
            properties,
        })
    }
}

/// Returns the metadata registered for `K`, building it with `describe` on
/// first use. Concurrent first calls may both run `describe`, but all callers
/// observe the same cached instance.
pub fn cached_for<K: 'static>(
    describe: impl FnOnce() -> Result<InterfaceMetadata>,
) -> Result<Arc<InterfaceMetadata>> {
    let key = TypeId::of::<K>();
    if let Some(meta) = CACHE.read().get(&key) {
        return Ok(meta.clone());
    }
    let meta = Arc::new(describe()?);
    Ok(CACHE.write().entry(key).or_insert(meta).clone())
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn products() -> MetadataBuilder {
        InterfaceMetadata::builder("Products")
            .base_url("http://localhost")
            .method(
                MethodBuilder::new("get")
                    .route(Method::GET, "/products/{id}")
                    .param(ParamSpec::new("id", "i64").role(Role::Path)),
            )
            .method(
                MethodBuilder::new("update")
                    .route(Method::PUT, "/products/{id}")
                    .param(ParamSpec::new("id", "i64").role(Role::Path))
                    .param(ParamSpec::new("product", "Product").role(Role::Body))
                    .returns("Product"),
            )
            .property("authorize", "Authorize")
    }

    #[test]
    fn lookup_by_identity() -> anyhow::Result<()> {
        let meta = products().build()?;
        assert_eq!("Products", meta.name());
        assert_eq!(Some("http://localhost"), meta.base_url());

        let update = meta.method("update(i64,Product)").unwrap();
        assert_eq!(Method::PUT, update.verb);
        assert_eq!("product", update.body_param().unwrap().name);
        assert_eq!(1, update.params[1].ordinal);
        assert!(meta.method("update").is_none());
        assert_eq!("Authorize", meta.property("authorize").unwrap().header);
        assert_eq!(2, meta.methods().count());
        Ok(())
    }

    #[test]
    fn identity_ignores_whitespace() {
        assert_eq!("find(Option<i32>,&str)", method_identity("find", &["Option < i32 >", "& str"]));
        assert_eq!("list()", MethodId::new("list", &[]).as_str());
    }

    #[test]
    fn overloads_are_distinct() -> anyhow::Result<()> {
        let meta = InterfaceMetadata::builder("Search")
            .method(
                MethodBuilder::new("find")
                    .route(Method::GET, "/find")
                    .param(ParamSpec::new("q", "String")),
            )
            .method(
                MethodBuilder::new("find")
                    .route(Method::GET, "/find")
                    .param(ParamSpec::new("q", "String"))
                    .param(ParamSpec::new("limit", "u32")),
            )
            .build()?;
        assert!(meta.method("find(String)").is_some());
        assert!(meta.method("find(String,u32)").is_some());
        Ok(())
    }

    #[test]
    fn unannotated_scalars_are_query_parameters() -> anyhow::Result<()> {
        let meta = InterfaceMetadata::builder("Search")
            .method(
                MethodBuilder::new("find")
                    .route(Method::GET, "/find")
                    .param(ParamSpec::new("q", "&str"))
                    .param(ParamSpec::new("page", "Option<u32>"))
                    .param(ParamSpec::new("exact", "bool")),
            )
            .build()?;
        let find = meta.method("find(&str,Option<u32>,bool)").unwrap();
        assert!(find.params.iter().all(|p| p.role == Role::Query));
        Ok(())
    }

    #[test]
    fn configuration_errors() {
        let no_route = InterfaceMetadata::builder("A")
            .method(MethodBuilder::new("m"))
            .build();
        assert!(matches!(no_route, Err(Error::Configuration(_))));

        let two_routes = InterfaceMetadata::builder("A")
            .method(
                MethodBuilder::new("m")
                    .route(Method::GET, "/a")
                    .route(Method::POST, "/a"),
            )
            .build();
        assert!(matches!(two_routes, Err(Error::Configuration(_))));

        let two_roles = InterfaceMetadata::builder("A")
            .method(
                MethodBuilder::new("m")
                    .route(Method::GET, "/a")
                    .param(ParamSpec::new("x", "i32").role(Role::Query).role(Role::Path)),
            )
            .build();
        assert!(matches!(two_roles, Err(Error::Configuration(_))));

        let complex = InterfaceMetadata::builder("A")
            .method(
                MethodBuilder::new("m")
                    .route(Method::POST, "/a")
                    .param(ParamSpec::new("x", "Product")),
            )
            .build();
        assert!(matches!(complex, Err(Error::Configuration(_))));

        let two_bodies = InterfaceMetadata::builder("A")
            .method(
                MethodBuilder::new("m")
                    .route(Method::POST, "/a")
                    .param(ParamSpec::new("x", "A").role(Role::Body))
                    .param(ParamSpec::new("y", "B").role(Role::Body)),
            )
            .build();
        assert!(matches!(two_bodies, Err(Error::Configuration(_))));

        let twice = InterfaceMetadata::builder("A")
            .method(MethodBuilder::new("m").route(Method::GET, "/a"))
            .method(MethodBuilder::new("m").route(Method::GET, "/b"))
            .build();
        assert!(matches!(twice, Err(Error::Configuration(_))));

        let bad_header = InterfaceMetadata::builder("A")
            .property("auth", "bad header")
            .build();
        assert!(matches!(bad_header, Err(Error::Configuration(_))));

        let bad_header_param = InterfaceMetadata::builder("A")
            .method(
                MethodBuilder::new("m")
                    .route(Method::GET, "/a")
                    .param(ParamSpec::new("x y", "String").role(Role::Header)),
            )
            .build();
        assert!(matches!(bad_header_param, Err(Error::Configuration(_))));
    }

    #[test]
    fn unresolved_placeholders_are_allowed() -> anyhow::Result<()> {
        let meta = InterfaceMetadata::builder("A")
            .method(MethodBuilder::new("m").route(Method::GET, "/a/{missing}"))
            .build()?;
        assert_eq!("/a/{missing}", meta.method("m()").unwrap().path_template);
        Ok(())
    }

    #[test]
    fn cache_builds_once_per_type() -> anyhow::Result<()> {
        struct Marker;
        let first = cached_for::<Marker>(|| products().build())?;
        let second = cached_for::<Marker>(|| panic!("metadata must come from the cache"))?;
        assert!(Arc::ptr_eq(&first, &second));
        Ok(())
    }

    #[test]
    fn failed_builds_are_not_cached() {
        struct Marker;
        let failed = cached_for::<Marker>(|| {
            InterfaceMetadata::builder("A")
                .method(MethodBuilder::new("m"))
                .build()
        });
        assert!(failed.is_err());
        assert!(cached_for::<Marker>(|| products().build()).is_ok());
    }
}
