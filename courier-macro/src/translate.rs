use http::Method;
use proc_macro2::Ident;
use quote::ToTokens;
use syn::Type;

// Array of strict keywords (currently in use)
const STRICT_KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum", "extern",
    "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub",
    "ref", "return", "self", "Self", "static", "struct", "super", "trait", "true", "type",
    "unsafe", "use", "where", "while",
];

// Array of reserved keywords (for future use)
const RESERVED_KEYWORDS: &[&str] = &[
    "abstract", "become", "box", "do", "final", "gen", "macro", "override", "priv", "typeof",
    "unsized", "virtual", "yield",
];

fn is_keyword(s: &str) -> bool {
    STRICT_KEYWORDS
        .iter()
        .chain(RESERVED_KEYWORDS.iter())
        .any(|e| (*e).eq(s))
}

/// Name of the adapter struct generated for a trait, e.g. `ProductsClient`
pub(crate) fn client_type_name(trait_name: &str) -> String {
    format!("{trait_name}Client")
}

/// Maps a method attribute like `get` to its HTTP verb.
pub(crate) fn verb_of(attribute: &str) -> Option<Method> {
    match attribute {
        "get" => Some(Method::GET),
        "post" => Some(Method::POST),
        "put" => Some(Method::PUT),
        "patch" => Some(Method::PATCH),
        "delete" => Some(Method::DELETE),
        "head" => Some(Method::HEAD),
        "options" => Some(Method::OPTIONS),
        _ => None,
    }
}

/// Turns a Rust parameter name back into the name used on the wire. Raw
/// identifiers lose their `r#`, and keywords escaped with a trailing
/// underscore (`type_`) lose the underscore.
pub(crate) fn wire_name(ident: &Ident) -> String {
    let name = ident.to_string();
    let name = name.strip_prefix("r#").unwrap_or(&name);
    match name.strip_suffix('_') {
        Some(stripped) if is_keyword(stripped) => stripped.to_string(),
        _ => name.to_string(),
    }
}

/// Header name derived from a parameter name: `x_request_id` becomes
/// `x-request-id`.
pub(crate) fn header_name(ident: &Ident) -> String {
    wire_name(ident).replace('_', "-")
}

/// Property name for a getter or setter: `set_authorize` and `authorize`
/// both name the property `authorize`.
pub(crate) fn property_name(fn_name: &str) -> String {
    fn_name.strip_prefix("set_").unwrap_or(fn_name).to_string()
}

/// The type as written, without whitespace.
pub(crate) fn type_name(ty: &Type) -> String {
    ty.to_token_stream()
        .to_string()
        .split_whitespace()
        .collect()
}
