//! Reads an annotated trait into the tables code generation works from, and
//! strips the annotations so the trait can be emitted as plain Rust.

use courier_core::Role;
use http::Method;
use proc_macro2::Ident;
use syn::{
    Attribute, Expr, ExprLit, FnArg, GenericArgument, ItemTrait, Lit, LitStr, Pat, PathArguments,
    ReturnType, Signature, TraitItem, Type, spanned::Spanned,
};

use crate::translate::{header_name, property_name, verb_of, wire_name};

pub(crate) struct ApiModel {
    pub ident: Ident,
    pub methods: Vec<RouteMethod>,
    pub properties: Vec<PropertyAccessor>,
}

pub(crate) struct RouteMethod {
    pub sig: Signature,
    pub verb: Method,
    pub path: String,
    pub params: Vec<RouteParam>,
    pub cancel: Option<Ident>,
    /// the `T` of the declared `Result<T>`
    pub success: Type,
    /// `true` when the success type is an `ApiResponse`
    pub initializing: bool,
}

pub(crate) struct RouteParam {
    pub ident: Ident,
    pub ty: Type,
    pub wire_name: String,
    pub role: Option<Role>,
}

pub(crate) enum Accessor {
    Getter,
    Setter(Ident),
}

pub(crate) struct PropertyAccessor {
    pub sig: Signature,
    pub name: String,
    pub header: String,
    pub accessor: Accessor,
}

/// Parses an optional string argument as in `#[query("page")]`.
fn attr_string(attr: &Attribute) -> syn::Result<Option<String>> {
    match &attr.meta {
        syn::Meta::Path(_) => Ok(None),
        syn::Meta::List(_) => Ok(Some(attr.parse_args::<LitStr>()?.value())),
        syn::Meta::NameValue(nv) => match &nv.value {
            Expr::Lit(ExprLit {
                lit: Lit::Str(s), ..
            }) => Ok(Some(s.value())),
            other => Err(syn::Error::new(other.span(), "expected a string literal")),
        },
    }
}

fn attr_name(attr: &Attribute) -> Option<String> {
    attr.path().get_ident().map(Ident::to_string)
}

fn role_of(name: &str) -> Option<Role> {
    match name {
        "path" => Some(Role::Path),
        "query" => Some(Role::Query),
        "header" => Some(Role::Header),
        "body" => Some(Role::Body),
        _ => None,
    }
}

/// Returns the `T` in `Result<T>` / `Result<T, E>`.
fn success_type(sig: &Signature) -> syn::Result<Type> {
    let error = || {
        syn::Error::new(
            sig.output.span(),
            "routed methods must return courier::Result<T>",
        )
    };
    let ReturnType::Type(_, ty) = &sig.output else {
        return Err(error());
    };
    let Type::Path(path) = ty.as_ref() else {
        return Err(error());
    };
    let segment = path.path.segments.last().ok_or_else(error)?;
    if segment.ident != "Result" {
        return Err(error());
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return Err(error());
    };
    match args.args.first() {
        Some(GenericArgument::Type(ty)) => Ok(ty.clone()),
        _ => Err(error()),
    }
}

fn is_api_response(ty: &Type) -> bool {
    match ty {
        Type::Path(path) => path
            .path
            .segments
            .last()
            .is_some_and(|s| s.ident == "ApiResponse"),
        _ => false,
    }
}

fn parse_route_params(sig: &mut Signature) -> syn::Result<(Vec<RouteParam>, Option<Ident>)> {
    let mut params = Vec::new();
    let mut cancel = None;

    for input in sig.inputs.iter_mut() {
        let FnArg::Typed(arg) = input else {
            continue;
        };
        let Pat::Ident(pat) = arg.pat.as_ref() else {
            return Err(syn::Error::new(
                arg.pat.span(),
                "parameters of routed methods must be plain identifiers",
            ));
        };
        let ident = pat.ident.clone();

        let mut role = None;
        let mut wire = None;
        let mut is_cancel = false;
        let mut kept = Vec::new();
        for attr in arg.attrs.drain(..) {
            let name = attr_name(&attr).unwrap_or_default();
            if name == "cancel" {
                is_cancel = true;
            } else if let Some(r) = role_of(&name) {
                if role.is_some() {
                    return Err(syn::Error::new(
                        attr.span(),
                        format!("parameter '{ident}' has more than one role"),
                    ));
                }
                role = Some(r);
                wire = attr_string(&attr)?;
            } else {
                kept.push(attr);
            }
        }
        arg.attrs = kept;

        if is_cancel {
            if role.is_some() {
                return Err(syn::Error::new(
                    ident.span(),
                    "a #[cancel] parameter cannot have a role",
                ));
            }
            cancel = Some(ident);
            continue;
        }

        let wire_name = wire.unwrap_or_else(|| match role {
            Some(Role::Header) => header_name(&ident),
            _ => wire_name(&ident),
        });
        params.push(RouteParam {
            ident,
            ty: arg.ty.as_ref().clone(),
            wire_name,
            role,
        });
    }
    Ok((params, cancel))
}

fn parse_property(sig: &Signature, header: Option<String>, span: proc_macro2::Span) -> syn::Result<PropertyAccessor> {
    let header = header.ok_or_else(|| {
        syn::Error::new(span, "property accessors need a header name: #[header(\"Name\")]")
    })?;
    if sig.asyncness.is_some() {
        return Err(syn::Error::new(sig.span(), "property accessors cannot be async"));
    }
    let typed: Vec<_> = sig
        .inputs
        .iter()
        .filter_map(|i| match i {
            FnArg::Typed(t) => Some(t),
            FnArg::Receiver(_) => None,
        })
        .collect();
    let accessor = match typed.as_slice() {
        [] => Accessor::Getter,
        [value] => match value.pat.as_ref() {
            Pat::Ident(p) => Accessor::Setter(p.ident.clone()),
            other => {
                return Err(syn::Error::new(other.span(), "expected a plain identifier"));
            }
        },
        _ => {
            return Err(syn::Error::new(
                sig.inputs.span(),
                "property setters take exactly one value",
            ));
        }
    };
    Ok(PropertyAccessor {
        sig: sig.clone(),
        name: property_name(&sig.ident.to_string()),
        header,
        accessor,
    })
}

/// Extracts the model and removes all courier attributes from `item`.
pub(crate) fn extract(item: &mut ItemTrait) -> syn::Result<ApiModel> {
    let mut methods = Vec::new();
    let mut properties = Vec::new();

    for trait_item in item.items.iter_mut() {
        let TraitItem::Fn(f) = trait_item else {
            continue;
        };

        let mut route: Option<(Method, String)> = None;
        let mut header: Option<(Option<String>, proc_macro2::Span)> = None;
        let mut kept = Vec::new();
        for attr in f.attrs.drain(..) {
            let name = attr_name(&attr).unwrap_or_default();
            if let Some(verb) = verb_of(&name) {
                if route.is_some() {
                    return Err(syn::Error::new(
                        attr.span(),
                        format!("method '{}' has more than one HTTP verb", f.sig.ident),
                    ));
                }
                let path = attr_string(&attr)?.ok_or_else(|| {
                    syn::Error::new(attr.span(), format!("#[{name}] needs a path template"))
                })?;
                route = Some((verb, path));
            } else if name == "header" {
                header = Some((attr_string(&attr)?, attr.span()));
            } else {
                kept.push(attr);
            }
        }
        f.attrs = kept;

        match (route, header) {
            (Some(_), Some((_, span))) => {
                return Err(syn::Error::new(
                    span,
                    "a method is either routed or a property accessor",
                ));
            }
            (Some((verb, path)), None) => {
                if f.sig.asyncness.is_none() {
                    return Err(syn::Error::new(
                        f.sig.fn_token.span(),
                        "routed methods must be async",
                    ));
                }
                if f.default.is_some() {
                    return Err(syn::Error::new(
                        f.sig.span(),
                        "routed methods cannot have a default body",
                    ));
                }
                let success = success_type(&f.sig)?;
                let (params, cancel) = parse_route_params(&mut f.sig)?;
                methods.push(RouteMethod {
                    sig: f.sig.clone(),
                    verb,
                    path,
                    params,
                    cancel,
                    initializing: is_api_response(&success),
                    success,
                });
            }
            (None, Some((name, span))) => properties.push(parse_property(&f.sig, name, span)?),
            (None, None) if f.default.is_none() => {
                return Err(syn::Error::new(
                    f.sig.span(),
                    format!(
                        "method '{}' needs #[get], #[post], #[put], #[patch], #[delete] or #[header]",
                        f.sig.ident
                    ),
                ));
            }
            (None, None) => {}
        }
    }

    Ok(ApiModel {
        ident: item.ident.clone(),
        methods,
        properties,
    })
}
