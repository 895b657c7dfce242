use courier_core::{Role, method_identity};
use http::Method;
use proc_macro2::{Ident, Span, TokenStream};
use quote::{ToTokens, format_ident, quote};
use syn::{
    Expr, ExprLit, ItemTrait, MetaNameValue,
    parse::{Parse, ParseStream},
    punctuated::Punctuated,
    spanned::Spanned,
    token::Comma,
};

use crate::{
    model::{Accessor, ApiModel, PropertyAccessor, RouteMethod, extract},
    translate::{client_type_name, type_name},
};

// Structure to hold key-value pair arguments
#[derive(Default, Debug, PartialEq)]
pub struct ApiConfig {
    base_url: Option<String>,
    name: Option<String>,
    client: Option<String>,
}

trait ExprInto<T> {
    fn expr_into(&self) -> Option<T>;
}

impl ExprInto<String> for Expr {
    fn expr_into(&self) -> Option<String> {
        if let Expr::Lit(ExprLit {
            attrs: _,
            lit: syn::Lit::Str(lit_str),
        }) = self
        {
            Some(lit_str.value())
        } else {
            None
        }
    }
}

impl Parse for ApiConfig {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut config = Self::default();

        let kv_pairs = Punctuated::<MetaNameValue, Comma>::parse_terminated(input)?;

        for name_value in kv_pairs {
            let name = name_value.path.to_token_stream().to_string();
            let value: Option<String> = name_value.value.expr_into();
            let value = value.ok_or(syn::Error::new(
                name_value.span(),
                format!("'{name}' expects a string literal as argument"),
            ))?;

            match name.as_str() {
                "base_url" => config.base_url = Some(value),
                "name" => config.name = Some(value),
                "client" => config.client = Some(value),
                _ => {
                    return Err(syn::Error::new(
                        name_value.span(),
                        format!("unknown parameter: {}", name),
                    ));
                }
            }
        }

        Ok(config)
    }
}

pub(crate) fn parse_config(input: TokenStream) -> syn::Result<ApiConfig> {
    syn::parse2(input)
}

fn verb_tokens(verb: &Method) -> TokenStream {
    let ident = Ident::new(verb.as_str(), Span::call_site());
    quote!(::courier::http::Method::#ident)
}

fn role_tokens(role: Role) -> TokenStream {
    match role {
        Role::Body => quote!(::courier::Role::Body),
        Role::Query => quote!(::courier::Role::Query),
        Role::Path => quote!(::courier::Role::Path),
        Role::Header => quote!(::courier::Role::Header),
    }
}

fn identity_of(method: &RouteMethod) -> String {
    let types: Vec<String> = method.params.iter().map(|p| type_name(&p.ty)).collect();
    let types: Vec<&str> = types.iter().map(String::as_str).collect();
    method_identity(&method.sig.ident.to_string(), &types)
}

/// the registration call for one routed method
fn describe_method(method: &RouteMethod) -> TokenStream {
    let name = method.sig.ident.to_string();
    let verb = verb_tokens(&method.verb);
    let path = &method.path;
    let returns = type_name(&method.success);
    let params = method.params.iter().map(|p| {
        let wire_name = &p.wire_name;
        let ty = type_name(&p.ty);
        let role = p.role.map(|r| {
            let r = role_tokens(r);
            quote!(.role(#r))
        });
        quote!(.param(::courier::ParamSpec::new(#wire_name, #ty) #role))
    });
    quote! {
        .method(
            ::courier::MethodBuilder::new(#name)
                .route(#verb, #path)
                #(#params)*
                .returns(#returns)
        )
    }
}

fn implement_method(method: &RouteMethod) -> TokenStream {
    let sig = &method.sig;
    let identity = identity_of(method);
    let args = method.params.iter().map(|p| {
        let ident = &p.ident;
        quote!(::courier::Argument::new(&#ident)?)
    });
    let cancel = match &method.cancel {
        Some(c) => quote!(::core::option::Option::Some(#c)),
        None => quote!(::core::option::Option::None),
    };
    let invoke = if method.initializing {
        quote!(invoke_initializing)
    } else {
        quote!(invoke)
    };
    quote! {
        #sig {
            const METHOD: &str = #identity;
            let args: &[::courier::Argument] = &[#(#args),*];
            self.proxy.#invoke(METHOD, args, #cancel).await
        }
    }
}

fn implement_property(property: &PropertyAccessor) -> TokenStream {
    let sig = &property.sig;
    let name = &property.name;
    match &property.accessor {
        Accessor::Getter => quote! {
            #sig {
                ::core::convert::From::from(self.proxy.property(#name))
            }
        },
        Accessor::Setter(value) => quote! {
            #sig {
                self.proxy.set_property(#name, #value);
            }
        },
    }
}

fn generate(config: ApiConfig, model: &ApiModel) -> TokenStream {
    let trait_ident = &model.ident;
    let interface_name = config.name.unwrap_or_else(|| trait_ident.to_string());
    let client_ident = match &config.client {
        Some(client) => Ident::new(client, Span::call_site()),
        None => format_ident!("{}", client_type_name(&trait_ident.to_string())),
    };
    let doc = format!("REST client implementing [{trait_ident}].");

    let base_url = config.base_url.map(|b| quote!(.base_url(#b)));
    let mut seen = Vec::new();
    let properties = model.properties.iter().filter_map(|p| {
        if seen.contains(&p.name) {
            return None;
        }
        seen.push(p.name.clone());
        let name = &p.name;
        let header = &p.header;
        Some(quote!(.property(#name, #header)))
    });
    let described = model.methods.iter().map(describe_method);
    let methods = model.methods.iter().map(implement_method);
    let accessors = model.properties.iter().map(implement_property);

    quote! {
        #[doc = #doc]
        pub struct #client_ident<T> {
            proxy: ::courier::ServiceProxy<T>,
        }

        impl<T> ::core::fmt::Debug for #client_ident<T> {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.debug_tuple(stringify!(#client_ident)).field(&self.proxy).finish()
            }
        }

        impl<T: ::courier::Transport + 'static> ::courier::Interface for #client_ident<T> {
            type Transport = T;

            fn describe() -> ::courier::Result<::courier::InterfaceMetadata> {
                ::courier::InterfaceMetadata::builder(#interface_name)
                    #base_url
                    #(#properties)*
                    #(#described)*
                    .build()
            }

            fn from_proxy(proxy: ::courier::ServiceProxy<T>) -> Self {
                Self { proxy }
            }

            fn proxy(&self) -> &::courier::ServiceProxy<T> {
                &self.proxy
            }
        }

        impl<T: ::courier::Transport + 'static> #trait_ident for #client_ident<T> {
            #(#accessors)*
            #(#methods)*
        }
    }
}

// Main macro implementation
pub(super) fn generate_code(config: ApiConfig, mut item: ItemTrait) -> TokenStream {
    let model = match extract(&mut item) {
        Ok(model) => model,
        Err(e) => return e.to_compile_error(),
    };
    let client = generate(config, &model);
    quote! {
        #[allow(async_fn_in_trait)]
        #item

        #client
    }
}
