use proc_macro::TokenStream;
use syn::ItemTrait;

mod model;
mod procmacro;
mod translate;

/// Turns an annotated trait into a REST client.
///
/// Emits the trait itself without courier attributes, plus a
/// `<Trait>Client<T>` struct implementing it over any transport `T`. Macro
/// arguments: `base_url = "..."`, `name = "..."` (interface name used in
/// metadata and errors) and `client = "..."` (name of the generated struct).
#[proc_macro_attribute]
pub fn api(attr: TokenStream, item: TokenStream) -> TokenStream {
    let config = match procmacro::parse_config(attr.into()) {
        Ok(config) => config,
        Err(e) => return e.to_compile_error().into(),
    };
    match syn::parse::<ItemTrait>(item) {
        Ok(item) => procmacro::generate_code(config, item).into(),
        Err(e) => e.to_compile_error().into(),
    }
}
