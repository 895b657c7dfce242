//! Declarative REST clients.
//!
//! Annotate a trait with [api] and get a `<Trait>Client` that turns every
//! method call into an HTTP request:
//!
//! ```no_run
//! use courier::{Interface, Result};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! pub struct Product {
//!     pub name: String,
//!     pub price: f64,
//! }
//!
//! #[courier::api(base_url = "https://shop.example.com/api")]
//! pub trait Products {
//!     #[header("Authorization")]
//!     fn authorization(&self) -> Option<String>;
//!     #[header("Authorization")]
//!     fn set_authorization(&self, value: Option<String>);
//!
//!     #[get("/products/{id}")]
//!     async fn get(&self, #[path] id: i64) -> Result<Product>;
//!
//!     #[put("/products/{id}")]
//!     async fn update(&self, #[path] id: i64, #[body] product: &Product) -> Result<Product>;
//! }
//!
//! # async fn run<T: courier::Transport + 'static>(transport: T) -> Result<()> {
//! let products = ProductsClient::connect(transport)?;
//! products.set_authorization(Some("Bearer secret".to_string()));
//! let product = products.get(42).await?;
//! # Ok(())
//! # }
//! ```
//!
//! Requests can also be put together by hand with [RequestBuilder].

pub use courier_core::*;
pub use courier_macro::api;
pub use http;

#[cfg(feature = "reqwest")]
mod reqwest_transport;

#[cfg(feature = "reqwest")]
pub use reqwest_transport::ReqwestTransport;
