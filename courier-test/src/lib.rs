//! End-to-end checks of clients generated by `#[courier::api]`, run against
//! an in-memory transport.

pub mod memory;
pub mod shop;
