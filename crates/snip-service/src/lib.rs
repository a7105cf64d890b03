//! Application-facing shortener service.
//!
//! [`ShortenerService`] wires a [`Store`](snip_core::Store) backend and a
//! deletion poller together and renders short URLs against a base URL.

pub mod error;
pub mod service;

pub use error::ServiceError;
pub use service::{BatchRequest, BatchResponse, OwnedUrl, ShortenerService};
