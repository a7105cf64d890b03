//! Asynchronous, batched soft deletion.
//!
//! Request handlers hand bulk-delete requests to a [`DeletionPoller`] and
//! acknowledge them immediately; a single background task applies them to
//! the store in submission order.

pub mod error;
pub mod poller;

pub use error::PollerError;
pub use poller::{DeletionPoller, PollerConfig};
