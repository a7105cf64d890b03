//! Core types and traits for the snip URL shortener.
//!
//! This crate provides the record model, short code type, error taxonomy
//! and the [`Store`] contract that every storage backend implements and
//! every caller depends on.

pub mod error;
pub mod record;
pub mod shortcode;
pub mod store;

pub use error::{Result, StoreError, ValidationError};
pub use record::{NewUrl, Owner, UrlRecord};
pub use shortcode::ShortCode;
pub use store::{BatchOutcome, Store, StoreStats};
