//! Storage backends for the snip URL shortener.
//!
//! Every backend implements [`snip_core::Store`] with the same observable
//! behaviour; they differ only in persistence and in how concurrent writers
//! are serialised.

mod codes;
pub mod file;
pub mod memory;
pub mod postgres;

pub use codes::DEFAULT_MAX_CODE_ATTEMPTS;
pub use file::FileStore;
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use snip_core::{Result, Store, StoreError};
