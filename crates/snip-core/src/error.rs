use crate::record::UrlRecord;
use thiserror::Error;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Reasons an original URL is rejected before it reaches a store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("url cannot be empty")]
    Empty,
    #[error("url must be {min} or more chars long, got {len}")]
    TooShort { min: usize, len: usize },
    #[error("url must have no whitespace in it")]
    ContainsWhitespace,
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("short code not found: {0}")]
    NotFound(String),
    #[error("url already shortened as {}", .0.id)]
    AlreadyExists(Box<UrlRecord>),
    #[error("short code is deleted: {0}")]
    IsDeleted(String),
    #[error("storage backend not accessible: {0}")]
    NotAccessible(String),
    #[error("storage is already closed")]
    AlreadyClosed,
    #[error("invalid url: {0}")]
    Validation(#[from] ValidationError),
    #[error("storage io failed: {0}")]
    Io(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("no free short code found after {attempts} attempts")]
    CodeSpaceExhausted { attempts: usize },
}

impl StoreError {
    /// Returns the conflicting record carried by [`StoreError::AlreadyExists`].
    pub fn existing(&self) -> Option<&UrlRecord> {
        match self {
            StoreError::AlreadyExists(record) => Some(record),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}
