use snip_core::{StoreError, ValidationError};
use snip_poller::PollerError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] ValidationError),

    /// The URL already has a live short code.
    #[error("url is already shortened as {short_url}")]
    AlreadyShortened { code: String, short_url: String },

    #[error("short code not found: {0}")]
    NotFound(String),

    #[error("short code has been deleted: {0}")]
    Gone(String),

    #[error("storage error: {0}")]
    Store(StoreError),

    #[error(transparent)]
    Poller(#[from] PollerError),
}
