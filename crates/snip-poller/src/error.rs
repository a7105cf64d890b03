use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PollerError {
    #[error("deletion poller is stopped")]
    Stopped,
    #[error("deletion poller worker failed: {0}")]
    Worker(String),
}
