//! Error kinds for external-service boundaries.
//!
//! Connectors, the reverse geocoder, and embedding providers return
//! [`SourceError`] instead of panicking or swallowing failures, so a caller
//! can tell "the source had no data" (`Ok(vec![])`) apart from "the fetch
//! failed" (`Err(_)`). Every kind is recoverable.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("{0} is disabled")]
    Disabled(&'static str),
}

impl SourceError {
    /// Whether the failure came from the network rather than the payload.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SourceError::Transport(_) | SourceError::Timeout | SourceError::Status(_)
        )
    }
}

pub type SourceResult<T> = std::result::Result<T, SourceError>;
