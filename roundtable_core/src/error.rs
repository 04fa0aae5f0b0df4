use std::time::Duration;

use thiserror::Error;

/// Failure of an external provider call (chat, embedding, summarization).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

impl ProviderError {
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Raised at a cancellation checkpoint. Not a failure: the caller abandons
/// the unit of work silently.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("cancellation requested")]
pub struct CancellationRequested;
