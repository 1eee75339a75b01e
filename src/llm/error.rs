use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("backend request failed: {0}")]
    Backend(String),
    #[error("backend rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),
    #[error("model produced no usable text")]
    EmptyOutput,
    #[error("no execution slot available: {0}")]
    Unavailable(String),
    #[error("invalid post-processing pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}
