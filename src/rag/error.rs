use thiserror::Error;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("index unavailable: {0}")]
    IndexUnavailable(String),
    #[error("invalid index: {0}")]
    InvalidIndex(String),
    #[error("embedding failed: {0}")]
    Embedding(String),
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
