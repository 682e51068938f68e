use thiserror::Error;

/// Store-facing error taxonomy. Mirrors the three buckets spec'd for the KV
/// adapter: absence is not an error, transient faults are retried by the
/// caller, everything else is fatal to the operation that hit it.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key not found")]
    NotFound,

    #[error("transient store error, retry: {0}")]
    Retryable(String),

    #[error("fatal store error: {0}")]
    Fatal(#[from] sled::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;
