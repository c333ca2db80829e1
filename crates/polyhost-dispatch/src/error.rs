//! Error types for worker dispatch.

use thiserror::Error;

/// Result type alias for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Errors that can occur while launching or managing workers.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to launch worker process: {0}")]
    Launch(#[from] std::io::Error),

    #[error("dynamic worker concurrency is not supported for http workers")]
    HttpUnsupported,
}
