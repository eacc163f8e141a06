/// Errors from storage view operations.
#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    /// I/O error from the underlying backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The key cannot be mapped onto the backend's namespace.
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: &'static str },

    /// Backend failure that is not a plain I/O error.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Result alias for view operations.
pub type ViewResult<T> = Result<T, ViewError>;
