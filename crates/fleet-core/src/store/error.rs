//! Store error type.

/// Store failure.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Backend error (database, network, etc.).
    #[error("backend error: {0}")]
    Backend(String),

    /// Row not found where one was required.
    #[error("not found")]
    NotFound,
}

impl StoreError {
    /// Create a backend error from any error type.
    #[inline]
    pub fn backend<E: std::fmt::Display>(err: E) -> Self {
        Self::Backend(err.to_string())
    }
}
