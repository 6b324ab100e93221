//! Panel error taxonomy.

/// Error raised by panel clients.
///
/// Only [`PanelError::Config`] is meant to reach callers of the
/// higher-level components; everything else is logged where it occurs
/// and degrades to a skipped panel or a failed per-panel operation.
#[derive(Debug, thiserror::Error)]
pub enum PanelError {
    /// Network-level failure: DNS, connect, TLS, timeout.
    #[error("transport: {0}")]
    Transport(String),

    /// The panel rejected our credentials (HTTP 401 after any retry).
    #[error("authentication rejected")]
    Auth,

    /// The requested user does not exist on the panel (HTTP 404).
    #[error("not found")]
    NotFound,

    /// Any other HTTP error status, with the decoded body for the log.
    #[error("remote error (status {status}): {body}")]
    Remote { status: u16, body: String },

    /// Response body could not be decoded.
    #[error("decode: {0}")]
    Decode(String),

    /// Unknown panel name or kind, or unusable credentials.
    #[error("config: {0}")]
    Config(String),
}

impl PanelError {
    /// Create a config error.
    #[inline]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a decode error from any error type.
    #[inline]
    pub fn decode<E: std::fmt::Display>(err: E) -> Self {
        Self::Decode(err.to_string())
    }

    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

impl From<reqwest::Error> for PanelError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}
