use thiserror::Error;

/// Client-facing error taxonomy
///
/// Every variant leaves the client in a previously-known-safe state; none of
/// them is fatal to the process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CrushError {
    /// Malformed or self-referential address, rejected before any network call
    #[error("Validation error: {0}")]
    Validation(String),

    /// Identity handshake failed, timed out or is already in flight
    #[error("Connection error: {0}")]
    Connection(String),

    /// A remote call was unreachable or returned a non-success status
    #[error("Network error: {0}")]
    Network(String),

    /// The persisted session record could not be parsed or validated
    #[error("Corrupt persisted session: {0}")]
    PersistenceCorruption(String),
}

impl CrushError {
    /// Whether the caller may retry the same operation unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, CrushError::Connection(_) | CrushError::Network(_))
    }
}

impl From<crate::services::RemoteError> for CrushError {
    fn from(err: crate::services::RemoteError) -> Self {
        CrushError::Network(err.to_string())
    }
}
