use thiserror::Error;

/// Errors surfaced by the core to its callers.
///
/// An absent reading is not an error: deletes of unknown ids succeed and
/// lookups return `None`.
#[derive(Debug, Error)]
pub enum GlucoseError {
    /// The backing database could not be opened or migrated. Every operation
    /// that depends on the store fails with this until an open succeeds.
    #[error("Storage unavailable ({location}): {reason}")]
    StorageUnavailable { location: String, reason: String },

    /// A user-supplied value was rejected before reaching the store.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A storage operation failed after the store was opened.
    #[error(transparent)]
    Storage(#[from] anyhow::Error),

    /// The blocking storage task panicked or was cancelled.
    #[error("Storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type GlucoseResult<T> = Result<T, GlucoseError>;

impl GlucoseError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    #[must_use]
    pub fn is_storage_unavailable(&self) -> bool {
        matches!(self, Self::StorageUnavailable { .. })
    }
}
