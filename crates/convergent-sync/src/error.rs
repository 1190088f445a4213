//! Error types for the sync module.

use thiserror::Error;

use convergent_core::CoreError;

/// Errors that can occur while merging or restoring documents.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Encoding or crypto error from the core.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A persisted document dump could not be restored.
    #[error("corrupt document dump: {0}")]
    CorruptDump(String),

    /// Transport-level failure.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
