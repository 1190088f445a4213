//! Error types for the engine facade.

use thiserror::Error;

use convergent_core::CoreError;
use convergent_store::StoreError;
use convergent_sync::SyncError;

/// Errors surfaced by the [`SyncEngine`](crate::SyncEngine).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The key ring is empty; nothing can be sealed or opened.
    #[error("no decryption keys in the ring")]
    NoKeys,

    /// The namespace was never opened on this engine.
    #[error("unknown namespace: {0}")]
    UnknownNamespace(String),

    /// A sealed push would exceed the relay's accepted size.
    #[error("message of {size} bytes exceeds the {max} byte limit")]
    MessageTooLarge { size: usize, max: usize },
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
