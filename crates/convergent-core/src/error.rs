//! Error types for Convergent core.

use thiserror::Error;

/// Core errors that can occur while encoding, decoding, or verifying
/// configuration data.
///
/// Type-mismatched reads are not errors: typed accessors on the value
/// model return `Option` instead.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("malformed encoding: {0}")]
    MalformedEncoding(String),

    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("invalid field value: {0}")]
    InvalidField(String),

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("signature verification failed")]
    SignatureInvalid,

    #[error("decryption failed")]
    DecryptFailed,

    #[error("encryption failed: {0}")]
    EncryptFailed(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
