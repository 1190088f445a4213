//! The persistence boundary.
//!
//! The engine persists one opaque dump per namespace. The store never
//! interprets dump contents; versioning and format both belong to the
//! document layer above.

use async_trait::async_trait;

use crate::error::Result;

/// Blob-per-namespace persistence.
///
/// Implementations must be thread-safe (Send + Sync). `save` fully
/// replaces any previous dump for the namespace.
#[async_trait]
pub trait Store: Send + Sync {
    /// Load the dump for a namespace, if one was saved.
    async fn load(&self, namespace: &str) -> Result<Option<Vec<u8>>>;

    /// Save (insert or replace) the dump for a namespace.
    async fn save(&self, namespace: &str, dump: &[u8]) -> Result<()>;

    /// Delete the dump for a namespace. No-op when absent.
    async fn delete(&self, namespace: &str) -> Result<()>;

    /// All namespaces with a saved dump, sorted.
    async fn list(&self) -> Result<Vec<String>>;
}
