//! Transport abstraction for configuration messages.
//!
//! The transport moves sealed envelope bytes between a device and the
//! swarm; implementations may use HTTP, onion routing, or any other
//! carrier. Retry policy lives with the implementation, never here.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::state::Namespace;

/// Fetch-and-push boundary to the message swarm.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch all pending sealed messages for a namespace.
    async fn fetch(&self, namespace: &Namespace) -> Result<Vec<Bytes>>;

    /// Push one sealed message to a namespace.
    async fn push(&self, namespace: &Namespace, message: Bytes) -> Result<()>;
}

/// A simple in-memory transport for testing.
///
/// Messages pushed to a namespace accumulate and are served to every
/// fetch, like a relay that retains until expiry.
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use tokio::sync::RwLock;

    /// In-memory swarm shared by the devices in a test.
    #[derive(Default)]
    pub struct MemoryTransport {
        messages: RwLock<HashMap<Namespace, Vec<Bytes>>>,
    }

    impl MemoryTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Drop retained messages for a namespace, simulating relay
        /// expiry.
        pub async fn expire(&self, namespace: &Namespace) {
            self.messages.write().await.remove(namespace);
        }
    }

    #[async_trait]
    impl Transport for MemoryTransport {
        async fn fetch(&self, namespace: &Namespace) -> Result<Vec<Bytes>> {
            let messages = self.messages.read().await;
            Ok(messages.get(namespace).cloned().unwrap_or_default())
        }

        async fn push(&self, namespace: &Namespace, message: Bytes) -> Result<()> {
            let mut messages = self.messages.write().await;
            messages.entry(namespace.clone()).or_default().push(message);
            Ok(())
        }
    }
}
