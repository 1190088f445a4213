//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{Result, StoreError};
use crate::traits::Store;

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
#[derive(Default)]
pub struct MemoryStore {
    dumps: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn load(&self, namespace: &str) -> Result<Option<Vec<u8>>> {
        let dumps = self.dumps.read().map_err(poisoned)?;
        Ok(dumps.get(namespace).cloned())
    }

    async fn save(&self, namespace: &str, dump: &[u8]) -> Result<()> {
        let mut dumps = self.dumps.write().map_err(poisoned)?;
        dumps.insert(namespace.to_owned(), dump.to_vec());
        Ok(())
    }

    async fn delete(&self, namespace: &str) -> Result<()> {
        let mut dumps = self.dumps.write().map_err(poisoned)?;
        dumps.remove(namespace);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        let dumps = self.dumps.read().map_err(poisoned)?;
        Ok(dumps.keys().cloned().collect())
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> StoreError {
    StoreError::InvalidData("store lock poisoned".into())
}
