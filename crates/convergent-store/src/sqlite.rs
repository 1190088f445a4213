//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend for Convergent. It uses
//! rusqlite with bundled SQLite behind a mutex; dumps are small and
//! writes are infrequent, so operations run directly on the calling
//! task.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::Store;

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::InvalidData(format!("mutex poisoned: {}", e)))?;
        f(&conn)
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn load(&self, namespace: &str) -> Result<Option<Vec<u8>>> {
        self.with_conn(|conn| {
            let dump = conn
                .query_row(
                    "SELECT dump FROM dumps WHERE namespace = ?1",
                    params![namespace],
                    |row| row.get::<_, Vec<u8>>(0),
                )
                .optional()?;
            Ok(dump)
        })
    }

    async fn save(&self, namespace: &str, dump: &[u8]) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO dumps (namespace, dump, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(namespace) DO UPDATE SET dump = ?2, updated_at = ?3",
                params![namespace, dump, now_millis()],
            )?;
            debug!(namespace, bytes = dump.len(), "dump saved");
            Ok(())
        })
    }

    async fn delete(&self, namespace: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM dumps WHERE namespace = ?1", params![namespace])?;
            Ok(())
        })
    }

    async fn list(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT namespace FROM dumps ORDER BY namespace")?;
            let names = stmt
                .query_map([], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(names)
        })
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_load_delete() {
        let store = SqliteStore::open_memory().unwrap();
        assert_eq!(store.load("UserProfile").await.unwrap(), None);

        store.save("UserProfile", b"dump-1").await.unwrap();
        assert_eq!(
            store.load("UserProfile").await.unwrap(),
            Some(b"dump-1".to_vec())
        );

        store.save("UserProfile", b"dump-2").await.unwrap();
        assert_eq!(
            store.load("UserProfile").await.unwrap(),
            Some(b"dump-2".to_vec())
        );

        store.delete("UserProfile").await.unwrap();
        assert_eq!(store.load("UserProfile").await.unwrap(), None);
        store.delete("UserProfile").await.unwrap();
    }

    #[tokio::test]
    async fn test_list_is_sorted() {
        let store = SqliteStore::open_memory().unwrap();
        store.save("UserProfile", b"u").await.unwrap();
        store.save("Contacts", b"c").await.unwrap();

        assert_eq!(store.list().await.unwrap(), vec!["Contacts", "UserProfile"]);
    }

    #[tokio::test]
    async fn test_dumps_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("convergent.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.save("UserProfile", b"persisted").await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(
            store.load("UserProfile").await.unwrap(),
            Some(b"persisted".to_vec())
        );
    }
}
