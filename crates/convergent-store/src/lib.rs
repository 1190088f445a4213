//! # Convergent Store
//!
//! The persistence boundary for Convergent: one opaque document dump
//! per namespace, behind the async [`Store`] trait.
//!
//! Two implementations:
//!
//! - [`MemoryStore`] - in-memory, for tests
//! - [`SqliteStore`] - rusqlite with bundled SQLite, the production
//!   backend

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::Store;
