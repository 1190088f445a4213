//! # Convergent
//!
//! Multi-device configuration synchronization without a central
//! authority. Devices exchange signed, encrypted, content-addressed
//! configuration messages; the engine decodes, verifies, merges, and
//! re-encodes them into a single deterministic state regardless of
//! delivery order or duplication.
//!
//! [`SyncEngine`] is the entry point:
//!
//! ```no_run
//! use convergent::{Keypair, MemoryStore, Namespace, SyncEngine};
//!
//! # async fn demo() -> Result<(), convergent::EngineError> {
//! let engine = SyncEngine::new(Keypair::generate(), MemoryStore::new());
//! engine.add_key([0u8; 32], true);
//!
//! let profile = Namespace::new("UserProfile");
//! engine.open(&profile).await?;
//! engine.edit(&profile, |p| p.set_text("name", "alice")).await?;
//!
//! if engine.needs_push(&profile).await? {
//!     let push = engine.push(&profile).await?;
//!     // hand push.message to the transport, then:
//!     engine.confirm_pushed(&profile, &push).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod error;

pub use engine::{IngestReport, PushMessage, SyncEngine};
pub use error::EngineError;

// Re-export the pieces applications need alongside the engine.
pub use convergent_core::{
    decode_pubkey, validate_session_id, ContentHash, CoreError, Dict, DictExt, Ed25519PublicKey,
    FieldProxy, Group, Keypair, NotifyMode, ProfilePic, Scalar, SessionId, Set, Value,
};
pub use convergent_store::{MemoryStore, SqliteStore, Store, StoreError};
pub use convergent_sync::{ConfigDoc, DocState, MergeReport, Namespace, SyncError, Transport};
