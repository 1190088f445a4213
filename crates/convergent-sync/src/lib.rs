//! # Convergent Sync
//!
//! The merge engine: per-namespace document state machines, the
//! deterministic tree merge, and the transport boundary.
//!
//! A [`ConfigDoc`] tracks one namespace through the
//! `Clean`/`Dirty`/`Merging` cycle. Incoming payloads merge through a
//! hash-ordered fold (see [`merge`]) so every device that has seen the
//! same messages holds byte-identical state.

pub mod error;
pub mod merge;
pub mod state;
pub mod transport;

pub use error::SyncError;
pub use merge::{merge_contributions, merge_dicts, Contribution};
pub use state::{ConfigDoc, DocState, MergeReport, Namespace, PushData};
pub use transport::Transport;
