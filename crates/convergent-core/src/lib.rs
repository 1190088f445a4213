//! # Convergent Core
//!
//! Pure primitives for the Convergent sync engine: the configuration
//! value model, canonical encoding, identities, and message envelopes.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over configuration trees and cryptographic data.
//!
//! ## Key Types
//!
//! - [`Value`] / [`Scalar`] - The configuration tree model
//! - [`ContentHash`] - Content-addressed identifier (Blake3 hash)
//! - [`SessionId`] - A validated 66-hex-char device identity
//! - [`Envelope`] - A signed, content-addressed configuration message
//! - [`FieldProxy`] - Shared default-suppressing write policies
//!
//! ## Canonicalization
//!
//! All configuration data is encoded with a deterministic,
//! self-delimiting format. See the [`canonical`] module.

pub mod canonical;
pub mod crypto;
pub mod encrypt;
pub mod envelope;
pub mod error;
pub mod fields;
pub mod groups;
pub mod identity;
pub mod value;

pub use canonical::{decode, decode_dict, encode, encode_dict};
pub use crypto::{ContentHash, Ed25519PublicKey, Ed25519Signature, Keypair};
pub use envelope::{Envelope, MAX_MESSAGE_SIZE};
pub use error::CoreError;
pub use fields::{FieldProxy, ProfilePic, MAX_PROFILE_PIC_URL};
pub use groups::{Group, NotifyMode, MAX_GROUP_NAME};
pub use identity::{decode_pubkey, validate_session_id, SessionId};
pub use value::{Dict, DictExt, Scalar, Set, Value};
