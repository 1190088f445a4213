//! Signed, content-addressed message envelopes.
//!
//! An envelope carries one canonical payload between devices. Its wire
//! form is itself a canonical dict with single-letter keys:
//!
//! - `f` — sender public key, 32 bytes
//! - `h` — Blake3 content hash of the payload, 32 bytes
//! - `p` — the payload
//! - `s` — Ed25519 signature over the payload, 64 bytes
//!
//! Envelopes are immutable once built. [`Envelope::decode`] checks
//! structure only; [`Envelope::verify`] recomputes the hash and checks
//! the signature, so a relay can route on the claimed hash while
//! recipients still refuse tampered payloads.

use crate::canonical;
use crate::crypto::{ContentHash, Ed25519PublicKey, Ed25519Signature, Keypair};
use crate::error::{CoreError, Result};
use crate::value::{Dict, DictExt, Value};

/// Upper bound on a serialized envelope, matching the relay's accepted
/// message size.
pub const MAX_MESSAGE_SIZE: usize = 76_800;

/// A signed configuration message.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Envelope {
    sender: Ed25519PublicKey,
    hash: ContentHash,
    payload: Vec<u8>,
    signature: Ed25519Signature,
}

impl Envelope {
    /// Build and sign an envelope over a payload.
    pub fn create(keypair: &Keypair, payload: Vec<u8>) -> Self {
        let hash = ContentHash::hash(&payload);
        let signature = keypair.sign(&payload);
        Self {
            sender: keypair.public_key(),
            hash,
            payload,
            signature,
        }
    }

    pub fn sender(&self) -> &Ed25519PublicKey {
        &self.sender
    }

    pub fn hash(&self) -> &ContentHash {
        &self.hash
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn signature(&self) -> &Ed25519Signature {
        &self.signature
    }

    /// Serialize to the canonical wire form.
    pub fn encode(&self) -> Vec<u8> {
        let mut dict = Dict::new();
        dict.insert("f".into(), Value::from(self.sender.as_bytes().to_vec()));
        dict.insert("h".into(), Value::from(self.hash.as_bytes().to_vec()));
        dict.insert("p".into(), Value::from(self.payload.clone()));
        dict.insert("s".into(), Value::from(self.signature.as_bytes().to_vec()));
        canonical::encode_dict(&dict)
    }

    /// Parse the canonical wire form.
    ///
    /// Requires all four fields with their exact widths; unknown extra
    /// keys are tolerated so older devices can read envelopes from
    /// newer ones. No hash or signature check happens here.
    pub fn decode(input: &[u8]) -> Result<Self> {
        let dict = canonical::decode_dict(input)?;

        let sender = fixed::<32>(&dict, "f", "sender key")?;
        let hash = fixed::<32>(&dict, "h", "content hash")?;
        let signature = fixed::<64>(&dict, "s", "signature")?;
        let payload = dict
            .bytes_at("p")
            .ok_or_else(|| {
                CoreError::MalformedEncoding("envelope missing payload field 'p'".into())
            })?
            .to_vec();

        Ok(Self {
            sender: Ed25519PublicKey::from_bytes(sender),
            hash: ContentHash::from_bytes(hash),
            payload,
            signature: Ed25519Signature::from_bytes(signature),
        })
    }

    /// Verify integrity and authenticity.
    ///
    /// Recomputes the payload hash and checks the Ed25519 signature;
    /// either failure means the envelope must be discarded.
    pub fn verify(&self) -> Result<()> {
        let actual = ContentHash::hash(&self.payload);
        if actual != self.hash {
            return Err(CoreError::SignatureInvalid);
        }
        self.sender.verify(&self.payload, &self.signature)
    }
}

fn fixed<const N: usize>(dict: &Dict, key: &str, what: &str) -> Result<[u8; N]> {
    let bytes = dict.bytes_at(key).ok_or_else(|| {
        CoreError::MalformedEncoding(format!("envelope missing {what} field '{key}'"))
    })?;
    bytes.try_into().map_err(|_| {
        CoreError::MalformedEncoding(format!(
            "envelope {what} must be {N} bytes, got {}",
            bytes.len()
        ))
    })
}
