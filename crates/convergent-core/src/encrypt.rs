//! Deterministic sealing of configuration messages.
//!
//! Messages are padded to 256-byte buckets and encrypted with
//! XChaCha20-Poly1305. Both the key and the nonce are derived
//! deterministically from the ring key, the domain string, and the
//! message itself, so the same plaintext sealed under the same key and
//! domain always produces the same ciphertext. Push retries therefore
//! stay content-addressable: re-sealing an unchanged document yields
//! the same bytes and the same hash.
//!
//! The 24-byte nonce is appended to the ciphertext. Padding is a prefix
//! of zero bytes; canonical encodings never begin with 0x00, so
//! stripping leading zeros recovers the exact plaintext.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};

use crate::error::{CoreError, Result};

/// Bytes added by sealing: a 16-byte Poly1305 tag plus the appended
/// 24-byte nonce.
pub const SEAL_OVERHEAD: usize = 16 + 24;

/// Sealed messages are padded so their final size is a multiple of
/// this, hiding the plaintext length.
pub const PAD_BUCKET: usize = 256;

/// Seal a message under a 32-byte ring key and a domain string.
pub fn seal(key_base: &[u8; 32], domain: &str, message: &[u8]) -> Result<Vec<u8>> {
    if message.first() == Some(&0) {
        return Err(CoreError::EncryptFailed(
            "message may not begin with a zero byte".into(),
        ));
    }
    let padded = pad(message);
    let key = derive_key(key_base, domain, padded.len());
    let nonce = derive_nonce(domain, &padded);

    let cipher = XChaCha20Poly1305::new(Key::from_slice(&key));
    let mut sealed = cipher
        .encrypt(XNonce::from_slice(&nonce), padded.as_slice())
        .map_err(|_| CoreError::EncryptFailed("AEAD encryption failed".into()))?;
    sealed.extend_from_slice(&nonce);
    Ok(sealed)
}

/// Open a sealed message, returning the unpadded plaintext.
///
/// Any structural problem or authentication failure reports as
/// [`CoreError::DecryptFailed`]; callers trying a ring of keys treat
/// every failure the same way.
pub fn open(key_base: &[u8; 32], domain: &str, sealed: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < SEAL_OVERHEAD {
        return Err(CoreError::DecryptFailed);
    }
    let (ciphertext, nonce) = sealed.split_at(sealed.len() - 24);
    let key = derive_key(key_base, domain, ciphertext.len() - 16);

    let cipher = XChaCha20Poly1305::new(Key::from_slice(&key));
    let padded = cipher
        .decrypt(XNonce::from_slice(nonce), ciphertext)
        .map_err(|_| CoreError::DecryptFailed)?;
    Ok(unpad(&padded))
}

// Key derivation binds the padded length and the domain, so a sealed
// blob only opens in the context it was produced for.
fn derive_key(key_base: &[u8; 32], domain: &str, padded_len: usize) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(key_base);
    hasher.update(&(padded_len as u64).to_be_bytes());
    hasher.update(domain.as_bytes());
    *hasher.finalize().as_bytes()
}

fn derive_nonce(domain: &str, padded: &[u8]) -> [u8; 24] {
    let domain_key = blake3::hash(domain.as_bytes());
    let digest = blake3::Hasher::new_keyed(domain_key.as_bytes())
        .update(padded)
        .finalize();
    let mut nonce = [0u8; 24];
    nonce.copy_from_slice(&digest.as_bytes()[..24]);
    nonce
}

fn pad(message: &[u8]) -> Vec<u8> {
    let total = message.len() + SEAL_OVERHEAD;
    let target = total.div_ceil(PAD_BUCKET) * PAD_BUCKET;
    let mut padded = vec![0u8; target - total];
    padded.extend_from_slice(message);
    padded
}

fn unpad(padded: &[u8]) -> Vec<u8> {
    let start = padded
        .iter()
        .position(|&b| b != 0)
        .unwrap_or(padded.len());
    padded[start..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 32] = [0x11; 32];
    const DOMAIN: &str = "UserProfile";

    #[test]
    fn test_seal_open_roundtrip() {
        let message = b"d4:name5:alicee";
        let sealed = seal(&KEY, DOMAIN, message).unwrap();
        let opened = open(&KEY, DOMAIN, &sealed).unwrap();
        assert_eq!(opened, message);
    }

    #[test]
    fn test_sealed_size_is_bucketed() {
        for len in [1usize, 100, 215, 216, 217, 1000] {
            let mut message = vec![b'x'; len];
            message[0] = b'd';
            let sealed = seal(&KEY, DOMAIN, &message).unwrap();
            assert_eq!(sealed.len() % PAD_BUCKET, 0, "len {}", len);
            assert_eq!(open(&KEY, DOMAIN, &sealed).unwrap(), message);
        }
    }

    #[test]
    fn test_deterministic_ciphertext() {
        let message = b"d1:ai1ee";
        let a = seal(&KEY, DOMAIN, message).unwrap();
        let b = seal(&KEY, DOMAIN, message).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealed = seal(&KEY, DOMAIN, b"d1:ai1ee").unwrap();
        let wrong = [0x22u8; 32];
        assert!(matches!(
            open(&wrong, DOMAIN, &sealed),
            Err(CoreError::DecryptFailed)
        ));
    }

    #[test]
    fn test_wrong_domain_fails() {
        let sealed = seal(&KEY, DOMAIN, b"d1:ai1ee").unwrap();
        assert!(open(&KEY, "Contacts", &sealed).is_err());
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let mut sealed = seal(&KEY, DOMAIN, b"d1:ai1ee").unwrap();
        sealed[0] ^= 0x01;
        assert!(open(&KEY, DOMAIN, &sealed).is_err());
    }

    #[test]
    fn test_too_short_input_fails() {
        assert!(open(&KEY, DOMAIN, &[0u8; 10]).is_err());
        assert!(open(&KEY, DOMAIN, &[]).is_err());
    }

    #[test]
    fn test_leading_zero_message_rejected() {
        assert!(seal(&KEY, DOMAIN, &[0, 1, 2]).is_err());
    }
}
