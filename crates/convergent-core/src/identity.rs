//! Identity validation and public key decoding.
//!
//! A session id is the hex form of a 33-byte identity: the `0x05`
//! prefix byte followed by a 32-byte public key. Public keys also
//! travel in base64 and zbase32 forms; [`decode_pubkey`] accepts all
//! three.

use std::fmt;

use crate::error::{CoreError, Result};

/// The prefix byte of every session identity.
pub const SESSION_ID_PREFIX: u8 = 0x05;

/// A validated session identity: 33 bytes, always starting with
/// [`SESSION_ID_PREFIX`]. The textual form is 66 lowercase hex chars.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId([u8; 33]);

impl SessionId {
    /// Parse a session id from its 66-character hex form.
    ///
    /// Hex digits of either case are accepted; the stored form is
    /// normalized. Fails with [`CoreError::InvalidIdentity`] on wrong
    /// length, non-hex characters, or a prefix other than "05".
    pub fn parse(s: &str) -> Result<Self> {
        if s.len() != 66 {
            return Err(CoreError::InvalidIdentity(format!(
                "session id must be 66 hex chars, got {}",
                s.len()
            )));
        }
        if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(CoreError::InvalidIdentity(
                "session id contains non-hex characters".into(),
            ));
        }
        let bytes = hex::decode(s.to_ascii_lowercase())
            .map_err(|_| CoreError::InvalidIdentity("session id is not valid hex".into()))?;
        if bytes[0] != SESSION_ID_PREFIX {
            return Err(CoreError::InvalidIdentity(format!(
                "session id must start with \"05\", got \"{}\"",
                &s[..2]
            )));
        }
        let mut arr = [0u8; 33];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Build from the raw 33-byte form, checking the prefix.
    pub fn from_bytes(bytes: [u8; 33]) -> Result<Self> {
        if bytes[0] != SESSION_ID_PREFIX {
            return Err(CoreError::InvalidIdentity(format!(
                "session id must start with 0x05, got 0x{:02x}",
                bytes[0]
            )));
        }
        Ok(Self(bytes))
    }

    /// Build a session id from a raw 32-byte public key.
    pub fn from_pubkey(key: [u8; 32]) -> Self {
        let mut arr = [0u8; 33];
        arr[0] = SESSION_ID_PREFIX;
        arr[1..].copy_from_slice(&key);
        Self(arr)
    }

    /// The 32-byte public key behind the prefix.
    pub fn pubkey(&self) -> [u8; 32] {
        let mut key = [0u8; 32];
        key.copy_from_slice(&self.0[1..]);
        key
    }

    /// The full 33 raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 33] {
        &self.0
    }

    /// The canonical 66-char lowercase hex form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({}...)", &self.to_hex()[..10])
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Validate a session id string without keeping the parsed value.
pub fn validate_session_id(s: &str) -> Result<()> {
    SessionId::parse(s).map(|_| ())
}

/// Decode a 32-byte public key from any of its textual forms.
///
/// Accepted, tried in order:
/// - hex, 64 chars (either case),
/// - base64, 43 chars or 44 with a single trailing `=`,
/// - zbase32, 52 chars.
///
/// Everything else fails with [`CoreError::InvalidIdentity`].
pub fn decode_pubkey(s: &str) -> Result<[u8; 32]> {
    let decoded = if s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit()) {
        hex::decode(s.to_ascii_lowercase())
            .map_err(|_| CoreError::InvalidIdentity("invalid hex public key".into()))?
    } else if s.len() == 43 || (s.len() == 44 && s.ends_with('=')) {
        use base64::Engine;
        let trimmed = s.trim_end_matches('=');
        base64::engine::general_purpose::STANDARD_NO_PAD
            .decode(trimmed)
            .map_err(|_| CoreError::InvalidIdentity("invalid base64 public key".into()))?
    } else if s.len() == 52 {
        decode_zbase32(&s.to_ascii_lowercase())?
    } else {
        return Err(CoreError::InvalidIdentity(format!(
            "unrecognized public key form ({} chars)",
            s.len()
        )));
    };

    if decoded.len() != 32 {
        return Err(CoreError::InvalidIdentity(format!(
            "public key decoded to {} bytes, expected 32",
            decoded.len()
        )));
    }
    let mut key = [0u8; 32];
    key.copy_from_slice(&decoded);
    Ok(key)
}

const ZBASE32_ALPHABET: &[u8; 32] = b"ybndrfg8ejkmcpqxot1uwisza345h769";

// 52 chars of 5 bits each carry 260 bits; the final 4 are discarded.
fn decode_zbase32(s: &str) -> Result<Vec<u8>> {
    let mut table = [0xffu8; 256];
    for (i, &c) in ZBASE32_ALPHABET.iter().enumerate() {
        table[c as usize] = i as u8;
    }

    let mut out = Vec::with_capacity(32);
    let mut buffer = 0u32;
    let mut bits = 0u32;
    for c in s.bytes() {
        let val = table[c as usize];
        if val == 0xff {
            return Err(CoreError::InvalidIdentity(
                "invalid zbase32 public key".into(),
            ));
        }
        buffer = (buffer << 5) | u32::from(val);
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push((buffer >> bits) as u8);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;

    const GOOD_ID: &str = "05d871fc80ca007eed9b2f4df72853e2a2d5465a92fcb1889fb5c84aa2833b3b40";

    #[test]
    fn test_valid_session_id() {
        let id = SessionId::parse(GOOD_ID).unwrap();
        assert_eq!(id.to_hex(), GOOD_ID);
        assert_eq!(id.as_bytes()[0], SESSION_ID_PREFIX);
        validate_session_id(GOOD_ID).unwrap();
    }

    #[test]
    fn test_uppercase_hex_normalizes() {
        let id = SessionId::parse(&GOOD_ID.to_ascii_uppercase()).unwrap();
        assert_eq!(id.to_hex(), GOOD_ID);
    }

    #[test]
    fn test_wrong_length_rejected() {
        assert!(validate_session_id(&GOOD_ID[..65]).is_err());
        let long = format!("{GOOD_ID}0");
        assert!(validate_session_id(&long).is_err());
        assert!(validate_session_id("").is_err());
    }

    #[test]
    fn test_wrong_prefix_rejected() {
        let bad = format!("03{}", &GOOD_ID[2..]);
        assert!(matches!(
            validate_session_id(&bad),
            Err(CoreError::InvalidIdentity(_))
        ));
    }

    #[test]
    fn test_non_hex_rejected() {
        let bad = format!("05{}zz", &GOOD_ID[4..]);
        assert_eq!(bad.len(), 66);
        assert!(validate_session_id(&bad).is_err());
    }

    #[test]
    fn test_pubkey_roundtrip() {
        let id = SessionId::parse(GOOD_ID).unwrap();
        assert_eq!(SessionId::from_pubkey(id.pubkey()), id);
    }

    #[test]
    fn test_raw_bytes_roundtrip() {
        let id = SessionId::parse(GOOD_ID).unwrap();
        assert_eq!(SessionId::from_bytes(*id.as_bytes()).unwrap(), id);

        let mut bad = *id.as_bytes();
        bad[0] = 0x03;
        assert!(SessionId::from_bytes(bad).is_err());
    }

    #[test]
    fn test_decode_pubkey_hex() {
        let key = decode_pubkey(&GOOD_ID[2..]).unwrap();
        assert_eq!(hex::encode(key), &GOOD_ID[2..]);
    }

    #[test]
    fn test_decode_pubkey_base64_forms_agree() {
        let raw: [u8; 32] = SessionId::parse(GOOD_ID).unwrap().pubkey();
        let unpadded = base64::engine::general_purpose::STANDARD_NO_PAD.encode(raw);
        let padded = base64::engine::general_purpose::STANDARD.encode(raw);
        assert_eq!(unpadded.len(), 43);
        assert_eq!(padded.len(), 44);
        assert!(padded.ends_with('='));

        assert_eq!(decode_pubkey(&unpadded).unwrap(), raw);
        assert_eq!(decode_pubkey(&padded).unwrap(), raw);
    }

    #[test]
    fn test_decode_pubkey_zbase32() {
        let raw: [u8; 32] = SessionId::parse(GOOD_ID).unwrap().pubkey();
        let encoded = encode_zbase32(&raw);
        assert_eq!(encoded.len(), 52);
        assert_eq!(decode_pubkey(&encoded).unwrap(), raw);
    }

    #[test]
    fn test_decode_pubkey_rejects_garbage() {
        assert!(decode_pubkey("").is_err());
        assert!(decode_pubkey("not a key").is_err());
        // Right length, wrong alphabet.
        assert!(decode_pubkey(&"@".repeat(64)).is_err());
        assert!(decode_pubkey(&"!".repeat(43)).is_err());
        assert!(decode_pubkey(&"0".repeat(52)).is_err());
    }

    // Test-only inverse of decode_zbase32.
    fn encode_zbase32(data: &[u8]) -> String {
        let mut out = String::new();
        let mut buffer = 0u32;
        let mut bits = 0u32;
        for &b in data {
            buffer = (buffer << 8) | u32::from(b);
            bits += 8;
            while bits >= 5 {
                bits -= 5;
                out.push(ZBASE32_ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
            }
        }
        if bits > 0 {
            out.push(ZBASE32_ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
        }
        out
    }
}
