//! Shared write policies for configuration fields.
//!
//! Feature code never writes raw values for flags, counters, or names;
//! it goes through [`FieldProxy`] so every device suppresses default
//! values the same way. A field holding its default is erased rather
//! than stored, which keeps "never set" and "set back to default"
//! byte-identical and therefore merge-identical.

use crate::error::{CoreError, Result};
use crate::value::{Dict, DictExt, Value};

/// Maximum byte length of a profile picture URL.
pub const MAX_PROFILE_PIC_URL: usize = 223;

/// A short-lived mutable view over a configuration dict.
pub struct FieldProxy<'a> {
    pub(crate) dict: &'a mut Dict,
}

impl<'a> FieldProxy<'a> {
    pub fn new(dict: &'a mut Dict) -> Self {
        Self { dict }
    }

    // ── Write policies ──────────────────────────────────────────────

    /// Flag policy: true stores integer 1, false erases the key.
    pub fn set_flag(&mut self, key: &str, value: bool) {
        if value {
            self.dict.insert(key.to_owned(), Value::from(1));
        } else {
            self.dict.remove(key);
        }
    }

    /// Positive-int policy: values > 0 are stored, anything else erases.
    pub fn set_positive_int(&mut self, key: &str, value: i64) {
        if value > 0 {
            self.dict.insert(key.to_owned(), Value::from(value));
        } else {
            self.dict.remove(key);
        }
    }

    /// Nonzero-int policy: zero erases, any other value is stored.
    pub fn set_nonzero_int(&mut self, key: &str, value: i64) {
        if value != 0 {
            self.dict.insert(key.to_owned(), Value::from(value));
        } else {
            self.dict.remove(key);
        }
    }

    /// Nonempty-text policy: empty text erases, anything else is stored.
    pub fn set_nonempty_text(&mut self, key: &str, value: &str) {
        if value.is_empty() {
            self.dict.remove(key);
        } else {
            self.dict.insert(key.to_owned(), Value::from(value));
        }
    }

    // ── Plain writes ────────────────────────────────────────────────

    pub fn set_int(&mut self, key: &str, value: i64) {
        self.dict.insert(key.to_owned(), Value::from(value));
    }

    pub fn set_text(&mut self, key: &str, value: &str) {
        self.dict.insert(key.to_owned(), Value::from(value));
    }

    pub fn set_bytes(&mut self, key: &str, value: Vec<u8>) {
        self.dict.insert(key.to_owned(), Value::from(value));
    }

    pub fn set(&mut self, key: &str, value: Value) {
        self.dict.insert(key.to_owned(), value);
    }

    /// Erase a key. No-op when absent.
    pub fn erase(&mut self, key: &str) {
        self.dict.remove(key);
    }

    /// The set at `key`, created empty on first access.
    pub fn set_mut(&mut self, key: &str) -> &mut crate::value::Set {
        let entry = self
            .dict
            .entry(key.to_owned())
            .or_insert_with(Value::empty_set);
        if entry.as_set().is_none() {
            *entry = Value::empty_set();
        }
        match entry {
            Value::Set(s) => s,
            _ => unreachable!("entry was just replaced with a set"),
        }
    }

    /// The nested dict at `key`, created empty on first access.
    pub fn dict_mut(&mut self, key: &str) -> FieldProxy<'_> {
        let entry = self
            .dict
            .entry(key.to_owned())
            .or_insert_with(Value::empty_dict);
        if entry.as_dict().is_none() {
            *entry = Value::empty_dict();
        }
        match entry {
            Value::Dict(d) => FieldProxy::new(d),
            _ => unreachable!("entry was just replaced with a dict"),
        }
    }

    // ── Typed reads ─────────────────────────────────────────────────

    pub fn flag(&self, key: &str) -> bool {
        self.dict.int_at(key) == Some(1)
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        self.dict.int_at(key)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.dict.text_at(key)
    }

    pub fn bytes(&self, key: &str) -> Option<&[u8]> {
        self.dict.bytes_at(key)
    }

    // ── Profile picture record ──────────────────────────────────────

    /// Store a profile picture, or erase the record when the pic is
    /// empty. Fails only on an over-long URL.
    pub fn set_profile_pic(&mut self, key: &str, pic: Option<&ProfilePic>) -> Result<()> {
        match pic {
            Some(p) if !p.url.is_empty() => {
                if p.url.len() > MAX_PROFILE_PIC_URL {
                    return Err(CoreError::InvalidField(format!(
                        "profile pic URL exceeds {MAX_PROFILE_PIC_URL} bytes"
                    )));
                }
                let mut record = Dict::new();
                record.insert("url".into(), Value::from(p.url.as_str()));
                record.insert("key".into(), Value::from(p.key.to_vec()));
                self.dict.insert(key.to_owned(), Value::Dict(record));
                Ok(())
            }
            _ => {
                self.dict.remove(key);
                Ok(())
            }
        }
    }

    /// Read a profile picture record. Absent, malformed, or empty-url
    /// records all read as `None`; the key is meaningless without a
    /// URL.
    pub fn profile_pic(&self, key: &str) -> Option<ProfilePic> {
        let record = self.dict.dict_at(key)?;
        let url = record.text_at("url")?;
        if url.is_empty() {
            return None;
        }
        let key_bytes: [u8; 32] = record.bytes_at("key")?.try_into().ok()?;
        Some(ProfilePic {
            url: url.to_owned(),
            key: key_bytes,
        })
    }
}

/// A profile picture pointer: where to fetch it and the key that
/// decrypts it.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ProfilePic {
    pub url: String,
    pub key: [u8; 32],
}
