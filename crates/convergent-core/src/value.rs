//! The configuration value model.
//!
//! A configuration tree is a [`Dict`] whose values are scalars, sets of
//! scalars, or nested dicts. The model is closed: every node is one of
//! these shapes, and all operations on it are total.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::canonical;

/// A leaf value: a signed integer, UTF-8 text, or an opaque byte string.
///
/// Text and bytes are distinct types with distinct encodings, even when
/// the text's UTF-8 bytes and the byte string are identical.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Scalar {
    Int(i64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Scalar {
    /// The canonical encoding of this scalar alone.
    pub fn encoded(&self) -> Vec<u8> {
        let mut out = Vec::new();
        canonical::write_scalar(&mut out, self);
        out
    }
}

// Scalars are totally ordered by their canonical encoded bytes, not by
// their native values. This is the order set members are stored and
// emitted in, so two devices always serialize a set identically.
impl Ord for Scalar {
    fn cmp(&self, other: &Self) -> Ordering {
        self.encoded().cmp(&other.encoded())
    }
}

impl PartialOrd for Scalar {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Text(v.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Text(v)
    }
}

impl From<Vec<u8>> for Scalar {
    fn from(v: Vec<u8>) -> Self {
        Scalar::Bytes(v)
    }
}

/// An unordered collection of unique scalars.
///
/// The backing `BTreeSet` keeps members sorted by canonical encoding
/// (via [`Scalar`]'s `Ord`), so insertion order never matters.
pub type Set = BTreeSet<Scalar>;

/// A string-keyed map of configuration values.
pub type Dict = BTreeMap<String, Value>;

/// A node in a configuration tree.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Value {
    Scalar(Scalar),
    Set(Set),
    Dict(Dict),
}

impl Value {
    /// An empty dict node.
    pub fn empty_dict() -> Self {
        Value::Dict(Dict::new())
    }

    /// An empty set node.
    pub fn empty_set() -> Self {
        Value::Set(Set::new())
    }

    /// The integer at this node, if it is one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Scalar(Scalar::Int(v)) => Some(*v),
            _ => None,
        }
    }

    /// The text at this node, if it is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Scalar(Scalar::Text(v)) => Some(v),
            _ => None,
        }
    }

    /// The byte string at this node, if it is one.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Scalar(Scalar::Bytes(v)) => Some(v),
            _ => None,
        }
    }

    /// The set at this node, if it is one.
    pub fn as_set(&self) -> Option<&Set> {
        match self {
            Value::Set(s) => Some(s),
            _ => None,
        }
    }

    /// The dict at this node, if it is one.
    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Value::Dict(d) => Some(d),
            _ => None,
        }
    }

    /// Mutable access to the set at this node, if it is one.
    pub fn as_set_mut(&mut self) -> Option<&mut Set> {
        match self {
            Value::Set(s) => Some(s),
            _ => None,
        }
    }

    /// Mutable access to the dict at this node, if it is one.
    pub fn as_dict_mut(&mut self) -> Option<&mut Dict> {
        match self {
            Value::Dict(d) => Some(d),
            _ => None,
        }
    }
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self {
        Value::Scalar(s)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Scalar(Scalar::Int(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Scalar(Scalar::Text(v.to_owned()))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Scalar(Scalar::Text(v))
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Scalar(Scalar::Bytes(v))
    }
}

impl From<Set> for Value {
    fn from(s: Set) -> Self {
        Value::Set(s)
    }
}

impl From<Dict> for Value {
    fn from(d: Dict) -> Self {
        Value::Dict(d)
    }
}

/// Typed read helpers for dicts.
///
/// A present key of the wrong shape reads the same as an absent key.
/// Callers that need to distinguish the two can use `Dict::get` and
/// match on the [`Value`] directly.
pub trait DictExt {
    fn int_at(&self, key: &str) -> Option<i64>;
    fn text_at(&self, key: &str) -> Option<&str>;
    fn bytes_at(&self, key: &str) -> Option<&[u8]>;
    fn set_at(&self, key: &str) -> Option<&Set>;
    fn dict_at(&self, key: &str) -> Option<&Dict>;
}

impl DictExt for Dict {
    fn int_at(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_int)
    }

    fn text_at(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_text)
    }

    fn bytes_at(&self, key: &str) -> Option<&[u8]> {
        self.get(key).and_then(Value::as_bytes)
    }

    fn set_at(&self, key: &str) -> Option<&Set> {
        self.get(key).and_then(Value::as_set)
    }

    fn dict_at(&self, key: &str) -> Option<&Dict> {
        self.get(key).and_then(Value::as_dict)
    }
}
