//! Golden test vectors for deterministic verification.
//!
//! These vectors pin the canonical encoding byte for byte, so any
//! implementation (or refactor) that changes the wire format fails
//! loudly instead of silently diverging from deployed devices.

use convergent_core::{Dict, Scalar, Set, Value};

/// A golden encoding vector.
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// The value to encode.
    pub value: Value,
    /// The expected canonical bytes.
    pub expected: &'static [u8],
}

/// Get all golden vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "positive int",
            value: Value::from(42),
            expected: b"i42e",
        },
        GoldenVector {
            name: "negative int",
            value: Value::from(-7),
            expected: b"i-7e",
        },
        GoldenVector {
            name: "zero",
            value: Value::from(0),
            expected: b"i0e",
        },
        GoldenVector {
            name: "int64 min",
            value: Value::from(i64::MIN),
            expected: b"i-9223372036854775808e",
        },
        GoldenVector {
            name: "empty text",
            value: Value::from(""),
            expected: b"u0:",
        },
        GoldenVector {
            name: "short text",
            value: Value::from("hello"),
            expected: b"u5:hello",
        },
        GoldenVector {
            name: "bytes with high bit",
            value: Value::from(vec![0x01, 0xff]),
            expected: b"b2:\x01\xff",
        },
        GoldenVector {
            name: "empty dict",
            value: Value::empty_dict(),
            expected: b"de",
        },
        GoldenVector {
            name: "empty set",
            value: Value::empty_set(),
            expected: b"le",
        },
        GoldenVector {
            name: "mixed set orders by encoding",
            value: {
                let mut s = Set::new();
                s.insert(Scalar::Text("a".into()));
                s.insert(Scalar::Int(2));
                Value::Set(s)
            },
            expected: b"li2eu1:ae",
        },
        GoldenVector {
            name: "flat dict",
            value: {
                let mut d = Dict::new();
                d.insert("b".into(), Value::from("x"));
                d.insert("a".into(), Value::from(1));
                Value::Dict(d)
            },
            expected: b"d1:ai1e1:bu1:xe",
        },
        GoldenVector {
            name: "nested profile tree",
            value: {
                let mut members = Set::new();
                members.insert(Scalar::Text("x".into()));
                members.insert(Scalar::Text("y".into()));

                let mut pic = Dict::new();
                pic.insert("key".into(), Value::from(vec![0x09; 4]));
                pic.insert("url".into(), Value::from("http://example.com/p.jpg"));

                let mut d = Dict::new();
                d.insert("members".into(), Value::Set(members));
                d.insert("pic".into(), Value::Dict(pic));
                d.insert("priority".into(), Value::from(3));
                Value::Dict(d)
            },
            expected: b"d7:memberslu1:xu1:ye3:picd3:keyb4:\x09\x09\x09\x093:urlu24:http://example.com/p.jpge8:priorityi3ee",
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use convergent_core::{canonical, ContentHash};

    #[test]
    fn test_all_vectors_encode_exactly() {
        for v in all_vectors() {
            assert_eq!(
                canonical::encode(&v.value),
                v.expected,
                "vector '{}' encoded differently",
                v.name
            );
        }
    }

    #[test]
    fn test_all_vectors_decode_back() {
        for v in all_vectors() {
            let decoded = canonical::decode(v.expected)
                .unwrap_or_else(|e| panic!("vector '{}' failed to decode: {e}", v.name));
            assert_eq!(decoded, v.value, "vector '{}' decoded differently", v.name);
        }
    }

    #[test]
    fn test_vector_hashes_are_stable_across_runs() {
        for v in all_vectors() {
            let h1 = ContentHash::hash(v.expected);
            let h2 = ContentHash::hash(&canonical::encode(&v.value));
            assert_eq!(h1, h2, "vector '{}' hash unstable", v.name);
        }
    }
}
