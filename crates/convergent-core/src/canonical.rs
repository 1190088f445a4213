//! Canonical encoding and decoding for configuration trees.
//!
//! The wire format is self-delimiting and prefix-free:
//!
//! - Int:   `i<base-10>e` (no leading zeros, no `-0`)
//! - Text:  `u<len>:<utf-8 bytes>`
//! - Bytes: `b<len>:<bytes>`
//! - Set:   `l` + members in strictly ascending encoded order + `e`
//! - Dict:  `d` + (`<len>:<key>` + value) pairs in strictly ascending
//!   key order + `e`
//!
//! Every tree has exactly one encoding, so equality of trees is equality
//! of bytes and content hashes are stable across devices. The decoder is
//! strict: it rejects any input that the encoder could not have produced
//! rather than normalizing it.

use crate::error::{CoreError, Result};
use crate::value::{Dict, Scalar, Set, Value};

/// Encode a value to its canonical byte form.
pub fn encode(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    write_value(&mut out, value);
    out
}

/// Encode a dict as a canonical top-level document.
pub fn encode_dict(dict: &Dict) -> Vec<u8> {
    let mut out = Vec::new();
    write_dict(&mut out, dict);
    out
}

/// Decode a canonical byte string into a value.
///
/// Fails with [`CoreError::MalformedEncoding`] on truncation, unknown
/// tags, non-canonical integers or lengths, unordered or duplicate dict
/// keys or set members, and trailing bytes.
pub fn decode(input: &[u8]) -> Result<Value> {
    let mut d = Decoder::new(input);
    let value = d.read_value()?;
    d.expect_end()?;
    Ok(value)
}

/// Decode a canonical top-level dict document.
pub fn decode_dict(input: &[u8]) -> Result<Dict> {
    let mut d = Decoder::new(input);
    let dict = d.read_dict_body()?;
    d.expect_end()?;
    Ok(dict)
}

fn write_value(out: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Scalar(s) => write_scalar(out, s),
        Value::Set(s) => write_set(out, s),
        Value::Dict(d) => write_dict(out, d),
    }
}

pub(crate) fn write_scalar(out: &mut Vec<u8>, scalar: &Scalar) {
    match scalar {
        Scalar::Int(v) => {
            out.push(b'i');
            out.extend_from_slice(v.to_string().as_bytes());
            out.push(b'e');
        }
        Scalar::Text(v) => {
            out.push(b'u');
            out.extend_from_slice(v.len().to_string().as_bytes());
            out.push(b':');
            out.extend_from_slice(v.as_bytes());
        }
        Scalar::Bytes(v) => {
            out.push(b'b');
            out.extend_from_slice(v.len().to_string().as_bytes());
            out.push(b':');
            out.extend_from_slice(v);
        }
    }
}

fn write_set(out: &mut Vec<u8>, set: &Set) {
    out.push(b'l');
    // BTreeSet iteration is already ascending in encoded-byte order.
    for member in set {
        write_scalar(out, member);
    }
    out.push(b'e');
}

fn write_dict(out: &mut Vec<u8>, dict: &Dict) {
    out.push(b'd');
    for (key, value) in dict {
        out.extend_from_slice(key.len().to_string().as_bytes());
        out.push(b':');
        out.extend_from_slice(key.as_bytes());
        write_value(out, value);
    }
    out.push(b'e');
}

struct Decoder<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Result<u8> {
        self.input
            .get(self.pos)
            .copied()
            .ok_or_else(|| malformed("unexpected end of input"))
    }

    fn advance(&mut self) -> Result<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Ok(b)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&e| e <= self.input.len())
            .ok_or_else(|| malformed("truncated string body"))?;
        let slice = &self.input[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn expect_end(&self) -> Result<()> {
        if self.pos == self.input.len() {
            Ok(())
        } else {
            Err(malformed("trailing bytes after top-level value"))
        }
    }

    fn read_value(&mut self) -> Result<Value> {
        match self.peek()? {
            b'i' | b'u' | b'b' => self.read_scalar().map(Value::Scalar),
            b'l' => {
                self.pos += 1;
                self.read_set_body().map(Value::Set)
            }
            b'd' => {
                self.pos += 1;
                self.read_dict_entries().map(Value::Dict)
            }
            b'z' | b'm' => Err(malformed(
                "compressed and multipart frames are not supported",
            )),
            tag => Err(malformed(format!("unknown tag byte 0x{tag:02x}"))),
        }
    }

    fn read_scalar(&mut self) -> Result<Scalar> {
        match self.advance()? {
            b'i' => self.read_int().map(Scalar::Int),
            b'u' => {
                let body = self.read_string_body()?;
                let text = std::str::from_utf8(body)
                    .map_err(|_| malformed("text scalar is not valid UTF-8"))?;
                Ok(Scalar::Text(text.to_owned()))
            }
            b'b' => self.read_string_body().map(|b| Scalar::Bytes(b.to_vec())),
            tag => Err(malformed(format!(
                "expected scalar, found tag byte 0x{tag:02x}"
            ))),
        }
    }

    // Digits between 'i' and 'e', canonical decimal only.
    fn read_int(&mut self) -> Result<i64> {
        let start = self.pos;
        if self.peek()? == b'-' {
            self.pos += 1;
        }
        while self.peek()?.is_ascii_digit() {
            self.pos += 1;
        }
        let digits = &self.input[start..self.pos];
        if self.advance()? != b'e' {
            return Err(malformed("integer not terminated by 'e'"));
        }
        check_canonical_decimal(digits, true)?;
        std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(|| malformed("integer out of range"))
    }

    // `<len>:<bytes>` with the tag byte already consumed.
    fn read_string_body(&mut self) -> Result<&'a [u8]> {
        let start = self.pos;
        while self.peek()?.is_ascii_digit() {
            self.pos += 1;
        }
        let digits = &self.input[start..self.pos];
        if self.advance()? != b':' {
            return Err(malformed("length not terminated by ':'"));
        }
        check_canonical_decimal(digits, false)?;
        let len = std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .ok_or_else(|| malformed("string length out of range"))?;
        self.take(len)
    }

    // Set members must arrive in strictly ascending encoded-byte order;
    // comparing the raw consumed slices enforces that without
    // re-encoding.
    fn read_set_body(&mut self) -> Result<Set> {
        let mut set = Set::new();
        let mut prev: Option<&'a [u8]> = None;
        while self.peek()? != b'e' {
            let start = self.pos;
            let member = self.read_scalar()?;
            let raw = &self.input[start..self.pos];
            if let Some(p) = prev {
                if raw <= p {
                    return Err(malformed("set members not in ascending order"));
                }
            }
            prev = Some(raw);
            set.insert(member);
        }
        self.pos += 1;
        Ok(set)
    }

    // Top-level documents are dicts; the 'd' tag is still required.
    fn read_dict_body(&mut self) -> Result<Dict> {
        if self.advance()? != b'd' {
            return Err(malformed("document is not a dict"));
        }
        self.read_dict_entries()
    }

    fn read_dict_entries(&mut self) -> Result<Dict> {
        let mut dict = Dict::new();
        let mut prev: Option<&'a [u8]> = None;
        while self.peek()? != b'e' {
            let key_bytes = self.read_string_body()?;
            if !key_bytes.is_ascii() {
                return Err(malformed("dict key is not ASCII"));
            }
            if let Some(p) = prev {
                if key_bytes <= p {
                    return Err(malformed("dict keys not in ascending order"));
                }
            }
            prev = Some(key_bytes);
            let key = std::str::from_utf8(key_bytes)
                .map_err(|_| malformed("dict key is not ASCII"))?
                .to_owned();
            let value = self.read_value()?;
            dict.insert(key, value);
        }
        self.pos += 1;
        Ok(dict)
    }
}

fn check_canonical_decimal(digits: &[u8], signed: bool) -> Result<()> {
    let unsigned = match digits {
        [b'-', rest @ ..] if signed => {
            if rest == b"0" {
                return Err(malformed("negative zero is not canonical"));
            }
            rest
        }
        d => d,
    };
    match unsigned {
        [] => Err(malformed("empty number")),
        [b'0'] => Ok(()),
        [b'0', ..] => Err(malformed("leading zero is not canonical")),
        _ => Ok(()),
    }
}

fn malformed(msg: impl Into<String>) -> CoreError {
    CoreError::MalformedEncoding(msg.into())
}
