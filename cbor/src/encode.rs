//! CBOR encoder: [`Value`] tree in, bytes out.
//!
//! Head bytes always use the shortest argument width that fits (integers,
//! negative integers, lengths, counts and tag numbers alike). Floats are
//! emitted at their stated width; a `Double` is never silently narrowed.
//! Encoding cannot fail: the ownership model makes cyclic graphs
//! unrepresentable, and every constructible value has a wire form.

use crate::tags;
use crate::value::{Map, Value};
use core::cmp::Ordering;
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use std::io::Write;

// Indefinite-length string chunk size; text chunks shrink to the nearest
// character boundary so a multi-byte sequence is never split.
const STRING_CHUNK: usize = 4096;

#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Emit text and byte strings as indefinite-length chunk sequences.
    pub indefinite_strings: bool,
}

pub struct Encoder {
    data: Vec<u8>,
    opts: Options,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder {
    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    pub fn with_options(opts: Options) -> Self {
        Self {
            data: Vec::new(),
            opts,
        }
    }

    pub fn build(self) -> Vec<u8> {
        self.data
    }

    pub fn offset(&self) -> usize {
        self.data.len()
    }

    fn emit_uint_minor(&mut self, major: u8, val: u64) {
        if val < 24 {
            self.data.push((major << 5) | (val as u8))
        } else if val <= u8::MAX as u64 {
            self.data.push((major << 5) | 24u8);
            self.data.push(val as u8)
        } else if val <= u16::MAX as u64 {
            self.data.push((major << 5) | 25u8);
            self.data.extend((val as u16).to_be_bytes())
        } else if val <= u32::MAX as u64 {
            self.data.push((major << 5) | 26u8);
            self.data.extend((val as u32).to_be_bytes())
        } else {
            self.data.push((major << 5) | 27u8);
            self.data.extend(val.to_be_bytes())
        }
    }

    fn emit_big_integer(&mut self, v: &BigInt) {
        if let Some(u) = v.to_u64() {
            return self.emit_uint_minor(0, u);
        }
        // -1 - v covers the wire range of major type 1 down to -2^64
        let complement = BigInt::from(-1) - v;
        if let Some(u) = complement.to_u64() {
            return self.emit_uint_minor(1, u);
        }
        let (tag, magnitude) = if v.sign() == num_bigint::Sign::Minus {
            (tags::TAG_NEGATIVE_BIGNUM, complement)
        } else {
            (tags::TAG_POSITIVE_BIGNUM, v.clone())
        };
        self.emit_uint_minor(6, tag);
        let bytes = magnitude.magnitude().to_bytes_be();
        self.emit_uint_minor(2, bytes.len() as u64);
        self.data.extend_from_slice(&bytes);
    }

    fn emit_exponent_mantissa(&mut self, m: &BigInt, e: &BigInt, plain_tag: u64, big_tag: u64) {
        let tag = if e.to_i64().is_some() { plain_tag } else { big_tag };
        self.emit_uint_minor(6, tag);
        self.emit_uint_minor(4, 2);
        self.emit_integer_item(e);
        self.emit_integer_item(m);
    }

    fn emit_integer_item(&mut self, v: &BigInt) {
        match v.to_i64() {
            Some(i) => self.emit_i64(i),
            None => self.emit_big_integer(v),
        }
    }

    fn emit_i64(&mut self, v: i64) {
        if v >= 0 {
            self.emit_uint_minor(0, v as u64);
        } else {
            self.emit_uint_minor(1, Value::negative_wire_magnitude(v));
        }
    }

    fn emit_bytes(&mut self, b: &[u8]) {
        if self.opts.indefinite_strings {
            self.data.push((2 << 5) | 31);
            for chunk in b.chunks(STRING_CHUNK) {
                self.emit_uint_minor(2, chunk.len() as u64);
                self.data.extend_from_slice(chunk);
            }
            self.data.push(0xff);
        } else {
            self.emit_uint_minor(2, b.len() as u64);
            self.data.extend_from_slice(b);
        }
    }

    fn emit_text(&mut self, s: &str) {
        if self.opts.indefinite_strings {
            self.data.push((3 << 5) | 31);
            let mut rest = s;
            while !rest.is_empty() {
                let mut at = rest.len().min(STRING_CHUNK);
                while !rest.is_char_boundary(at) {
                    at -= 1;
                }
                let (chunk, tail) = rest.split_at(at);
                self.emit_uint_minor(3, chunk.len() as u64);
                self.data.extend_from_slice(chunk.as_bytes());
                rest = tail;
            }
            self.data.push(0xff);
        } else {
            self.emit_uint_minor(3, s.len() as u64);
            self.data.extend_from_slice(s.as_bytes());
        }
    }

    pub fn emit(&mut self, value: &Value) {
        match value {
            Value::Integer(v) => self.emit_i64(*v),
            Value::BigInteger(v) => self.emit_big_integer(v),
            Value::Single(v) => {
                self.data.push((7 << 5) | 26);
                self.data.extend(v.to_be_bytes());
            }
            Value::Double(v) => {
                self.data.push((7 << 5) | 27);
                self.data.extend(v.to_be_bytes());
            }
            Value::Decimal(d) => self.emit_exponent_mantissa(
                &d.mantissa,
                &d.exponent,
                tags::TAG_DECIMAL_FRACTION,
                tags::TAG_DECIMAL_FRACTION_EXTENDED,
            ),
            Value::BigFloat(b) => self.emit_exponent_mantissa(
                &b.mantissa,
                &b.exponent,
                tags::TAG_BIGFLOAT,
                tags::TAG_BIGFLOAT_EXTENDED,
            ),
            Value::Rational(r) => {
                self.emit_uint_minor(6, tags::TAG_RATIONAL);
                self.emit_uint_minor(4, 2);
                self.emit_integer_item(r.numer());
                self.emit_integer_item(r.denom());
            }
            Value::Bytes(b) => self.emit_bytes(b),
            Value::Text(s) => self.emit_text(s),
            Value::Array(items) => {
                self.emit_uint_minor(4, items.len() as u64);
                for item in items {
                    self.emit(item);
                }
            }
            Value::Map(m) => {
                self.emit_uint_minor(5, m.len() as u64);
                for (k, v) in m {
                    self.emit(k);
                    self.emit(v);
                }
            }
            Value::Simple(s) => self.emit_uint_minor(7, s.code() as u64),
            Value::Tagged(tag, inner) => {
                self.emit_uint_minor(6, *tag);
                self.emit(inner);
            }
        }
    }

    /// Deterministic profile: definite lengths only, shortest-form heads, map
    /// entries ordered by the canonical encoding of their keys
    /// (shorter first, then bytewise).
    pub fn emit_canonical(&mut self, value: &Value) {
        match value {
            Value::Bytes(b) => {
                self.emit_uint_minor(2, b.len() as u64);
                self.data.extend_from_slice(b);
            }
            Value::Text(s) => {
                self.emit_uint_minor(3, s.len() as u64);
                self.data.extend_from_slice(s.as_bytes());
            }
            Value::Array(items) => {
                self.emit_uint_minor(4, items.len() as u64);
                for item in items {
                    self.emit_canonical(item);
                }
            }
            Value::Map(m) => self.emit_canonical_map(m),
            Value::Tagged(tag, inner) => {
                self.emit_uint_minor(6, *tag);
                self.emit_canonical(inner);
            }
            v => self.emit(v),
        }
    }

    fn emit_canonical_map(&mut self, m: &Map) {
        let mut entries: Vec<(Vec<u8>, &Value)> = m
            .iter()
            .map(|(k, v)| (emit_canonical(k), v))
            .collect();
        entries.sort_by(|(a, _), (b, _)| ctap2_key_order(a, b));
        self.emit_uint_minor(5, entries.len() as u64);
        for (key, value) in entries {
            self.data.extend_from_slice(&key);
            self.emit_canonical(value);
        }
    }
}

/// CTAP2 map-key order over canonical key encodings: shorter encodings sort
/// first, equal lengths compare bytewise.
pub(crate) fn ctap2_key_order(a: &[u8], b: &[u8]) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Serializes a value with default options.
pub fn emit(value: &Value) -> Vec<u8> {
    emit_with(value, &Options::default())
}

pub fn emit_with(value: &Value, opts: &Options) -> Vec<u8> {
    let mut e = Encoder::with_options(opts.clone());
    e.emit(value);
    e.build()
}

/// Serializes a value under the deterministic canonical profile. The output
/// for a given value is byte-identical across calls.
pub fn emit_canonical(value: &Value) -> Vec<u8> {
    let mut e = Encoder::new();
    e.emit_canonical(value);
    e.build()
}

/// Serializes a value straight into a writer.
pub fn write<W: Write>(value: &Value, writer: &mut W) -> std::io::Result<()> {
    writer.write_all(&emit(value))
}
