//! Bidirectional JSON bridge over the value model.
//!
//! Reading preserves numbers exactly: integer text becomes `Integer` (or
//! `BigInteger` past 64 bits), anything with a fraction or exponent becomes a
//! decimal fraction with the source's exact value. Writing is total but lossy
//! for kinds JSON cannot express; see [`to_string`] for the fixed mappings.

use crate::value::{Map, Simple, Value};
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use std::io::{Read, Write};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unexpected end of JSON input")]
    Eof,

    #[error("Invalid JSON at offset {0}")]
    Syntax(usize),

    #[error("Byte-order mark at start of input")]
    Bom,

    #[error("Trailing characters at offset {0}")]
    Trailing(usize),

    #[error("Invalid escape at offset {0}")]
    BadEscape(usize),

    #[error("Unpaired surrogate at offset {0}")]
    UnpairedSurrogate(usize),

    #[error("Invalid number at offset {0}")]
    BadNumber(usize),

    #[error("Invalid UTF-8 at offset {0}")]
    InvalidUtf8(usize),

    #[error("Duplicate object key at offset {0}")]
    DuplicateKey(usize),

    #[error("Nesting deeper than {0} levels")]
    TooDeep(usize),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct Options {
    /// Overwrite on duplicate object keys instead of failing.
    pub allow_duplicate_keys: bool,

    /// Nesting ceiling for arrays and objects.
    pub max_depth: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            allow_duplicate_keys: false,
            max_depth: 500,
        }
    }
}

struct Reader<'a, 'o> {
    data: &'a [u8],
    x: usize,
    opts: &'o Options,
    depth: usize,
}

impl Reader<'_, '_> {
    fn peek(&self) -> Option<u8> {
        self.data.get(self.x).copied()
    }

    fn skip_ws(&mut self) {
        while let Some(b' ' | b'\t' | b'\n' | b'\r') = self.peek() {
            self.x += 1;
        }
    }

    fn descend(&mut self) -> Result<(), Error> {
        self.depth += 1;
        if self.depth > self.opts.max_depth {
            Err(Error::TooDeep(self.opts.max_depth))
        } else {
            Ok(())
        }
    }

    fn read_value(&mut self) -> Result<Value, Error> {
        self.skip_ws();
        match self.peek().ok_or(Error::Eof)? {
            b'{' => self.read_object(),
            b'[' => self.read_array(),
            b'"' => self.read_string().map(Value::Text),
            b't' => self.literal(b"true", Value::TRUE),
            b'f' => self.literal(b"false", Value::FALSE),
            b'n' => self.literal(b"null", Value::NULL),
            b'-' | b'0'..=b'9' => self.read_number(),
            _ => Err(Error::Syntax(self.x)),
        }
    }

    fn literal(&mut self, lit: &[u8], value: Value) -> Result<Value, Error> {
        if self.data[self.x..].starts_with(lit) {
            self.x += lit.len();
            Ok(value)
        } else {
            Err(Error::Syntax(self.x))
        }
    }

    fn read_array(&mut self) -> Result<Value, Error> {
        self.descend()?;
        self.x += 1;
        let mut items = Vec::new();
        self.skip_ws();
        if self.peek() == Some(b']') {
            self.x += 1;
            self.depth -= 1;
            return Ok(Value::Array(items));
        }
        loop {
            items.push(self.read_value()?);
            self.skip_ws();
            match self.peek().ok_or(Error::Eof)? {
                b',' => self.x += 1,
                b']' => {
                    self.x += 1;
                    break;
                }
                _ => return Err(Error::Syntax(self.x)),
            }
        }
        self.depth -= 1;
        Ok(Value::Array(items))
    }

    fn read_object(&mut self) -> Result<Value, Error> {
        self.descend()?;
        self.x += 1;
        let mut map = Map::new();
        self.skip_ws();
        if self.peek() == Some(b'}') {
            self.x += 1;
            self.depth -= 1;
            return Ok(Value::Map(map));
        }
        loop {
            self.skip_ws();
            let key_at = self.x;
            if self.peek() != Some(b'"') {
                return Err(Error::Syntax(self.x));
            }
            let key = self.read_string()?;
            self.skip_ws();
            if self.peek() != Some(b':') {
                return Err(match self.peek() {
                    None => Error::Eof,
                    Some(_) => Error::Syntax(self.x),
                });
            }
            self.x += 1;
            let value = self.read_value()?;
            if map.insert(Value::Text(key), value).is_some() && !self.opts.allow_duplicate_keys {
                return Err(Error::DuplicateKey(key_at));
            }
            self.skip_ws();
            match self.peek().ok_or(Error::Eof)? {
                b',' => self.x += 1,
                b'}' => {
                    self.x += 1;
                    break;
                }
                _ => return Err(Error::Syntax(self.x)),
            }
        }
        self.depth -= 1;
        Ok(Value::Map(map))
    }

    fn read_string(&mut self) -> Result<String, Error> {
        self.x += 1; // opening quote
        let mut out = String::new();
        let mut run = self.x;
        loop {
            let at = self.x;
            match self.peek().ok_or(Error::Eof)? {
                b'"' => {
                    self.flush_run(run, at, &mut out)?;
                    self.x += 1;
                    return Ok(out);
                }
                b'\\' => {
                    self.flush_run(run, at, &mut out)?;
                    self.x += 1;
                    self.read_escape(&mut out)?;
                    run = self.x;
                }
                c if c < 0x20 => return Err(Error::Syntax(at)),
                _ => self.x += 1,
            }
        }
    }

    fn flush_run(&self, start: usize, end: usize, out: &mut String) -> Result<(), Error> {
        if start == end {
            return Ok(());
        }
        let s = core::str::from_utf8(&self.data[start..end])
            .map_err(|e| Error::InvalidUtf8(start + e.valid_up_to()))?;
        out.push_str(s);
        Ok(())
    }

    fn read_escape(&mut self, out: &mut String) -> Result<(), Error> {
        let at = self.x;
        let esc = self.peek().ok_or(Error::Eof)?;
        self.x += 1;
        let c = match esc {
            b'"' => '"',
            b'\\' => '\\',
            b'/' => '/',
            b'b' => '\u{8}',
            b'f' => '\u{c}',
            b'n' => '\n',
            b'r' => '\r',
            b't' => '\t',
            b'u' => {
                let hi = self.read_hex4()?;
                let code = match hi {
                    0xdc00..=0xdfff => return Err(Error::UnpairedSurrogate(at)),
                    0xd800..=0xdbff => {
                        if self.peek() != Some(b'\\') {
                            return Err(Error::UnpairedSurrogate(at));
                        }
                        self.x += 1;
                        if self.peek() != Some(b'u') {
                            return Err(Error::UnpairedSurrogate(at));
                        }
                        self.x += 1;
                        let lo = self.read_hex4()?;
                        if !(0xdc00..=0xdfff).contains(&lo) {
                            return Err(Error::UnpairedSurrogate(at));
                        }
                        0x10000 + ((hi - 0xd800) << 10) + (lo - 0xdc00)
                    }
                    c => c,
                };
                char::from_u32(code).ok_or(Error::BadEscape(at))?
            }
            _ => return Err(Error::BadEscape(at)),
        };
        out.push(c);
        Ok(())
    }

    fn read_hex4(&mut self) -> Result<u32, Error> {
        let at = self.x;
        if self.x + 4 > self.data.len() {
            return Err(Error::Eof);
        }
        let mut v = 0u32;
        for _ in 0..4 {
            let d = (self.data[self.x] as char)
                .to_digit(16)
                .ok_or(Error::BadEscape(at))?;
            v = (v << 4) | d;
            self.x += 1;
        }
        Ok(v)
    }

    fn read_number(&mut self) -> Result<Value, Error> {
        let start = self.x;
        let d = self.data;
        let mut x = self.x;
        let negative = d.get(x) == Some(&b'-');
        if negative {
            x += 1;
        }
        let int_start = x;
        while d.get(x).is_some_and(u8::is_ascii_digit) {
            x += 1;
        }
        if x == int_start || (d[int_start] == b'0' && x - int_start > 1) {
            return Err(Error::BadNumber(start));
        }
        let int_end = x;

        let mut frac = 0..0;
        if d.get(x) == Some(&b'.') {
            x += 1;
            let fs = x;
            while d.get(x).is_some_and(u8::is_ascii_digit) {
                x += 1;
            }
            if x == fs {
                return Err(Error::BadNumber(start));
            }
            frac = fs..x;
        }

        let mut exponent = BigInt::from(0);
        let mut has_exp = false;
        if matches!(d.get(x), Some(b'e' | b'E')) {
            has_exp = true;
            x += 1;
            let exp_neg = match d.get(x) {
                Some(b'+') => {
                    x += 1;
                    false
                }
                Some(b'-') => {
                    x += 1;
                    true
                }
                _ => false,
            };
            let es = x;
            while d.get(x).is_some_and(u8::is_ascii_digit) {
                x += 1;
            }
            if x == es {
                return Err(Error::BadNumber(start));
            }
            exponent = BigInt::parse_bytes(&d[es..x], 10).ok_or(Error::BadNumber(start))?;
            if exp_neg {
                exponent = -exponent;
            }
        }
        self.x = x;

        if frac.is_empty() && !has_exp {
            let mut m =
                BigInt::parse_bytes(&d[int_start..int_end], 10).ok_or(Error::BadNumber(start))?;
            if negative {
                m = -m;
            }
            return Ok(Value::from(m));
        }

        // exact decimal: shift the fraction into the exponent
        let mut digits = Vec::with_capacity(int_end - int_start + frac.len());
        digits.extend_from_slice(&d[int_start..int_end]);
        digits.extend_from_slice(&d[frac.clone()]);
        let mut mantissa = BigInt::parse_bytes(&digits, 10).ok_or(Error::BadNumber(start))?;
        if negative {
            mantissa = -mantissa;
        }
        Ok(Value::decimal(mantissa, exponent - frac.len() as i64))
    }
}

/// Parses one JSON value from `data`; the entire input must be consumed.
pub fn from_slice(data: &[u8], opts: &Options) -> Result<Value, Error> {
    if data.starts_with(&[0xef, 0xbb, 0xbf]) {
        return Err(Error::Bom);
    }
    let mut r = Reader {
        data,
        x: 0,
        opts,
        depth: 0,
    };
    let value = r.read_value()?;
    r.skip_ws();
    if r.x != data.len() {
        return Err(Error::Trailing(r.x));
    }
    Ok(value)
}

pub fn from_str(s: &str, opts: &Options) -> Result<Value, Error> {
    from_slice(s.as_bytes(), opts)
}

/// Reads the stream to its end and parses it as one JSON value.
pub fn read<R: Read>(mut reader: R, opts: &Options) -> Result<Value, Error> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf)?;
    from_slice(&buf, opts)
}

/// Renders a value as JSON text.
///
/// Kinds without a JSON equivalent use fixed lossy mappings: undefined and
/// non-reserved simple values render as `null`; byte strings render as
/// base64url text (tag 22 switches to base64, tag 23 to hex); other tags
/// render as their inner value; non-finite floats render as the bare tokens
/// `NaN`/`Infinity`/`-Infinity` (not standard JSON); rationals and bigfloats
/// beyond exact range fall back to a double approximation; non-text map keys
/// render as their JSON text.
pub fn to_string(value: &Value) -> String {
    let mut out = String::new();
    write_value(value, &mut out);
    out
}

/// Writes [`to_string`]'s rendering into a writer.
pub fn write<W: Write>(value: &Value, writer: &mut W) -> std::io::Result<()> {
    writer.write_all(to_string(value).as_bytes())
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Integer(i) => out.push_str(&i.to_string()),
        Value::BigInteger(b) => out.push_str(&b.to_string()),
        Value::Single(f) => write_f32(*f, out),
        Value::Double(f) => write_f64(*f, out),
        Value::Decimal(d) => write_decimal(d.mantissa(), d.exponent(), out),
        Value::BigFloat(_) | Value::Rational(_) => match value.to_decimal() {
            Ok(Value::Decimal(d)) => write_decimal(d.mantissa(), d.exponent(), out),
            Ok(v) => write_value(&v, out),
            Err(_) => write_f64(value.as_f64().unwrap_or(f64::NAN), out),
        },
        Value::Bytes(b) => {
            out.push('"');
            out.push_str(&URL_SAFE_NO_PAD.encode(b));
            out.push('"');
        }
        Value::Text(s) => write_string(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        Value::Map(m) => {
            out.push('{');
            for (i, (k, v)) in m.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                match k {
                    Value::Text(s) => write_string(s, out),
                    other => write_string(&to_string(other), out),
                }
                out.push(':');
                write_value(v, out);
            }
            out.push('}');
        }
        Value::Simple(Simple::FALSE) => out.push_str("false"),
        Value::Simple(Simple::TRUE) => out.push_str("true"),
        Value::Simple(_) => out.push_str("null"),
        Value::Tagged(22, inner) => match inner.as_ref() {
            Value::Bytes(b) => {
                out.push('"');
                out.push_str(&STANDARD.encode(b));
                out.push('"');
            }
            v => write_value(v, out),
        },
        Value::Tagged(23, inner) => match inner.as_ref() {
            Value::Bytes(b) => {
                out.push('"');
                for byte in b {
                    out.push_str(&format!("{byte:02x}"));
                }
                out.push('"');
            }
            v => write_value(v, out),
        },
        Value::Tagged(_, inner) => write_value(inner, out),
    }
}

fn write_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}

fn write_f64(f: f64, out: &mut String) {
    if f.is_nan() {
        out.push_str("NaN");
    } else if f.is_infinite() {
        out.push_str(if f < 0.0 { "-Infinity" } else { "Infinity" });
    } else if f != 0.0 && (f.abs() >= 1e21 || f.abs() < 1e-6) {
        out.push_str(&format!("{f:e}"));
    } else {
        out.push_str(&f.to_string());
    }
}

fn write_f32(f: f32, out: &mut String) {
    if f.is_nan() {
        out.push_str("NaN");
    } else if f.is_infinite() {
        out.push_str(if f < 0.0 { "-Infinity" } else { "Infinity" });
    } else if f != 0.0 && (f.abs() >= 1e21 || f.abs() < 1e-6) {
        out.push_str(&format!("{f:e}"));
    } else {
        out.push_str(&f.to_string());
    }
}

// Exact rendering: plain decimal for small negative exponents (which
// re-parse to the identical decimal), scientific form otherwise.
fn write_decimal(m: &BigInt, e: &BigInt, out: &mut String) {
    let digits = m.magnitude().to_string();
    if m.sign() == num_bigint::Sign::Minus {
        out.push('-');
    }
    let plain = e
        .to_i64()
        .filter(|e| (-(digits.len() as i64 + 30)..0).contains(e));
    match plain {
        Some(e) => {
            let k = (-e) as usize;
            if k < digits.len() {
                let (int, frac) = digits.split_at(digits.len() - k);
                out.push_str(int);
                out.push('.');
                out.push_str(frac);
            } else {
                out.push_str("0.");
                for _ in 0..k - digits.len() {
                    out.push('0');
                }
                out.push_str(&digits);
            }
        }
        None => {
            out.push_str(&digits);
            out.push('E');
            out.push_str(&e.to_string());
        }
    }
}
