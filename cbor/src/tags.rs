//! Tag registry and per-tag extension handlers.
//!
//! A handler constrains what may appear as its tag's payload (checked from
//! the head byte, before the payload is parsed) and validates or transforms
//! the tagged value once it has been built — e.g. folding a tag 2 byte-string
//! payload into the canonical integer value. The process-wide default
//! registry is seeded with the built-in handlers on first use; decode entry
//! points can also be handed an explicit [`Registry`].

use crate::decode;
use crate::value::Value;
use num_bigint::{BigInt, Sign};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

pub const TAG_DATE_TEXT: u64 = 0;
pub const TAG_EPOCH_TIME: u64 = 1;
pub const TAG_POSITIVE_BIGNUM: u64 = 2;
pub const TAG_NEGATIVE_BIGNUM: u64 = 3;
pub const TAG_DECIMAL_FRACTION: u64 = 4;
pub const TAG_BIGFLOAT: u64 = 5;
pub const TAG_STRING_REF: u64 = 25;
pub const TAG_SHAREABLE: u64 = 28;
pub const TAG_SHARED_REF: u64 = 29;
pub const TAG_RATIONAL: u64 = 30;
pub const TAG_URI: u64 = 32;
pub const TAG_BASE64URL: u64 = 33;
pub const TAG_BASE64: u64 = 34;
pub const TAG_REGEX: u64 = 35;
pub const TAG_MIME: u64 = 36;
pub const TAG_UUID: u64 = 37;
pub const TAG_STRING_REF_NAMESPACE: u64 = 256;
pub const TAG_DECIMAL_FRACTION_EXTENDED: u64 = 264;
pub const TAG_BIGFLOAT_EXTENDED: u64 = 265;
pub const TAG_SELF_DESCRIBED: u64 = 55799;

/// Constrains the major types legal as a tag's payload.
#[derive(Debug, Clone, Copy)]
pub struct TypeFilter {
    majors: u8,
    floats: bool,
    simples: bool,
}

impl TypeFilter {
    pub const ANY: TypeFilter = TypeFilter {
        majors: 0x7f,
        floats: true,
        simples: true,
    };
    pub const TEXT: TypeFilter = TypeFilter {
        majors: 1 << 3,
        floats: false,
        simples: false,
    };
    pub const BYTES: TypeFilter = TypeFilter {
        majors: 1 << 2,
        floats: false,
        simples: false,
    };
    pub const INTEGER: TypeFilter = TypeFilter {
        majors: (1 << 0) | (1 << 1),
        floats: false,
        simples: false,
    };
    pub const UNSIGNED: TypeFilter = TypeFilter {
        majors: 1 << 0,
        floats: false,
        simples: false,
    };
    pub const ARRAY: TypeFilter = TypeFilter {
        majors: 1 << 4,
        floats: false,
        simples: false,
    };
    pub const NUMBER: TypeFilter = TypeFilter {
        majors: (1 << 0) | (1 << 1),
        floats: true,
        simples: false,
    };

    pub fn allows(&self, major: u8, minor: u8) -> bool {
        match major {
            7 => match minor {
                25..=27 => self.floats,
                _ => self.simples,
            },
            m => self.majors & (1 << m) != 0,
        }
    }
}

pub trait TagHandler: Send + Sync {
    /// Which payload shapes are acceptable; enforced from the payload's head
    /// byte before it is parsed.
    fn type_filter(&self) -> TypeFilter {
        TypeFilter::ANY
    }

    /// Validates (and possibly replaces) a freshly constructed tagged value.
    fn validate(&self, value: Value) -> Result<Value, decode::Error>;
}

#[derive(Default)]
pub struct Registry {
    handlers: HashMap<u64, Arc<dyn TagHandler>>,
}

impl Registry {
    /// An empty registry: every tag decodes as an opaque `Tagged` value.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A registry seeded with the built-in handlers.
    pub fn with_builtins() -> Self {
        let mut r = Self::default();
        r.register(TAG_DATE_TEXT, DateText);
        r.register(TAG_EPOCH_TIME, EpochTime);
        r.register(TAG_POSITIVE_BIGNUM, Bignum { negative: false });
        r.register(TAG_NEGATIVE_BIGNUM, Bignum { negative: true });
        r.register(
            TAG_DECIMAL_FRACTION,
            ExponentMantissa { base: 10, big_exponent: false },
        );
        r.register(TAG_BIGFLOAT, ExponentMantissa { base: 2, big_exponent: false });
        r.register(
            TAG_DECIMAL_FRACTION_EXTENDED,
            ExponentMantissa { base: 10, big_exponent: true },
        );
        r.register(
            TAG_BIGFLOAT_EXTENDED,
            ExponentMantissa { base: 2, big_exponent: true },
        );
        r.register(TAG_RATIONAL, Rational);
        r.register(TAG_URI, Uri);
        r.register(TAG_BASE64URL, Base64Text { url_safe: true });
        r.register(TAG_BASE64, Base64Text { url_safe: false });
        r.register(TAG_REGEX, TextOnly);
        r.register(TAG_MIME, TextOnly);
        r.register(TAG_UUID, Uuid);
        r.register(TAG_SELF_DESCRIBED, SelfDescribed);
        r
    }

    /// Stores (overwriting) the handler for a tag.
    pub fn register(&mut self, tag: u64, handler: impl TagHandler + 'static) {
        self.handlers.insert(tag, Arc::new(handler));
    }

    pub fn lookup(&self, tag: u64) -> Option<Arc<dyn TagHandler>> {
        self.handlers.get(&tag).cloned()
    }
}

static DEFAULT_REGISTRY: OnceLock<RwLock<Registry>> = OnceLock::new();

fn default_registry() -> &'static RwLock<Registry> {
    DEFAULT_REGISTRY.get_or_init(|| RwLock::new(Registry::with_builtins()))
}

/// Registers a handler in the process-wide default registry, replacing any
/// existing handler for that tag.
pub fn register(tag: u64, handler: impl TagHandler + 'static) {
    default_registry()
        .write()
        .unwrap_or_else(|e| e.into_inner())
        .register(tag, handler);
}

pub(crate) fn lookup_default(tag: u64) -> Option<Arc<dyn TagHandler>> {
    default_registry()
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .lookup(tag)
}

fn payload(value: Value) -> (u64, Value) {
    match value {
        Value::Tagged(tag, inner) => (tag, *inner),
        // handlers are invoked on freshly tagged values only
        v => (0, v),
    }
}

fn shape(tag: u64, reason: &'static str) -> decode::Error {
    decode::Error::TagPayload { tag, reason }
}

struct Bignum {
    negative: bool,
}

impl TagHandler for Bignum {
    fn type_filter(&self) -> TypeFilter {
        TypeFilter::BYTES
    }

    fn validate(&self, value: Value) -> Result<Value, decode::Error> {
        let (tag, inner) = payload(value);
        let Value::Bytes(bytes) = inner else {
            return Err(shape(tag, "expected a byte string"));
        };
        let magnitude = BigInt::from_bytes_be(Sign::Plus, &bytes);
        Ok(Value::from(if self.negative {
            BigInt::from(-1) - magnitude
        } else {
            magnitude
        }))
    }
}

struct ExponentMantissa {
    base: u32,
    big_exponent: bool,
}

impl TagHandler for ExponentMantissa {
    fn type_filter(&self) -> TypeFilter {
        TypeFilter::ARRAY
    }

    fn validate(&self, value: Value) -> Result<Value, decode::Error> {
        let (tag, inner) = payload(value);
        let Value::Array(items) = inner else {
            return Err(shape(tag, "expected a two-element array"));
        };
        let [exponent, mantissa]: [Value; 2] = items
            .try_into()
            .map_err(|_| shape(tag, "expected a two-element array"))?;
        let exponent = match exponent {
            Value::Integer(e) => BigInt::from(e),
            Value::BigInteger(e) if self.big_exponent => e,
            Value::BigInteger(_) => {
                return Err(shape(tag, "exponent out of range for this tag"));
            }
            _ => return Err(shape(tag, "exponent must be an integer")),
        };
        let mantissa = match mantissa {
            Value::Integer(m) => BigInt::from(m),
            Value::BigInteger(m) => m,
            _ => return Err(shape(tag, "mantissa must be an integer")),
        };
        Ok(if self.base == 10 {
            Value::decimal(mantissa, exponent)
        } else {
            Value::big_float(mantissa, exponent)
        })
    }
}

struct Rational;

impl TagHandler for Rational {
    fn type_filter(&self) -> TypeFilter {
        TypeFilter::ARRAY
    }

    fn validate(&self, value: Value) -> Result<Value, decode::Error> {
        let (tag, inner) = payload(value);
        let Value::Array(items) = inner else {
            return Err(shape(tag, "expected a two-element array"));
        };
        let [numerator, denominator]: [Value; 2] = items
            .try_into()
            .map_err(|_| shape(tag, "expected a two-element array"))?;
        let numerator = match numerator {
            Value::Integer(n) => BigInt::from(n),
            Value::BigInteger(n) => n,
            _ => return Err(shape(tag, "numerator must be an integer")),
        };
        let denominator = match denominator {
            Value::Integer(d) => BigInt::from(d),
            Value::BigInteger(d) => d,
            _ => return Err(shape(tag, "denominator must be an integer")),
        };
        if denominator.sign() != Sign::Plus {
            return Err(shape(tag, "denominator must be positive"));
        }
        Value::rational(numerator, denominator)
            .map_err(|_| shape(tag, "denominator must be positive"))
    }
}

struct DateText;

impl TagHandler for DateText {
    fn type_filter(&self) -> TypeFilter {
        TypeFilter::TEXT
    }

    fn validate(&self, value: Value) -> Result<Value, decode::Error> {
        match value.untag() {
            Value::Text(s) if is_rfc3339_datetime(s) => {}
            Value::Text(_) => return Err(shape(TAG_DATE_TEXT, "not an RFC 3339 date/time")),
            _ => return Err(shape(TAG_DATE_TEXT, "expected a text string")),
        }
        Ok(value)
    }
}

struct EpochTime;

impl TagHandler for EpochTime {
    fn type_filter(&self) -> TypeFilter {
        TypeFilter::NUMBER
    }

    fn validate(&self, value: Value) -> Result<Value, decode::Error> {
        if value.untag().is_number() {
            Ok(value)
        } else {
            Err(shape(TAG_EPOCH_TIME, "expected an integer or float"))
        }
    }
}

struct Uri;

impl TagHandler for Uri {
    fn type_filter(&self) -> TypeFilter {
        TypeFilter::TEXT
    }

    fn validate(&self, value: Value) -> Result<Value, decode::Error> {
        match value.untag() {
            Value::Text(s) if has_uri_scheme(s) => {}
            Value::Text(_) => return Err(shape(TAG_URI, "not a URI")),
            _ => return Err(shape(TAG_URI, "expected a text string")),
        }
        Ok(value)
    }
}

struct Base64Text {
    url_safe: bool,
}

impl TagHandler for Base64Text {
    fn type_filter(&self) -> TypeFilter {
        TypeFilter::TEXT
    }

    fn validate(&self, value: Value) -> Result<Value, decode::Error> {
        let tag = if self.url_safe { TAG_BASE64URL } else { TAG_BASE64 };
        let valid = match value.untag() {
            Value::Text(s) => s.bytes().all(|b| {
                b.is_ascii_alphanumeric()
                    || if self.url_safe {
                        b == b'-' || b == b'_'
                    } else {
                        b == b'+' || b == b'/' || b == b'='
                    }
            }),
            _ => return Err(shape(tag, "expected a text string")),
        };
        if valid {
            Ok(value)
        } else {
            Err(shape(tag, "not in the base64 alphabet"))
        }
    }
}

struct TextOnly;

impl TagHandler for TextOnly {
    fn type_filter(&self) -> TypeFilter {
        TypeFilter::TEXT
    }

    fn validate(&self, value: Value) -> Result<Value, decode::Error> {
        Ok(value)
    }
}

struct Uuid;

impl TagHandler for Uuid {
    fn type_filter(&self) -> TypeFilter {
        TypeFilter::BYTES
    }

    fn validate(&self, value: Value) -> Result<Value, decode::Error> {
        match value.untag() {
            Value::Bytes(b) if b.len() == 16 => {}
            _ => return Err(shape(TAG_UUID, "expected 16 bytes")),
        }
        Ok(value)
    }
}

/// Tag 55799 only marks the content as CBOR; it is transparent.
struct SelfDescribed;

impl TagHandler for SelfDescribed {
    fn validate(&self, value: Value) -> Result<Value, decode::Error> {
        let (_, inner) = payload(value);
        Ok(inner)
    }
}

fn has_uri_scheme(s: &str) -> bool {
    let Some(colon) = s.find(':') else {
        return false;
    };
    let scheme = &s[..colon];
    !scheme.is_empty()
        && scheme.as_bytes()[0].is_ascii_alphabetic()
        && scheme
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'-' || b == b'.')
}

// "YYYY-MM-DDTHH:MM:SS[.frac](Z|±HH:MM)", liberal about field values beyond
// basic range checks
fn is_rfc3339_datetime(s: &str) -> bool {
    let b = s.as_bytes();
    if b.len() < 20 {
        return false;
    }
    let digits = |r: core::ops::Range<usize>| b[r].iter().all(u8::is_ascii_digit);
    if !(digits(0..4)
        && b[4] == b'-'
        && digits(5..7)
        && b[7] == b'-'
        && digits(8..10)
        && (b[10] == b'T' || b[10] == b't')
        && digits(11..13)
        && b[13] == b':'
        && digits(14..16)
        && b[16] == b':'
        && digits(17..19))
    {
        return false;
    }
    let mut i = 19;
    if b[i] == b'.' {
        i += 1;
        let start = i;
        while i < b.len() && b[i].is_ascii_digit() {
            i += 1;
        }
        if i == start {
            return false;
        }
    }
    match b.get(i) {
        Some(b'Z') | Some(b'z') => i + 1 == b.len(),
        Some(b'+') | Some(b'-') => {
            i + 6 == b.len() && digits(i + 1..i + 3) && b[i + 3] == b':' && digits(i + 4..i + 6)
        }
        _ => false,
    }
}
