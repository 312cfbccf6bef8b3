//! The in-memory representation of a decoded CBOR data item.

use core::fmt;
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, ToPrimitive, Zero};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("Simple values 24..=31 are reserved")]
    ReservedSimple(u8),

    #[error("Rational denominator must not be zero")]
    ZeroDenominator,
}

/// A major type 7 simple value.
///
/// Codes 20..=23 carry the reserved meanings false/true/null/undefined; codes
/// 24..=31 are unencodable and rejected by [`Simple::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Simple(u8);

impl Simple {
    pub const FALSE: Simple = Simple(20);
    pub const TRUE: Simple = Simple(21);
    pub const NULL: Simple = Simple(22);
    pub const UNDEFINED: Simple = Simple(23);

    pub fn new(code: u8) -> Result<Self, Error> {
        match code {
            24..=31 => Err(Error::ReservedSimple(code)),
            _ => Ok(Simple(code)),
        }
    }

    /// Caller must have excluded 24..=31.
    pub(crate) const fn from_raw(code: u8) -> Self {
        Simple(code)
    }

    pub const fn code(&self) -> u8 {
        self.0
    }

    /// True for the four codes with a reserved meaning (false/true/null/undefined).
    pub const fn is_reserved(&self) -> bool {
        matches!(self.0, 20..=23)
    }
}

/// An arbitrary-precision decimal: `mantissa * 10^exponent`.
///
/// Always finite, and never constructed with a zero exponent or zero mantissa;
/// [`Value::decimal`] collapses those to a plain integer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Decimal {
    pub(crate) mantissa: BigInt,
    pub(crate) exponent: BigInt,
}

impl Decimal {
    pub fn mantissa(&self) -> &BigInt {
        &self.mantissa
    }

    pub fn exponent(&self) -> &BigInt {
        &self.exponent
    }
}

/// An arbitrary-precision binary float: `mantissa * 2^exponent`.
///
/// Same canonical-form rules as [`Decimal`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BigFloat {
    pub(crate) mantissa: BigInt,
    pub(crate) exponent: BigInt,
}

impl BigFloat {
    pub fn mantissa(&self) -> &BigInt {
        &self.mantissa
    }

    pub fn exponent(&self) -> &BigInt {
        &self.exponent
    }
}

/// An insertion-order-preserving map with keys unique under [`Value`] equality.
#[derive(Debug, Clone, Default)]
pub struct Map {
    entries: Vec<(Value, Value)>,
}

impl Map {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &Value) -> Option<&mut Value> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Inserts a pair, replacing the value in place if the key is already
    /// present (insertion position is kept). Returns the replaced value.
    pub fn insert(&mut self, key: Value, value: Value) -> Option<Value> {
        for (k, v) in &mut self.entries {
            if *k == key {
                return Some(core::mem::replace(v, value));
            }
        }
        self.entries.push((key, value));
        None
    }

    pub fn remove(&mut self, key: &Value) -> Option<Value> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn clear(&mut self) {
        self.entries.clear()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut Value> {
        self.entries.iter_mut().map(|(_, v)| v)
    }

    pub(crate) fn entries_mut(&mut self) -> &mut Vec<(Value, Value)> {
        &mut self.entries
    }
}

impl FromIterator<(Value, Value)> for Map {
    fn from_iter<I: IntoIterator<Item = (Value, Value)>>(iter: I) -> Self {
        let mut map = Map::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl<'a> IntoIterator for &'a Map {
    type Item = &'a (Value, Value);
    type IntoIter = core::slice::Iter<'a, (Value, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// A CBOR data item.
///
/// The numeric kinds are kept disjoint and canonical: an integer magnitude
/// representable as `i64` is always `Integer`, never `BigInteger`; a decimal
/// fraction or bigfloat with a zero exponent, and a rational with a unit
/// denominator, collapse to an integer at construction time.
#[derive(Debug, Clone)]
pub enum Value {
    Integer(i64),
    BigInteger(BigInt),
    Single(f32),
    Double(f64),
    Decimal(Decimal),
    BigFloat(BigFloat),
    Rational(BigRational),
    Bytes(Vec<u8>),
    Text(String),
    Array(Vec<Value>),
    Map(Map),
    Simple(Simple),
    Tagged(u64, Box<Value>),
}

impl Value {
    pub const FALSE: Value = Value::Simple(Simple::FALSE);
    pub const TRUE: Value = Value::Simple(Simple::TRUE);
    pub const NULL: Value = Value::Simple(Simple::NULL);
    pub const UNDEFINED: Value = Value::Simple(Simple::UNDEFINED);

    pub fn array() -> Value {
        Value::Array(Vec::new())
    }

    pub fn map() -> Value {
        Value::Map(Map::new())
    }

    pub fn simple(code: u8) -> Result<Value, Error> {
        Simple::new(code).map(Value::Simple)
    }

    /// `mantissa * 10^exponent`, collapsed to a plain integer when the
    /// exponent or the mantissa is zero.
    pub fn decimal(mantissa: impl Into<BigInt>, exponent: impl Into<BigInt>) -> Value {
        let mantissa = mantissa.into();
        let exponent = exponent.into();
        if exponent.is_zero() || mantissa.is_zero() {
            Value::from(mantissa)
        } else {
            Value::Decimal(Decimal { mantissa, exponent })
        }
    }

    /// `mantissa * 2^exponent`, with the same collapse rule as [`Value::decimal`].
    pub fn big_float(mantissa: impl Into<BigInt>, exponent: impl Into<BigInt>) -> Value {
        let mantissa = mantissa.into();
        let exponent = exponent.into();
        if exponent.is_zero() || mantissa.is_zero() {
            Value::from(mantissa)
        } else {
            Value::BigFloat(BigFloat { mantissa, exponent })
        }
    }

    /// `numerator / denominator`, reduced to lowest terms and collapsed to a
    /// plain integer when the reduced denominator is one.
    pub fn rational(
        numerator: impl Into<BigInt>,
        denominator: impl Into<BigInt>,
    ) -> Result<Value, Error> {
        let denominator = denominator.into();
        if denominator.is_zero() {
            return Err(Error::ZeroDenominator);
        }
        Ok(Value::from(BigRational::new(numerator.into(), denominator)))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Simple(Simple::NULL))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Simple(Simple::UNDEFINED))
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::BigInteger(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Simple(Simple::FALSE) => Some(false),
            Value::Simple(Simple::TRUE) => Some(true),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut Map> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Element at `index` of an array value, `None` for anything else.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.as_array().and_then(|a| a.get(index))
    }

    /// Wraps this value with an outermost tag.
    pub fn tagged(self, tag: u64) -> Value {
        Value::Tagged(tag, Box::new(self))
    }

    /// The tag chain, outermost first. Empty for untagged values.
    pub fn tags(&self) -> Vec<u64> {
        let mut tags = Vec::new();
        let mut v = self;
        while let Value::Tagged(t, inner) = v {
            tags.push(*t);
            v = inner;
        }
        tags
    }

    pub fn has_tag(&self, tag: u64) -> bool {
        let mut v = self;
        while let Value::Tagged(t, inner) = v {
            if *t == tag {
                return true;
            }
            v = inner;
        }
        false
    }

    /// The value beneath all tags; `self` if untagged.
    pub fn untag(&self) -> &Value {
        let mut v = self;
        while let Value::Tagged(_, inner) = v {
            v = inner;
        }
        v
    }

    pub fn into_untagged(self) -> Value {
        let mut v = self;
        while let Value::Tagged(_, inner) = v {
            v = *inner;
        }
        v
    }
}

/// Panics when the value is not an array, like slice indexing.
impl core::ops::Index<usize> for Value {
    type Output = Value;

    fn index(&self, index: usize) -> &Value {
        match self {
            Value::Array(a) => &a[index],
            _ => panic!("Indexed a non-array value"),
        }
    }
}

impl core::ops::IndexMut<usize> for Value {
    fn index_mut(&mut self, index: usize) -> &mut Value {
        match self {
            Value::Array(a) => &mut a[index],
            _ => panic!("Indexed a non-array value"),
        }
    }
}

macro_rules! impl_small_int_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Value {
                    Value::Integer(v as i64)
                }
            }
        )*
    };
}

impl_small_int_from!(u8, u16, u32, i8, i16, i32, i64);

impl From<u64> for Value {
    fn from(v: u64) -> Value {
        match i64::try_from(v) {
            Ok(i) => Value::Integer(i),
            Err(_) => Value::BigInteger(BigInt::from(v)),
        }
    }
}

impl From<BigInt> for Value {
    fn from(v: BigInt) -> Value {
        match v.to_i64() {
            Some(i) => Value::Integer(i),
            None => Value::BigInteger(v),
        }
    }
}

impl From<BigRational> for Value {
    fn from(v: BigRational) -> Value {
        if v.denom().is_one() {
            Value::from(v.numer().clone())
        } else {
            Value::Rational(v)
        }
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Value {
        Value::Single(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Value {
        Value::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Value {
        if v { Value::TRUE } else { Value::FALSE }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Value {
        Value::Text(v.into())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Value {
        Value::Text(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Value {
        Value::Bytes(v.into())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Value {
        Value::Bytes(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Value {
        Value::Array(v)
    }
}

impl From<Map> for Value {
    fn from(v: Map) -> Value {
        Value::Map(v)
    }
}

fn fmt_text(s: &str, f: &mut fmt::Formatter) -> fmt::Result {
    f.write_str("\"")?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            c => write!(f, "{c}")?,
        }
    }
    f.write_str("\"")
}

/// Diagnostic-notation rendering, close to RFC 8949 §8.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{v}"),
            Value::BigInteger(v) => write!(f, "{v}"),
            Value::Single(v) if v.is_nan() => f.write_str("NaN"),
            Value::Single(v) if v.is_infinite() => {
                f.write_str(if v.is_sign_negative() { "-Infinity" } else { "Infinity" })
            }
            Value::Single(v) => write!(f, "{v}_2"),
            Value::Double(v) if v.is_nan() => f.write_str("NaN"),
            Value::Double(v) if v.is_infinite() => {
                f.write_str(if v.is_sign_negative() { "-Infinity" } else { "Infinity" })
            }
            Value::Double(v) => write!(f, "{v}"),
            Value::Decimal(d) => write!(f, "{}e{}", d.mantissa, d.exponent),
            Value::BigFloat(b) => write!(f, "{}p{}", b.mantissa, b.exponent),
            Value::Rational(r) => write!(f, "{}/{}", r.numer(), r.denom()),
            Value::Bytes(b) => {
                f.write_str("h'")?;
                for byte in b {
                    write!(f, "{byte:02x}")?;
                }
                f.write_str("'")
            }
            Value::Text(s) => fmt_text(s, f),
            Value::Array(a) => {
                f.write_str("[")?;
                for (i, v) in a.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
            Value::Map(m) => {
                f.write_str("{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
            Value::Simple(Simple::FALSE) => f.write_str("false"),
            Value::Simple(Simple::TRUE) => f.write_str("true"),
            Value::Simple(Simple::NULL) => f.write_str("null"),
            Value::Simple(Simple::UNDEFINED) => f.write_str("undefined"),
            Value::Simple(s) => write!(f, "simple({})", s.code()),
            Value::Tagged(t, v) => write!(f, "{t}({v})"),
        }
    }
}

impl Value {
    /// Magnitude of a negative value as encoded by major type 1 (`-1 - n`).
    pub(crate) fn negative_wire_magnitude(v: i64) -> u64 {
        debug_assert!(v < 0);
        !(v as u64)
    }

    /// Is `self` one of the seven numeric kinds?
    pub fn is_number(&self) -> bool {
        matches!(
            self,
            Value::Integer(_)
                | Value::BigInteger(_)
                | Value::Single(_)
                | Value::Double(_)
                | Value::Decimal(_)
                | Value::BigFloat(_)
                | Value::Rational(_)
        )
    }
}

pub(crate) fn neg_from_wire(n: u64) -> Value {
    // major type 1: value is -1 - n
    match i64::try_from(n) {
        Ok(i) => Value::Integer(-1 - i),
        Err(_) => Value::BigInteger(BigInt::from(-1) - BigInt::from(n)),
    }
}
