//! Ordering, equality and hashing over the value model.
//!
//! Equality is structural and stricter than the total order: `1` and `1.0`
//! compare equal under [`Value::total_cmp`] but are not `==`, and floats are
//! equal only bit-for-bit (so `Eq` and `Hash` stay lawful).

use crate::num::cmp_number;
use crate::value::{Map, Value};
use core::cmp::Ordering;
use core::hash::{Hash, Hasher};

fn reserved_rank(v: &Value) -> Option<u8> {
    match v {
        Value::Simple(s) => match s.code() {
            23 => Some(0), // undefined
            22 => Some(1), // null
            20 => Some(2), // false
            21 => Some(3), // true
            _ => None,
        },
        _ => None,
    }
}

// Coarse cross-kind rank; map key ordering depends on this staying fixed.
fn kind_rank(v: &Value) -> u8 {
    match v {
        _ if v.is_number() => 0,
        Value::Bytes(_) => 1,
        Value::Text(_) => 2,
        Value::Array(_) => 3,
        Value::Map(_) => 4,
        Value::Simple(_) => 5,
        // bases are peeled before ranking
        Value::Tagged(..) => 6,
        _ => 0,
    }
}

fn seq_cmp(a: &[Value], b: &[Value]) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| {
        for (x, y) in a.iter().zip(b) {
            match x.total_cmp(y) {
                Ordering::Equal => {}
                other => return other,
            }
        }
        Ordering::Equal
    })
}

fn map_cmp(a: &Map, b: &Map) -> Ordering {
    let sorted = |m: &Map| {
        let mut entries: Vec<(Value, Value)> = m.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        entries.sort_by(|x, y| x.0.total_cmp(&y.0));
        entries
    };
    let ea = sorted(a);
    let eb = sorted(b);
    a.len()
        .cmp(&b.len())
        .then_with(|| {
            for ((ka, _), (kb, _)) in ea.iter().zip(&eb) {
                match ka.total_cmp(kb) {
                    Ordering::Equal => {}
                    other => return other,
                }
            }
            Ordering::Equal
        })
        .then_with(|| {
            for ((_, va), (_, vb)) in ea.iter().zip(&eb) {
                match va.total_cmp(vb) {
                    Ordering::Equal => {}
                    other => return other,
                }
            }
            Ordering::Equal
        })
}

fn base_cmp(a: &Value, b: &Value) -> Ordering {
    match (reserved_rank(a), reserved_rank(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => {
            if a.is_number() && b.is_number() {
                return cmp_number(a, b);
            }
            kind_rank(a).cmp(&kind_rank(b)).then_with(|| match (a, b) {
                (Value::Bytes(x), Value::Bytes(y)) => x.cmp(y),
                (Value::Text(x), Value::Text(y)) => x.cmp(y),
                (Value::Array(x), Value::Array(y)) => seq_cmp(x, y),
                (Value::Map(x), Value::Map(y)) => map_cmp(x, y),
                (Value::Simple(x), Value::Simple(y)) => x.code().cmp(&y.code()),
                _ => Ordering::Equal,
            })
        }
    }
}

impl Value {
    /// Total order across all kinds.
    ///
    /// Policy: the four reserved simple values sort first
    /// (undefined < null < false < true); numbers compare numerically across
    /// kinds; remaining kinds rank
    /// numbers < byte strings < text strings < arrays < maps < simple values;
    /// equal bases are ordered by their tag chains, outermost first, with
    /// untagged before tagged.
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        base_cmp(self.untag(), other.untag()).then_with(|| self.tags().cmp(&other.tags()))
    }
}

fn map_eq(a: &Map, b: &Map) -> bool {
    a.len() == b.len() && a.iter().all(|(k, v)| b.get(k) == Some(v))
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::BigInteger(a), Value::BigInteger(b)) => a == b,
            (Value::Single(a), Value::Single(b)) => a.to_bits() == b.to_bits(),
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::BigFloat(a), Value::BigFloat(b)) => a == b,
            (Value::Rational(a), Value::Rational(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => map_eq(a, b),
            (Value::Simple(a), Value::Simple(b)) => a == b,
            (Value::Tagged(ta, va), Value::Tagged(tb, vb)) => ta == tb && va == vb,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl PartialEq for Map {
    fn eq(&self, other: &Map) -> bool {
        map_eq(self, other)
    }
}

impl Eq for Map {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Integer(v) => {
                state.write_u8(0);
                v.hash(state);
            }
            Value::BigInteger(v) => {
                state.write_u8(1);
                v.hash(state);
            }
            Value::Single(v) => {
                state.write_u8(2);
                v.to_bits().hash(state);
            }
            Value::Double(v) => {
                state.write_u8(3);
                v.to_bits().hash(state);
            }
            Value::Decimal(d) => {
                state.write_u8(4);
                d.mantissa().hash(state);
                d.exponent().hash(state);
            }
            Value::BigFloat(b) => {
                state.write_u8(5);
                b.mantissa().hash(state);
                b.exponent().hash(state);
            }
            Value::Rational(r) => {
                state.write_u8(6);
                r.numer().hash(state);
                r.denom().hash(state);
            }
            Value::Bytes(b) => {
                state.write_u8(7);
                b.hash(state);
            }
            Value::Text(s) => {
                state.write_u8(8);
                s.hash(state);
            }
            Value::Array(a) => {
                state.write_u8(9);
                state.write_usize(a.len());
                for v in a {
                    v.hash(state);
                }
            }
            // count-based: maps have no stable key order to fold in
            Value::Map(m) => {
                state.write_u8(10);
                state.write_usize(m.len());
            }
            Value::Simple(s) => {
                state.write_u8(11);
                state.write_u8(s.code());
            }
            Value::Tagged(t, v) => {
                state.write_u8(12);
                t.hash(state);
                v.hash(state);
            }
        }
    }
}
