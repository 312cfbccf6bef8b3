use super::num::{Error as NumError, Sign};
use super::value::{Error, Map, Simple, Value};
use core::cmp::Ordering;
use num_bigint::BigInt;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

#[test]
fn canonical_construction() {
    // integer representations are disjoint
    assert_eq!(Value::from(BigInt::from(5)), Value::Integer(5));
    assert_eq!(Value::from(i64::MAX as u64), Value::Integer(i64::MAX));
    assert!(matches!(Value::from(u64::MAX), Value::BigInteger(_)));

    // zero exponents and unit denominators collapse
    assert_eq!(Value::decimal(5, 0), Value::Integer(5));
    assert_eq!(Value::decimal(0, 7), Value::Integer(0));
    assert!(matches!(Value::decimal(5, -1), Value::Decimal(_)));
    assert_eq!(Value::big_float(3, 0), Value::Integer(3));
    assert_eq!(Value::rational(4, 2).unwrap(), Value::Integer(2));
    assert_eq!(Value::rational(-6, 3).unwrap(), Value::Integer(-2));
    assert!(matches!(Value::rational(1, 3).unwrap(), Value::Rational(_)));
    assert_eq!(Value::rational(1, 0), Err(Error::ZeroDenominator));
}

#[test]
fn simple_value_codes() {
    assert!(Simple::new(0).is_ok());
    assert!(Simple::new(19).is_ok());
    assert!(Simple::new(23).is_ok());
    assert!(Simple::new(32).is_ok());
    assert!(Simple::new(255).is_ok());
    for code in 24..=31 {
        assert_eq!(Simple::new(code), Err(Error::ReservedSimple(code)));
    }
    assert!(Simple::TRUE.is_reserved());
    assert!(!Simple::new(0).unwrap().is_reserved());
}

#[test]
fn map_operations() {
    let mut m = Map::new();
    assert!(m.insert(Value::from("a"), Value::Integer(1)).is_none());
    assert!(m.insert(Value::from("b"), Value::Integer(2)).is_none());
    // replacement keeps the original position
    assert_eq!(
        m.insert(Value::from("a"), Value::Integer(3)),
        Some(Value::Integer(1))
    );
    assert_eq!(
        m.keys().cloned().collect::<Vec<_>>(),
        vec![Value::from("a"), Value::from("b")]
    );
    assert_eq!(m.get(&Value::from("a")), Some(&Value::Integer(3)));
    assert!(m.contains_key(&Value::from("b")));
    assert_eq!(m.remove(&Value::from("a")), Some(Value::Integer(3)));
    assert_eq!(m.len(), 1);
    m.clear();
    assert!(m.is_empty());

    // keys are unique under value equality, not identity
    let mut m = Map::new();
    m.insert(Value::Integer(1), Value::TRUE);
    assert_eq!(m.insert(Value::Integer(1), Value::FALSE), Some(Value::TRUE));
    assert_eq!(m.len(), 1);
}

#[test]
fn tag_accessors() {
    let v = Value::Integer(7).tagged(5).tagged(4);
    assert_eq!(v.tags(), vec![4, 5]);
    assert!(v.has_tag(4));
    assert!(v.has_tag(5));
    assert!(!v.has_tag(7));
    assert_eq!(*v.untag(), Value::Integer(7));
    assert_eq!(v.into_untagged(), Value::Integer(7));
    assert_eq!(Value::Integer(7).tags(), Vec::<u64>::new());
}

#[test]
fn reserved_simples_sort_first() {
    let order = [Value::UNDEFINED, Value::NULL, Value::FALSE, Value::TRUE];
    for (i, a) in order.iter().enumerate() {
        for (j, b) in order.iter().enumerate() {
            assert_eq!(a.total_cmp(b), i.cmp(&j));
        }
    }
    // any reserved simple sorts below anything else, even negative numbers
    assert_eq!(
        Value::TRUE.total_cmp(&Value::Integer(i64::MIN)),
        Ordering::Less
    );
    assert_eq!(
        Value::Integer(0).total_cmp(&Value::UNDEFINED),
        Ordering::Greater
    );
}

#[test]
fn cross_kind_numeric_ordering() {
    assert_eq!(
        Value::Integer(1).total_cmp(&Value::Double(1.0)),
        Ordering::Equal
    );
    assert_eq!(
        Value::decimal(15, -1).total_cmp(&Value::Double(1.5)),
        Ordering::Equal
    );
    assert_eq!(
        Value::rational(1, 2).unwrap().total_cmp(&Value::Double(0.5)),
        Ordering::Equal
    );
    assert_eq!(
        Value::big_float(3, -1).total_cmp(&Value::decimal(15, -1)),
        Ordering::Equal
    );
    // exactness where doubles cannot represent the integer
    let big = Value::BigInteger((BigInt::from(1u8) << 64) + 1);
    assert_eq!(
        big.total_cmp(&Value::Double(18446744073709551616.0)),
        Ordering::Greater
    );
    // sign short-circuit across kinds
    assert_eq!(
        Value::decimal(-1, 100).total_cmp(&Value::Integer(0)),
        Ordering::Less
    );
    // huge exponents order by magnitude without materializing
    assert_eq!(
        Value::decimal(1, 1_000_000_000i64).total_cmp(&Value::from(u64::MAX)),
        Ordering::Greater
    );
    assert_eq!(
        Value::decimal(1, -1_000_000_000i64).total_cmp(&Value::decimal(1, -2)),
        Ordering::Less
    );
}

#[test]
fn nan_ordering() {
    let nan = Value::Double(f64::NAN);
    assert_eq!(nan.total_cmp(&Value::Double(f64::INFINITY)), Ordering::Greater);
    assert_eq!(nan.total_cmp(&Value::Integer(i64::MAX)), Ordering::Greater);
    assert_eq!(nan.total_cmp(&Value::Single(f32::NAN)), Ordering::Equal);
    assert_eq!(Value::Single(1.0).total_cmp(&nan), Ordering::Less);
    // but NaN still sorts below non-numbers by kind rank
    assert_eq!(nan.total_cmp(&Value::from("")), Ordering::Less);
}

#[test]
fn coarse_kind_rank() {
    let ranked = [
        Value::Integer(99),
        Value::Bytes(vec![0]),
        Value::from(""),
        Value::Array(vec![]),
        Value::Map(Map::new()),
        Value::Simple(Simple::from_raw(0)),
    ];
    for (i, a) in ranked.iter().enumerate() {
        for (j, b) in ranked.iter().enumerate() {
            assert_eq!(a.total_cmp(b), i.cmp(&j), "{a} vs {b}");
        }
    }
}

#[test]
fn structural_ordering() {
    // byte strings: plain lexicographic
    assert_eq!(
        Value::Bytes(vec![1]).total_cmp(&Value::Bytes(vec![1, 0])),
        Ordering::Less
    );
    // arrays: length first, then element-wise
    let short = Value::Array(vec![Value::Integer(9)]);
    let long = Value::Array(vec![Value::Integer(0), Value::Integer(0)]);
    assert_eq!(short.total_cmp(&long), Ordering::Less);
    // tags break ties, untagged first
    let plain = Value::Integer(1);
    let tagged = Value::Integer(1).tagged(0);
    assert_eq!(plain.total_cmp(&tagged), Ordering::Less);
    assert_eq!(
        tagged.total_cmp(&Value::Integer(1).tagged(1)),
        Ordering::Less
    );
    // the base value dominates the tags
    assert_eq!(
        Value::Integer(2).tagged(0).total_cmp(&Value::Integer(1).tagged(9)),
        Ordering::Greater
    );
}

#[test]
fn comparator_is_antisymmetric() {
    let samples = [
        Value::UNDEFINED,
        Value::NULL,
        Value::FALSE,
        Value::TRUE,
        Value::Integer(-5),
        Value::Integer(0),
        Value::from(u64::MAX),
        Value::Double(0.5),
        Value::Double(f64::NAN),
        Value::Single(-0.0),
        Value::decimal(15, -1),
        Value::big_float(3, -1),
        Value::rational(2, 3).unwrap(),
        Value::Bytes(vec![1, 2]),
        Value::from("abc"),
        Value::Array(vec![Value::Integer(1)]),
        Value::Map(Map::new()),
        Value::Simple(Simple::from_raw(40)),
        Value::Integer(1).tagged(2),
    ];
    for a in &samples {
        for b in &samples {
            assert_eq!(
                a.total_cmp(b),
                b.total_cmp(a).reverse(),
                "{a} vs {b}"
            );
            if a.total_cmp(b) == Ordering::Equal {
                for c in &samples {
                    assert_eq!(a.total_cmp(c), b.total_cmp(c), "{a} == {b} vs {c}");
                }
            }
        }
    }
}

fn hash_of(v: &Value) -> u64 {
    let mut h = DefaultHasher::new();
    v.hash(&mut h);
    h.finish()
}

#[test]
fn equality_is_stricter_than_ordering() {
    assert_ne!(Value::Integer(1), Value::Double(1.0));
    assert_ne!(Value::Single(1.0), Value::Double(1.0));
    assert_ne!(Value::Double(0.0), Value::Double(-0.0));
    assert_ne!(Value::Integer(1), Value::Integer(1).tagged(0));
    assert_eq!(
        Value::Double(0.0).total_cmp(&Value::Double(-0.0)),
        Ordering::Equal
    );
    // NaN is self-equal bitwise, so Eq is lawful
    assert_eq!(Value::Double(f64::NAN), Value::Double(f64::NAN));
}

#[test]
fn equal_values_hash_identically() {
    let mut a = Map::new();
    a.insert(Value::from("x"), Value::Integer(1));
    a.insert(Value::from("y"), Value::Integer(2));
    let mut b = Map::new();
    b.insert(Value::from("y"), Value::Integer(2));
    b.insert(Value::from("x"), Value::Integer(1));
    // maps are equal regardless of insertion order, and hashes agree
    assert_eq!(Value::Map(a.clone()), Value::Map(b.clone()));
    assert_eq!(hash_of(&Value::Map(a)), hash_of(&Value::Map(b)));

    let pairs = [
        (Value::Integer(5), Value::from(BigInt::from(5))),
        (Value::from("abc"), Value::Text("abc".into())),
        (
            Value::Array(vec![Value::TRUE]),
            Value::Array(vec![Value::TRUE]),
        ),
        (Value::Integer(1).tagged(2), Value::Integer(1).tagged(2)),
    ];
    for (x, y) in &pairs {
        assert_eq!(x, y);
        assert_eq!(hash_of(x), hash_of(y), "{x}");
    }
}

#[test]
fn signs() {
    assert_eq!(Value::Integer(-3).sign(), Some(Sign::Negative));
    assert_eq!(Value::Integer(0).sign(), Some(Sign::Zero));
    assert_eq!(Value::Double(-0.0).sign(), Some(Sign::Zero));
    assert_eq!(Value::Double(f64::NAN).sign(), Some(Sign::Nan));
    assert_eq!(Value::Double(f64::INFINITY).sign(), Some(Sign::Positive));
    assert_eq!(Value::decimal(-5, -1).sign(), Some(Sign::Negative));
    assert_eq!(Value::rational(-1, 2).unwrap().sign(), Some(Sign::Negative));
    assert_eq!(Value::from("x").sign(), None);
    assert!(Value::Integer(-1).is_negative());
    assert!(Value::Double(0.0).is_zero());
}

#[test]
fn integrality() {
    assert!(Value::Integer(7).is_integral());
    assert!(Value::Double(2.0).is_integral());
    assert!(!Value::Double(2.5).is_integral());
    assert!(!Value::Double(f64::INFINITY).is_integral());
    assert!(Value::decimal(20, -1).is_integral());
    assert!(!Value::decimal(25, -1).is_integral());
    assert!(Value::big_float(1, 10).is_integral());
    assert!(!Value::rational(1, 2).unwrap().is_integral());
    assert!(!Value::from("2").is_integral());
}

#[test]
fn narrowing_conversions() {
    assert_eq!(Value::Integer(42).as_i64(), Ok(42));
    assert_eq!(Value::Double(1.9).as_i64(), Ok(1));
    assert_eq!(Value::Double(-1.9).as_i64(), Ok(-1));
    assert_eq!(Value::decimal(25, -1).as_i64(), Ok(2));
    assert_eq!(Value::rational(7, 2).unwrap().as_i64(), Ok(3));
    assert_eq!(
        Value::BigInteger(BigInt::from(1u8) << 64).as_i64(),
        Err(NumError::Overflow)
    );
    assert_eq!(Value::Double(1e300).as_i64(), Err(NumError::Overflow));
    assert_eq!(Value::Double(f64::NAN).as_i64(), Err(NumError::NotANumber));
    assert_eq!(Value::Integer(1 << 40).as_i32(), Err(NumError::Overflow));
    assert_eq!(Value::from(u64::MAX).as_u64(), Ok(u64::MAX));
    assert_eq!(Value::Integer(-1).as_u64(), Err(NumError::Overflow));
    assert_eq!(Value::from("1").as_i64(), Err(NumError::NotNumeric));

    assert_eq!(
        Value::Double(1.5).as_big_integer(),
        Ok(BigInt::from(1))
    );
    assert_eq!(Value::Single(2.5).as_f64(), Ok(2.5));
}

#[test]
fn fits_predicates() {
    assert!(Value::Integer(i64::MAX).fits_in_i64());
    assert!(!Value::from(u64::MAX).fits_in_i64());
    assert!(Value::Double(3.0).fits_in_i64());
    assert!(!Value::Double(3.5).fits_in_i64());
    assert!(Value::Double(3.5).truncated_fits_in_i64());
    assert!(!Value::Double(1e300).truncated_fits_in_i64());
    assert!(Value::Integer(1 << 40).fits_in_i64());
    assert!(!Value::Integer(1 << 40).fits_in_i32());

    // 2^53 is the last contiguous double integer
    assert!(Value::Integer(1 << 53).fits_in_f64());
    assert!(!Value::Integer((1 << 53) + 1).fits_in_f64());
    assert!(Value::Double(0.5).fits_in_f32());
    assert!(!Value::Double(1e300).fits_in_f32());
    assert!(Value::Single(f32::NAN).fits_in_f64());
    assert!(Value::decimal(5, -1).fits_in_f64());
    assert!(!Value::decimal(1, -1).fits_in_f64());
    assert!(!Value::rational(1, 3).unwrap().fits_in_f64());
}

#[test]
fn negate_and_abs() {
    assert_eq!(Value::Integer(5).negate(), Ok(Value::Integer(-5)));
    assert_eq!(
        Value::Integer(i64::MIN).negate(),
        Ok(Value::BigInteger(BigInt::from(1u8) << 63))
    );
    assert_eq!(
        Value::BigInteger(BigInt::from(1u8) << 63).negate(),
        Ok(Value::Integer(i64::MIN))
    );
    assert_eq!(Value::Double(-2.5).abs(), Ok(Value::Double(2.5)));
    assert_eq!(Value::decimal(-15, -1).abs(), Ok(Value::decimal(15, -1)));
    assert_eq!(
        Value::rational(-1, 2).unwrap().negate(),
        Ok(Value::rational(1, 2).unwrap())
    );
    assert_eq!(Value::TRUE.negate(), Err(NumError::NotNumeric));
}

#[test]
fn promotions() {
    assert_eq!(Value::Double(0.5).to_rational(), Ok(Value::rational(1, 2).unwrap()));
    assert_eq!(Value::Double(0.5).to_decimal(), Ok(Value::decimal(5, -1)));
    assert_eq!(Value::decimal(5, -1).to_big_float(), Ok(Value::big_float(1, -1)));
    assert_eq!(
        Value::decimal(1, -1).to_big_float(),
        Err(NumError::Inexact)
    );
    assert_eq!(
        Value::rational(1, 3).unwrap().to_decimal(),
        Err(NumError::Inexact)
    );
    assert_eq!(
        Value::rational(3, 8).unwrap().to_decimal(),
        Ok(Value::decimal(375, -3))
    );
    assert_eq!(
        Value::rational(3, 8).unwrap().to_big_float(),
        Ok(Value::big_float(3, -3))
    );
    assert_eq!(Value::Integer(7).to_rational(), Ok(Value::Integer(7)));
    assert_eq!(
        Value::Double(f64::INFINITY).to_rational(),
        Err(NumError::NotANumber)
    );
}

#[test]
fn indexing() {
    let v = Value::Array(vec![Value::Integer(10), Value::Integer(20)]);
    assert_eq!(v[1], Value::Integer(20));
    assert_eq!(v.get(2), None);
    assert_eq!(Value::Integer(0).get(0), None);
}

#[test]
fn diagnostic_display() {
    assert_eq!(Value::Integer(-42).to_string(), "-42");
    assert_eq!(Value::from("a\"b").to_string(), "\"a\\\"b\"");
    assert_eq!(Value::Bytes(vec![0x01, 0xff]).to_string(), "h'01ff'");
    assert_eq!(
        Value::Array(vec![Value::TRUE, Value::NULL]).to_string(),
        "[true, null]"
    );
    assert_eq!(Value::Integer(1).tagged(2).to_string(), "2(1)");
    assert_eq!(Value::Double(f64::NAN).to_string(), "NaN");
    assert_eq!(Value::Simple(Simple::from_raw(99)).to_string(), "simple(99)");
}
