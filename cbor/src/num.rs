//! Uniform numeric operations over the polymorphic number kinds.
//!
//! Every operation is an exhaustive match over the closed set of numeric
//! variants; cross-kind comparison promotes through an exact internal form so
//! that, e.g., `10000000000000000000` and `1e19` order correctly without
//! round-off.

use crate::value::Value;
use core::cmp::Ordering;
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{Pow, Signed, ToPrimitive, Zero};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("Operation requires a numeric value")]
    NotNumeric,

    #[error("Value is NaN or infinite where a finite number is required")]
    NotANumber,

    #[error("Value does not fit the requested range")]
    Overflow,

    #[error("Conversion is not exact")]
    Inexact,

    #[error("Number too large to materialize")]
    TooLarge,
}

/// Sign of a numeric value. NaN gets its own indicator rather than -1/0/1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Negative,
    Zero,
    Positive,
    Nan,
}

// Scaled forms beyond this exponent magnitude are never materialized into a
// rational; the logarithmic bounds decide those comparisons instead.
const MATERIALIZE_LIMIT: i64 = 1 << 20;

// Fixed-point bounds for log2(10), scaled by 2^32.
const LOG2_10_LO: i64 = 14_267_572_527;
const LOG2_10_HI: i64 = 14_267_572_528;

fn pow_big(base: u32, exp: u32) -> BigInt {
    Pow::pow(BigInt::from(base), exp)
}

/// Exact mantissa/exponent decomposition of a finite double: `m * 2^e`.
pub(crate) fn f64_to_parts(v: f64) -> Option<(BigInt, i64)> {
    let bits = v.to_bits();
    let exp = ((bits >> 52) & 0x7ff) as i64;
    let frac = bits & 0x000f_ffff_ffff_ffff;
    if exp == 0x7ff {
        return None;
    }
    let (m, e) = if exp == 0 {
        (frac, -1074)
    } else {
        (frac | (1 << 52), exp - 1075)
    };
    let mut m = BigInt::from(m);
    if bits >> 63 == 1 {
        m = -m;
    }
    Some((m, e))
}

pub(crate) fn f32_to_parts(v: f32) -> Option<(BigInt, i64)> {
    f64_to_parts(v as f64)
}

/// Exact internal form of a finite numeric value, for comparison and
/// promotion. `Scaled` covers decimal fractions (base 10), bigfloats and
/// decomposed IEEE floats (base 2).
pub(crate) enum Exact {
    Int(BigInt),
    Scaled { m: BigInt, base: u32, exp: BigInt },
    Ratio(BigRational),
}

impl Exact {
    pub(crate) fn of(v: &Value) -> Option<Exact> {
        match v {
            Value::Integer(i) => Some(Exact::Int(BigInt::from(*i))),
            Value::BigInteger(b) => Some(Exact::Int(b.clone())),
            Value::Single(f) => {
                let (m, e) = f32_to_parts(*f)?;
                Some(Exact::scaled(m, 2, BigInt::from(e)))
            }
            Value::Double(f) => {
                let (m, e) = f64_to_parts(*f)?;
                Some(Exact::scaled(m, 2, BigInt::from(e)))
            }
            Value::Decimal(d) => Some(Exact::scaled(d.mantissa().clone(), 10, d.exponent().clone())),
            Value::BigFloat(b) => Some(Exact::scaled(b.mantissa().clone(), 2, b.exponent().clone())),
            Value::Rational(r) => Some(Exact::Ratio(r.clone())),
            _ => None,
        }
    }

    fn scaled(m: BigInt, base: u32, exp: BigInt) -> Exact {
        if m.is_zero() || exp.is_zero() {
            // Scaled never holds a zero mantissa or zero exponent
            if exp.is_zero() {
                Exact::Int(m)
            } else {
                Exact::Int(BigInt::zero())
            }
        } else {
            Exact::Scaled { m, base, exp }
        }
    }

    fn sign(&self) -> i8 {
        let m = match self {
            Exact::Int(m) => m,
            Exact::Scaled { m, .. } => m,
            Exact::Ratio(r) => r.numer(),
        };
        if m.is_zero() {
            0
        } else if m.is_negative() {
            -1
        } else {
            1
        }
    }

    /// `[lo, hi]` bracketing `floor(log2 |self|)`, scaled by 2^32.
    /// Caller guarantees the value is non-zero.
    fn log2_bounds(&self) -> (BigInt, BigInt) {
        match self {
            Exact::Int(m) => {
                let b = BigInt::from(m.bits());
                (((&b - 1) << 32), (b << 32))
            }
            Exact::Scaled { m, base, exp } => {
                let bits = BigInt::from(m.bits());
                let (scale_lo, scale_hi) = if *base == 2 {
                    (exp << 32, exp << 32)
                } else {
                    let x = exp * LOG2_10_LO;
                    let y = exp * LOG2_10_HI;
                    if x <= y { (x, y) } else { (y, x) }
                };
                ((((&bits - 1) << 32) + scale_lo), ((bits << 32) + scale_hi))
            }
            Exact::Ratio(r) => {
                let bn = BigInt::from(r.numer().bits());
                let bd = BigInt::from(r.denom().bits());
                (((&bn - 1 - &bd) << 32), ((bn - (bd - 1)) << 32))
            }
        }
    }

    /// Materialized rational form; `None` when the exponent is too large to
    /// compute with (in which case `log2_bounds` always decides ordering).
    pub(crate) fn to_ratio(&self) -> Option<BigRational> {
        match self {
            Exact::Int(m) => Some(BigRational::from_integer(m.clone())),
            Exact::Ratio(r) => Some(r.clone()),
            Exact::Scaled { m, base, exp } => {
                let e = exp.to_i64()?;
                if e.unsigned_abs() > MATERIALIZE_LIMIT as u64 {
                    return None;
                }
                if e >= 0 {
                    Some(BigRational::from_integer(m * pow_big(*base, e as u32)))
                } else {
                    Some(BigRational::new(m.clone(), pow_big(*base, (-e) as u32)))
                }
            }
        }
    }
}

fn cmp_exact(a: &Exact, b: &Exact) -> Ordering {
    let (sa, sb) = (a.sign(), b.sign());
    if sa != sb {
        return sa.cmp(&sb);
    }
    if sa == 0 {
        return Ordering::Equal;
    }
    let (alo, ahi) = a.log2_bounds();
    let (blo, bhi) = b.log2_bounds();
    let magnitude = if ahi < blo {
        Ordering::Less
    } else if bhi < alo {
        Ordering::Greater
    } else {
        match (a.to_ratio(), b.to_ratio()) {
            (Some(ra), Some(rb)) => return ra.cmp(&rb),
            // Exponents beyond the materialization limit with overlapping
            // magnitude brackets: the bracket endpoints break the tie
            // deterministically (true ties are only possible for values that
            // are structurally identical, which compare equal here).
            _ => ahi.cmp(&bhi).then_with(|| alo.cmp(&blo)),
        }
    };
    if sa > 0 { magnitude } else { magnitude.reverse() }
}

fn non_finite_class(v: &Value) -> Option<f64> {
    match v {
        Value::Single(f) if !f.is_finite() => Some(*f as f64),
        Value::Double(f) if !f.is_finite() => Some(*f),
        _ => None,
    }
}

/// Total numeric ordering across all seven kinds.
///
/// NaN compares equal to NaN and greater than every other number; -0.0 and
/// 0.0 compare equal; otherwise the ordering is the exact mathematical one.
/// Both arguments must be numeric.
pub(crate) fn cmp_number(a: &Value, b: &Value) -> Ordering {
    match (non_finite_class(a), non_finite_class(b)) {
        (Some(x), Some(y)) => {
            return match (x.is_nan(), y.is_nan()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            };
        }
        (Some(x), None) => {
            return if x.is_nan() || x > 0.0 {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }
        (None, Some(y)) => {
            return if y.is_nan() || y > 0.0 {
                Ordering::Less
            } else {
                Ordering::Greater
            };
        }
        (None, None) => {}
    }
    if let (Value::Integer(x), Value::Integer(y)) = (a, b) {
        return x.cmp(y);
    }
    match (Exact::of(a), Exact::of(b)) {
        (Some(ea), Some(eb)) => cmp_exact(&ea, &eb),
        // unreachable for numeric arguments; non-numbers order equal here and
        // the caller's kind rank separates them
        _ => Ordering::Equal,
    }
}

fn ratio_to_f64(r: &BigRational) -> f64 {
    let (n, d) = (r.numer(), r.denom());
    if n.is_zero() {
        return 0.0;
    }
    let bn = n.bits() as i64;
    let bd = d.bits() as i64;
    let sn = (bn - 512).max(0);
    let sd = (bd - 512).max(0);
    let nf = (n >> sn as u64).to_f64().unwrap_or(0.0);
    let df = (d >> sd as u64).to_f64().unwrap_or(1.0);
    let scale = (sn - sd).clamp(-2000, 2000) as i32;
    (nf / df) * 2f64.powi(scale)
}

impl Value {
    /// Sign of a numeric value; `None` when `self` is not a number.
    pub fn sign(&self) -> Option<Sign> {
        match self {
            Value::Integer(i) => Some(match i.cmp(&0) {
                Ordering::Less => Sign::Negative,
                Ordering::Equal => Sign::Zero,
                Ordering::Greater => Sign::Positive,
            }),
            Value::BigInteger(b) => Some(if b.is_negative() {
                Sign::Negative
            } else {
                Sign::Positive
            }),
            Value::Single(f) => Some(float_sign(*f as f64)),
            Value::Double(f) => Some(float_sign(*f)),
            Value::Decimal(d) => Some(big_sign(d.mantissa())),
            Value::BigFloat(b) => Some(big_sign(b.mantissa())),
            Value::Rational(r) => Some(big_sign(r.numer())),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.sign() == Some(Sign::Zero)
    }

    pub fn is_negative(&self) -> bool {
        self.sign() == Some(Sign::Negative)
    }

    /// Does the value represent a mathematical integer? False for
    /// non-numbers, NaN and infinities.
    pub fn is_integral(&self) -> bool {
        match self {
            Value::Integer(_) | Value::BigInteger(_) => true,
            Value::Single(f) => f.is_finite() && f.fract() == 0.0,
            Value::Double(f) => f.is_finite() && f.fract() == 0.0,
            Value::Decimal(d) => scaled_is_integral(d.mantissa(), d.exponent(), 10),
            Value::BigFloat(b) => scaled_is_integral(b.mantissa(), b.exponent(), 2),
            // reduced form always has a denominator > 1
            Value::Rational(_) => false,
            _ => false,
        }
    }

    /// Truncating conversion to `i64`; fails with [`Error::Overflow`] when
    /// the truncated value is out of range.
    pub fn as_i64(&self) -> Result<i64, Error> {
        self.as_big_integer()
            .and_then(|b| b.to_i64().ok_or(Error::Overflow))
    }

    pub fn as_i32(&self) -> Result<i32, Error> {
        self.as_big_integer()
            .and_then(|b| b.to_i32().ok_or(Error::Overflow))
    }

    pub fn as_u64(&self) -> Result<u64, Error> {
        self.as_big_integer()
            .and_then(|b| b.to_u64().ok_or(Error::Overflow))
    }

    /// Truncating conversion to an arbitrary-precision integer.
    pub fn as_big_integer(&self) -> Result<BigInt, Error> {
        match self {
            Value::Integer(i) => Ok(BigInt::from(*i)),
            Value::BigInteger(b) => Ok(b.clone()),
            Value::Single(f) => float_truncate(*f as f64),
            Value::Double(f) => float_truncate(*f),
            Value::Decimal(d) => scaled_truncate(d.mantissa(), d.exponent(), 10),
            Value::BigFloat(b) => scaled_truncate(b.mantissa(), b.exponent(), 2),
            Value::Rational(r) => Ok(r.numer() / r.denom()),
            _ => Err(Error::NotNumeric),
        }
    }

    /// Nearest-double approximation. Infinities and NaN pass through; the
    /// arbitrary-precision kinds overflow to ±infinity / underflow to zero.
    pub fn as_f64(&self) -> Result<f64, Error> {
        match self {
            Value::Integer(i) => Ok(*i as f64),
            Value::Single(f) => Ok(*f as f64),
            Value::Double(f) => Ok(*f),
            Value::BigInteger(_)
            | Value::Decimal(_)
            | Value::BigFloat(_)
            | Value::Rational(_) => {
                let exact = Exact::of(self).ok_or(Error::NotNumeric)?;
                if let Some(r) = exact.to_ratio() {
                    return Ok(ratio_to_f64(&r));
                }
                // beyond the materialization limit the magnitude is far
                // outside double range either way
                let (_, hi) = exact.log2_bounds();
                let huge = hi > (BigInt::from(2000) << 32);
                let mag = if huge { f64::INFINITY } else { 0.0 };
                Ok(if exact.sign() < 0 { -mag } else { mag })
            }
            _ => Err(Error::NotNumeric),
        }
    }

    pub fn as_f32(&self) -> Result<f32, Error> {
        match self {
            Value::Single(f) => Ok(*f),
            _ => self.as_f64().map(|f| f as f32),
        }
    }

    /// Exact promotion to decimal-fraction form (the result may be a plain
    /// integer after canonical collapse). Fails with [`Error::Inexact`] when
    /// the value has no finite decimal expansion.
    pub fn to_decimal(&self) -> Result<Value, Error> {
        match self {
            Value::Integer(_) | Value::BigInteger(_) | Value::Decimal(_) => Ok(self.clone()),
            Value::Single(f) => float_to_decimal(*f as f64),
            Value::Double(f) => float_to_decimal(*f),
            Value::BigFloat(b) => {
                let e = small_exponent(b.exponent())?;
                if e >= 0 {
                    Ok(Value::from(b.mantissa() << e as u64))
                } else {
                    let k = (-e) as u32;
                    Ok(Value::decimal(b.mantissa() * pow_big(5, k), e))
                }
            }
            Value::Rational(r) => {
                let (a, rest) = factor_out(r.denom().clone(), 2);
                let (b, rest) = factor_out(rest, 5);
                if !rest.is_one_magnitude() {
                    return Err(Error::Inexact);
                }
                let k = a.max(b);
                let m = r.numer() * pow_big(2, k - a) * pow_big(5, k - b);
                Ok(Value::decimal(m, -(k as i64)))
            }
            _ => Err(Error::NotNumeric),
        }
    }

    /// Exact promotion to bigfloat form; fails with [`Error::Inexact`] when
    /// the value is not representable as `m * 2^e`.
    pub fn to_big_float(&self) -> Result<Value, Error> {
        match self {
            Value::Integer(_) | Value::BigInteger(_) | Value::BigFloat(_) => Ok(self.clone()),
            Value::Single(f) => float_to_big_float(*f as f64),
            Value::Double(f) => float_to_big_float(*f),
            Value::Decimal(d) => {
                let e = small_exponent(d.exponent())?;
                if e >= 0 {
                    Ok(Value::from(d.mantissa() * pow_big(10, e as u32)))
                } else {
                    let five = pow_big(5, (-e) as u32);
                    if (d.mantissa() % &five).is_zero() {
                        Ok(Value::big_float(d.mantissa() / five, e))
                    } else {
                        Err(Error::Inexact)
                    }
                }
            }
            Value::Rational(r) => {
                let (a, rest) = factor_out(r.denom().clone(), 2);
                if !rest.is_one_magnitude() {
                    return Err(Error::Inexact);
                }
                Ok(Value::big_float(r.numer().clone(), -(a as i64)))
            }
            _ => Err(Error::NotNumeric),
        }
    }

    /// Exact promotion to rational form (collapsing back to an integer when
    /// the denominator reduces to one).
    pub fn to_rational(&self) -> Result<Value, Error> {
        match self {
            Value::Single(f) if !f.is_finite() => Err(Error::NotANumber),
            Value::Double(f) if !f.is_finite() => Err(Error::NotANumber),
            _ => {
                let exact = Exact::of(self).ok_or(Error::NotNumeric)?;
                let r = exact.to_ratio().ok_or(Error::TooLarge)?;
                Ok(Value::from(r))
            }
        }
    }

    pub fn negate(&self) -> Result<Value, Error> {
        match self {
            Value::Integer(i) => Ok(match i.checked_neg() {
                Some(n) => Value::Integer(n),
                None => Value::BigInteger(-BigInt::from(*i)),
            }),
            Value::BigInteger(b) => Ok(Value::from(-b)),
            Value::Single(f) => Ok(Value::Single(-f)),
            Value::Double(f) => Ok(Value::Double(-f)),
            Value::Decimal(d) => Ok(Value::decimal(-d.mantissa(), d.exponent().clone())),
            Value::BigFloat(b) => Ok(Value::big_float(-b.mantissa(), b.exponent().clone())),
            Value::Rational(r) => Ok(Value::from(-r)),
            _ => Err(Error::NotNumeric),
        }
    }

    pub fn abs(&self) -> Result<Value, Error> {
        match self {
            Value::Single(f) => Ok(Value::Single(f.abs())),
            Value::Double(f) => Ok(Value::Double(f.abs())),
            _ if self.is_negative() => self.negate(),
            _ if self.is_number() => Ok(self.clone()),
            _ => Err(Error::NotNumeric),
        }
    }

    /// Is the value a mathematical integer representable as `i64`?
    pub fn fits_in_i64(&self) -> bool {
        self.is_integral() && self.as_i64().is_ok()
    }

    pub fn fits_in_i32(&self) -> bool {
        self.is_integral() && self.as_i32().is_ok()
    }

    /// Would truncation toward zero produce a value in `i64` range?
    pub fn truncated_fits_in_i64(&self) -> bool {
        self.as_i64().is_ok()
    }

    pub fn truncated_fits_in_i32(&self) -> bool {
        self.as_i32().is_ok()
    }

    /// Is the value exactly representable as an IEEE double?
    pub fn fits_in_f64(&self) -> bool {
        match self.as_f64() {
            Err(_) => false,
            Ok(d) if d.is_nan() => matches!(self, Value::Single(f) if f.is_nan())
                || matches!(self, Value::Double(f) if f.is_nan()),
            Ok(d) if d.is_infinite() => {
                matches!(self, Value::Single(f) if f.is_infinite())
                    || matches!(self, Value::Double(f) if f.is_infinite())
            }
            Ok(d) => cmp_number(self, &Value::Double(d)) == Ordering::Equal,
        }
    }

    pub fn fits_in_f32(&self) -> bool {
        match self.as_f32() {
            Err(_) => false,
            Ok(s) if s.is_nan() => matches!(self, Value::Single(f) if f.is_nan())
                || matches!(self, Value::Double(f) if f.is_nan()),
            Ok(s) if s.is_infinite() => {
                matches!(self, Value::Single(f) if f.is_infinite())
                    || matches!(self, Value::Double(f) if f.is_infinite())
            }
            Ok(s) => cmp_number(self, &Value::Single(s)) == Ordering::Equal,
        }
    }
}

fn float_sign(f: f64) -> Sign {
    if f.is_nan() {
        Sign::Nan
    } else if f == 0.0 {
        Sign::Zero
    } else if f < 0.0 {
        Sign::Negative
    } else {
        Sign::Positive
    }
}

fn big_sign(m: &BigInt) -> Sign {
    // scaled kinds never hold a zero mantissa
    if m.is_negative() {
        Sign::Negative
    } else {
        Sign::Positive
    }
}

fn float_truncate(f: f64) -> Result<BigInt, Error> {
    let (m, e) = f64_to_parts(f).ok_or(Error::NotANumber)?;
    if e >= 0 {
        Ok(m << e as u64)
    } else {
        // BigInt division truncates toward zero
        Ok(m / (BigInt::from(1) << (-e) as u64))
    }
}

fn scaled_truncate(m: &BigInt, exp: &BigInt, base: u32) -> Result<BigInt, Error> {
    match exp.to_i64() {
        Some(e) if e >= 0 => {
            if e > MATERIALIZE_LIMIT {
                Err(Error::TooLarge)
            } else {
                Ok(m * pow_big(base, e as u32))
            }
        }
        Some(e) => {
            let k = (-e) as u64;
            // base^k > |m| once k reaches the bit length
            if k > m.bits() {
                return Ok(BigInt::zero());
            }
            Ok(m / pow_big(base, k as u32))
        }
        None => {
            if exp.is_negative() {
                Ok(BigInt::zero())
            } else {
                Err(Error::TooLarge)
            }
        }
    }
}

fn scaled_is_integral(m: &BigInt, exp: &BigInt, base: u32) -> bool {
    if !exp.is_negative() {
        return true;
    }
    let k = match (-exp).to_u64() {
        Some(k) => k,
        None => return false,
    };
    // base^k > |m| once k reaches the bit length, so divisibility is ruled out
    if k > m.bits() {
        return false;
    }
    (m % pow_big(base, k as u32)).is_zero()
}

fn float_to_decimal(f: f64) -> Result<Value, Error> {
    let (m, e) = f64_to_parts(f).ok_or(Error::NotANumber)?;
    if e >= 0 {
        Ok(Value::from(m << e as u64))
    } else {
        let k = (-e) as u32;
        // m * 5^k carries the mantissa's factors of two as trailing decimal
        // zeros; fold them back into the exponent for the minimal mantissa
        let (zeros, m) = factor_out(m * pow_big(5, k), 10);
        Ok(Value::decimal(m, e + zeros as i64))
    }
}

fn float_to_big_float(f: f64) -> Result<Value, Error> {
    let (m, e) = f64_to_parts(f).ok_or(Error::NotANumber)?;
    Ok(Value::big_float(m, e))
}

fn small_exponent(exp: &BigInt) -> Result<i64, Error> {
    match exp.to_i64() {
        Some(e) if e.unsigned_abs() <= MATERIALIZE_LIMIT as u64 => Ok(e),
        _ => Err(Error::TooLarge),
    }
}

/// Splits `n` into (multiplicity of `factor`, remaining cofactor).
fn factor_out(mut n: BigInt, factor: u32) -> (u32, BigInt) {
    let f = BigInt::from(factor);
    let mut count = 0;
    while (&n % &f).is_zero() && !n.is_zero() {
        n /= &f;
        count += 1;
    }
    (count, n)
}

trait OneMagnitude {
    fn is_one_magnitude(&self) -> bool;
}

impl OneMagnitude for BigInt {
    fn is_one_magnitude(&self) -> bool {
        self.magnitude().to_u32() == Some(1)
    }
}
