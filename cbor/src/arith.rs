//! Arithmetic over two numeric values with overflow promotion.
//!
//! Results stay exact for the exact kinds: 64-bit operations that overflow
//! promote to an arbitrary-precision integer, mixed arbitrary-precision
//! operands compute through rationals, and inexact integer division yields a
//! rational. IEEE semantics apply as soon as either operand is a `Single` or
//! `Double` (so infinities and NaN propagate instead of erroring).

use crate::num::Exact;
use crate::value::Value;
use num_bigint::BigInt;
use num_traits::{Pow, ToPrimitive, Zero};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("Operand is not a number")]
    NotANumber,

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Number too large to compute")]
    TooLarge,
}

#[derive(Clone, Copy, PartialEq)]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
}

pub fn add(a: &Value, b: &Value) -> Result<Value, Error> {
    apply(Op::Add, a, b)
}

pub fn sub(a: &Value, b: &Value) -> Result<Value, Error> {
    apply(Op::Sub, a, b)
}

pub fn mul(a: &Value, b: &Value) -> Result<Value, Error> {
    apply(Op::Mul, a, b)
}

/// Division. Exact kinds divide exactly (an inexact integer quotient becomes
/// a rational); division of an exact kind by exact zero is an error, while
/// float division follows IEEE-754.
pub fn div(a: &Value, b: &Value) -> Result<Value, Error> {
    apply(Op::Div, a, b)
}

fn is_float(v: &Value) -> bool {
    matches!(v, Value::Single(_) | Value::Double(_))
}

fn apply(op: Op, a: &Value, b: &Value) -> Result<Value, Error> {
    if !a.is_number() || !b.is_number() {
        return Err(Error::NotANumber);
    }

    if is_float(a) || is_float(b) {
        let x = a.as_f64().map_err(|_| Error::NotANumber)?;
        let y = b.as_f64().map_err(|_| Error::NotANumber)?;
        let r = match op {
            Op::Add => x + y,
            Op::Sub => x - y,
            Op::Mul => x * y,
            Op::Div => x / y,
        };
        return Ok(Value::Double(r));
    }

    // fast path: both in 64-bit range
    if let (Value::Integer(x), Value::Integer(y)) = (a, b) {
        let checked = match op {
            Op::Add => x.checked_add(*y),
            Op::Sub => x.checked_sub(*y),
            Op::Mul => x.checked_mul(*y),
            Op::Div => match y {
                0 => return Err(Error::DivisionByZero),
                // checked_rem also covers i64::MIN / -1
                _ if x.checked_rem(*y) == Some(0) => x.checked_div(*y),
                _ => None,
            },
        };
        if let Some(r) = checked {
            return Ok(Value::Integer(r));
        }
        // overflow or inexact quotient: fall through to the exact path
    }

    match (a, b) {
        (Value::Integer(_) | Value::BigInteger(_), Value::Integer(_) | Value::BigInteger(_))
            if op != Op::Div =>
        {
            let x = a.as_big_integer().map_err(|_| Error::NotANumber)?;
            let y = b.as_big_integer().map_err(|_| Error::NotANumber)?;
            Ok(Value::from(match op {
                Op::Add => x + y,
                Op::Sub => x - y,
                Op::Mul => x * y,
                Op::Div => unreachable!(),
            }))
        }
        (Value::Decimal(x), Value::Decimal(y)) if op != Op::Div => {
            scaled_op(op, x.mantissa(), x.exponent(), y.mantissa(), y.exponent(), 10)
        }
        (Value::BigFloat(x), Value::BigFloat(y)) if op != Op::Div => {
            scaled_op(op, x.mantissa(), x.exponent(), y.mantissa(), y.exponent(), 2)
        }
        _ => rational_op(op, a, b),
    }
}

fn scaled_value(m: BigInt, exp: BigInt, base: u32) -> Value {
    if base == 10 {
        Value::decimal(m, exp)
    } else {
        Value::big_float(m, exp)
    }
}

fn scaled_op(
    op: Op,
    m1: &BigInt,
    e1: &BigInt,
    m2: &BigInt,
    e2: &BigInt,
    base: u32,
) -> Result<Value, Error> {
    match op {
        // exponents add without any materialization
        Op::Mul => Ok(scaled_value(m1 * m2, e1 + e2, base)),
        Op::Add | Op::Sub => {
            // align to the smaller exponent
            let (hi_m, hi_e, lo_m, lo_e, swapped) = if e1 >= e2 {
                (m1, e1, m2, e2, false)
            } else {
                (m2, e2, m1, e1, true)
            };
            let diff = (hi_e - lo_e).to_u32().ok_or(Error::TooLarge)?;
            if diff > 1 << 20 {
                return Err(Error::TooLarge);
            }
            let scaled_hi = hi_m * Pow::pow(BigInt::from(base), diff);
            let m = match (op, swapped) {
                (Op::Add, _) => scaled_hi + lo_m,
                (Op::Sub, false) => scaled_hi - lo_m,
                (Op::Sub, true) => lo_m - scaled_hi,
                _ => unreachable!(),
            };
            Ok(scaled_value(m, lo_e.clone(), base))
        }
        Op::Div => unreachable!(),
    }
}

// Mixed exact kinds and all exact division compute through rationals; the
// canonical collapse brings integer results back to integer form.
fn rational_op(op: Op, a: &Value, b: &Value) -> Result<Value, Error> {
    let x = Exact::of(a)
        .and_then(|e| e.to_ratio())
        .ok_or(Error::TooLarge)?;
    let y = Exact::of(b)
        .and_then(|e| e.to_ratio())
        .ok_or(Error::TooLarge)?;
    let r = match op {
        Op::Add => x + y,
        Op::Sub => x - y,
        Op::Mul => x * y,
        Op::Div => {
            if y.is_zero() {
                return Err(Error::DivisionByZero);
            }
            x / y
        }
    };
    Ok(Value::from(r))
}
