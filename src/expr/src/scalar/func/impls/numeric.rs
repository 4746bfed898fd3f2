// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Arithmetic over the numeric kinds.
//!
//! Integers of different widths combine at the wider width, integers and
//! decimals combine as decimals, and anything combined with a float is a
//! float.

use std::cmp;

use dec::Context;
use ordered_float::OrderedFloat;
use pql_ore::cast::CastLossy;
use pql_repr::adt::numeric::{self, Decimal, Numeric, DECIMAL_MAX_PRECISION};
use pql_repr::{Datum, IntWidth};

use crate::scalar::EvalError;

/// The scale kept by a division or by a capped result at minimum.
const MIN_ADJUSTED_SCALE: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl ArithOp {
    pub fn sql_name(&self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Mod => "%",
        }
    }
}

enum Operands {
    Int(IntWidth, i128, i128),
    Decimal(Decimal, Decimal),
    Float { real: bool, a: f64, b: f64 },
}

fn classify(a: &Datum, b: &Datum) -> Option<Operands> {
    let is_float = |d: &Datum| matches!(d, Datum::Float32(_) | Datum::Float64(_));
    if is_float(a) || is_float(b) {
        let real = !matches!(a, Datum::Float64(_)) && !matches!(b, Datum::Float64(_));
        return Some(Operands::Float {
            real,
            a: a.as_f64()?,
            b: b.as_f64()?,
        });
    }
    match (IntWidth::of(a), IntWidth::of(b)) {
        (Some(wa), Some(wb)) => Some(Operands::Int(
            cmp::max(wa, wb),
            i128::from(a.as_i64()?),
            i128::from(b.as_i64()?),
        )),
        _ => Some(Operands::Decimal(a.as_decimal()?, b.as_decimal()?)),
    }
}

/// Applies `op` to two numeric datums.
///
/// Returns `None` if either operand is not numeric.
pub fn arith(op: ArithOp, a: &Datum, b: &Datum) -> Option<Result<Datum, EvalError>> {
    Some(match classify(a, b)? {
        Operands::Int(width, a, b) => int_arith(op, width, a, b),
        Operands::Decimal(a, b) => decimal_arith(op, &a, &b),
        Operands::Float { real, a, b } => float_arith(op, real, a, b),
    })
}

fn int_arith(op: ArithOp, width: IntWidth, a: i128, b: i128) -> Result<Datum, EvalError> {
    // Both operands fit in an i64, so none of these overflow an i128.
    let result = match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div | ArithOp::Mod if b == 0 => return Err(EvalError::DivisionByZero),
        ArithOp::Div => a / b,
        ArithOp::Mod => a % b,
    };
    Ok(width.datum(result)?)
}

fn float_arith(op: ArithOp, real: bool, a: f64, b: f64) -> Result<Datum, EvalError> {
    let result = match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div | ArithOp::Mod if b == 0.0 => return Err(EvalError::DivisionByZero),
        ArithOp::Div => a / b,
        ArithOp::Mod => a % b,
    };
    float_datum(result, real, a.is_finite() && b.is_finite())
}

/// Constructs a `REAL` or `DOUBLE PRECISION` datum, failing if a finite
/// computation overflowed to infinity.
pub fn float_datum(value: f64, real: bool, inputs_finite: bool) -> Result<Datum, EvalError> {
    if real {
        let narrowed = f32::cast_lossy(value);
        if inputs_finite && narrowed.is_infinite() {
            return Err(EvalError::FloatOutOfRange);
        }
        Ok(Datum::Float32(OrderedFloat(narrowed)))
    } else {
        if inputs_finite && value.is_infinite() {
            return Err(EvalError::FloatOutOfRange);
        }
        Ok(Datum::Float64(OrderedFloat(value)))
    }
}

/// The precision and scale of `a op b` for decimals `a` and `b`.
pub fn decimal_result_type(op: ArithOp, a: (u8, u8), b: (u8, u8)) -> (u8, u8) {
    let (p1, s1) = (u32::from(a.0), u32::from(a.1));
    let (p2, s2) = (u32::from(b.0), u32::from(b.1));
    let (precision, scale) = match op {
        ArithOp::Add | ArithOp::Sub => {
            let scale = cmp::max(s1, s2);
            (scale + cmp::max(p1 - s1, p2 - s2) + 1, scale)
        }
        ArithOp::Mul => (p1 + p2 + 1, s1 + s2),
        ArithOp::Div => {
            let scale = cmp::max(MIN_ADJUSTED_SCALE, s1 + p2 + 1);
            (p1 - s1 + s2 + scale, scale)
        }
        ArithOp::Mod => {
            let scale = cmp::max(s1, s2);
            (cmp::min(p1 - s1, p2 - s2) + scale, scale)
        }
    };
    cap_precision(precision, scale)
}

/// Caps a derived precision at the maximum, giving up fractional digits
/// first but keeping at least a few of them.
fn cap_precision(precision: u32, scale: u32) -> (u8, u8) {
    let max = u32::from(DECIMAL_MAX_PRECISION);
    let (precision, scale) = if precision > max {
        let excess = precision - max;
        let scale = cmp::max(
            scale.saturating_sub(excess),
            cmp::min(scale, MIN_ADJUSTED_SCALE),
        );
        (max, scale)
    } else {
        (cmp::max(precision, 1), scale)
    };
    // Both are at most DECIMAL_MAX_PRECISION here.
    (
        u8::try_from(precision).unwrap_or(DECIMAL_MAX_PRECISION),
        u8::try_from(cmp::min(scale, precision)).unwrap_or(DECIMAL_MAX_PRECISION),
    )
}

fn decimal_arith(op: ArithOp, a: &Decimal, b: &Decimal) -> Result<Datum, EvalError> {
    let (precision, scale) = decimal_result_type(
        op,
        (a.precision(), a.scale()),
        (b.precision(), b.scale()),
    );
    let mut cx = numeric::cx_datum();
    let mut value = a.numeric();
    let other = b.numeric();
    match op {
        ArithOp::Add => cx.add(&mut value, &other),
        ArithOp::Sub => cx.sub(&mut value, &other),
        ArithOp::Mul => cx.mul(&mut value, &other),
        ArithOp::Div | ArithOp::Mod if other.is_zero() => return Err(EvalError::DivisionByZero),
        ArithOp::Div => cx.div(&mut value, &other),
        ArithOp::Mod => cx.rem(&mut value, &other),
    }
    check_status(&cx)?;
    Ok(Datum::Decimal(Decimal::new(value, precision, scale)?))
}

fn check_status(cx: &Context<Numeric>) -> Result<(), EvalError> {
    let status = cx.status();
    if status.overflow() || status.invalid_operation() {
        Err(EvalError::NumericFieldOverflow)
    } else {
        Ok(())
    }
}

/// Unary minus.
pub fn neg(a: &Datum) -> Option<Result<Datum, EvalError>> {
    Some(match a {
        Datum::Float32(f) => Ok(Datum::Float32(-*f)),
        Datum::Float64(f) => Ok(Datum::Float64(-*f)),
        Datum::Decimal(d) => {
            let mut cx = numeric::cx_datum();
            let mut value = d.numeric();
            cx.neg(&mut value);
            Decimal::new(value, d.precision(), d.scale())
                .map(Datum::Decimal)
                .map_err(EvalError::from)
        }
        _ => {
            let width = IntWidth::of(a)?;
            width
                .datum(-i128::from(a.as_i64()?))
                .map_err(EvalError::from)
        }
    })
}

/// `ABS`.
pub fn abs(a: &Datum) -> Option<Result<Datum, EvalError>> {
    Some(match a {
        Datum::Float32(f) => Ok(Datum::Float32(OrderedFloat(f.0.abs()))),
        Datum::Float64(f) => Ok(Datum::Float64(OrderedFloat(f.0.abs()))),
        Datum::Decimal(d) => {
            let mut cx = numeric::cx_datum();
            let mut value = d.numeric();
            cx.abs(&mut value);
            Decimal::new(value, d.precision(), d.scale())
                .map(Datum::Decimal)
                .map_err(EvalError::from)
        }
        _ => {
            let width = IntWidth::of(a)?;
            width
                .datum(i128::from(a.as_i64()?).abs())
                .map_err(EvalError::from)
        }
    })
}

/// Constructs a decimal holding `value`, rounding away fractional digits
/// beyond the maximum precision.
pub fn decimal_rounded(mut value: Numeric) -> Result<Decimal, EvalError> {
    let mut cx = numeric::cx_datum();
    cx.reduce(&mut value);
    if value.exponent() > 0 {
        cx.rescale(&mut value, &Numeric::from(0));
    }
    let precision = numeric::get_precision(&value);
    let max = u32::from(DECIMAL_MAX_PRECISION);
    if precision > max {
        let scale = numeric::get_scale(&value).saturating_sub(precision - max);
        let scale = i32::try_from(scale).map_err(|_| EvalError::NumericFieldOverflow)?;
        cx.rescale(&mut value, &Numeric::from(-scale));
    }
    check_status(&cx)?;
    Ok(Decimal::from_numeric(value)?)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use proptest::prelude::*;

    use super::*;

    fn dec(s: &str) -> Datum {
        Datum::Decimal(Decimal::from_str(s).unwrap())
    }

    #[pql_ore::test]
    fn test_int_overflow() {
        let r = arith(ArithOp::Add, &Datum::Int8(127), &Datum::Int8(1)).unwrap();
        assert_eq!(r, Err(EvalError::IntegerOutOfRange("TINYINT")));
        let r = arith(ArithOp::Add, &Datum::Int8(127), &Datum::Int16(1)).unwrap();
        assert_eq!(r, Ok(Datum::Int16(128)));
        let r = arith(ArithOp::Div, &Datum::Int32(i32::MIN), &Datum::Int32(-1)).unwrap();
        assert_eq!(r, Err(EvalError::IntegerOutOfRange("INT")));
        let r = arith(ArithOp::Mod, &Datum::Int64(7), &Datum::Int64(0)).unwrap();
        assert_eq!(r, Err(EvalError::DivisionByZero));
        assert_eq!(
            neg(&Datum::Int8(i8::MIN)).unwrap(),
            Err(EvalError::IntegerOutOfRange("TINYINT"))
        );
        assert_eq!(
            abs(&Datum::Int16(i16::MIN)).unwrap(),
            Err(EvalError::IntegerOutOfRange("SMALLINT"))
        );
        assert_eq!(abs(&Datum::Int16(-3)).unwrap(), Ok(Datum::Int16(3)));
    }

    #[pql_ore::test]
    fn test_int_division_truncates() {
        let r = arith(ArithOp::Div, &Datum::Int32(-7), &Datum::Int32(2)).unwrap();
        assert_eq!(r, Ok(Datum::Int32(-3)));
        let r = arith(ArithOp::Mod, &Datum::Int32(-7), &Datum::Int32(2)).unwrap();
        assert_eq!(r, Ok(Datum::Int32(-1)));
    }

    #[pql_ore::test]
    fn test_decimal_result_types() {
        assert_eq!(decimal_result_type(ArithOp::Add, (10, 0), (6, 5)), (16, 5));
        assert_eq!(decimal_result_type(ArithOp::Mul, (4, 2), (3, 1)), (8, 3));
        assert_eq!(decimal_result_type(ArithOp::Div, (4, 2), (3, 1)), (9, 6));
        assert_eq!(decimal_result_type(ArithOp::Mod, (4, 2), (3, 1)), (4, 2));
        assert_eq!(decimal_result_type(ArithOp::Mul, (38, 10), (38, 10)), (38, 6));
    }

    #[pql_ore::test]
    fn test_decimal_add() {
        let r = arith(ArithOp::Add, &Datum::Int32(1), &dec("2.00000"))
            .unwrap()
            .unwrap();
        match r {
            Datum::Decimal(d) => {
                assert_eq!((d.precision(), d.scale()), (16, 5));
                assert_eq!(d.to_string(), "3.00000");
            }
            other => panic!("expected a decimal, got {:?}", other),
        }
    }

    #[pql_ore::test]
    fn test_decimal_div() {
        let r = arith(ArithOp::Div, &dec("1.00"), &dec("3"))
            .unwrap()
            .unwrap();
        assert_eq!(r.to_string(), "0.333333");
        let r = arith(ArithOp::Div, &dec("1.0"), &dec("0.0")).unwrap();
        assert_eq!(r, Err(EvalError::DivisionByZero));
    }

    #[pql_ore::test]
    fn test_float_promotion() {
        let r = arith(ArithOp::Mul, &Datum::Int32(2), &Datum::from(1.5f32))
            .unwrap()
            .unwrap();
        assert_eq!(r, Datum::Float32(OrderedFloat(3.0)));
        let r = arith(ArithOp::Add, &dec("0.5"), &Datum::from(1.0f64))
            .unwrap()
            .unwrap();
        assert_eq!(r, Datum::Float64(OrderedFloat(1.5)));
        let r = arith(ArithOp::Mul, &Datum::from(f64::MAX), &Datum::from(2.0f64)).unwrap();
        assert_eq!(r, Err(EvalError::FloatOutOfRange));
        assert!(arith(ArithOp::Add, &Datum::from("a"), &Datum::Int32(1)).is_none());
    }

    proptest! {
        #[pql_ore::test]
        fn int_overflow_is_an_error(a: i8, b: i8) {
            let expected = i8::try_from(i16::from(a) * i16::from(b)).ok();
            let actual = arith(ArithOp::Mul, &Datum::Int8(a), &Datum::Int8(b)).unwrap();
            match expected {
                Some(p) => prop_assert_eq!(actual, Ok(Datum::Int8(p))),
                None => prop_assert_eq!(actual, Err(EvalError::IntegerOutOfRange("TINYINT"))),
            }
        }

        #[pql_ore::test]
        fn decimal_addition_type(
            a in -9_999i64..9_999,
            b in -9_999i64..9_999,
            s1 in 0u8..4,
            s2 in 0u8..4,
        ) {
            let typed = |v: i64, scale: u8| {
                let value = Decimal::from_str(&format!("{}E-{}", v, scale)).unwrap();
                Decimal::new(value.numeric(), 4 + scale, scale).unwrap()
            };
            let (da, db) = (typed(a, s1), typed(b, s2));
            let sum = arith(ArithOp::Add, &Datum::Decimal(da), &Datum::Decimal(db))
                .unwrap()
                .unwrap();
            let Datum::Decimal(sum) = sum else {
                panic!("expected a decimal");
            };
            let scale = cmp::max(s1, s2);
            prop_assert_eq!(sum.scale(), scale);
            prop_assert_eq!(sum.precision(), scale + 4 + 1);
        }
    }
}
