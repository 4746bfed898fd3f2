// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Functions related to the `DECIMAL` type, which is largely a wrapper
//! around [`dec`].
//!
//! A [`Decimal`] pairs an arbitrary-precision coefficient with the declared
//! `(precision, scale)` of its type. The coefficient is always stored with
//! exactly `scale` fractional digits, so rendering preserves trailing zeros.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use dec::{Context, OrderedDecimal};

use crate::error::ValueError;

/// The number of internal decimal units in a [`Numeric`] value.
pub const NUMERIC_DATUM_WIDTH: usize = 13;

/// The maximum number of digits expressable in a [`Numeric`] value.
pub const NUMERIC_DATUM_MAX_PRECISION: u8 = 39;

/// The maximum declared precision of a `DECIMAL` type.
pub const DECIMAL_MAX_PRECISION: u8 = 38;

/// The precision used for a `DECIMAL` without declared parameters.
pub const DECIMAL_DEFAULT_PRECISION: u8 = 38;

/// A numeric value.
pub type Numeric = dec::Decimal<NUMERIC_DATUM_WIDTH>;

static CX_DATUM: LazyLock<Context<Numeric>> = LazyLock::new(|| {
    let mut cx = Context::<Numeric>::default();
    cx.set_max_exponent(isize::from(NUMERIC_DATUM_MAX_PRECISION - 1))
        .unwrap();
    cx.set_min_exponent(-isize::from(NUMERIC_DATUM_MAX_PRECISION))
        .unwrap();
    cx
});

/// Returns a new context appropriate for operating on decimal datums.
pub fn cx_datum() -> Context<Numeric> {
    CX_DATUM.clone()
}

/// Returns the number of digits of `n`, counting leading zeros implied by a
/// negative exponent (e.g. `0.05` has precision 2).
pub fn get_precision(n: &Numeric) -> u32 {
    let e = n.exponent();
    if e >= 0 {
        n.digits() + e.unsigned_abs()
    } else {
        std::cmp::max(n.digits(), e.unsigned_abs())
    }
}

/// Returns the number of fractional digits of `n`.
pub fn get_scale(n: &Numeric) -> u32 {
    let exp = n.exponent();
    if exp >= 0 { 0 } else { exp.unsigned_abs() }
}

/// Returns the number of digits to the left of the decimal point.
fn integer_digits(n: &Numeric) -> u32 {
    if n.is_zero() {
        0
    } else {
        get_precision(n).saturating_sub(get_scale(n))
    }
}

/// The decimal precision needed to hold every value of an integer type of
/// the given byte width.
pub fn integer_precision(bytes: u8) -> u8 {
    match bytes {
        1 => 3,
        2 => 5,
        4 => 10,
        _ => 19,
    }
}

/// A decimal value with its declared precision and scale.
#[derive(Debug, Clone, Copy)]
pub struct Decimal {
    value: OrderedDecimal<Numeric>,
    precision: u8,
    scale: u8,
}

impl Decimal {
    /// Constructs a decimal of type `DECIMAL(precision, scale)`.
    ///
    /// The value is rounded to `scale` fractional digits. Fails if the
    /// parameters are invalid or if the value needs more than
    /// `precision - scale` integer digits.
    pub fn new(mut value: Numeric, precision: u8, scale: u8) -> Result<Decimal, ValueError> {
        if precision == 0 || precision > DECIMAL_MAX_PRECISION || scale > precision {
            return Err(ValueError::InvalidDecimalPrecision {
                precision: u32::from(precision),
                scale: u32::from(scale),
            });
        }
        if value.is_special() {
            return Err(ValueError::NumericOverflow);
        }
        let mut cx = cx_datum();
        cx.rescale(&mut value, &Numeric::from(-i32::from(scale)));
        if cx.status().invalid_operation()
            || integer_digits(&value) > u32::from(precision - scale)
        {
            return Err(ValueError::DecimalOutOfRange {
                value: value.to_standard_notation_string(),
                precision,
                scale,
            });
        }
        if value.is_zero() && value.is_negative() {
            cx.neg(&mut value);
        }
        Ok(Decimal {
            value: OrderedDecimal(value),
            precision,
            scale,
        })
    }

    /// Constructs a decimal whose type is the narrowest able to hold `value`
    /// exactly.
    pub fn from_numeric(value: Numeric) -> Result<Decimal, ValueError> {
        let scale = u8::try_from(get_scale(&value)).map_err(|_| ValueError::NumericOverflow)?;
        let digits = std::cmp::max(integer_digits(&value) + u32::from(scale), 1);
        let precision = u8::try_from(digits).map_err(|_| ValueError::NumericOverflow)?;
        if precision > DECIMAL_MAX_PRECISION {
            return Err(ValueError::NumericOverflow);
        }
        Decimal::new(value, precision, scale)
    }

    /// Constructs the decimal representation of an integer of the given byte
    /// width, e.g. `DECIMAL(3,0)` for a `TINYINT`.
    pub fn from_integer(value: i64, bytes: u8) -> Decimal {
        Decimal {
            value: OrderedDecimal(Numeric::from(value)),
            precision: integer_precision(bytes),
            scale: 0,
        }
    }

    /// The coefficient of this decimal.
    pub fn numeric(&self) -> Numeric {
        self.value.0
    }

    /// The declared precision.
    pub fn precision(&self) -> u8 {
        self.precision
    }

    /// The declared scale.
    pub fn scale(&self) -> u8 {
        self.scale
    }

    pub fn is_zero(&self) -> bool {
        self.value.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.value.0.is_negative()
    }

    /// Converts to the nearest `f64`.
    pub fn to_f64(&self) -> f64 {
        f64::from_str(&self.value.0.to_standard_notation_string()).unwrap_or(f64::NAN)
    }

    /// Returns the integer part, truncated toward zero, if it fits in an
    /// `i128`.
    pub fn trunc_i128(&self) -> Option<i128> {
        let s = self.value.0.to_standard_notation_string();
        let int_part = s.split('.').next().unwrap_or("0");
        match int_part {
            "" | "-" => Some(0),
            _ => i128::from_str(int_part).ok(),
        }
    }

    /// Returns the coefficient and scale as an exact `i128` pair, such that
    /// the value equals `coefficient * 10^-scale`.
    pub fn to_i128_parts(&self) -> Option<(i128, u32)> {
        let s = self.value.0.to_standard_notation_string();
        let scale = u32::from(self.scale);
        let digits: String = s.chars().filter(|c| *c != '.').collect();
        i128::from_str(&digits).ok().map(|c| (c, scale))
    }

    /// Total order over decimal values, ignoring declared types.
    pub fn cmp_value(&self, other: &Decimal) -> std::cmp::Ordering {
        self.value.cmp(&other.value)
    }
}

impl FromStr for Decimal {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Decimal, ValueError> {
        let mut cx = cx_datum();
        let mut n = cx
            .parse(s.trim())
            .map_err(|_| ValueError::NumericOverflow)?;
        if n.is_special() {
            return Err(ValueError::NumericOverflow);
        }
        if n.exponent() > 0 {
            cx.rescale(&mut n, &Numeric::from(0));
        }
        Decimal::from_numeric(n)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.value.0.to_standard_notation_string())
    }
}
