// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! A time interval abstract data type.
//!
//! Intervals come in two families that never convert into each other:
//! `YEAR TO MONTH` intervals count months, `DAY TO SECOND` intervals count
//! nanoseconds. Each carries its declared leading field precision (the number
//! of digits allowed in its largest field) and, for the day-second family,
//! its fractional seconds precision.

use std::cmp::Ordering;
use std::fmt;

use pql_ore::cast::{CastLossy, TryCastFrom};
use serde::{Deserialize, Serialize};

use crate::adt::numeric::Decimal;
use crate::error::ValueError;

/// The leading field precision used when none is declared.
pub const DEFAULT_LEADING_PRECISION: u8 = 2;
/// The largest leading field precision.
pub const MAX_LEADING_PRECISION: u8 = 9;
/// The fractional seconds precision used when none is declared.
pub const DEFAULT_FRACTIONAL_PRECISION: u8 = 6;
/// The largest fractional seconds precision.
pub const MAX_FRACTIONAL_PRECISION: u8 = 9;

pub const NANOS_PER_SECOND: i128 = 1_000_000_000;
pub const NANOS_PER_MINUTE: i128 = 60 * NANOS_PER_SECOND;
pub const NANOS_PER_HOUR: i128 = 60 * NANOS_PER_MINUTE;
pub const NANOS_PER_DAY: i128 = 24 * NANOS_PER_HOUR;

/// Which family an interval belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IntervalFamily {
    YearMonth,
    DaySecond,
}

/// An interval of time.
///
/// Equality and ordering consider only the family and the magnitude, not the
/// declared precisions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum Interval {
    YearMonth {
        /// A possibly negative number of months.
        months: i64,
        precision: u8,
    },
    DaySecond {
        /// A possibly negative number of nanoseconds.
        nanos: i128,
        precision: u8,
        fractional_precision: u8,
    },
}

fn check_precision(precision: u8) -> Result<(), ValueError> {
    if precision == 0 || precision > MAX_LEADING_PRECISION {
        return Err(ValueError::InvalidIntervalPrecision(u32::from(precision)));
    }
    Ok(())
}

fn check_fractional_precision(fractional_precision: u8) -> Result<(), ValueError> {
    if fractional_precision > MAX_FRACTIONAL_PRECISION {
        return Err(ValueError::InvalidFractionalPrecision(u32::from(
            fractional_precision,
        )));
    }
    Ok(())
}

fn leading_limit(precision: u8) -> i128 {
    10i128.pow(u32::from(precision))
}

/// Truncates `nanos` toward zero to a multiple of the smallest unit allowed
/// by `fractional_precision`.
fn truncate_nanos(nanos: i128, fractional_precision: u8) -> i128 {
    let unit = 10i128.pow(u32::from(MAX_FRACTIONAL_PRECISION - fractional_precision));
    nanos / unit * unit
}

fn same_sign(fields: &[i128]) -> bool {
    !(fields.iter().any(|f| *f > 0) && fields.iter().any(|f| *f < 0))
}

impl Interval {
    /// Constructs a `YEAR TO MONTH` interval from its fields.
    ///
    /// The fields must share one sign and the year field must fit in
    /// `precision` digits.
    pub fn year_month(years: i64, months: i64, precision: u8) -> Result<Interval, ValueError> {
        check_precision(precision)?;
        if !same_sign(&[i128::from(years), i128::from(months)]) {
            return Err(ValueError::IntervalMixedSign);
        }
        let total = i128::from(years) * 12 + i128::from(months);
        Interval::from_months(total, precision)
    }

    /// Constructs a `YEAR TO MONTH` interval holding `months` months.
    pub fn from_months(months: i128, precision: u8) -> Result<Interval, ValueError> {
        check_precision(precision)?;
        if (months / 12).abs() >= leading_limit(precision) {
            return Err(ValueError::IntervalFieldOverflow { precision });
        }
        let months = i64::try_from(months).map_err(|_| ValueError::IntervalFieldOverflow { precision })?;
        Ok(Interval::YearMonth { months, precision })
    }

    /// Constructs a `DAY TO SECOND` interval from its fields.
    ///
    /// The fields must share one sign, the day field must fit in `precision`
    /// digits, and `nanoseconds` is truncated to `fractional_precision`
    /// fractional digits.
    pub fn day_second(
        days: i64,
        hours: i64,
        minutes: i64,
        seconds: i64,
        nanoseconds: i64,
        precision: u8,
        fractional_precision: u8,
    ) -> Result<Interval, ValueError> {
        let fields = [days, hours, minutes, seconds, nanoseconds].map(i128::from);
        if !same_sign(&fields) {
            return Err(ValueError::IntervalMixedSign);
        }
        let total = fields[0] * NANOS_PER_DAY
            + fields[1] * NANOS_PER_HOUR
            + fields[2] * NANOS_PER_MINUTE
            + fields[3] * NANOS_PER_SECOND
            + fields[4];
        Interval::from_nanos(total, precision, fractional_precision)
    }

    /// Constructs a `DAY TO SECOND` interval holding `nanos` nanoseconds.
    pub fn from_nanos(
        nanos: i128,
        precision: u8,
        fractional_precision: u8,
    ) -> Result<Interval, ValueError> {
        check_precision(precision)?;
        check_fractional_precision(fractional_precision)?;
        let nanos = truncate_nanos(nanos, fractional_precision);
        if (nanos / NANOS_PER_DAY).abs() >= leading_limit(precision) {
            return Err(ValueError::IntervalFieldOverflow { precision });
        }
        Ok(Interval::DaySecond {
            nanos,
            precision,
            fractional_precision,
        })
    }

    pub fn family(&self) -> IntervalFamily {
        match self {
            Interval::YearMonth { .. } => IntervalFamily::YearMonth,
            Interval::DaySecond { .. } => IntervalFamily::DaySecond,
        }
    }

    /// The declared leading field precision.
    pub fn precision(&self) -> u8 {
        match self {
            Interval::YearMonth { precision, .. } | Interval::DaySecond { precision, .. } => {
                *precision
            }
        }
    }

    /// The declared fractional seconds precision; zero for year-month
    /// intervals.
    pub fn fractional_precision(&self) -> u8 {
        match self {
            Interval::YearMonth { .. } => 0,
            Interval::DaySecond {
                fractional_precision,
                ..
            } => *fractional_precision,
        }
    }

    /// The total number of months of a year-month interval, or zero.
    pub fn total_months(&self) -> i64 {
        match self {
            Interval::YearMonth { months, .. } => *months,
            Interval::DaySecond { .. } => 0,
        }
    }

    /// The total number of nanoseconds of a day-second interval, or zero.
    pub fn total_nanos(&self) -> i128 {
        match self {
            Interval::YearMonth { .. } => 0,
            Interval::DaySecond { nanos, .. } => *nanos,
        }
    }

    pub fn is_negative(&self) -> bool {
        self.total_months() < 0 || self.total_nanos() < 0
    }

    pub fn years(&self) -> i64 {
        self.total_months() / 12
    }

    pub fn months(&self) -> i64 {
        self.total_months() % 12
    }

    pub fn days(&self) -> i128 {
        self.total_nanos() / NANOS_PER_DAY
    }

    pub fn hours(&self) -> i128 {
        self.total_nanos() % NANOS_PER_DAY / NANOS_PER_HOUR
    }

    pub fn minutes(&self) -> i128 {
        self.total_nanos() % NANOS_PER_HOUR / NANOS_PER_MINUTE
    }

    pub fn seconds(&self) -> i128 {
        self.total_nanos() % NANOS_PER_MINUTE / NANOS_PER_SECOND
    }

    /// The sub-second part, in nanoseconds.
    pub fn nanoseconds(&self) -> i128 {
        self.total_nanos() % NANOS_PER_SECOND
    }

    /// Adds two intervals of the same family.
    ///
    /// The result carries the largest leading precision and the larger
    /// fractional precision of the operands.
    pub fn checked_add(&self, other: &Interval) -> Result<Interval, ValueError> {
        match (self, other) {
            (Interval::YearMonth { months: a, .. }, Interval::YearMonth { months: b, .. }) => {
                Interval::from_months(i128::from(*a) + i128::from(*b), MAX_LEADING_PRECISION)
            }
            (
                Interval::DaySecond {
                    nanos: a,
                    fractional_precision: fa,
                    ..
                },
                Interval::DaySecond {
                    nanos: b,
                    fractional_precision: fb,
                    ..
                },
            ) => {
                let sum = a.checked_add(*b).ok_or(ValueError::IntervalFieldOverflow {
                    precision: MAX_LEADING_PRECISION,
                })?;
                Interval::from_nanos(sum, MAX_LEADING_PRECISION, std::cmp::max(*fa, *fb))
            }
            _ => Err(ValueError::IntervalFamilyMismatch),
        }
    }

    /// Negates the interval.
    pub fn checked_neg(&self) -> Result<Interval, ValueError> {
        match self {
            Interval::YearMonth { months, precision } => {
                Interval::from_months(-i128::from(*months), *precision)
            }
            Interval::DaySecond {
                nanos,
                precision,
                fractional_precision,
            } => Interval::from_nanos(-nanos, *precision, *fractional_precision),
        }
    }

    /// Multiplies by an exact factor `coefficient * 10^-scale`, truncating
    /// toward zero at the interval's smallest field.
    pub fn checked_mul_exact(&self, coefficient: i128, scale: u32) -> Result<Interval, ValueError> {
        let divisor = 10i128
            .checked_pow(scale)
            .ok_or(ValueError::IntervalFieldOverflow {
                precision: MAX_LEADING_PRECISION,
            })?;
        self.map_magnitude(|m| m.checked_mul(coefficient).map(|p| p / divisor))
    }

    /// Multiplies by an approximate factor, truncating toward zero.
    pub fn checked_mul_f64(&self, factor: f64) -> Result<Interval, ValueError> {
        self.map_magnitude(|m| i128::try_cast_from(f64::cast_lossy(m) * factor))
    }

    /// Divides by an exact divisor `coefficient * 10^-scale`, truncating
    /// toward zero at the interval's smallest field.
    pub fn checked_div_exact(&self, coefficient: i128, scale: u32) -> Result<Interval, ValueError> {
        if coefficient == 0 {
            return Err(ValueError::DivisionByZero);
        }
        let multiplier = 10i128
            .checked_pow(scale)
            .ok_or(ValueError::IntervalFieldOverflow {
                precision: MAX_LEADING_PRECISION,
            })?;
        self.map_magnitude(|m| m.checked_mul(multiplier).map(|p| p / coefficient))
    }

    /// Divides by an approximate divisor, truncating toward zero.
    pub fn checked_div_f64(&self, divisor: f64) -> Result<Interval, ValueError> {
        if divisor == 0.0 {
            return Err(ValueError::DivisionByZero);
        }
        self.map_magnitude(|m| i128::try_cast_from(f64::cast_lossy(m) / divisor))
    }

    /// Multiplies by a decimal factor.
    pub fn checked_mul_decimal(&self, factor: &Decimal) -> Result<Interval, ValueError> {
        match factor.to_i128_parts() {
            Some((coefficient, scale)) => self.checked_mul_exact(coefficient, scale),
            None => self.checked_mul_f64(factor.to_f64()),
        }
    }

    /// Divides by a decimal divisor.
    pub fn checked_div_decimal(&self, divisor: &Decimal) -> Result<Interval, ValueError> {
        match divisor.to_i128_parts() {
            Some((coefficient, scale)) => self.checked_div_exact(coefficient, scale),
            None => self.checked_div_f64(divisor.to_f64()),
        }
    }

    fn map_magnitude<F>(&self, f: F) -> Result<Interval, ValueError>
    where
        F: FnOnce(i128) -> Option<i128>,
    {
        let overflow = ValueError::IntervalFieldOverflow {
            precision: MAX_LEADING_PRECISION,
        };
        match self {
            Interval::YearMonth { months, .. } => {
                let months = f(i128::from(*months)).ok_or(overflow)?;
                Interval::from_months(months, MAX_LEADING_PRECISION)
            }
            Interval::DaySecond {
                nanos,
                fractional_precision,
                ..
            } => {
                let nanos = f(*nanos).ok_or(overflow)?;
                Interval::from_nanos(nanos, MAX_LEADING_PRECISION, *fractional_precision)
            }
        }
    }
}

impl PartialEq for Interval {
    fn eq(&self, other: &Interval) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Interval {}

impl PartialOrd for Interval {
    fn partial_cmp(&self, other: &Interval) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Interval {
    fn cmp(&self, other: &Interval) -> Ordering {
        self.family()
            .cmp(&other.family())
            .then_with(|| self.total_months().cmp(&other.total_months()))
            .then_with(|| self.total_nanos().cmp(&other.total_nanos()))
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let sign = if self.is_negative() { "-" } else { "" };
        match self {
            Interval::YearMonth { precision, .. } => write!(
                f,
                "INTERVAL '{}{}-{}' YEAR({}) TO MONTH",
                sign,
                self.years().abs(),
                self.months().abs(),
                precision
            ),
            Interval::DaySecond {
                precision,
                fractional_precision,
                ..
            } => {
                write!(
                    f,
                    "INTERVAL '{}{} {:02}:{:02}:{:02}",
                    sign,
                    self.days().abs(),
                    self.hours().abs(),
                    self.minutes().abs(),
                    self.seconds().abs()
                )?;
                let frac = self.nanoseconds().abs();
                if frac != 0 {
                    let digits = format!("{:09}", frac);
                    write!(f, ".{}", digits.trim_end_matches('0'))?;
                }
                write!(
                    f,
                    "' DAY({}) TO SECOND({})",
                    precision, fractional_precision
                )
            }
        }
    }
}
