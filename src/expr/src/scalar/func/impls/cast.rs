// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! `CAST`.

use chrono::{FixedOffset, NaiveDateTime, TimeZone};
use ordered_float::OrderedFloat;
use pql_repr::adt::datetime::TimeTz;
use pql_repr::adt::interval::Interval;
use pql_repr::adt::numeric::{self, Decimal};
use pql_repr::{strconv, Datum, IntWidth, PType};

use crate::scalar::func::impls::numeric::float_datum;
use crate::scalar::EvalError;

/// Converts `d` to the type `to`.
///
/// Absent values cast to themselves. Values that cannot be represented in
/// the target type, or whose kind has no conversion to it, are errors.
pub fn cast(d: &Datum, to: &PType) -> Result<Datum, EvalError> {
    if d.is_absent() || matches!(to, PType::Dynamic) {
        return Ok(d.clone());
    }
    let invalid = || EvalError::InvalidCast {
        from: d.type_name().to_owned(),
        to: to.to_string(),
    };
    match to {
        PType::Dynamic => Ok(d.clone()),
        PType::Null => Ok(Datum::Null),
        PType::Missing => Ok(Datum::Missing),
        PType::Bool => match d {
            Datum::Bool(b) => Ok(Datum::Bool(*b)),
            Datum::Char(s) | Datum::String(s) => Ok(Datum::Bool(strconv::parse_bool(s)?)),
            _ if d.is_numeric() => Ok(Datum::Bool(d.as_f64().ok_or_else(invalid)? != 0.0)),
            _ => Err(invalid()),
        },
        PType::TinyInt | PType::SmallInt | PType::Int | PType::BigInt => {
            let width = to.int_width().ok_or_else(invalid)?;
            cast_to_int(d, width).ok_or_else(invalid)?
        }
        PType::Decimal { precision, scale } => {
            let value = match d {
                Datum::Decimal(v) => v.numeric(),
                Datum::Float32(_) | Datum::Float64(_) => {
                    let f = d.as_f64().ok_or_else(invalid)?;
                    if !f.is_finite() {
                        return Err(invalid());
                    }
                    numeric::cx_datum()
                        .parse(f.to_string())
                        .map_err(|_| EvalError::NumericFieldOverflow)?
                }
                Datum::Char(s) | Datum::String(s) => strconv::parse_decimal(s)?.numeric(),
                Datum::Bool(b) => numeric::Numeric::from(i32::from(*b)),
                _ => d.as_decimal().ok_or_else(invalid)?.numeric(),
            };
            Ok(Datum::Decimal(Decimal::new(value, *precision, *scale)?))
        }
        PType::Real | PType::Double => {
            let value = match d {
                Datum::Char(s) | Datum::String(s) => strconv::parse_float64(s)?,
                Datum::Bool(b) => f64::from(u8::from(*b)),
                _ => d.as_f64().ok_or_else(invalid)?,
            };
            float_datum(value, matches!(to, PType::Real), value.is_finite())
        }
        PType::Char { length } => {
            let s = to_text(d).ok_or_else(invalid)?;
            Ok(Datum::Char(fit_string(&s, *length, true, to)?))
        }
        PType::String { length } => {
            let s = to_text(d).ok_or_else(invalid)?;
            match length {
                Some(length) => Ok(Datum::String(fit_string(&s, *length, false, to)?)),
                None => Ok(Datum::String(s)),
            }
        }
        PType::Clob => match d {
            Datum::Char(s) | Datum::String(s) | Datum::Clob(s) => Ok(Datum::Clob(s.clone())),
            _ => Err(invalid()),
        },
        PType::Blob => match d {
            Datum::Blob(b) => Ok(Datum::Blob(b.clone())),
            _ => Err(invalid()),
        },
        PType::Date => match d {
            Datum::Date(date) => Ok(Datum::Date(*date)),
            Datum::Timestamp(ts) => Ok(Datum::Date(ts.date())),
            Datum::TimestampTz(ts) => Ok(Datum::Date(ts.naive_local().date())),
            Datum::Char(s) | Datum::String(s) => Ok(Datum::Date(strconv::parse_date(s)?)),
            _ => Err(invalid()),
        },
        PType::Time => match d {
            Datum::Time(t) => Ok(Datum::Time(*t)),
            Datum::TimeTz(t) => Ok(Datum::Time(t.time)),
            Datum::Timestamp(ts) => Ok(Datum::Time(ts.time())),
            Datum::TimestampTz(ts) => Ok(Datum::Time(ts.naive_local().time())),
            Datum::Char(s) | Datum::String(s) => Ok(Datum::Time(strconv::parse_time(s)?)),
            _ => Err(invalid()),
        },
        PType::TimeTz => match d {
            Datum::TimeTz(t) => Ok(Datum::TimeTz(*t)),
            Datum::Time(t) => Ok(Datum::TimeTz(TimeTz::new(*t, 0))),
            Datum::TimestampTz(ts) => Ok(Datum::TimeTz(TimeTz::new(
                ts.naive_local().time(),
                ts.offset().local_minus_utc(),
            ))),
            Datum::Char(s) | Datum::String(s) => Ok(Datum::TimeTz(strconv::parse_timetz(s)?)),
            _ => Err(invalid()),
        },
        PType::Timestamp => match d {
            Datum::Timestamp(ts) => Ok(Datum::Timestamp(*ts)),
            Datum::TimestampTz(ts) => Ok(Datum::Timestamp(ts.naive_local())),
            Datum::Date(date) => date
                .and_hms_opt(0, 0, 0)
                .map(Datum::Timestamp)
                .ok_or(EvalError::DateTimeOutOfRange),
            Datum::Char(s) | Datum::String(s) => {
                Ok(Datum::Timestamp(strconv::parse_timestamp(s)?))
            }
            _ => Err(invalid()),
        },
        PType::TimestampTz => match d {
            Datum::TimestampTz(ts) => Ok(Datum::TimestampTz(*ts)),
            Datum::Timestamp(ts) => utc(*ts).map(Datum::TimestampTz),
            Datum::Date(date) => {
                let midnight = date.and_hms_opt(0, 0, 0).ok_or(EvalError::DateTimeOutOfRange)?;
                utc(midnight).map(Datum::TimestampTz)
            }
            Datum::Char(s) | Datum::String(s) => {
                Ok(Datum::TimestampTz(strconv::parse_timestamptz(s)?))
            }
            _ => Err(invalid()),
        },
        PType::IntervalYearMonth { precision } => match d {
            Datum::Interval(iv @ Interval::YearMonth { .. }) => Ok(Datum::Interval(
                Interval::from_months(i128::from(iv.total_months()), *precision)?,
            )),
            Datum::Char(s) | Datum::String(s) => Ok(Datum::Interval(
                strconv::parse_interval_year_month(s, *precision)?,
            )),
            _ => Err(invalid()),
        },
        PType::IntervalDaySecond {
            precision,
            fractional_precision,
        } => match d {
            Datum::Interval(iv @ Interval::DaySecond { .. }) => Ok(Datum::Interval(
                Interval::from_nanos(iv.total_nanos(), *precision, *fractional_precision)?,
            )),
            Datum::Char(s) | Datum::String(s) => Ok(Datum::Interval(
                strconv::parse_interval_day_second(s, *precision, *fractional_precision)?,
            )),
            _ => Err(invalid()),
        },
        PType::Array { .. } => match d {
            Datum::Array(elems) | Datum::Bag(elems) => Ok(Datum::Array(elems.clone())),
            _ => Err(invalid()),
        },
        PType::Bag { .. } => match d {
            Datum::Array(elems) | Datum::Bag(elems) => Ok(Datum::Bag(elems.clone())),
            _ => Err(invalid()),
        },
        PType::Struct { .. } => match d {
            Datum::Struct(s) => Ok(Datum::Struct(s.clone())),
            _ => Err(invalid()),
        },
    }
}

fn cast_to_int(d: &Datum, width: IntWidth) -> Option<Result<Datum, EvalError>> {
    let value = match d {
        Datum::Bool(b) => i128::from(*b),
        Datum::Decimal(v) => match v.trunc_i128() {
            Some(i) => i,
            None => return Some(Err(EvalError::IntegerOutOfRange(width.name()))),
        },
        Datum::Float32(_) | Datum::Float64(_) => {
            let f = d.as_f64()?.trunc();
            if !f.is_finite() || f.abs() >= 1e38 {
                return Some(Err(EvalError::IntegerOutOfRange(width.name())));
            }
            f as i128
        }
        Datum::Char(s) | Datum::String(s) => match strconv::parse_int64(s) {
            Ok(i) => i128::from(i),
            Err(e) => return Some(Err(e.into())),
        },
        _ => i128::from(d.as_i64()?),
    };
    Some(width.datum(value).map_err(EvalError::from))
}

fn utc(ts: NaiveDateTime) -> Result<chrono::DateTime<FixedOffset>, EvalError> {
    FixedOffset::east_opt(0)
        .and_then(|utc| utc.from_local_datetime(&ts).single())
        .ok_or(EvalError::DateTimeOutOfRange)
}

/// The text form of a scalar, as produced by a cast to a string type.
pub fn to_text(d: &Datum) -> Option<String> {
    Some(match d {
        Datum::Bool(b) => b.to_string(),
        Datum::Int8(_) | Datum::Int16(_) | Datum::Int32(_) | Datum::Int64(_) => {
            d.as_i64()?.to_string()
        }
        Datum::Decimal(v) => v.to_string(),
        Datum::Float32(OrderedFloat(f)) => f.to_string(),
        Datum::Float64(OrderedFloat(f)) => f.to_string(),
        Datum::Char(s) | Datum::String(s) | Datum::Clob(s) => s.clone(),
        Datum::Date(date) => date.format("%Y-%m-%d").to_string(),
        Datum::Time(t) => t.format("%H:%M:%S%.f").to_string(),
        Datum::TimeTz(t) => t.to_string(),
        Datum::Timestamp(ts) => ts.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
        Datum::TimestampTz(ts) => ts.format("%Y-%m-%d %H:%M:%S%.f%:z").to_string(),
        _ => return None,
    })
}

/// Fits `s` into `length` characters. Characters beyond `length` may only be
/// spaces. Pads with spaces when `pad` is set.
fn fit_string(s: &str, length: u32, pad: bool, typ: &PType) -> Result<String, EvalError> {
    let length = usize::try_from(length).unwrap_or(usize::MAX);
    let count = s.chars().count();
    if count > length {
        if s.chars().skip(length).any(|c| c != ' ') {
            return Err(EvalError::StringTruncation(typ.to_string()));
        }
        return Ok(s.chars().take(length).collect());
    }
    let mut s = s.to_owned();
    if pad {
        s.extend(std::iter::repeat(' ').take(length - count));
    }
    Ok(s)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[pql_ore::test]
    fn test_cast_to_int() {
        assert_eq!(cast(&Datum::Int32(127), &PType::TinyInt), Ok(Datum::Int8(127)));
        assert_eq!(
            cast(&Datum::Int32(128), &PType::TinyInt),
            Err(EvalError::IntegerOutOfRange("TINYINT"))
        );
        assert_eq!(cast(&Datum::from(" 42 "), &PType::Int), Ok(Datum::Int32(42)));
        assert_eq!(cast(&Datum::from(-1.9f64), &PType::SmallInt), Ok(Datum::Int16(-1)));
        let d = Datum::Decimal(Decimal::from_str("12.99").unwrap());
        assert_eq!(cast(&d, &PType::BigInt), Ok(Datum::Int64(12)));
        assert!(matches!(
            cast(&Datum::from("x"), &PType::Int),
            Err(EvalError::Parse(_))
        ));
    }

    #[pql_ore::test]
    fn test_cast_to_decimal() {
        let to = PType::decimal(4, 2).unwrap();
        let r = cast(&Datum::from("12.346"), &to).unwrap();
        assert_eq!(r.to_string(), "12.35");
        assert!(matches!(
            cast(&Datum::Int32(123), &to),
            Err(EvalError::DecimalOutOfRange { .. })
        ));
        let r = cast(&Datum::from(1.5f64), &to).unwrap();
        assert_eq!(r.to_string(), "1.50");
    }

    #[pql_ore::test]
    fn test_cast_to_char() {
        let to = PType::character(3).unwrap();
        assert_eq!(cast(&Datum::from("a"), &to), Ok(Datum::Char("a  ".into())));
        assert_eq!(cast(&Datum::from("abc   "), &to), Ok(Datum::Char("abc".into())));
        assert!(matches!(
            cast(&Datum::from("abcd"), &to),
            Err(EvalError::StringTruncation(_))
        ));
        let to = PType::varchar(2).unwrap();
        assert_eq!(cast(&Datum::Int32(12), &to), Ok(Datum::from("12")));
        assert_eq!(cast(&Datum::Bool(true), &PType::String { length: None }), Ok(Datum::from("true")));
    }

    #[pql_ore::test]
    fn test_cast_absent_and_invalid() {
        assert_eq!(cast(&Datum::Null, &PType::Int), Ok(Datum::Null));
        assert_eq!(cast(&Datum::Missing, &PType::Int), Ok(Datum::Missing));
        assert!(matches!(
            cast(&Datum::Bag(vec![]), &PType::Int),
            Err(EvalError::InvalidCast { .. })
        ));
        assert_eq!(
            cast(&Datum::Array(vec![Datum::Int32(1)]), &PType::bag()),
            Ok(Datum::Bag(vec![Datum::Int32(1)]))
        );
    }

    #[pql_ore::test]
    fn test_cast_interval_precision() {
        let iv = Datum::Interval(Interval::year_month(150, 0, 3).unwrap());
        assert!(cast(&iv, &PType::IntervalYearMonth { precision: 2 }).is_err());
        assert!(cast(&iv, &PType::IntervalYearMonth { precision: 3 }).is_ok());
        let r = cast(
            &Datum::from("1 02:03:04.56789"),
            &PType::IntervalDaySecond {
                precision: 2,
                fractional_precision: 2,
            },
        )
        .unwrap();
        match r {
            Datum::Interval(iv) => assert_eq!(iv.nanoseconds(), 560_000_000),
            other => panic!("expected an interval, got {:?}", other),
        }
    }
}
