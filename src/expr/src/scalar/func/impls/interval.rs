// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Interval arithmetic and interval arithmetic on date/time values.

use chrono::{DateTime, FixedOffset, TimeZone};
use pql_repr::adt::datetime::{self, TimeTz};
use pql_repr::adt::interval::Interval;
use pql_repr::Datum;

use crate::scalar::func::impls::numeric::ArithOp;
use crate::scalar::EvalError;

/// Evaluates `a op b` where at least one operand is an interval.
///
/// Returns `None` if the operand kinds do not form an interval operation.
pub fn interval_arith(op: ArithOp, a: &Datum, b: &Datum) -> Option<Result<Datum, EvalError>> {
    match (op, a, b) {
        (ArithOp::Add, Datum::Interval(a), Datum::Interval(b)) => {
            Some(a.checked_add(b).map(Datum::Interval).map_err(EvalError::from))
        }
        (ArithOp::Sub, Datum::Interval(_), Datum::Interval(_)) => Some(Err(
            EvalError::Unsupported("subtracting an interval from an interval".into()),
        )),
        (ArithOp::Add, temporal, Datum::Interval(iv))
        | (ArithOp::Add, Datum::Interval(iv), temporal) => add_interval(temporal, iv),
        (ArithOp::Sub, temporal, Datum::Interval(iv)) => {
            let negated = match iv.checked_neg() {
                Ok(negated) => negated,
                Err(e) => return Some(Err(e.into())),
            };
            add_interval(temporal, &negated)
        }
        (ArithOp::Mul, Datum::Interval(iv), factor) | (ArithOp::Mul, factor, Datum::Interval(iv)) => {
            mul_interval(iv, factor)
        }
        (ArithOp::Div, Datum::Interval(iv), divisor) => div_interval(iv, divisor),
        _ => None,
    }
}

fn mul_interval(iv: &Interval, factor: &Datum) -> Option<Result<Datum, EvalError>> {
    let result = match factor {
        Datum::Float32(_) | Datum::Float64(_) => iv.checked_mul_f64(factor.as_f64()?),
        Datum::Decimal(d) => iv.checked_mul_decimal(d),
        _ => iv.checked_mul_exact(i128::from(factor.as_i64()?), 0),
    };
    Some(result.map(Datum::Interval).map_err(EvalError::from))
}

fn div_interval(iv: &Interval, divisor: &Datum) -> Option<Result<Datum, EvalError>> {
    let result = match divisor {
        Datum::Float32(_) | Datum::Float64(_) => iv.checked_div_f64(divisor.as_f64()?),
        Datum::Decimal(d) => iv.checked_div_decimal(d),
        _ => iv.checked_div_exact(i128::from(divisor.as_i64()?), 0),
    };
    Some(result.map(Datum::Interval).map_err(EvalError::from))
}

/// Adds an interval to a date/time value.
///
/// A `DATE` plus a whole number of days stays a `DATE`; a `DATE` plus any
/// other day-second interval becomes a `TIMESTAMP`. Times of day wrap
/// around midnight. A year-month interval cannot be added to a time of day.
fn add_interval(temporal: &Datum, iv: &Interval) -> Option<Result<Datum, EvalError>> {
    Some(match (temporal, iv) {
        (Datum::Date(date), Interval::YearMonth { months, .. }) => datetime::add_months(*date, *months)
            .map(Datum::Date)
            .map_err(EvalError::from),
        (Datum::Date(date), Interval::DaySecond { nanos, .. }) => {
            let Some(midnight) = date.and_hms_opt(0, 0, 0) else {
                return Some(Err(EvalError::DateTimeOutOfRange));
            };
            match datetime::add_interval_to_timestamp(midnight, iv) {
                Ok(ts) if datetime::is_whole_days(*nanos) => Ok(Datum::Date(ts.date())),
                Ok(ts) => Ok(Datum::Timestamp(ts)),
                Err(e) => Err(e.into()),
            }
        }
        (Datum::Time(_) | Datum::TimeTz(_), Interval::YearMonth { .. }) => {
            Err(EvalError::TypeMismatch {
                func: "+".into(),
                found: format!("{} and INTERVAL YEAR TO MONTH", temporal.type_name()),
            })
        }
        (Datum::Time(time), Interval::DaySecond { nanos, .. }) => {
            datetime::add_nanos_to_time(*time, *nanos)
                .map(Datum::Time)
                .map_err(EvalError::from)
        }
        (Datum::TimeTz(tz), Interval::DaySecond { nanos, .. }) => {
            datetime::add_nanos_to_time(tz.time, *nanos)
                .map(|time| Datum::TimeTz(TimeTz::new(time, tz.offset_seconds)))
                .map_err(EvalError::from)
        }
        (Datum::Timestamp(ts), _) => datetime::add_interval_to_timestamp(*ts, iv)
            .map(Datum::Timestamp)
            .map_err(EvalError::from),
        (Datum::TimestampTz(ts), _) => add_interval_to_timestamptz(ts, iv).map(Datum::TimestampTz),
        _ => return None,
    })
}

fn add_interval_to_timestamptz(
    ts: &DateTime<FixedOffset>,
    iv: &Interval,
) -> Result<DateTime<FixedOffset>, EvalError> {
    let local = datetime::add_interval_to_timestamp(ts.naive_local(), iv)?;
    ts.offset()
        .from_local_datetime(&local)
        .single()
        .ok_or(EvalError::DateTimeOutOfRange)
}
