// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! `EXTRACT`.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Timelike};
use pql_repr::adt::interval::{Interval, NANOS_PER_SECOND};
use pql_repr::adt::numeric::Decimal;
use pql_repr::Datum;
use serde::{Deserialize, Serialize};

use crate::scalar::EvalError;

/// A field of a date/time value or interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DateTimeField {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    TimezoneHour,
    TimezoneMinute,
}

impl fmt::Display for DateTimeField {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            DateTimeField::Year => "YEAR",
            DateTimeField::Month => "MONTH",
            DateTimeField::Day => "DAY",
            DateTimeField::Hour => "HOUR",
            DateTimeField::Minute => "MINUTE",
            DateTimeField::Second => "SECOND",
            DateTimeField::TimezoneHour => "TIMEZONE_HOUR",
            DateTimeField::TimezoneMinute => "TIMEZONE_MINUTE",
        })
    }
}

/// Parts of a date/time value relevant to `EXTRACT`; absent parts are
/// `None`.
#[derive(Default)]
struct Parts {
    year: Option<i64>,
    month: Option<i64>,
    day: Option<i64>,
    hour: Option<i64>,
    minute: Option<i64>,
    /// Seconds within the minute, in nanoseconds.
    second: Option<i128>,
    offset_seconds: Option<i32>,
}

impl Parts {
    fn date(d: &impl Datelike) -> Parts {
        Parts {
            year: Some(i64::from(d.year())),
            month: Some(i64::from(d.month())),
            day: Some(i64::from(d.day())),
            ..Default::default()
        }
    }

    fn with_time(mut self, t: &impl Timelike) -> Parts {
        self.hour = Some(i64::from(t.hour()));
        self.minute = Some(i64::from(t.minute()));
        self.second =
            Some(i128::from(t.second()) * NANOS_PER_SECOND + i128::from(t.nanosecond()));
        self
    }
}

/// `EXTRACT(field FROM d)`.
///
/// `SECOND` yields a `DECIMAL` carrying the fractional seconds; every other
/// field yields an `INT`.
pub fn extract(field: DateTimeField, d: &Datum) -> Result<Datum, EvalError> {
    let mismatch = || EvalError::type_mismatch(format!("EXTRACT({})", field), d);
    let parts = match d {
        Datum::Date(date) => Parts::date(date),
        Datum::Time(t) => Parts::default().with_time(t),
        Datum::TimeTz(t) => Parts {
            offset_seconds: Some(t.offset_seconds),
            ..Parts::default().with_time(&t.time)
        },
        Datum::Timestamp(ts) => Parts::date(ts).with_time(ts),
        Datum::TimestampTz(ts) => Parts {
            offset_seconds: Some(ts.offset().local_minus_utc()),
            ..Parts::date(ts).with_time(ts)
        },
        Datum::Interval(iv) => interval_parts(iv),
        _ => return Err(mismatch()),
    };
    let int = |v: Option<i64>| -> Result<Datum, EvalError> {
        let v = v.ok_or_else(mismatch)?;
        i32::try_from(v)
            .map(Datum::Int32)
            .map_err(|_| EvalError::IntegerOutOfRange("INT"))
    };
    match field {
        DateTimeField::Year => int(parts.year),
        DateTimeField::Month => int(parts.month),
        DateTimeField::Day => int(parts.day),
        DateTimeField::Hour => int(parts.hour),
        DateTimeField::Minute => int(parts.minute),
        DateTimeField::Second => seconds_decimal(parts.second.ok_or_else(mismatch)?),
        DateTimeField::TimezoneHour => int(parts.offset_seconds.map(|o| i64::from(o / 3600))),
        DateTimeField::TimezoneMinute => {
            int(parts.offset_seconds.map(|o| i64::from(o % 3600 / 60)))
        }
    }
}

fn interval_parts(iv: &Interval) -> Parts {
    let narrow = |v: i128| i64::try_from(v).ok();
    match iv {
        Interval::YearMonth { .. } => Parts {
            year: Some(iv.years()),
            month: Some(iv.months()),
            ..Default::default()
        },
        Interval::DaySecond { .. } => Parts {
            day: narrow(iv.days()),
            hour: narrow(iv.hours()),
            minute: narrow(iv.minutes()),
            second: Some(iv.seconds() * NANOS_PER_SECOND + iv.nanoseconds()),
            ..Default::default()
        },
    }
}

fn seconds_decimal(nanos: i128) -> Result<Datum, EvalError> {
    let sign = if nanos < 0 { "-" } else { "" };
    let abs = nanos.unsigned_abs();
    let per_second = NANOS_PER_SECOND.unsigned_abs();
    let text = format!("{}{}.{:09}", sign, abs / per_second, abs % per_second);
    let value = Decimal::from_str(&text)?;
    Ok(Datum::Decimal(Decimal::new(value.numeric(), 11, 9)?))
}
