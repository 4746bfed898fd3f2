// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Date and time utilities.

use std::cmp::Ordering;
use std::fmt;

use chrono::{Months, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use serde::{Deserialize, Serialize};

use crate::adt::interval::{Interval, NANOS_PER_DAY, NANOS_PER_SECOND};
use crate::error::ValueError;

/// A time of day with a fixed offset from UTC.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimeTz {
    pub time: NaiveTime,
    /// Offset from UTC, in seconds east.
    pub offset_seconds: i32,
}

impl TimeTz {
    pub fn new(time: NaiveTime, offset_seconds: i32) -> TimeTz {
        TimeTz {
            time,
            offset_seconds,
        }
    }

    /// Nanoseconds since midnight UTC, wrapped into a single day.
    fn utc_nanos(&self) -> i128 {
        let local = i128::from(self.time.num_seconds_from_midnight()) * NANOS_PER_SECOND
            + i128::from(self.time.nanosecond());
        (local - i128::from(self.offset_seconds) * NANOS_PER_SECOND).rem_euclid(NANOS_PER_DAY)
    }
}

impl PartialEq for TimeTz {
    fn eq(&self, other: &TimeTz) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TimeTz {}

impl PartialOrd for TimeTz {
    fn partial_cmp(&self, other: &TimeTz) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimeTz {
    fn cmp(&self, other: &TimeTz) -> Ordering {
        self.utc_nanos()
            .cmp(&other.utc_nanos())
            .then(self.offset_seconds.cmp(&other.offset_seconds))
    }
}

impl fmt::Display for TimeTz {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let sign = if self.offset_seconds < 0 { '-' } else { '+' };
        let abs = self.offset_seconds.unsigned_abs();
        write!(
            f,
            "{}{}{:02}:{:02}",
            self.time,
            sign,
            abs / 3600,
            abs % 3600 / 60
        )
    }
}

/// Splits a nanosecond count into a [`TimeDelta`].
fn time_delta(nanos: i128) -> Result<TimeDelta, ValueError> {
    let secs = i64::try_from(nanos.div_euclid(NANOS_PER_SECOND))
        .map_err(|_| ValueError::DateTimeOutOfRange)?;
    let subsec = i64::try_from(nanos.rem_euclid(NANOS_PER_SECOND))
        .map_err(|_| ValueError::DateTimeOutOfRange)?;
    let delta = TimeDelta::try_seconds(secs).ok_or(ValueError::DateTimeOutOfRange)?;
    delta
        .checked_add(&TimeDelta::nanoseconds(subsec))
        .ok_or(ValueError::DateTimeOutOfRange)
}

/// Adds `months` months to `date`, clamping the day to the end of the
/// resulting month.
pub fn add_months(date: NaiveDate, months: i64) -> Result<NaiveDate, ValueError> {
    let magnitude = u32::try_from(months.unsigned_abs()).map_err(|_| ValueError::DateTimeOutOfRange)?;
    let result = if months >= 0 {
        date.checked_add_months(Months::new(magnitude))
    } else {
        date.checked_sub_months(Months::new(magnitude))
    };
    result.ok_or(ValueError::DateTimeOutOfRange)
}

/// Adds an interval of either family to a timestamp.
pub fn add_interval_to_timestamp(
    ts: NaiveDateTime,
    interval: &Interval,
) -> Result<NaiveDateTime, ValueError> {
    match interval {
        Interval::YearMonth { months, .. } => {
            Ok(NaiveDateTime::new(add_months(ts.date(), *months)?, ts.time()))
        }
        Interval::DaySecond { nanos, .. } => ts
            .checked_add_signed(time_delta(*nanos)?)
            .ok_or(ValueError::DateTimeOutOfRange),
    }
}

/// Adds a day-second interval to a time of day, wrapping modulo 24 hours.
pub fn add_nanos_to_time(time: NaiveTime, nanos: i128) -> Result<NaiveTime, ValueError> {
    let delta = time_delta(nanos.rem_euclid(NANOS_PER_DAY))?;
    Ok(time.overflowing_add_signed(delta).0)
}

/// Whether a day-second interval is a whole number of days.
pub fn is_whole_days(nanos: i128) -> bool {
    nanos % NANOS_PER_DAY == 0
}
