// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Routines for converting datum values from their text representations.
//!
//! The functions here accept the bodies of typed literals (the `2020-01-01`
//! in `DATE '2020-01-01'`) and the operands of `CAST` from a string type.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};

use crate::adt::datetime::TimeTz;
use crate::adt::interval::{Interval, NANOS_PER_SECOND};
use crate::adt::numeric::Decimal;
use crate::error::ValueError;

/// An error while parsing the text representation of a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    typ: &'static str,
    input: String,
    details: Option<String>,
}

impl ParseError {
    fn new(typ: &'static str, input: &str) -> ParseError {
        ParseError {
            typ,
            input: input.to_owned(),
            details: None,
        }
    }

    fn with_details(mut self, details: impl fmt::Display) -> ParseError {
        self.details = Some(details.to_string());
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "invalid input syntax for type {}: \"{}\"",
            self.typ, self.input
        )?;
        if let Some(details) = &self.details {
            write!(f, ": {}", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

pub fn parse_bool(s: &str) -> Result<bool, ParseError> {
    match s.trim().to_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ParseError::new("BOOL", s)),
    }
}

pub fn parse_int64(s: &str) -> Result<i64, ParseError> {
    i64::from_str(s.trim()).map_err(|e| ParseError::new("BIGINT", s).with_details(e))
}

pub fn parse_float64(s: &str) -> Result<f64, ParseError> {
    let trimmed = s.trim();
    match trimmed.to_lowercase().as_str() {
        "nan" => Ok(f64::NAN),
        "inf" | "+inf" | "infinity" | "+infinity" => Ok(f64::INFINITY),
        "-inf" | "-infinity" => Ok(f64::NEG_INFINITY),
        _ => f64::from_str(trimmed).map_err(|e| ParseError::new("DOUBLE PRECISION", s).with_details(e)),
    }
}

pub fn parse_decimal(s: &str) -> Result<Decimal, ParseError> {
    Decimal::from_str(s).map_err(|e| ParseError::new("DECIMAL", s).with_details(e))
}

pub fn parse_date(s: &str) -> Result<NaiveDate, ParseError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| ParseError::new("DATE", s).with_details(e))
}

pub fn parse_time(s: &str) -> Result<NaiveTime, ParseError> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(s.trim(), "%H:%M"))
        .map_err(|e| ParseError::new("TIME", s).with_details(e))
}

/// Parses `HH:MM:SS[.f]±HH:MM`.
pub fn parse_timetz(s: &str) -> Result<TimeTz, ParseError> {
    let trimmed = s.trim();
    let split = trimmed
        .rfind(['+', '-'])
        .ok_or_else(|| ParseError::new("TIME WITH TIME ZONE", s))?;
    let (time, offset) = trimmed.split_at(split);
    let time = parse_time(time).map_err(|_| ParseError::new("TIME WITH TIME ZONE", s))?;
    let offset = parse_offset(offset).ok_or_else(|| ParseError::new("TIME WITH TIME ZONE", s))?;
    Ok(TimeTz::new(time, offset))
}

fn parse_offset(s: &str) -> Option<i32> {
    let (sign, rest) = match s.chars().next()? {
        '+' => (1, &s[1..]),
        '-' => (-1, &s[1..]),
        _ => return None,
    };
    let (hours, minutes) = rest.split_once(':').unwrap_or((rest, "0"));
    let hours = i32::from_str(hours).ok()?;
    let minutes = i32::from_str(minutes).ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    Some(sign * (hours * 3600 + minutes * 60))
}

pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime, ParseError> {
    let trimmed = s.trim();
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f"))
        .or_else(|_| {
            parse_date(trimmed)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .ok_or(())
        })
        .map_err(|_| ParseError::new("TIMESTAMP", s))
}

pub fn parse_timestamptz(s: &str) -> Result<DateTime<FixedOffset>, ParseError> {
    let trimmed = s.trim();
    DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f%:z")
        .or_else(|_| DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f %:z"))
        .or_else(|_| DateTime::parse_from_rfc3339(trimmed))
        .map_err(|e| ParseError::new("TIMESTAMP WITH TIME ZONE", s).with_details(e))
}

/// Parses the body of an `INTERVAL '[-]Y-M' YEAR TO MONTH` literal.
pub fn parse_interval_year_month(s: &str, precision: u8) -> Result<Interval, ParseError> {
    let err = || ParseError::new("INTERVAL YEAR TO MONTH", s);
    let trimmed = s.trim();
    let (negative, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let (years, months) = body.split_once('-').unwrap_or((body, "0"));
    let years = i64::from_str(years).map_err(|_| err())?;
    let months = i64::from_str(months).map_err(|_| err())?;
    if months >= 12 {
        return Err(err().with_details("month field must be below 12"));
    }
    let sign = if negative { -1 } else { 1 };
    Interval::year_month(sign * years, sign * months, precision)
        .map_err(|e: ValueError| err().with_details(e))
}

/// Parses the body of an `INTERVAL '[-]D HH:MM:SS[.f]' DAY TO SECOND`
/// literal.
pub fn parse_interval_day_second(
    s: &str,
    precision: u8,
    fractional_precision: u8,
) -> Result<Interval, ParseError> {
    let err = || ParseError::new("INTERVAL DAY TO SECOND", s);
    let trimmed = s.trim();
    let (negative, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let (days, clock) = body.split_once(' ').unwrap_or((body, "0:0:0"));
    let days = i64::from_str(days).map_err(|_| err())?;
    let mut parts = clock.split(':');
    let hours = parts.next().unwrap_or("0");
    let minutes = parts.next().unwrap_or("0");
    let seconds = parts.next().unwrap_or("0");
    if parts.next().is_some() {
        return Err(err());
    }
    let hours = i64::from_str(hours).map_err(|_| err())?;
    let minutes = i64::from_str(minutes).map_err(|_| err())?;
    let (whole, frac) = seconds.split_once('.').unwrap_or((seconds, ""));
    let whole = i64::from_str(whole).map_err(|_| err())?;
    if hours >= 24 || minutes >= 60 || whole >= 60 || frac.len() > 9 {
        return Err(err().with_details("field value out of range"));
    }
    let nanos = if frac.is_empty() {
        0
    } else {
        let digits = i64::from_str(frac).map_err(|_| err())?;
        let scale = 10i64.pow(u32::try_from(9 - frac.len()).map_err(|_| err())?);
        digits * scale
    };
    debug_assert!(i128::from(nanos) < NANOS_PER_SECOND);
    let sign = if negative { -1 } else { 1 };
    Interval::day_second(
        sign * days,
        sign * hours,
        sign * minutes,
        sign * whole,
        sign * nanos,
        precision,
        fractional_precision,
    )
    .map_err(|e| err().with_details(e))
}
