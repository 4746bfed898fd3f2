// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Errors raised when constructing or converting values.

/// A value violated the range or field constraints of its type.
///
/// These are the data exceptions raised by the checked constructors. Callers
/// that evaluate expressions decide whether they abort the query or coerce
/// the offending sub-expression to `MISSING`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    #[error("{typ} out of range")]
    IntegerOutOfRange { typ: &'static str },
    #[error("numeric field overflow: value {value} does not fit in DECIMAL({precision},{scale})")]
    DecimalOutOfRange {
        value: String,
        precision: u8,
        scale: u8,
    },
    #[error("invalid DECIMAL precision {precision} or scale {scale}")]
    InvalidDecimalPrecision { precision: u32, scale: u32 },
    #[error("numeric overflow")]
    NumericOverflow,
    #[error("division by zero")]
    DivisionByZero,
    #[error("invalid interval leading field precision {0}")]
    InvalidIntervalPrecision(u32),
    #[error("invalid interval fractional seconds precision {0}")]
    InvalidFractionalPrecision(u32),
    #[error("interval field value out of range for leading field precision {precision}")]
    IntervalFieldOverflow { precision: u8 },
    #[error("interval fields must share one sign")]
    IntervalMixedSign,
    #[error("cannot combine a YEAR-MONTH interval with a DAY-SECOND interval")]
    IntervalFamilyMismatch,
    #[error("date/time value out of range")]
    DateTimeOutOfRange,
    #[error("invalid length {0} for character type")]
    InvalidLength(u32),
}
