// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Aggregate and window functions.

use std::fmt;

use dec::Context;
use pql_ore::cast::CastLossy;
use pql_repr::adt::numeric::{self, Decimal, Numeric, DECIMAL_MAX_PRECISION};
use pql_repr::Datum;

use crate::scalar::func;
use crate::scalar::{EvalError, ScalarExpr};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AggregateFunc {
    /// `COUNT(expr)`: the number of values that are not absent.
    Count,
    /// `COUNT(*)`: the number of rows.
    CountAll,
    Sum,
    Avg,
    Min,
    Max,
    /// `EVERY(expr)`: whether every value is `TRUE`.
    Every,
    /// `ANY(expr)` or `SOME(expr)`: whether some value is `TRUE`.
    Any,
}

impl AggregateFunc {
    /// Aggregates the values of one group.
    ///
    /// `NULL` and `MISSING` values are skipped by every function except
    /// `COUNT(*)`. Over no values `COUNT` is zero and every other function
    /// is `NULL`.
    pub fn eval<'a, I>(&self, datums: I) -> Result<Datum, EvalError>
    where
        I: IntoIterator<Item = &'a Datum>,
    {
        let count = |n: usize| {
            i64::try_from(n)
                .map(Datum::Int64)
                .map_err(|_| EvalError::IntegerOutOfRange("BIGINT"))
        };
        let datums: Vec<&Datum> = datums.into_iter().collect();
        if let AggregateFunc::CountAll = self {
            return count(datums.len());
        }
        let datums: Vec<&Datum> = datums.into_iter().filter(|d| !d.is_absent()).collect();
        match self {
            AggregateFunc::Count | AggregateFunc::CountAll => count(datums.len()),
            _ if datums.is_empty() => Ok(Datum::Null),
            AggregateFunc::Sum => sum(datums),
            AggregateFunc::Avg => avg(datums),
            AggregateFunc::Min => Ok(datums.into_iter().min().cloned().unwrap_or(Datum::Null)),
            AggregateFunc::Max => Ok(datums.into_iter().max().cloned().unwrap_or(Datum::Null)),
            AggregateFunc::Every | AggregateFunc::Any => {
                let mut values = Vec::with_capacity(datums.len());
                for d in datums {
                    values.push(d.as_bool().ok_or_else(|| EvalError::type_mismatch(self, d))?);
                }
                Ok(Datum::Bool(match self {
                    AggregateFunc::Every => values.into_iter().all(|b| b),
                    _ => values.into_iter().any(|b| b),
                }))
            }
        }
    }
}

/// Sums numeric values.
///
/// Integers sum to a `BIGINT`. Decimals, and integers mixed with decimals,
/// sum exactly to a `DECIMAL(38, s)` where `s` is the widest input scale.
/// Anything summed with a float is a float.
fn sum(datums: Vec<&Datum>) -> Result<Datum, EvalError> {
    if let Some(d) = datums.iter().find(|d| !d.is_numeric()) {
        return Err(EvalError::type_mismatch(AggregateFunc::Sum, d));
    }
    if datums
        .iter()
        .any(|d| matches!(d, Datum::Float32(_) | Datum::Float64(_)))
    {
        let real = !datums.iter().any(|d| matches!(d, Datum::Float64(_)));
        let values: Vec<f64> = datums.iter().filter_map(|d| d.as_f64()).collect();
        let total: f64 = values.iter().sum();
        return func::float_datum(total, real, values.iter().all(|v| v.is_finite()));
    }
    if datums.iter().all(|d| d.as_i64().is_some()) {
        let total: i128 = datums
            .iter()
            .filter_map(|d| d.as_i64())
            .map(i128::from)
            .sum();
        return i64::try_from(total)
            .map(Datum::Int64)
            .map_err(|_| EvalError::IntegerOutOfRange("BIGINT"));
    }
    let mut cx: Context<Numeric> = numeric::cx_datum();
    let mut total = Numeric::zero();
    let mut scale = 0;
    for d in &datums {
        let value = d
            .as_decimal()
            .ok_or_else(|| EvalError::type_mismatch(AggregateFunc::Sum, d))?;
        scale = std::cmp::max(scale, value.scale());
        cx.add(&mut total, &value.numeric());
    }
    if cx.status().overflow() || cx.status().invalid_operation() {
        return Err(EvalError::NumericFieldOverflow);
    }
    Decimal::new(total, DECIMAL_MAX_PRECISION, scale)
        .map(Datum::Decimal)
        .map_err(|_| EvalError::NumericFieldOverflow)
}

/// Averages numeric values: exactly, unless some value is a float.
fn avg(datums: Vec<&Datum>) -> Result<Datum, EvalError> {
    if let Some(d) = datums.iter().find(|d| !d.is_numeric()) {
        return Err(EvalError::type_mismatch(AggregateFunc::Avg, d));
    }
    let count = datums.len();
    if datums
        .iter()
        .any(|d| matches!(d, Datum::Float32(_) | Datum::Float64(_)))
    {
        let total: f64 = datums.iter().filter_map(|d| d.as_f64()).sum();
        let mean = total / f64::cast_lossy(count);
        return func::float_datum(mean, false, total.is_finite());
    }
    let mut cx: Context<Numeric> = numeric::cx_datum();
    let mut total = Numeric::zero();
    for d in &datums {
        let value = d
            .as_decimal()
            .ok_or_else(|| EvalError::type_mismatch(AggregateFunc::Avg, d))?;
        cx.add(&mut total, &value.numeric());
    }
    let count = i64::try_from(count).map_err(|_| EvalError::NumericFieldOverflow)?;
    cx.div(&mut total, &Numeric::from(count));
    if cx.status().overflow() || cx.status().invalid_operation() {
        return Err(EvalError::NumericFieldOverflow);
    }
    Ok(Datum::Decimal(func::decimal_rounded(total)?))
}

impl fmt::Display for AggregateFunc {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AggregateFunc::Count => f.write_str("count"),
            AggregateFunc::CountAll => f.write_str("count(*)"),
            AggregateFunc::Sum => f.write_str("sum"),
            AggregateFunc::Avg => f.write_str("avg"),
            AggregateFunc::Min => f.write_str("min"),
            AggregateFunc::Max => f.write_str("max"),
            AggregateFunc::Every => f.write_str("every"),
            AggregateFunc::Any => f.write_str("any"),
        }
    }
}

/// A function computed over the ordered rows of a window partition.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum WindowFunc {
    /// The position of the row in its partition, starting at 1.
    RowNumber,
    /// The position of the first row with equal ordering keys; ties share a
    /// rank and leave gaps after them.
    Rank,
    /// Like `Rank`, without gaps.
    DenseRank,
    /// The value of `expr` for the row `offset` rows before the current row
    /// of the partition, or `default` (`NULL` if absent) if there is none.
    Lag {
        expr: Box<ScalarExpr>,
        offset: usize,
        default: Option<Box<ScalarExpr>>,
    },
    /// Like `Lag`, reading `offset` rows after the current row.
    Lead {
        expr: Box<ScalarExpr>,
        offset: usize,
        default: Option<Box<ScalarExpr>>,
    },
}

impl WindowFunc {
    /// The scalar expressions evaluated against each row of the partition.
    pub fn exprs(&self) -> Vec<&ScalarExpr> {
        match self {
            WindowFunc::RowNumber | WindowFunc::Rank | WindowFunc::DenseRank => vec![],
            WindowFunc::Lag { expr, default, .. } | WindowFunc::Lead { expr, default, .. } => {
                std::iter::once(&**expr).chain(default.as_deref()).collect()
            }
        }
    }
}

impl fmt::Display for WindowFunc {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WindowFunc::RowNumber => f.write_str("row_number()"),
            WindowFunc::Rank => f.write_str("rank()"),
            WindowFunc::DenseRank => f.write_str("dense_rank()"),
            WindowFunc::Lag { expr, offset, .. } => write!(f, "lag({}, {})", expr, offset),
            WindowFunc::Lead { expr, offset, .. } => write!(f, "lead({}, {})", expr, offset),
        }
    }
}
