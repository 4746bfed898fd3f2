// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Three-valued logic and comparisons.
//!
//! `NULL` and `MISSING` are both "unknown" to the logical connectives. When
//! an unknown result stems from a `MISSING` operand the result is `MISSING`.

use std::cmp::Ordering;

use pql_repr::Datum;

use crate::scalar::EvalError;

/// Interprets a datum as a truth value: `Some` for booleans, `None` for
/// unknown.
fn truth(func: &str, d: &Datum) -> Result<Option<bool>, EvalError> {
    match d {
        Datum::Bool(b) => Ok(Some(*b)),
        Datum::Null | Datum::Missing => Ok(None),
        _ => Err(EvalError::type_mismatch(func, d)),
    }
}

/// The unknown value resulting from combining `a` and `b`.
fn unknown(a: &Datum, b: &Datum) -> Datum {
    if a.is_missing() || b.is_missing() {
        Datum::Missing
    } else {
        Datum::Null
    }
}

pub fn and(a: &Datum, b: &Datum) -> Result<Datum, EvalError> {
    match (truth("AND", a)?, truth("AND", b)?) {
        (Some(false), _) | (_, Some(false)) => Ok(Datum::Bool(false)),
        (Some(true), Some(true)) => Ok(Datum::Bool(true)),
        _ => Ok(unknown(a, b)),
    }
}

pub fn or(a: &Datum, b: &Datum) -> Result<Datum, EvalError> {
    match (truth("OR", a)?, truth("OR", b)?) {
        (Some(true), _) | (_, Some(true)) => Ok(Datum::Bool(true)),
        (Some(false), Some(false)) => Ok(Datum::Bool(false)),
        _ => Ok(unknown(a, b)),
    }
}

pub fn not(a: &Datum) -> Result<Datum, EvalError> {
    Ok(match truth("NOT", a)? {
        Some(b) => Datum::Bool(!b),
        None => a.clone(),
    })
}

/// `a = b` for present values. Values of kinds that cannot be compared are
/// simply unequal.
pub fn eq(a: &Datum, b: &Datum) -> bool {
    a.is_comparable_with(b) && a == b
}

/// Orders two present values, failing if their kinds cannot be compared.
pub fn compare(a: &Datum, b: &Datum) -> Result<Ordering, EvalError> {
    if a.is_comparable_with(b) {
        Ok(a.cmp(b))
    } else {
        Err(EvalError::Incomparable {
            left: a.type_name().to_owned(),
            right: b.type_name().to_owned(),
        })
    }
}

/// `value IN collection`.
///
/// True if some element equals `value`. Otherwise unknown if some element
/// is absent, and false if none is.
pub fn is_in(value: &Datum, collection: &Datum) -> Result<Datum, EvalError> {
    let elems = collection
        .as_elements()
        .ok_or_else(|| EvalError::type_mismatch("IN", collection))?;
    let mut saw_absent = false;
    for elem in elems {
        if elem.is_absent() {
            saw_absent = true;
        } else if eq(value, elem) {
            return Ok(Datum::Bool(true));
        }
    }
    Ok(match saw_absent {
        true => Datum::Null,
        false => Datum::Bool(false),
    })
}

/// `value BETWEEN low AND high`.
pub fn between(value: &Datum, low: &Datum, high: &Datum) -> Result<Datum, EvalError> {
    let above = compare(value, low)? != Ordering::Less;
    let below = compare(value, high)? != Ordering::Greater;
    Ok(Datum::Bool(above && below))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[pql_ore::test]
    fn test_truth_tables() {
        let t = Datum::Bool(true);
        let f = Datum::Bool(false);
        let n = Datum::Null;
        let m = Datum::Missing;
        assert_eq!(and(&f, &m), Ok(f.clone()));
        assert_eq!(and(&t, &m), Ok(Datum::Missing));
        assert_eq!(and(&t, &n), Ok(Datum::Null));
        assert_eq!(and(&n, &m), Ok(Datum::Missing));
        assert_eq!(or(&t, &m), Ok(t.clone()));
        assert_eq!(or(&f, &n), Ok(Datum::Null));
        assert_eq!(not(&m), Ok(Datum::Missing));
        assert_eq!(not(&t), Ok(f.clone()));
        assert!(and(&t, &Datum::Int32(1)).is_err());
    }

    #[pql_ore::test]
    fn test_comparisons() {
        assert!(eq(&Datum::Int32(1), &Datum::Float64(1.0.into())));
        assert!(!eq(&Datum::Int32(1), &Datum::from("1")));
        assert!(compare(&Datum::Int32(1), &Datum::from("1")).is_err());
        assert_eq!(
            compare(&Datum::Int8(1), &Datum::Int64(2)),
            Ok(Ordering::Less)
        );
    }

    #[pql_ore::test]
    fn test_in() {
        let coll = Datum::Bag(vec![Datum::Int32(1), Datum::Null]);
        assert_eq!(is_in(&Datum::Int32(1), &coll), Ok(Datum::Bool(true)));
        assert_eq!(is_in(&Datum::Int32(2), &coll), Ok(Datum::Null));
        let coll = Datum::Array(vec![Datum::Int32(1)]);
        assert_eq!(is_in(&Datum::Int32(2), &coll), Ok(Datum::Bool(false)));
        assert!(is_in(&Datum::Int32(2), &Datum::Int32(2)).is_err());
    }
}
