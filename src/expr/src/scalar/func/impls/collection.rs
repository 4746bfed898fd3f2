// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Functions over arrays, bags and structs.

use std::collections::BTreeSet;

use pql_repr::{Datum, Struct};

use crate::scalar::EvalError;

/// `CARDINALITY`/`SIZE`: the number of elements of a collection or fields
/// of a struct.
pub fn cardinality(d: &Datum) -> Result<Datum, EvalError> {
    let n = match d {
        Datum::Array(elems) | Datum::Bag(elems) => elems.len(),
        Datum::Struct(s) => s.len(),
        _ => return Err(EvalError::type_mismatch("CARDINALITY", d)),
    };
    i64::try_from(n)
        .map(Datum::Int64)
        .map_err(|_| EvalError::IntegerOutOfRange("BIGINT"))
}

/// `EXISTS`: whether a collection has any element.
pub fn exists(d: &Datum) -> Result<Datum, EvalError> {
    match d.as_elements() {
        Some(elems) => Ok(Datum::Bool(!elems.is_empty())),
        None => Err(EvalError::type_mismatch("EXISTS", d)),
    }
}

/// Removes duplicate elements of a collection, keeping the first of each
/// set of equal elements in its original position.
pub fn distinct(d: &Datum) -> Result<Datum, EvalError> {
    let dedup = |elems: &[Datum]| -> Vec<Datum> {
        let mut seen = BTreeSet::new();
        elems
            .iter()
            .filter(|elem| seen.insert(*elem))
            .cloned()
            .collect()
    };
    match d {
        Datum::Array(elems) => Ok(Datum::Array(dedup(elems))),
        Datum::Bag(elems) => Ok(Datum::Bag(dedup(elems))),
        _ => Err(EvalError::type_mismatch("DISTINCT", d)),
    }
}

/// Merges the fields of `values` into one struct, in order.
///
/// Absent values contribute nothing. A value that is not a struct
/// contributes a single field named `_n`, where `n` is its 1-based position
/// among the arguments.
pub fn tuple_union(values: &[Datum]) -> Datum {
    let mut ordered = true;
    let mut fields = vec![];
    for (i, value) in values.iter().enumerate() {
        match value {
            Datum::Missing | Datum::Null => {}
            Datum::Struct(s) => {
                ordered &= s.is_ordered();
                fields.extend(s.iter().map(|(k, v)| (k.to_owned(), v.clone())));
            }
            other => fields.push((format!("_{}", i + 1), other.clone())),
        }
    }
    match ordered {
        true => Datum::Struct(Struct::new(fields)),
        false => Datum::Struct(Struct::unordered(fields)),
    }
}
