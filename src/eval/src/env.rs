// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The rows and `WITH` bindings visible to an expression during evaluation.

use std::rc::Rc;

use pql_expr::ColumnRef;
use pql_repr::{Datum, Record};

use crate::error::Error;

#[derive(Debug)]
struct Link<T> {
    value: T,
    next: Option<Rc<Link<T>>>,
}

fn nth<T>(mut link: Option<&Rc<Link<T>>>, n: usize) -> Option<&T> {
    for _ in 0..n {
        link = link?.next.as_ref();
    }
    link.map(|l| &l.value)
}

/// A persistent stack of scopes.
///
/// Rows are addressed by [`ColumnRef`]: scope `0` is the most recently
/// pushed row. `WITH` bindings live on a separate stack addressed by their
/// distance from the innermost binding, as resolved by the compiler.
/// Pushing returns a new environment and leaves `self` untouched, so an
/// operator can hand out one environment per input row cheaply.
#[derive(Clone, Debug, Default)]
pub(crate) struct Env {
    rows: Option<Rc<Link<Record>>>,
    locals: Option<Rc<Link<Datum>>>,
}

impl Env {
    /// Returns an environment in which `row` is scope `0`.
    pub(crate) fn push(&self, row: Record) -> Env {
        Env {
            rows: Some(Rc::new(Link {
                value: row,
                next: self.rows.clone(),
            })),
            locals: self.locals.clone(),
        }
    }

    /// Returns an environment in which `value` is the innermost binding.
    pub(crate) fn bind(&self, value: Datum) -> Env {
        Env {
            rows: self.rows.clone(),
            locals: Some(Rc::new(Link {
                value,
                next: self.locals.clone(),
            })),
        }
    }

    pub(crate) fn column(&self, column: ColumnRef) -> Result<&Datum, Error> {
        nth(self.rows.as_ref(), column.scope)
            .and_then(|row| row.get(column.index))
            .ok_or_else(|| Error::Internal(format!("column {} is not bound", column)))
    }

    pub(crate) fn local(&self, depth: usize) -> Result<&Datum, Error> {
        nth(self.locals.as_ref(), depth)
            .ok_or_else(|| Error::Internal(format!("binding at depth {} is not bound", depth)))
    }
}
