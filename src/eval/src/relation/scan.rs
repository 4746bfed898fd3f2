// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::VecDeque;

use pql_expr::EvalError;
use pql_repr::{Datum, Record};
use tracing::trace;

use crate::context::ExecContext;
use crate::env::Env;
use crate::error::Error;
use crate::expr::Expr;
use crate::mode::Mode;
use crate::relation::Operator;

/// Iterates over the elements of a collection (`FROM expr [AT ordinal]`).
///
/// Only arrays have positions: the ordinal of a bag element is `MISSING`.
#[derive(Debug)]
pub(crate) struct Scan {
    expr: Expr,
    with_ordinal: bool,
    mode: Mode,
    elements: VecDeque<Datum>,
    ordered: bool,
    pos: i64,
}

impl Scan {
    pub(crate) fn new(expr: Expr, with_ordinal: bool, mode: Mode) -> Scan {
        Scan {
            expr,
            with_ordinal,
            mode,
            elements: VecDeque::new(),
            ordered: false,
            pos: 0,
        }
    }
}

impl Operator for Scan {
    fn open(&mut self, ctx: &ExecContext, env: &Env) -> Result<(), Error> {
        let (elements, ordered) = match self.expr.eval(ctx, env)? {
            Datum::Array(elements) => (elements, true),
            Datum::Bag(elements) => (elements, false),
            other if self.mode.is_permissive() => {
                trace!(value = %other, "scanning a non-collection as a singleton bag");
                (vec![other], false)
            }
            other => return Err(EvalError::type_mismatch("FROM", &other).into()),
        };
        self.elements = elements.into();
        self.ordered = ordered;
        self.pos = 0;
        Ok(())
    }

    fn pull(&mut self, _: &ExecContext) -> Result<Option<Record>, Error> {
        let Some(element) = self.elements.pop_front() else {
            return Ok(None);
        };
        let mut row = Record::new(vec![element]);
        if self.with_ordinal {
            row.push(match self.ordered {
                true => Datum::Int64(self.pos),
                false => Datum::Missing,
            });
        }
        self.pos += 1;
        Ok(Some(row))
    }

    fn close(&mut self) {
        self.elements.clear();
    }
}

/// Turns the fields of a struct into `(value, name)` rows (`UNPIVOT`).
///
/// Fields whose value is `MISSING` produce no row, and neither does a
/// `MISSING` input. Any other non-struct value `v` is treated as the struct
/// `{'_1': v}`.
#[derive(Debug)]
pub(crate) struct Unpivot {
    expr: Expr,
    rows: VecDeque<Record>,
}

impl Unpivot {
    pub(crate) fn new(expr: Expr) -> Unpivot {
        Unpivot {
            expr,
            rows: VecDeque::new(),
        }
    }
}

impl Operator for Unpivot {
    fn open(&mut self, ctx: &ExecContext, env: &Env) -> Result<(), Error> {
        let fields = match self.expr.eval(ctx, env)? {
            Datum::Struct(s) => s.into_fields(),
            Datum::Missing => vec![],
            other => vec![("_1".to_owned(), other)],
        };
        self.rows = fields
            .into_iter()
            .filter(|(_, value)| !value.is_missing())
            .map(|(name, value)| Record::new(vec![value, Datum::String(name)]))
            .collect();
        Ok(())
    }

    fn pull(&mut self, _: &ExecContext) -> Result<Option<Record>, Error> {
        Ok(self.rows.pop_front())
    }

    fn close(&mut self) {
        self.rows.clear();
    }
}

#[cfg(test)]
mod tests {
    use pql_repr::Struct;

    use crate::relation::Relation;
    use crate::session::Session;

    use super::*;

    fn scan(value: Datum, with_ordinal: bool, mode: Mode) -> Result<Vec<Record>, Error> {
        let session = Session::default();
        let ctx = ExecContext::new(&session);
        let mut rel = Relation::new(
            "scan",
            Scan::new(Expr::Literal(value), with_ordinal, mode),
        );
        rel.collect(&ctx, &Env::default())
    }

    #[pql_ore::test]
    fn test_scan_ordinals() {
        let array = Datum::Array(vec![Datum::from("a"), Datum::from("b")]);
        assert_eq!(
            scan(array, true, Mode::Strict).unwrap(),
            vec![
                Record::new(vec![Datum::from("a"), Datum::Int64(0)]),
                Record::new(vec![Datum::from("b"), Datum::Int64(1)]),
            ]
        );
        let bag = Datum::Bag(vec![Datum::from("a")]);
        assert_eq!(
            scan(bag, true, Mode::Strict).unwrap(),
            vec![Record::new(vec![Datum::from("a"), Datum::Missing])]
        );
    }

    #[pql_ore::test]
    fn test_scan_non_collection() {
        assert!(matches!(
            scan(Datum::from(1), false, Mode::Strict),
            Err(Error::Eval(EvalError::TypeMismatch { .. }))
        ));
        assert_eq!(
            scan(Datum::from(1), false, Mode::Permissive).unwrap(),
            vec![Record::new(vec![Datum::from(1)])]
        );
    }

    #[pql_ore::test]
    fn test_unpivot() {
        let session = Session::default();
        let ctx = ExecContext::new(&session);
        let value = Datum::Struct(Struct::new(vec![
            ("a", Datum::from(1)),
            ("b", Datum::Missing),
            ("c", Datum::Null),
        ]));
        let mut rel = Relation::new("unpivot", Unpivot::new(Expr::Literal(value)));
        assert_eq!(
            rel.collect(&ctx, &Env::default()).unwrap(),
            vec![
                Record::new(vec![Datum::from(1), Datum::from("a")]),
                Record::new(vec![Datum::Null, Datum::from("c")]),
            ]
        );

        let mut rel = Relation::new("unpivot", Unpivot::new(Expr::Literal(Datum::Missing)));
        assert!(rel.collect(&ctx, &Env::default()).unwrap().is_empty());
    }
}
