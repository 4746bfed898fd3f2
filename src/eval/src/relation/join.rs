// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::VecDeque;

use pql_expr::JoinKind;
use pql_repr::{Datum, Record};

use crate::context::ExecContext;
use crate::env::Env;
use crate::error::Error;
use crate::expr::Expr;
use crate::relation::{Operator, Relation};

/// A nested-loop join.
///
/// The right input is buffered once per execution, or, for a lateral join,
/// reopened and buffered for every left row with that row in scope. A
/// `RIGHT` join is planned as a `LEFT` join with its inputs exchanged and
/// `swapped` set, so that output rows keep the column order of the plan.
#[derive(Debug)]
pub(crate) struct Join {
    kind: JoinKind,
    left: Relation,
    right: Relation,
    /// Evaluated against the concatenated row, in plan column order.
    on: Expr,
    lateral: bool,
    swapped: bool,
    left_arity: usize,
    right_arity: usize,
    env: Env,
    right_rows: Vec<Record>,
    /// For `FULL` joins, which buffered right rows have found a match.
    matched: Vec<bool>,
    pending: VecDeque<Record>,
    left_done: bool,
}

impl Join {
    pub(crate) fn new(
        kind: JoinKind,
        left: (Relation, usize),
        right: (Relation, usize),
        on: Expr,
        lateral: bool,
        swapped: bool,
    ) -> Join {
        Join {
            kind,
            left: left.0,
            right: right.0,
            on,
            lateral,
            swapped,
            left_arity: left.1,
            right_arity: right.1,
            env: Env::default(),
            right_rows: vec![],
            matched: vec![],
            pending: VecDeque::new(),
            left_done: false,
        }
    }
}

fn combine(swapped: bool, left: &Record, right: &Record) -> Record {
    match swapped {
        false => left.concat(right),
        true => right.concat(left),
    }
}

impl Operator for Join {
    fn open(&mut self, ctx: &ExecContext, env: &Env) -> Result<(), Error> {
        self.env = env.clone();
        self.pending.clear();
        self.left_done = false;
        self.left.open(ctx, env)?;
        if !self.lateral {
            self.right_rows = self.right.collect(ctx, env)?;
            self.matched = vec![false; self.right_rows.len()];
        }
        Ok(())
    }

    fn pull(&mut self, ctx: &ExecContext) -> Result<Option<Record>, Error> {
        loop {
            if let Some(row) = self.pending.pop_front() {
                return Ok(Some(row));
            }
            if self.left_done {
                return Ok(None);
            }
            if !self.left.has_next(ctx)? {
                self.left_done = true;
                if self.kind == JoinKind::Full {
                    let padding = Record::nulls(self.left_arity);
                    for (row, matched) in self.right_rows.iter().zip(&self.matched) {
                        if !matched {
                            self.pending.push_back(padding.concat(row));
                        }
                    }
                }
                continue;
            }

            let left_row = self.left.next(ctx)?;
            let lateral_rows;
            let right_rows = match self.lateral {
                true => {
                    let env = self.env.push(left_row.clone());
                    lateral_rows = self.right.collect(ctx, &env)?;
                    &lateral_rows
                }
                false => &self.right_rows,
            };
            let mut found = false;
            for (i, right_row) in right_rows.iter().enumerate() {
                ctx.checkpoint()?;
                let row = combine(self.swapped, &left_row, right_row);
                if self.on.eval(ctx, &self.env.push(row.clone()))? == Datum::Bool(true) {
                    found = true;
                    if let Some(matched) = self.matched.get_mut(i) {
                        *matched = true;
                    }
                    self.pending.push_back(row);
                }
            }
            if !found && self.kind != JoinKind::Inner {
                let padding = Record::nulls(self.right_arity);
                self.pending
                    .push_back(combine(self.swapped, &left_row, &padding));
            }
        }
    }

    fn close(&mut self) {
        self.left.close();
        self.right.close();
        self.right_rows.clear();
        self.matched.clear();
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use pql_expr::{BinaryFunc, ColumnRef};

    use crate::relation::tests::values;
    use crate::session::Session;

    use super::*;

    fn col(index: usize) -> Box<Expr> {
        Box::new(Expr::Column(ColumnRef { scope: 0, index }))
    }

    /// Joins `[1, 2]` with `[2, 3]` on equality.
    fn join(kind: JoinKind, swapped: bool) -> Vec<Vec<Datum>> {
        let session = Session::default();
        let ctx = ExecContext::new(&session);
        let (left, right) = (
            values(vec![vec![Datum::from(1)], vec![Datum::from(2)]]),
            values(vec![vec![Datum::from(2)], vec![Datum::from(3)]]),
        );
        let (left, right) = match swapped {
            false => (left, right),
            true => (right, left),
        };
        let on = Expr::Binary {
            func: BinaryFunc::Eq,
            expr1: col(0),
            expr2: col(1),
        };
        let mut rel = Relation::new(
            "join",
            Join::new(kind, (left, 1), (right, 1), on, false, swapped),
        );
        rel.collect(&ctx, &Env::default())
            .unwrap()
            .into_iter()
            .map(Record::into_values)
            .collect()
    }

    #[pql_ore::test]
    fn test_join_kinds() {
        let (one, two, three) = (Datum::from(1), Datum::from(2), Datum::from(3));
        assert_eq!(
            join(JoinKind::Inner, false),
            vec![vec![two.clone(), two.clone()]]
        );
        assert_eq!(
            join(JoinKind::Left, false),
            vec![
                vec![one.clone(), Datum::Null],
                vec![two.clone(), two.clone()]
            ]
        );
        // A right join, planned as a left join of the exchanged inputs.
        assert_eq!(
            join(JoinKind::Left, true),
            vec![
                vec![two.clone(), two.clone()],
                vec![Datum::Null, three.clone()]
            ]
        );
        assert_eq!(
            join(JoinKind::Full, false),
            vec![
                vec![one, Datum::Null],
                vec![two.clone(), two],
                vec![Datum::Null, three]
            ]
        );
    }
}
