// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::{BTreeSet, VecDeque};

use pql_repr::{Datum, Record};

use crate::context::ExecContext;
use crate::env::Env;
use crate::error::Error;
use crate::expr::Expr;
use crate::relation::{Operator, Relation};

/// Passes the rows for which `predicate` is `TRUE`.
#[derive(Debug)]
pub(crate) struct Filter {
    input: Relation,
    predicate: Expr,
    env: Env,
}

impl Filter {
    pub(crate) fn new(input: Relation, predicate: Expr) -> Filter {
        Filter {
            input,
            predicate,
            env: Env::default(),
        }
    }
}

impl Operator for Filter {
    fn open(&mut self, ctx: &ExecContext, env: &Env) -> Result<(), Error> {
        self.env = env.clone();
        self.input.open(ctx, env)
    }

    fn pull(&mut self, ctx: &ExecContext) -> Result<Option<Record>, Error> {
        while self.input.has_next(ctx)? {
            let row = self.input.next(ctx)?;
            let keep = self.predicate.eval(ctx, &self.env.push(row.clone()))?;
            if keep == Datum::Bool(true) {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    fn close(&mut self) {
        self.input.close();
    }
}

/// Replaces each row by the values of `exprs`.
#[derive(Debug)]
pub(crate) struct Project {
    input: Relation,
    exprs: Vec<Expr>,
    env: Env,
}

impl Project {
    pub(crate) fn new(input: Relation, exprs: Vec<Expr>) -> Project {
        Project {
            input,
            exprs,
            env: Env::default(),
        }
    }
}

impl Operator for Project {
    fn open(&mut self, ctx: &ExecContext, env: &Env) -> Result<(), Error> {
        self.env = env.clone();
        self.input.open(ctx, env)
    }

    fn pull(&mut self, ctx: &ExecContext) -> Result<Option<Record>, Error> {
        if !self.input.has_next(ctx)? {
            return Ok(None);
        }
        let env = self.env.push(self.input.next(ctx)?);
        let row = self
            .exprs
            .iter()
            .map(|e| e.eval(ctx, &env))
            .collect::<Result<Record, _>>()?;
        Ok(Some(row))
    }

    fn close(&mut self) {
        self.input.close();
    }
}

/// Appends the values of `exprs` to each row (`LET`). Each expression sees
/// the columns appended before it.
#[derive(Debug)]
pub(crate) struct Map {
    input: Relation,
    exprs: Vec<Expr>,
    env: Env,
}

impl Map {
    pub(crate) fn new(input: Relation, exprs: Vec<Expr>) -> Map {
        Map {
            input,
            exprs,
            env: Env::default(),
        }
    }
}

impl Operator for Map {
    fn open(&mut self, ctx: &ExecContext, env: &Env) -> Result<(), Error> {
        self.env = env.clone();
        self.input.open(ctx, env)
    }

    fn pull(&mut self, ctx: &ExecContext) -> Result<Option<Record>, Error> {
        if !self.input.has_next(ctx)? {
            return Ok(None);
        }
        let mut row = self.input.next(ctx)?;
        for expr in &self.exprs {
            let datum = expr.eval(ctx, &self.env.push(row.clone()))?;
            row.push(datum);
        }
        Ok(Some(row))
    }

    fn close(&mut self) {
        self.input.close();
    }
}

/// Removes duplicate rows, keeping the first occurrence of each.
#[derive(Debug)]
pub(crate) struct Distinct {
    input: Relation,
    rows: VecDeque<Record>,
}

impl Distinct {
    pub(crate) fn new(input: Relation) -> Distinct {
        Distinct {
            input,
            rows: VecDeque::new(),
        }
    }
}

/// Removes duplicates from `rows`, keeping the first occurrence of each.
pub(crate) fn dedup<I>(rows: I) -> Vec<Record>
where
    I: IntoIterator<Item = Record>,
{
    let mut seen = BTreeSet::new();
    rows.into_iter()
        .filter(|row| seen.insert(row.clone()))
        .collect()
}

impl Operator for Distinct {
    fn open(&mut self, ctx: &ExecContext, env: &Env) -> Result<(), Error> {
        let rows = self.input.collect(ctx, env)?;
        self.rows = dedup(rows).into();
        Ok(())
    }

    fn pull(&mut self, _: &ExecContext) -> Result<Option<Record>, Error> {
        Ok(self.rows.pop_front())
    }

    fn close(&mut self) {
        self.input.close();
        self.rows.clear();
    }
}

#[cfg(test)]
mod tests {
    use pql_expr::{BinaryFunc, ColumnRef};

    use crate::relation::tests::values;
    use crate::session::Session;

    use super::*;

    fn col(index: usize) -> Expr {
        Expr::Column(ColumnRef { scope: 0, index })
    }

    fn ints(rows: &[&[i32]]) -> Vec<Vec<Datum>> {
        rows.iter()
            .map(|r| r.iter().map(|i| Datum::from(*i)).collect())
            .collect()
    }

    #[pql_ore::test]
    fn test_filter_passes_only_true() {
        let session = Session::default();
        let ctx = ExecContext::new(&session);
        let input = values(vec![
            vec![Datum::Bool(true)],
            vec![Datum::Bool(false)],
            vec![Datum::Null],
            vec![Datum::Missing],
            vec![Datum::from(1)],
        ]);
        let mut rel = Relation::new("filter", Filter::new(input, col(0)));
        let rows = rel.collect(&ctx, &Env::default()).unwrap();
        assert_eq!(rows, vec![Record::new(vec![Datum::Bool(true)])]);
    }

    #[pql_ore::test]
    fn test_map_sees_earlier_bindings() {
        let session = Session::default();
        let ctx = ExecContext::new(&session);
        let input = values(ints(&[&[1], &[2]]));
        let plus = |a, b| Expr::Binary {
            func: BinaryFunc::Add,
            expr1: Box::new(a),
            expr2: Box::new(b),
        };
        let mut rel = Relation::new(
            "map",
            Map::new(input, vec![plus(col(0), col(0)), plus(col(1), col(0))]),
        );
        let rows = rel.collect(&ctx, &Env::default()).unwrap();
        assert_eq!(
            rows,
            ints(&[&[1, 2, 3], &[2, 4, 6]])
                .into_iter()
                .map(Record::new)
                .collect::<Vec<_>>()
        );
    }

    #[pql_ore::test]
    fn test_project_and_distinct() {
        let session = Session::default();
        let ctx = ExecContext::new(&session);
        let input = values(ints(&[&[1, 10], &[2, 20], &[1, 30], &[3, 10], &[2, 5]]));
        let project = Relation::new("project", Project::new(input, vec![col(0)]));
        let mut rel = Relation::new("distinct", Distinct::new(project));
        let rows = rel.collect(&ctx, &Env::default()).unwrap();
        assert_eq!(
            rows,
            ints(&[&[1], &[2], &[3]])
                .into_iter()
                .map(Record::new)
                .collect::<Vec<_>>()
        );
    }

    #[pql_ore::test]
    fn test_dedup_uses_value_equality() {
        let rows = dedup(vec![
            Record::new(vec![Datum::from(1)]),
            Record::new(vec![Datum::from(1.0f64)]),
            Record::new(vec![Datum::Null]),
            Record::new(vec![Datum::Missing]),
            Record::new(vec![Datum::Null]),
        ]);
        assert_eq!(
            rows,
            vec![
                Record::new(vec![Datum::from(1)]),
                Record::new(vec![Datum::Null]),
                Record::new(vec![Datum::Missing]),
            ]
        );
    }
}
