// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use pql_expr::AggregateFunc;
use pql_repr::{Datum, Record, Struct};
use tracing::trace;

use crate::context::ExecContext;
use crate::env::Env;
use crate::error::Error;
use crate::expr::Expr;
use crate::mode::Mode;
use crate::relation::{group_value, Operator, Relation};

/// A compiled aggregate call.
#[derive(Debug)]
pub(crate) struct Aggregate {
    pub func: AggregateFunc,
    pub expr: Expr,
    pub distinct: bool,
}

/// `GROUP BY` with aggregates and `GROUP AS`.
///
/// Output rows hold the group key, then one column per aggregate, then, if
/// `group_as` is set, a bag of structs holding the rows of the group. Groups
/// come out in order of first appearance. Keys are compared definitely:
/// `NULL` and `MISSING` keys form a single group.
#[derive(Debug)]
pub(crate) struct Reduce {
    input: Relation,
    group_key: Vec<Expr>,
    aggregates: Vec<Aggregate>,
    group_as: Option<Vec<String>>,
    mode: Mode,
    rows: VecDeque<Record>,
}

impl Reduce {
    pub(crate) fn new(
        input: Relation,
        group_key: Vec<Expr>,
        aggregates: Vec<Aggregate>,
        group_as: Option<Vec<String>>,
        mode: Mode,
    ) -> Reduce {
        Reduce {
            input,
            group_key,
            aggregates,
            group_as,
            mode,
            rows: VecDeque::new(),
        }
    }

    fn aggregate(
        &self,
        ctx: &ExecContext,
        env: &Env,
        agg: &Aggregate,
        rows: &[Record],
    ) -> Result<Datum, Error> {
        let mut values = rows
            .iter()
            .map(|row| agg.expr.eval(ctx, &env.push(row.clone())))
            .collect::<Result<Vec<_>, _>>()?;
        if agg.distinct {
            let mut seen = BTreeSet::new();
            values.retain(|v| seen.insert(v.clone()));
        }
        match agg.func.eval(&values) {
            Ok(datum) => Ok(datum),
            Err(e) if self.mode.is_permissive() => {
                trace!(error = %e, func = %agg.func, "aggregate evaluates to MISSING");
                Ok(Datum::Missing)
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Operator for Reduce {
    fn open(&mut self, ctx: &ExecContext, env: &Env) -> Result<(), Error> {
        let mut index = BTreeMap::new();
        let mut groups: Vec<(Vec<Datum>, Vec<Record>)> = vec![];
        for row in self.input.collect(ctx, env)? {
            let scope = env.push(row.clone());
            let key = self
                .group_key
                .iter()
                .map(|e| e.eval(ctx, &scope).map(group_value))
                .collect::<Result<Vec<_>, _>>()?;
            let i = *index.entry(key.clone()).or_insert_with(|| {
                groups.push((key, vec![]));
                groups.len() - 1
            });
            groups[i].1.push(row);
        }
        // Without grouping there is exactly one group, even over no rows.
        if groups.is_empty() && self.group_key.is_empty() {
            groups.push((vec![], vec![]));
        }

        let mut output = VecDeque::with_capacity(groups.len());
        for (mut key, rows) in groups {
            for agg in &self.aggregates {
                key.push(self.aggregate(ctx, env, agg, &rows)?);
            }
            if let Some(names) = &self.group_as {
                let members = rows
                    .iter()
                    .map(|row| {
                        Datum::Struct(Struct::new(
                            names.iter().cloned().zip(row.values().iter().cloned()),
                        ))
                    })
                    .collect();
                key.push(Datum::Bag(members));
            }
            output.push_back(Record::new(key));
        }
        self.rows = output;
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
    use pql_expr::{ColumnRef, EvalError};

    use crate::relation::tests::values;
    use crate::session::Session;

    use super::*;

    fn col(index: usize) -> Expr {
        Expr::Column(ColumnRef { scope: 0, index })
    }

    fn reduce(
        rows: Vec<Vec<Datum>>,
        group_key: Vec<Expr>,
        aggregates: Vec<Aggregate>,
        group_as: Option<Vec<String>>,
        mode: Mode,
    ) -> Result<Vec<Vec<Datum>>, Error> {
        let session = Session::default();
        let ctx = ExecContext::new(&session);
        let op = Reduce::new(values(rows), group_key, aggregates, group_as, mode);
        let mut rel = Relation::new("reduce", op);
        Ok(rel
            .collect(&ctx, &Env::default())?
            .into_iter()
            .map(Record::into_values)
            .collect())
    }

    fn agg(func: AggregateFunc, index: usize, distinct: bool) -> Aggregate {
        Aggregate {
            func,
            expr: col(index),
            distinct,
        }
    }

    #[pql_ore::test]
    fn test_grouping() {
        let rows = vec![
            vec![Datum::from("a"), Datum::from(1)],
            vec![Datum::Null, Datum::from(2)],
            vec![Datum::from("a"), Datum::from(1)],
            vec![Datum::Missing, Datum::from(4)],
        ];
        let result = reduce(
            rows,
            vec![col(0)],
            vec![
                agg(AggregateFunc::Sum, 1, false),
                agg(AggregateFunc::Count, 1, true),
            ],
            Some(vec!["k".into(), "v".into()]),
            Mode::Strict,
        )
        .unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0][0], Datum::from("a"));
        assert_eq!(result[0][1], Datum::from(2));
        assert_eq!(result[0][2], Datum::from(1));
        assert_eq!(result[1][0], Datum::Null);
        assert_eq!(result[1][1], Datum::from(6));
        assert_eq!(
            result[1][3],
            Datum::Bag(vec![
                Datum::Struct(Struct::new(vec![("k", Datum::Null), ("v", Datum::from(2))])),
                Datum::Struct(Struct::new(vec![
                    ("k", Datum::Missing),
                    ("v", Datum::from(4))
                ])),
            ])
        );
    }

    #[pql_ore::test]
    fn test_empty_input() {
        let aggregates = || {
            vec![
                agg(AggregateFunc::CountAll, 0, false),
                agg(AggregateFunc::Max, 0, false),
            ]
        };
        assert_eq!(
            reduce(vec![], vec![], aggregates(), None, Mode::Strict).unwrap(),
            vec![vec![Datum::Int64(0), Datum::Null]]
        );
        assert!(reduce(vec![], vec![col(0)], aggregates(), None, Mode::Strict)
            .unwrap()
            .is_empty());
    }

    #[pql_ore::test]
    fn test_aggregate_errors() {
        let rows = vec![vec![Datum::from("x")]];
        let aggregates = || vec![agg(AggregateFunc::Sum, 0, false)];
        assert!(matches!(
            reduce(rows.clone(), vec![], aggregates(), None, Mode::Strict),
            Err(Error::Eval(EvalError::TypeMismatch { .. }))
        ));
        assert_eq!(
            reduce(rows, vec![], aggregates(), None, Mode::Permissive).unwrap(),
            vec![vec![Datum::Missing]]
        );
    }
}
