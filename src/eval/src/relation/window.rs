// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::cmp::Ordering;
use std::collections::{BTreeMap, VecDeque};

use pql_ore::cast::CastFrom;
use pql_repr::{Datum, Record};

use crate::context::ExecContext;
use crate::env::Env;
use crate::error::Error;
use crate::expr::Expr;
use crate::relation::{compare_keys, eval_keys, group_value, Operator, OrderKey, Relation};

/// A compiled window function.
#[derive(Debug)]
pub(crate) enum WindowKind {
    RowNumber,
    Rank,
    DenseRank,
    /// The value of `expr` for the row `offset` rows before the current one,
    /// or `default` (`NULL` if unset) for the current row when there is no
    /// such row.
    Lag {
        expr: Expr,
        offset: usize,
        default: Option<Expr>,
    },
    /// As `Lag`, looking forward.
    Lead {
        expr: Expr,
        offset: usize,
        default: Option<Expr>,
    },
}

/// A window function with its own partitioning and ordering.
#[derive(Debug)]
pub(crate) struct WindowCall {
    pub kind: WindowKind,
    pub partition_by: Vec<Expr>,
    pub order_by: Vec<OrderKey>,
}

/// Appends one column per window function to every row.
///
/// Each function partitions and orders the buffered input on its own.
/// Rows come out in input order.
#[derive(Debug)]
pub(crate) struct Window {
    input: Relation,
    calls: Vec<WindowCall>,
    rows: VecDeque<Record>,
}

impl Window {
    pub(crate) fn new(input: Relation, calls: Vec<WindowCall>) -> Window {
        Window {
            input,
            calls,
            rows: VecDeque::new(),
        }
    }
}

fn rank(n: usize) -> Datum {
    Datum::Int64(i64::cast_from(n))
}

impl WindowCall {
    /// Computes the function's value for each of `rows`.
    fn eval(&self, ctx: &ExecContext, env: &Env, rows: &[Record]) -> Result<Vec<Datum>, Error> {
        let mut partitions: BTreeMap<Vec<Datum>, Vec<usize>> = BTreeMap::new();
        for (i, row) in rows.iter().enumerate() {
            let scope = env.push(row.clone());
            let key = self
                .partition_by
                .iter()
                .map(|e| e.eval(ctx, &scope).map(group_value))
                .collect::<Result<Vec<_>, _>>()?;
            partitions.entry(key).or_default().push(i);
        }

        let mut results = vec![Datum::Null; rows.len()];
        for members in partitions.into_values() {
            let mut ordered = vec![];
            for i in members {
                ctx.checkpoint()?;
                let key = eval_keys(&self.order_by, ctx, &env.push(rows[i].clone()))?;
                ordered.push((i, key));
            }
            ordered.sort_by(|(_, a), (_, b)| compare_keys(&self.order_by, a, b));

            let (mut rank_value, mut dense_rank) = (0, 0);
            for (pos, (i, key)) in ordered.iter().enumerate() {
                let peer = pos > 0
                    && compare_keys(&self.order_by, &ordered[pos - 1].1, key) == Ordering::Equal;
                if !peer {
                    rank_value = pos + 1;
                    dense_rank += 1;
                }
                results[*i] = match &self.kind {
                    WindowKind::RowNumber => rank(pos + 1),
                    WindowKind::Rank => rank(rank_value),
                    WindowKind::DenseRank => rank(dense_rank),
                    WindowKind::Lag {
                        expr,
                        offset,
                        default,
                    } => {
                        let target = pos.checked_sub(*offset).map(|p| ordered[p].0);
                        offset_value(ctx, env, rows, *i, target, expr, default.as_ref())?
                    }
                    WindowKind::Lead {
                        expr,
                        offset,
                        default,
                    } => {
                        let target = pos
                            .checked_add(*offset)
                            .and_then(|p| ordered.get(p))
                            .map(|(j, _)| *j);
                        offset_value(ctx, env, rows, *i, target, expr, default.as_ref())?
                    }
                };
            }
        }
        Ok(results)
    }
}

/// The value of `expr` for row `target`, or of `default` for row `current`
/// when there is no target.
fn offset_value(
    ctx: &ExecContext,
    env: &Env,
    rows: &[Record],
    current: usize,
    target: Option<usize>,
    expr: &Expr,
    default: Option<&Expr>,
) -> Result<Datum, Error> {
    match (target, default) {
        (Some(target), _) => expr.eval(ctx, &env.push(rows[target].clone())),
        (None, Some(default)) => default.eval(ctx, &env.push(rows[current].clone())),
        (None, None) => Ok(Datum::Null),
    }
}

impl Operator for Window {
    fn open(&mut self, ctx: &ExecContext, env: &Env) -> Result<(), Error> {
        let rows = self.input.collect(ctx, env)?;
        let columns = self
            .calls
            .iter()
            .map(|call| call.eval(ctx, env, &rows))
            .collect::<Result<Vec<_>, _>>()?;
        self.rows = rows
            .into_iter()
            .enumerate()
            .map(|(i, mut row)| {
                for column in &columns {
                    row.push(column[i].clone());
                }
                row
            })
            .collect();
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
