// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use pql_expr::EvalError;
use pql_ore::cast::TryCastFrom;
use pql_repr::Record;

use crate::context::ExecContext;
use crate::env::Env;
use crate::error::Error;
use crate::expr::Expr;
use crate::relation::{Operator, Relation};

/// `LIMIT`/`OFFSET`. Both bounds are evaluated once, when the operator is
/// opened, in the scope enclosing the input.
#[derive(Debug)]
pub(crate) struct Limit {
    input: Relation,
    limit: Option<Expr>,
    offset: Option<Expr>,
    remaining: Option<usize>,
    skip: usize,
}

impl Limit {
    pub(crate) fn new(input: Relation, limit: Option<Expr>, offset: Option<Expr>) -> Limit {
        Limit {
            input,
            limit,
            offset,
            remaining: None,
            skip: 0,
        }
    }
}

/// Evaluates a `LIMIT` or `OFFSET` bound. An absent bound is no bound.
fn eval_bound(
    ctx: &ExecContext,
    env: &Env,
    expr: Option<&Expr>,
    clause: &'static str,
) -> Result<Option<usize>, Error> {
    let Some(expr) = expr else {
        return Ok(None);
    };
    let value = expr.eval(ctx, env)?;
    if value.is_absent() {
        return Ok(None);
    }
    match value.as_i64() {
        Some(n) if n < 0 => Err(Error::NegativeLimit { clause, value: n }),
        Some(n) => Ok(Some(usize::try_cast_from(n).unwrap_or(usize::MAX))),
        None => Err(EvalError::type_mismatch(clause, &value).into()),
    }
}

impl Operator for Limit {
    fn open(&mut self, ctx: &ExecContext, env: &Env) -> Result<(), Error> {
        self.remaining = eval_bound(ctx, env, self.limit.as_ref(), "LIMIT")?;
        self.skip = eval_bound(ctx, env, self.offset.as_ref(), "OFFSET")?.unwrap_or(0);
        self.input.open(ctx, env)
    }

    fn pull(&mut self, ctx: &ExecContext) -> Result<Option<Record>, Error> {
        while self.skip > 0 {
            if !self.input.has_next(ctx)? {
                return Ok(None);
            }
            self.input.next(ctx)?;
            self.skip -= 1;
        }
        if self.remaining == Some(0) || !self.input.has_next(ctx)? {
            return Ok(None);
        }
        if let Some(remaining) = &mut self.remaining {
            *remaining -= 1;
        }
        Ok(Some(self.input.next(ctx)?))
    }

    fn close(&mut self) {
        self.input.close();
    }
}
