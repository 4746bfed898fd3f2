// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Pull-based relational operators.
//!
//! Every operator is driven through a [`Relation`], which enforces the
//! `open`/`has_next`/`next`/`close` lifecycle. Opening a relation that is
//! already open resets it, which is what lets a prepared statement run more
//! than once and a correlated subquery run once per outer row.

use std::cmp::Ordering;
use std::fmt;

use pql_repr::{Datum, Record};
use tracing::trace;

use crate::context::ExecContext;
use crate::env::Env;
use crate::error::Error;
use crate::expr::Expr;

mod basic;
mod exclude;
mod join;
mod limit;
mod reduce;
mod scan;
mod set_op;
mod sort;
mod window;

pub(crate) use basic::{Distinct, Filter, Map, Project};
pub(crate) use exclude::{Exclude, ExclusionTree};
pub(crate) use join::Join;
pub(crate) use limit::Limit;
pub(crate) use reduce::{Aggregate, Reduce};
pub(crate) use scan::{Scan, Unpivot};
pub(crate) use set_op::SetOp;
pub(crate) use sort::Sort;
pub(crate) use window::{Window, WindowCall, WindowKind};

/// The operator-specific half of a [`Relation`].
pub(crate) trait Operator: fmt::Debug {
    /// Prepares to produce rows, discarding anything left over from a
    /// previous execution. `env` holds the rows of the enclosing scopes.
    fn open(&mut self, ctx: &ExecContext, env: &Env) -> Result<(), Error>;

    /// Produces the next row, or `None` once the operator is exhausted.
    fn pull(&mut self, ctx: &ExecContext) -> Result<Option<Record>, Error>;

    /// Releases buffered rows and closes any child relations.
    fn close(&mut self);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Unopened,
    Open,
    Closed,
}

/// A relation: an operator together with its lifecycle state.
#[derive(Debug)]
pub(crate) struct Relation {
    name: &'static str,
    op: Box<dyn Operator>,
    state: State,
    peeked: Option<Record>,
    exhausted: bool,
}

impl Relation {
    pub(crate) fn new(name: &'static str, op: impl Operator + 'static) -> Relation {
        Relation {
            name,
            op: Box::new(op),
            state: State::Unopened,
            peeked: None,
            exhausted: false,
        }
    }

    pub(crate) fn open(&mut self, ctx: &ExecContext, env: &Env) -> Result<(), Error> {
        if self.state == State::Open {
            self.op.close();
        }
        self.peeked = None;
        self.exhausted = false;
        trace!(relation = self.name, "open");
        match self.op.open(ctx, env) {
            Ok(()) => {
                self.state = State::Open;
                Ok(())
            }
            Err(e) => {
                self.op.close();
                self.state = State::Closed;
                Err(e)
            }
        }
    }

    pub(crate) fn has_next(&mut self, ctx: &ExecContext) -> Result<bool, Error> {
        match self.state {
            State::Unopened => return Err(Error::Lifecycle("relation pulled before open")),
            State::Closed => return Err(Error::Lifecycle("relation pulled after close")),
            State::Open => {}
        }
        if self.peeked.is_none() && !self.exhausted {
            match self.op.pull(ctx) {
                Ok(Some(row)) => self.peeked = Some(row),
                Ok(None) => self.exhausted = true,
                Err(e) => {
                    self.close();
                    return Err(e);
                }
            }
        }
        Ok(self.peeked.is_some())
    }

    pub(crate) fn next(&mut self, ctx: &ExecContext) -> Result<Record, Error> {
        self.has_next(ctx)?;
        self.peeked
            .take()
            .ok_or(Error::Lifecycle("next called on an exhausted relation"))
    }

    pub(crate) fn close(&mut self) {
        if self.state == State::Open {
            self.op.close();
            trace!(relation = self.name, "close");
        }
        self.state = State::Closed;
        self.peeked = None;
    }

    /// Opens the relation, passes each of its rows to `f` and closes it
    /// again, whether or not an error occurs.
    pub(crate) fn consume<F>(&mut self, ctx: &ExecContext, env: &Env, mut f: F) -> Result<(), Error>
    where
        F: FnMut(Record) -> Result<(), Error>,
    {
        self.open(ctx, env)?;
        let result = self.drain(ctx, &mut f);
        self.close();
        result
    }

    fn drain<F>(&mut self, ctx: &ExecContext, f: &mut F) -> Result<(), Error>
    where
        F: FnMut(Record) -> Result<(), Error>,
    {
        while self.has_next(ctx)? {
            let row = self.next(ctx)?;
            ctx.checkpoint()?;
            f(row)?;
        }
        Ok(())
    }

    /// Runs the relation to completion, buffering all of its rows.
    pub(crate) fn collect(&mut self, ctx: &ExecContext, env: &Env) -> Result<Vec<Record>, Error> {
        let mut rows = vec![];
        self.consume(ctx, env, |row| {
            rows.push(row);
            Ok(())
        })?;
        Ok(rows)
    }
}

/// A compiled `ORDER BY` key.
#[derive(Debug)]
pub(crate) struct OrderKey {
    pub expr: Expr,
    pub desc: bool,
    pub nulls_first: bool,
}

impl OrderKey {
    /// Orders two key values. Absent values sort together at the end chosen
    /// by `nulls_first`, independently of the direction.
    fn compare(&self, a: &Datum, b: &Datum) -> Ordering {
        match (a.is_absent(), b.is_absent()) {
            (true, true) => Ordering::Equal,
            (true, false) if self.nulls_first => Ordering::Less,
            (true, false) => Ordering::Greater,
            (false, true) if self.nulls_first => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) if self.desc => b.cmp(a),
            (false, false) => a.cmp(b),
        }
    }
}

/// Evaluates `keys` in `env`, whose scope `0` is the row being ordered.
pub(crate) fn eval_keys(
    keys: &[OrderKey],
    ctx: &ExecContext,
    env: &Env,
) -> Result<Vec<Datum>, Error> {
    keys.iter().map(|k| k.expr.eval(ctx, env)).collect()
}

/// Orders two rows by the values of their keys, as evaluated by
/// [`eval_keys`].
pub(crate) fn compare_keys(keys: &[OrderKey], a: &[Datum], b: &[Datum]) -> Ordering {
    keys.iter()
        .zip(a.iter().zip(b))
        .map(|(key, (a, b))| key.compare(a, b))
        .find(|o| *o != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

/// Replaces `MISSING` by `NULL`, so that both land in the same group.
pub(crate) fn group_value(datum: Datum) -> Datum {
    match datum {
        Datum::Missing => Datum::Null,
        datum => datum,
    }
}
