// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Prepared statements.

use std::rc::Rc;

use pql_expr::ScalarExpr;
use pql_repr::Datum;
use tracing::debug;

use crate::compile::CompileContext;
use crate::context::ExecContext;
use crate::env::Env;
use crate::error::Error;
use crate::expr::Expr;
use crate::mode::Mode;
use crate::session::Session;

/// A compiled plan, ready to be executed any number of times.
///
/// Each execution reads the session's tables as they are at that moment,
/// and observes the session's cancellation token.
#[derive(Debug)]
pub struct Statement {
    session: Rc<Session>,
    mode: Mode,
    root: Expr,
}

impl Statement {
    /// The mode the statement was compiled in.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn session(&self) -> &Rc<Session> {
        &self.session
    }

    /// Evaluates the statement.
    ///
    /// Fails with [`Error::Cancelled`] if the session's cancellation token is
    /// set while the statement runs.
    #[pql_ore::instrument(level = "debug")]
    pub fn execute(&self) -> Result<Datum, Error> {
        let ctx = ExecContext::new(&self.session);
        let result = self.root.eval(&ctx, &Env::default());
        if let Err(e) = &result {
            debug!(mode = %self.mode, error = %e, "statement failed");
        }
        result
    }
}

/// Compiles `plan` against `session`.
///
/// Every table and `WITH` reference is resolved here, so name errors
/// surface before anything is evaluated.
#[pql_ore::instrument(level = "debug")]
pub fn prepare(session: &Rc<Session>, plan: &ScalarExpr, mode: Mode) -> Result<Statement, Error> {
    debug!(%mode, "compiling plan");
    let root = CompileContext::new(session, mode).compile_scalar(plan)?;
    Ok(Statement {
        session: Rc::clone(session),
        mode,
        root,
    })
}
