// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Evaluation of PartiQL plans.
//!
//! A plan, built from [`pql_expr::ScalarExpr`] and [`pql_expr::RelationExpr`]
//! nodes, is compiled against a [`Session`] into a [`Statement`]: a tree of
//! evaluators for scalar expressions and of pull-based operators for
//! relations. Compilation resolves every column, table and `WITH` reference,
//! and fixes the [`Mode`] that decides what a data exception does at run
//! time.
//!
//! ```ignore
//! let session = Rc::new(Session::new(Config::default()));
//! let plan = ScalarExpr::select(
//!     RelationExpr::scan(ScalarExpr::literal(...)),
//!     ScalarExpr::column(0),
//! );
//! let statement = prepare(&session, &plan, Mode::Strict)?;
//! let result = statement.execute()?;
//! ```

#![warn(missing_debug_implementations)]

mod compile;
mod config;
mod context;
mod env;
mod error;
mod expr;
mod mode;
mod relation;
mod session;
mod statement;

pub use config::Config;
pub use error::{CardinalityError, CompileError, Error};
pub use mode::Mode;
pub use session::{CancellationToken, Session, Table};
pub use statement::{prepare, Statement};
