// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use pql_expr::{ColumnRef, EvalError, JoinKind};

/// A problem with a plan, found while preparing it. Always aborts, whatever
/// the mode.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("unknown table {0}")]
    UnknownTable(String),
    #[error("unresolved variable {0}")]
    UnresolvedVariable(String),
    #[error("WITH query {0} references itself")]
    CteSelfReference(String),
    #[error("WITH query {0} is referenced before it is defined")]
    CteForwardReference(String),
    #[error("LET binding {0} references itself")]
    LetSelfReference(ColumnRef),
    #[error("column {0} does not exist")]
    InvalidColumn(ColumnRef),
    #[error("each {context} input must have the same number of columns, found {left} and {right}")]
    ArityMismatch {
        context: &'static str,
        left: usize,
        right: usize,
    },
    #[error("{func} does not accept {count} arguments")]
    WrongArgumentCount { func: String, count: usize },
    #[error("{clause} must not be negative, found {value}")]
    NegativeLimit { clause: &'static str, value: i64 },
    #[error("field {name} is not defined for type {typ}")]
    UndefinedPath { name: String, typ: String },
    #[error("a LATERAL {0:?} join is not supported")]
    InvalidLateralJoin(JoinKind),
}

/// A subquery coerced to a scalar produced more than one value.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CardinalityError {
    #[error("more than one row returned by a subquery used as an expression, found {0}")]
    TooManyRows(usize),
    #[error("subquery used as an expression must return one column, found {0}")]
    WrongColumnCount(usize),
}

/// The errors that preparing or executing a statement can raise.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A data exception not absorbed by the permissive mode.
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error(transparent)]
    Cardinality(#[from] CardinalityError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error("{clause} must not be negative, found {value}")]
    NegativeLimit { clause: &'static str, value: i64 },
    #[error("statement cancelled")]
    Cancelled,
    /// A relation was used outside of its `open`/`close` lifecycle.
    #[error("relation lifecycle violation: {0}")]
    Lifecycle(&'static str),
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Reports whether this is a data exception, the only kind of error the
    /// permissive mode absorbs.
    pub fn is_data_exception(&self) -> bool {
        matches!(self, Error::Eval(_))
    }
}
