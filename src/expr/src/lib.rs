// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The logical plan consumed by the evaluator, and the built-in function
//! library it calls into.

#![warn(missing_debug_implementations)]

mod id;
mod relation;
mod scalar;

pub use id::{GlobalId, Id, LocalId};
pub use relation::func::{AggregateFunc, WindowFunc};
pub use relation::{
    AggregateExpr, ExcludePath, ExcludeStep, JoinKind, RelationExpr, SetOpKind, SortKey,
    WindowExpr,
};
pub use scalar::func::{
    self, BinaryFunc, DateTimeField, TrimSpec, UnaryFunc, UnmaterializableFunc, VariadicFunc,
};
pub use scalar::{like_pattern, Coercion, ColumnRef, EvalError, PathStep, ScalarExpr};
