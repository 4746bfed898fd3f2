// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Relational plan nodes.
//!
//! A relation produces rows: fixed-arity records of datums. Scalar
//! expressions evaluated on behalf of an operator see the operator's current
//! input row as scope `0`, and the rows of enclosing operators at increasing
//! scopes.

use std::fmt;

use pql_ore::str::separated;
use serde::{Deserialize, Serialize};

use self::func::{AggregateFunc, WindowFunc};
use crate::ScalarExpr;

pub mod func;

/// A tree of relational operators.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum RelationExpr {
    /// Iterates over the elements of a collection.
    ///
    /// Produces one column holding each element, and a second holding its
    /// ordinal position if `with_ordinal` is set. Ordinals are only defined
    /// for arrays; for bags the second column is `MISSING`.
    Scan {
        /// The collection to iterate over.
        expr: ScalarExpr,
        /// Whether to emit the `AT` ordinal column.
        with_ordinal: bool,
    },
    /// Iterates over the fields of a struct, producing `(value, name)` rows.
    /// Fields whose value is `MISSING` are skipped.
    Unpivot {
        /// The struct to iterate over.
        expr: ScalarExpr,
    },
    /// Keeps the rows for which `predicate` is `TRUE`.
    Filter {
        /// The source relation.
        input: Box<RelationExpr>,
        /// The predicate; `FALSE`, `NULL` and `MISSING` reject the row.
        predicate: ScalarExpr,
    },
    /// Replaces each row with the values of `exprs`.
    Project {
        /// The source relation.
        input: Box<RelationExpr>,
        /// The output columns.
        exprs: Vec<ScalarExpr>,
    },
    /// Appends the values of `exprs` to each row, as `LET` does.
    ///
    /// Each expression sees the columns appended by the expressions before
    /// it, but not its own.
    Map {
        /// The source relation.
        input: Box<RelationExpr>,
        /// The appended columns.
        exprs: Vec<ScalarExpr>,
    },
    /// Pairs rows of `left` and `right` for which `on` is `TRUE`.
    Join {
        kind: JoinKind,
        left: Box<RelationExpr>,
        right: Box<RelationExpr>,
        /// The join condition, evaluated against the concatenation of a left
        /// and a right row.
        on: ScalarExpr,
        /// Whether `right` is re-evaluated for each left row, with the left
        /// row in scope.
        lateral: bool,
    },
    /// Removes all but the first occurrence of each row.
    Distinct {
        /// The source relation.
        input: Box<RelationExpr>,
    },
    /// Groups rows by the values of `group_key` and aggregates each group.
    ///
    /// Produces the key columns, then one column per aggregate, then, if
    /// `group_as` is set, a bag of the group's input rows as structs whose
    /// field names are `group_as`.
    Reduce {
        /// The source relation.
        input: Box<RelationExpr>,
        /// Expressions whose values form the group key.
        group_key: Vec<ScalarExpr>,
        /// The aggregates computed for each group.
        aggregates: Vec<AggregateExpr>,
        /// Names of the input columns for `GROUP AS`.
        group_as: Option<Vec<String>>,
    },
    /// Sorts the rows stably by `keys`.
    Sort {
        /// The source relation.
        input: Box<RelationExpr>,
        /// Sort keys in priority order.
        keys: Vec<SortKey>,
    },
    /// Skips `offset` rows and then returns at most `limit` rows.
    ///
    /// Both expressions are evaluated once when the operator is opened.
    Limit {
        /// The source relation.
        input: Box<RelationExpr>,
        limit: Option<ScalarExpr>,
        offset: Option<ScalarExpr>,
    },
    /// Appends one column per window function to each row.
    Window {
        /// The source relation.
        input: Box<RelationExpr>,
        functions: Vec<WindowExpr>,
    },
    /// Combines two relations of equal arity as bags.
    SetOp {
        op: SetOpKind,
        /// Whether duplicates are kept (`ALL`) rather than removed.
        all: bool,
        left: Box<RelationExpr>,
        right: Box<RelationExpr>,
    },
    /// Removes the struct fields and collection elements named by `paths`
    /// from each row.
    Exclude {
        /// The source relation.
        input: Box<RelationExpr>,
        paths: Vec<ExcludePath>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum JoinKind {
    Inner,
    /// Unmatched left rows are padded with `NULL`s.
    Left,
    /// Unmatched right rows are padded with `NULL`s.
    Right,
    /// Unmatched rows of either side are padded with `NULL`s.
    Full,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SetOpKind {
    /// `OUTER UNION`.
    Union,
    /// `OUTER INTERSECT`.
    Intersect,
    /// `OUTER EXCEPT`.
    Except,
}

/// An aggregate function applied to an expression over the rows of a group.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct AggregateExpr {
    pub func: AggregateFunc,
    /// The aggregated expression. Ignored by `COUNT(*)`.
    pub expr: ScalarExpr,
    /// Whether duplicate values are removed before aggregating.
    pub distinct: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SortKey {
    pub expr: ScalarExpr,
    pub desc: bool,
    /// Whether `NULL` and `MISSING` sort before other values. Defaults to
    /// `desc`: absent values are last for ascending keys and first for
    /// descending ones.
    pub nulls_first: Option<bool>,
}

impl SortKey {
    pub fn asc(expr: ScalarExpr) -> SortKey {
        SortKey {
            expr,
            desc: false,
            nulls_first: None,
        }
    }

    pub fn desc(expr: ScalarExpr) -> SortKey {
        SortKey {
            expr,
            desc: true,
            nulls_first: None,
        }
    }

    pub fn nulls_first(self, nulls_first: bool) -> SortKey {
        SortKey {
            nulls_first: Some(nulls_first),
            ..self
        }
    }

    pub fn effective_nulls_first(&self) -> bool {
        self.nulls_first.unwrap_or(self.desc)
    }
}

/// A window function with its own partitioning and ordering.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct WindowExpr {
    pub func: WindowFunc,
    pub partition_by: Vec<ScalarExpr>,
    pub order_by: Vec<SortKey>,
}

/// A path removed from the value of one column by `EXCLUDE`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExcludePath {
    pub column: usize,
    pub steps: Vec<ExcludeStep>,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ExcludeStep {
    /// `.name` or `['name']`.
    Field { name: String, case_sensitive: bool },
    /// `[i]`: an element of an array.
    Index(i64),
    /// `[*]`: every element of a collection.
    CollectionWildcard,
    /// `.*`: every field of a struct.
    TupleWildcard,
}

impl RelationExpr {
    pub fn scan(expr: ScalarExpr) -> Self {
        RelationExpr::Scan {
            expr,
            with_ordinal: false,
        }
    }

    pub fn scan_with_ordinal(expr: ScalarExpr) -> Self {
        RelationExpr::Scan {
            expr,
            with_ordinal: true,
        }
    }

    pub fn unpivot(expr: ScalarExpr) -> Self {
        RelationExpr::Unpivot { expr }
    }

    pub fn filter(self, predicate: ScalarExpr) -> Self {
        RelationExpr::Filter {
            input: Box::new(self),
            predicate,
        }
    }

    pub fn project(self, exprs: Vec<ScalarExpr>) -> Self {
        RelationExpr::Project {
            input: Box::new(self),
            exprs,
        }
    }

    pub fn map(self, exprs: Vec<ScalarExpr>) -> Self {
        RelationExpr::Map {
            input: Box::new(self),
            exprs,
        }
    }

    pub fn join(self, right: Self, kind: JoinKind, on: ScalarExpr) -> Self {
        RelationExpr::Join {
            kind,
            left: Box::new(self),
            right: Box::new(right),
            on,
            lateral: false,
        }
    }

    /// An inner join whose right side sees each left row.
    pub fn lateral_join(self, right: Self, kind: JoinKind, on: ScalarExpr) -> Self {
        RelationExpr::Join {
            kind,
            left: Box::new(self),
            right: Box::new(right),
            on,
            lateral: true,
        }
    }

    /// The cross product of `self` and `right`.
    pub fn product(self, right: Self) -> Self {
        self.join(right, JoinKind::Inner, ScalarExpr::literal(true))
    }

    pub fn distinct(self) -> Self {
        RelationExpr::Distinct {
            input: Box::new(self),
        }
    }

    pub fn reduce(self, group_key: Vec<ScalarExpr>, aggregates: Vec<AggregateExpr>) -> Self {
        RelationExpr::Reduce {
            input: Box::new(self),
            group_key,
            aggregates,
            group_as: None,
        }
    }

    pub fn sort(self, keys: Vec<SortKey>) -> Self {
        RelationExpr::Sort {
            input: Box::new(self),
            keys,
        }
    }

    pub fn limit(self, limit: Option<ScalarExpr>, offset: Option<ScalarExpr>) -> Self {
        RelationExpr::Limit {
            input: Box::new(self),
            limit,
            offset,
        }
    }

    pub fn window(self, functions: Vec<WindowExpr>) -> Self {
        RelationExpr::Window {
            input: Box::new(self),
            functions,
        }
    }

    pub fn set_op(self, op: SetOpKind, all: bool, right: Self) -> Self {
        RelationExpr::SetOp {
            op,
            all,
            left: Box::new(self),
            right: Box::new(right),
        }
    }

    pub fn exclude(self, paths: Vec<ExcludePath>) -> Self {
        RelationExpr::Exclude {
            input: Box::new(self),
            paths,
        }
    }

    /// The number of columns in the rows of the relation.
    pub fn arity(&self) -> usize {
        match self {
            RelationExpr::Scan {
                with_ordinal: true, ..
            } => 2,
            RelationExpr::Scan { .. } => 1,
            RelationExpr::Unpivot { .. } => 2,
            RelationExpr::Filter { input, .. }
            | RelationExpr::Distinct { input }
            | RelationExpr::Sort { input, .. }
            | RelationExpr::Limit { input, .. }
            | RelationExpr::Exclude { input, .. } => input.arity(),
            RelationExpr::Project { exprs, .. } => exprs.len(),
            RelationExpr::Map { input, exprs } => input.arity() + exprs.len(),
            RelationExpr::Join { left, right, .. } => left.arity() + right.arity(),
            RelationExpr::Reduce {
                group_key,
                aggregates,
                group_as,
                ..
            } => group_key.len() + aggregates.len() + usize::from(group_as.is_some()),
            RelationExpr::Window { input, functions } => input.arity() + functions.len(),
            RelationExpr::SetOp { left, .. } => left.arity(),
        }
    }

    /// Whether the rows of the relation come in a defined order, in which
    /// case a `SELECT` over it produces an array rather than a bag.
    pub fn is_ordered(&self) -> bool {
        match self {
            RelationExpr::Sort { .. } => true,
            RelationExpr::Filter { input, .. }
            | RelationExpr::Project { input, .. }
            | RelationExpr::Map { input, .. }
            | RelationExpr::Limit { input, .. }
            | RelationExpr::Exclude { input, .. } => input.is_ordered(),
            _ => false,
        }
    }

    /// Applies `f` to each child `RelationExpr`.
    pub fn visit1<'a, F>(&'a self, mut f: F)
    where
        F: FnMut(&'a Self),
    {
        match self {
            RelationExpr::Scan { .. } | RelationExpr::Unpivot { .. } => (),
            RelationExpr::Filter { input, .. }
            | RelationExpr::Project { input, .. }
            | RelationExpr::Map { input, .. }
            | RelationExpr::Distinct { input }
            | RelationExpr::Reduce { input, .. }
            | RelationExpr::Sort { input, .. }
            | RelationExpr::Limit { input, .. }
            | RelationExpr::Window { input, .. }
            | RelationExpr::Exclude { input, .. } => f(input),
            RelationExpr::Join { left, right, .. } | RelationExpr::SetOp { left, right, .. } => {
                f(left);
                f(right);
            }
        }
    }

    /// Post-order visitor.
    pub fn visit<'a, F>(&'a self, f: &mut F)
    where
        F: FnMut(&'a Self),
    {
        self.visit1(|e| e.visit(f));
        f(self);
    }

    /// Applies `f` to each scalar expression owned directly by this node.
    pub fn visit_scalars<'a, F>(&'a self, mut f: F)
    where
        F: FnMut(&'a ScalarExpr),
    {
        match self {
            RelationExpr::Scan { expr, .. } | RelationExpr::Unpivot { expr } => f(expr),
            RelationExpr::Filter { predicate, .. } => f(predicate),
            RelationExpr::Project { exprs, .. } | RelationExpr::Map { exprs, .. } => {
                exprs.iter().for_each(f)
            }
            RelationExpr::Join { on, .. } => f(on),
            RelationExpr::Reduce {
                group_key,
                aggregates,
                ..
            } => {
                group_key.iter().for_each(&mut f);
                aggregates.iter().for_each(|a| f(&a.expr));
            }
            RelationExpr::Sort { keys, .. } => keys.iter().for_each(|k| f(&k.expr)),
            RelationExpr::Limit { limit, offset, .. } => {
                limit.iter().chain(offset.iter()).for_each(f)
            }
            RelationExpr::Window { functions, .. } => {
                for function in functions {
                    function.partition_by.iter().for_each(&mut f);
                    function.order_by.iter().for_each(|k| f(&k.expr));
                    function.func.exprs().into_iter().for_each(&mut f);
                }
            }
            RelationExpr::Distinct { .. }
            | RelationExpr::SetOp { .. }
            | RelationExpr::Exclude { .. } => (),
        }
    }
}

impl fmt::Display for RelationExpr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RelationExpr::Scan { expr, with_ordinal } => {
                write!(f, "Scan {}", expr)?;
                if *with_ordinal {
                    f.write_str(" at")?;
                }
                Ok(())
            }
            RelationExpr::Unpivot { expr } => write!(f, "Unpivot {}", expr),
            RelationExpr::Filter { input, predicate } => {
                write!(f, "Filter {} ({})", predicate, input)
            }
            RelationExpr::Project { input, exprs } => {
                write!(f, "Project [{}] ({})", separated(", ", exprs), input)
            }
            RelationExpr::Map { input, exprs } => {
                write!(f, "Map [{}] ({})", separated(", ", exprs), input)
            }
            RelationExpr::Join {
                kind,
                left,
                right,
                on,
                lateral,
            } => {
                let lateral = if *lateral { "Lateral" } else { "" };
                write!(f, "{:?}{}Join {} ({}) ({})", kind, lateral, on, left, right)
            }
            RelationExpr::Distinct { input } => write!(f, "Distinct ({})", input),
            RelationExpr::Reduce {
                input,
                group_key,
                aggregates,
                group_as,
            } => {
                write!(
                    f,
                    "Reduce [{}] [{}]",
                    separated(", ", group_key),
                    separated(
                        ", ",
                        aggregates.iter().map(|a| match (a.func, a.distinct) {
                            (AggregateFunc::CountAll, _) => a.func.to_string(),
                            (func, true) => format!("{}(distinct {})", func, a.expr),
                            (func, false) => format!("{}({})", func, a.expr),
                        })
                    )
                )?;
                if let Some(names) = group_as {
                    write!(f, " group_as [{}]", separated(", ", names))?;
                }
                write!(f, " ({})", input)
            }
            RelationExpr::Sort { input, keys } => write!(
                f,
                "Sort [{}] ({})",
                separated(
                    ", ",
                    keys.iter().map(|k| format!(
                        "{} {} nulls {}",
                        k.expr,
                        if k.desc { "desc" } else { "asc" },
                        if k.effective_nulls_first() { "first" } else { "last" }
                    ))
                ),
                input
            ),
            RelationExpr::Limit {
                input,
                limit,
                offset,
            } => {
                f.write_str("Limit")?;
                if let Some(limit) = limit {
                    write!(f, " {}", limit)?;
                }
                if let Some(offset) = offset {
                    write!(f, " offset {}", offset)?;
                }
                write!(f, " ({})", input)
            }
            RelationExpr::Window { input, functions } => write!(
                f,
                "Window [{}] ({})",
                separated(", ", functions.iter().map(|w| w.func.to_string())),
                input
            ),
            RelationExpr::SetOp {
                op,
                all,
                left,
                right,
            } => {
                let all = if *all { " All" } else { "" };
                write!(f, "{:?}{} ({}) ({})", op, all, left, right)
            }
            RelationExpr::Exclude { input, paths } => {
                write!(f, "Exclude [{}] ({})", paths.len(), input)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pql_repr::Datum;

    use super::*;

    fn bag() -> RelationExpr {
        RelationExpr::scan(ScalarExpr::literal(Datum::Bag(vec![Datum::Int32(1)])))
    }

    #[pql_ore::test]
    fn test_arity() {
        let rel = bag()
            .product(RelationExpr::scan_with_ordinal(ScalarExpr::literal(
                Datum::Array(vec![]),
            )))
            .map(vec![ScalarExpr::column(0)]);
        assert_eq!(rel.arity(), 4);
        let rel = bag().reduce(
            vec![ScalarExpr::column(0)],
            vec![AggregateExpr {
                func: AggregateFunc::CountAll,
                expr: ScalarExpr::literal(true),
                distinct: false,
            }],
        );
        assert_eq!(rel.arity(), 2);
    }

    #[pql_ore::test]
    fn test_is_ordered() {
        assert!(!bag().is_ordered());
        let sorted = bag().sort(vec![SortKey::asc(ScalarExpr::column(0))]);
        assert!(sorted.clone().limit(None, None).is_ordered());
        assert!(!sorted.distinct().is_ordered());
    }

    #[pql_ore::test]
    fn test_sort_key_defaults() {
        assert!(!SortKey::asc(ScalarExpr::column(0)).effective_nulls_first());
        assert!(SortKey::desc(ScalarExpr::column(0)).effective_nulls_first());
        assert!(!SortKey::desc(ScalarExpr::column(0))
            .nulls_first(false)
            .effective_nulls_first());
    }
}
