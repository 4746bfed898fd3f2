// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use itertools::Itertools;
use pql_expr::SetOpKind;
use pql_repr::Record;

use crate::context::ExecContext;
use crate::env::Env;
use crate::error::Error;
use crate::relation::basic::dedup;
use crate::relation::{Operator, Relation};

/// `UNION`, `INTERSECT` and `EXCEPT` under bag semantics.
///
/// With `ALL`, a row occurring `m` times on the left and `n` times on the
/// right occurs `m + n`, `min(m, n)` and `max(m - n, 0)` times in the
/// result, respectively. Without `ALL`, duplicates are removed from the
/// result. Rows keep the order of the left input, followed by the right.
#[derive(Debug)]
pub(crate) struct SetOp {
    op: SetOpKind,
    all: bool,
    left: Relation,
    right: Relation,
    rows: VecDeque<Record>,
}

impl SetOp {
    pub(crate) fn new(op: SetOpKind, all: bool, left: Relation, right: Relation) -> SetOp {
        SetOp {
            op,
            all,
            left,
            right,
            rows: VecDeque::new(),
        }
    }
}

/// Counts the occurrences of each row.
fn multiset(rows: Vec<Record>) -> BTreeMap<Record, usize> {
    let mut counts = BTreeMap::new();
    for row in rows {
        *counts.entry(row).or_insert(0) += 1;
    }
    counts
}

/// Removes one occurrence of `row` from `counts`, reporting whether there
/// was one.
fn take(counts: &mut BTreeMap<Record, usize>, row: &Record) -> bool {
    match counts.get_mut(row) {
        Some(n) if *n > 0 => {
            *n -= 1;
            true
        }
        _ => false,
    }
}

/// Evaluates a set operation over buffered inputs.
pub(crate) fn eval_set_op(
    op: SetOpKind,
    all: bool,
    left: Vec<Record>,
    right: Vec<Record>,
) -> Vec<Record> {
    let rows = match op {
        SetOpKind::Union => left.into_iter().chain(right).collect_vec(),
        SetOpKind::Intersect => {
            let mut counts = multiset(right);
            left.into_iter()
                .filter(|row| take(&mut counts, row))
                .collect_vec()
        }
        SetOpKind::Except if all => {
            let mut counts = multiset(right);
            left.into_iter()
                .filter(|row| !take(&mut counts, row))
                .collect_vec()
        }
        SetOpKind::Except => {
            let right: BTreeSet<_> = right.into_iter().collect();
            left.into_iter()
                .filter(|row| !right.contains(row))
                .collect_vec()
        }
    };
    match all {
        true => rows,
        false => dedup(rows),
    }
}

impl Operator for SetOp {
    fn open(&mut self, ctx: &ExecContext, env: &Env) -> Result<(), Error> {
        let left = self.left.collect(ctx, env)?;
        let right = self.right.collect(ctx, env)?;
        self.rows = eval_set_op(self.op, self.all, left, right).into();
        Ok(())
    }

    fn pull(&mut self, _: &ExecContext) -> Result<Option<Record>, Error> {
        Ok(self.rows.pop_front())
    }

    fn close(&mut self) {
        self.left.close();
        self.right.close();
        self.rows.clear();
    }
}

#[cfg(test)]
mod tests {
    use pql_repr::Datum;
    use proptest::prelude::*;

    use super::*;

    fn rows(v: &[i32]) -> Vec<Record> {
        v.iter()
            .map(|i| Record::new(vec![Datum::from(*i)]))
            .collect()
    }

    #[pql_ore::test]
    fn test_bag_algebra() {
        let (l, r) = (&[1, 1, 1, 2, 3][..], &[1, 1, 3, 4][..]);
        let cases = [
            (SetOpKind::Union, true, vec![1, 1, 1, 2, 3, 1, 1, 3, 4]),
            (SetOpKind::Union, false, vec![1, 2, 3, 4]),
            (SetOpKind::Intersect, true, vec![1, 1, 3]),
            (SetOpKind::Intersect, false, vec![1, 3]),
            (SetOpKind::Except, true, vec![1, 2]),
            (SetOpKind::Except, false, vec![2]),
        ];
        for (op, all, expected) in cases {
            assert_eq!(
                eval_set_op(op, all, rows(l), rows(r)),
                rows(&expected),
                "{:?} all={}",
                op,
                all
            );
        }
    }

    fn op_strategy() -> impl Strategy<Value = SetOpKind> {
        prop_oneof![
            Just(SetOpKind::Union),
            Just(SetOpKind::Intersect),
            Just(SetOpKind::Except),
        ]
    }

    proptest! {
        #[pql_ore::test]
        fn distinct_set_ops_are_sets(
            op in op_strategy(),
            left in proptest::collection::vec(0i32..5, 0..12),
            right in proptest::collection::vec(0i32..5, 0..12),
        ) {
            let result = eval_set_op(op, false, rows(&left), rows(&right));
            let unique: BTreeSet<_> = result.iter().collect();
            prop_assert_eq!(unique.len(), result.len());
        }

        #[pql_ore::test]
        fn all_set_ops_count_occurrences(
            op in op_strategy(),
            left in proptest::collection::vec(0i32..5, 0..12),
            right in proptest::collection::vec(0i32..5, 0..12),
        ) {
            let result = eval_set_op(op, true, rows(&left), rows(&right));
            for v in 0..5 {
                let count = |rows: &[i32]| rows.iter().filter(|i| **i == v).count();
                let (m, n) = (count(&left), count(&right));
                let expected = match op {
                    SetOpKind::Union => m + n,
                    SetOpKind::Intersect => m.min(n),
                    SetOpKind::Except => m.saturating_sub(n),
                };
                let found = result.iter().filter(|r| r[0] == Datum::from(v)).count();
                prop_assert_eq!(found, expected);
            }
        }
    }
}
