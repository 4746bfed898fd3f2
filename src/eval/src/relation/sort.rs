// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::VecDeque;

use pql_repr::Record;

use crate::context::ExecContext;
use crate::env::Env;
use crate::error::Error;
use crate::relation::{compare_keys, eval_keys, Operator, OrderKey, Relation};

/// `ORDER BY`. A stable sort over the buffered input.
#[derive(Debug)]
pub(crate) struct Sort {
    input: Relation,
    keys: Vec<OrderKey>,
    rows: VecDeque<Record>,
}

impl Sort {
    pub(crate) fn new(input: Relation, keys: Vec<OrderKey>) -> Sort {
        Sort {
            input,
            keys,
            rows: VecDeque::new(),
        }
    }
}

impl Operator for Sort {
    fn open(&mut self, ctx: &ExecContext, env: &Env) -> Result<(), Error> {
        let mut keyed = vec![];
        for row in self.input.collect(ctx, env)? {
            let key = eval_keys(&self.keys, ctx, &env.push(row.clone()))?;
            keyed.push((key, row));
        }
        keyed.sort_by(|(a, _), (b, _)| compare_keys(&self.keys, a, b));
        self.rows = keyed.into_iter().map(|(_, row)| row).collect();
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
