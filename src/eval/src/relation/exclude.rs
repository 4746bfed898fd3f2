// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::{BTreeMap, BTreeSet};

use pql_expr::{ExcludePath, ExcludeStep};
use pql_ore::cast::TryCastFrom;
use pql_repr::{Datum, Record};

use crate::context::ExecContext;
use crate::env::Env;
use crate::error::Error;
use crate::relation::{Operator, Relation};

/// The paths excluded from one value, merged into a tree.
///
/// A node marked `remove` drops the value it addresses outright, so its
/// children never apply: excluding `t.a` and `t.a.b` together excludes
/// `t.a`. Paths that do not exist in a value leave it untouched.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct ExclusionTree {
    remove: bool,
    children: BTreeMap<ExcludeStep, ExclusionTree>,
}

impl ExclusionTree {
    /// Merges `paths` into one tree per column.
    pub(crate) fn build(paths: &[ExcludePath]) -> BTreeMap<usize, ExclusionTree> {
        let mut trees: BTreeMap<usize, ExclusionTree> = BTreeMap::new();
        for path in paths {
            let mut node = trees.entry(path.column).or_default();
            for step in &path.steps {
                node = node.children.entry(step.clone()).or_default();
            }
            node.remove = true;
        }
        trees
    }

    /// Applies the exclusions below the root of the tree to `value`.
    fn apply(&self, value: &mut Datum) {
        if self.children.is_empty() {
            return;
        }
        let is_array = matches!(value, Datum::Array(_));
        match value {
            Datum::Struct(s) => {
                for (step, child) in &self.children {
                    let matches = |name: &str| match step {
                        ExcludeStep::Field {
                            name: field,
                            case_sensitive: true,
                        } => name == field.as_str(),
                        ExcludeStep::Field { name: field, .. } => name.eq_ignore_ascii_case(field),
                        ExcludeStep::TupleWildcard => true,
                        ExcludeStep::Index(_) | ExcludeStep::CollectionWildcard => false,
                    };
                    if child.remove {
                        s.retain(|name, _| !matches(name));
                    } else {
                        for (name, v) in s.iter_mut() {
                            if matches(name) {
                                child.apply(v);
                            }
                        }
                    }
                }
            }
            Datum::Array(elements) | Datum::Bag(elements) => {
                let mut removed = BTreeSet::new();
                for (step, child) in &self.children {
                    match step {
                        ExcludeStep::Index(i) if is_array => {
                            let Some(i) = usize::try_cast_from(*i).filter(|i| *i < elements.len())
                            else {
                                continue;
                            };
                            if child.remove {
                                removed.insert(i);
                            } else {
                                child.apply(&mut elements[i]);
                            }
                        }
                        ExcludeStep::CollectionWildcard if child.remove => {
                            removed.extend(0..elements.len());
                        }
                        ExcludeStep::CollectionWildcard => {
                            for element in elements.iter_mut() {
                                child.apply(element);
                            }
                        }
                        _ => {}
                    }
                }
                // Back to front, so that earlier removals do not shift the
                // positions of later ones.
                for i in removed.into_iter().rev() {
                    elements.remove(i);
                }
            }
            _ => {}
        }
    }
}

/// `EXCLUDE`: removes paths from the values of a row.
#[derive(Debug)]
pub(crate) struct Exclude {
    input: Relation,
    trees: BTreeMap<usize, ExclusionTree>,
}

impl Exclude {
    pub(crate) fn new(input: Relation, trees: BTreeMap<usize, ExclusionTree>) -> Exclude {
        Exclude { input, trees }
    }
}

impl Operator for Exclude {
    fn open(&mut self, ctx: &ExecContext, env: &Env) -> Result<(), Error> {
        self.input.open(ctx, env)
    }

    fn pull(&mut self, ctx: &ExecContext) -> Result<Option<Record>, Error> {
        if !self.input.has_next(ctx)? {
            return Ok(None);
        }
        let mut values = self.input.next(ctx)?.into_values();
        for (column, tree) in &self.trees {
            if let Some(value) = values.get_mut(*column) {
                match tree.remove {
                    true => *value = Datum::Missing,
                    false => tree.apply(value),
                }
            }
        }
        Ok(Some(Record::new(values)))
    }

    fn close(&mut self) {
        self.input.close();
    }
}
