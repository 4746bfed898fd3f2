// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt;
use std::ops::Index;

use pql_ore::str::separated;

use crate::scalar::Datum;

/// A fixed-arity tuple of datums: one row flowing through a relational
/// pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Record {
    values: Vec<Datum>,
}

impl Record {
    pub fn new(values: Vec<Datum>) -> Record {
        Record { values }
    }

    /// A record of `arity` `NULL`s, used to pad the unmatched side of an
    /// outer join.
    pub fn nulls(arity: usize) -> Record {
        Record {
            values: vec![Datum::Null; arity],
        }
    }

    pub fn arity(&self) -> usize {
        self.values.len()
    }

    pub fn get(&self, i: usize) -> Option<&Datum> {
        self.values.get(i)
    }

    pub fn values(&self) -> &[Datum] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Datum> {
        self.values
    }

    pub fn push(&mut self, datum: Datum) {
        self.values.push(datum);
    }

    /// Returns a new record holding the values of `self` followed by those of
    /// `other`.
    pub fn concat(&self, other: &Record) -> Record {
        let mut values = Vec::with_capacity(self.arity() + other.arity());
        values.extend_from_slice(&self.values);
        values.extend_from_slice(&other.values);
        Record { values }
    }
}

impl Index<usize> for Record {
    type Output = Datum;

    fn index(&self, i: usize) -> &Datum {
        &self.values[i]
    }
}

impl From<Vec<Datum>> for Record {
    fn from(values: Vec<Datum>) -> Record {
        Record { values }
    }
}

impl FromIterator<Datum> for Record {
    fn from_iter<I: IntoIterator<Item = Datum>>(iter: I) -> Record {
        Record {
            values: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({})", separated(", ", &self.values))
    }
}
