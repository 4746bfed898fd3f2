// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The target of a [`ScalarExpr::Get`](crate::ScalarExpr::Get).
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum Id {
    /// A binding introduced by an enclosing `WITH`.
    Local(LocalId),
    /// A table in the session catalog.
    Global(GlobalId),
}

impl Id {
    /// The name the identifier was written with.
    pub fn name(&self) -> &str {
        match self {
            Id::Local(LocalId(name)) | Id::Global(GlobalId(name)) => name,
        }
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Id::Local(id) => id.fmt(f),
            Id::Global(id) => id.fmt(f),
        }
    }
}

/// The name of a common table expression.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct LocalId(pub String);

impl LocalId {
    pub fn new(name: impl Into<String>) -> LocalId {
        LocalId(name.into())
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "l:{}", self.0)
    }
}

/// The name of a catalog table.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct GlobalId(pub String);

impl GlobalId {
    pub fn new(name: impl Into<String>) -> GlobalId {
        GlobalId(name.into())
    }
}

impl fmt::Display for GlobalId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "g:{}", self.0)
    }
}
