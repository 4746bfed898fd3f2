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

/// What a data exception does to the statement that raises it.
///
/// The mode is fixed when a statement is prepared.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Data exceptions abort the statement.
    #[default]
    Strict,
    /// The innermost expression raising a data exception evaluates to
    /// `MISSING` and evaluation continues.
    Permissive,
}

impl Mode {
    pub fn is_permissive(&self) -> bool {
        matches!(self, Mode::Permissive)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Mode::Strict => f.write_str("STRICT"),
            Mode::Permissive => f.write_str("PERMISSIVE"),
        }
    }
}
