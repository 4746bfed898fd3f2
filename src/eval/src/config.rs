// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::mode::Mode;

/// Session settings.
///
/// Every field has a default, so a configuration can be deserialized from a
/// document naming only the settings it changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The mode statements are prepared with unless another is requested.
    pub mode: Mode,
    /// The value of `CURRENT_USER`.
    pub user: String,
    /// The offset from UTC of the session time zone, in minutes.
    pub timezone_offset_minutes: i32,
    /// A fixed UTC instant to report as the current time. When unset, the
    /// system clock is read.
    pub now: Option<NaiveDateTime>,
    /// How many rows an operator processes between checks for cancellation.
    pub cancellation_check_interval: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            mode: Mode::Strict,
            user: "pql".into(),
            timezone_offset_minutes: 0,
            now: None,
            cancellation_check_interval: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[pql_ore::test]
    fn test_partial_document() {
        let config: Config =
            serde_json::from_str(r#"{"mode": "permissive", "user": "alice"}"#).unwrap();
        assert_eq!(config.mode, Mode::Permissive);
        assert_eq!(config.user, "alice");
        assert_eq!(config.timezone_offset_minutes, 0);
        assert_eq!(config.cancellation_check_interval, 1024);

        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
    }

    #[pql_ore::test]
    fn test_fixed_clock() {
        let config: Config =
            serde_json::from_str(r#"{"now": "2024-02-29T12:30:00"}"#).unwrap();
        assert_eq!(
            config.now.map(|now| now.to_string()),
            Some("2024-02-29 12:30:00".to_owned())
        );
    }
}
