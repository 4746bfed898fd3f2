// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use pql_expr::{EvalError, ScalarExpr, UnmaterializableFunc};
use pql_repr::{Datum, PType};

use crate::config::Config;
use crate::error::Error;
use crate::mode::Mode;
use crate::statement::{self, Statement};

/// A named value that plans can reference as a global.
#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    pub name: String,
    /// The declared type of `data`. Struct types with known fields let the
    /// strict mode reject references to fields that cannot exist.
    pub typ: PType,
    pub data: Datum,
}

/// A flag through which a running statement can be asked to stop.
///
/// Clones share the flag, so a token can be handed to another thread while
/// the statement runs.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// The catalog and settings statements are prepared and executed against.
#[derive(Debug, Default)]
pub struct Session {
    config: Config,
    tables: Vec<Table>,
    cancellation: CancellationToken,
}

impl Session {
    pub fn new(config: Config) -> Session {
        Session {
            config,
            tables: vec![],
            cancellation: CancellationToken::default(),
        }
    }

    /// Adds a table, replacing any existing table with the same name.
    pub fn with_table(mut self, name: &str, typ: PType, data: Datum) -> Session {
        self.add_table(Table {
            name: name.to_owned(),
            typ,
            data,
        });
        self
    }

    pub fn add_table(&mut self, table: Table) {
        match self.tables.iter_mut().find(|t| t.name == table.name) {
            Some(existing) => *existing = table,
            None => self.tables.push(table),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn mode(&self) -> Mode {
        self.config.mode
    }

    pub fn user(&self) -> &str {
        &self.config.user
    }

    /// A token that cancels the statements of this session.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Prepares `plan` in the session's configured mode.
    pub fn prepare(self: &Rc<Self>, plan: &ScalarExpr) -> Result<Statement, Error> {
        statement::prepare(self, plan, self.mode())
    }

    /// Looks up a table by name, returning its position in the catalog.
    pub(crate) fn resolve_table(&self, name: &str) -> Option<(usize, &Table)> {
        self.tables.iter().enumerate().find(|(_, t)| t.name == name)
    }

    pub(crate) fn table(&self, index: usize) -> Option<&Table> {
        self.tables.get(index)
    }

    /// The current time in the session time zone.
    pub fn now(&self) -> Result<DateTime<FixedOffset>, EvalError> {
        let offset = self
            .config
            .timezone_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or(EvalError::DateTimeOutOfRange)?;
        let utc = self.config.now.unwrap_or_else(|| Utc::now().naive_utc());
        Ok(DateTime::from_naive_utc_and_offset(utc, offset))
    }

    pub(crate) fn eval_unmaterializable(
        &self,
        func: &UnmaterializableFunc,
    ) -> Result<Datum, EvalError> {
        match func {
            UnmaterializableFunc::CurrentUser => Ok(Datum::String(self.config.user.clone())),
            UnmaterializableFunc::CurrentDate => Ok(Datum::Date(self.now()?.date_naive())),
            UnmaterializableFunc::CurrentTimestamp => Ok(Datum::TimestampTz(self.now()?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[pql_ore::test]
    fn test_session_clock() {
        let session = Session::new(Config {
            timezone_offset_minutes: -300,
            now: NaiveDate::from_ymd_opt(2024, 1, 1).and_then(|d| d.and_hms_opt(2, 0, 0)),
            ..Default::default()
        });
        assert_eq!(
            session.eval_unmaterializable(&UnmaterializableFunc::CurrentDate),
            Ok(Datum::Date(NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()))
        );
        assert_eq!(
            session.now().unwrap().to_rfc3339(),
            "2023-12-31T21:00:00-05:00"
        );
        assert_eq!(
            session.eval_unmaterializable(&UnmaterializableFunc::CurrentUser),
            Ok(Datum::from("pql"))
        );
    }

    #[pql_ore::test]
    fn test_replace_table() {
        let session = Session::default()
            .with_table("t", PType::Dynamic, Datum::from(1))
            .with_table("u", PType::Dynamic, Datum::from(2))
            .with_table("t", PType::Dynamic, Datum::from(3));
        let (index, table) = session.resolve_table("t").unwrap();
        assert_eq!(index, 0);
        assert_eq!(table.data, Datum::from(3));
        assert!(session.resolve_table("v").is_none());
    }

    #[pql_ore::test]
    fn test_cancellation_token_is_shared() {
        let session = Session::default();
        let token = session.cancellation_token();
        token.cancel();
        assert!(session.cancellation_token().is_cancelled());
        token.reset();
        assert!(!session.cancellation_token().is_cancelled());
    }
}
