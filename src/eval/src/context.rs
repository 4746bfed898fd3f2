// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::cell::Cell;

use tracing::warn;

use crate::error::Error;
use crate::session::{CancellationToken, Session};

/// State shared by every evaluator during one execution of a statement.
#[derive(Debug)]
pub(crate) struct ExecContext<'a> {
    session: &'a Session,
    cancellation: CancellationToken,
    check_interval: usize,
    since_check: Cell<usize>,
}

impl<'a> ExecContext<'a> {
    pub(crate) fn new(session: &'a Session) -> ExecContext<'a> {
        ExecContext {
            session,
            cancellation: session.cancellation_token(),
            check_interval: session.config().cancellation_check_interval.max(1),
            since_check: Cell::new(0),
        }
    }

    pub(crate) fn session(&self) -> &'a Session {
        self.session
    }

    /// Records one unit of work, failing with [`Error::Cancelled`] if the
    /// statement was cancelled. The flag is only read once every
    /// `cancellation_check_interval` calls.
    pub(crate) fn checkpoint(&self) -> Result<(), Error> {
        let n = self.since_check.get() + 1;
        if n < self.check_interval {
            self.since_check.set(n);
            return Ok(());
        }
        self.since_check.set(0);
        if self.cancellation.is_cancelled() {
            warn!("statement cancelled");
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}
