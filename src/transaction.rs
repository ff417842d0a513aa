use std::fmt;

use crate::connection::{ClientInfo, Connection, Statement, TypeMap};
use crate::error::StealthDbError;
use crate::tx_outcome::TxOutcome;
use crate::types::{Holdability, IsolationLevel};

/// Options applied when a [`TransactionScope`] begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionOptions {
    /// Isolation level to set before auto-commit is turned off
    pub isolation: Option<IsolationLevel>,
    /// Close the inner connection when the scope ends
    pub release_inner: bool,
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self {
            isolation: None,
            release_inner: true,
        }
    }
}

impl TransactionOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_isolation(mut self, isolation: IsolationLevel) -> Self {
        self.isolation = Some(isolation);
        self
    }

    #[must_use]
    pub fn with_release_inner(mut self, release_inner: bool) -> Self {
        self.release_inner = release_inner;
        self
    }
}

/// Connection in manual-commit mode whose outcome is decided by a flag.
///
/// Work done through the scope is committed when it ends only if
/// [`complete`](Self::complete) was called; otherwise it is rolled back.
/// Ending happens on [`close`](Self::close) or on drop.
pub struct TransactionScope {
    inner: Option<Box<dyn Connection>>,
    complete: bool,
    release_inner: bool,
    finished: bool,
}

impl fmt::Debug for TransactionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionScope")
            .field("complete", &self.complete)
            .field("release_inner", &self.release_inner)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

fn scope_closed() -> StealthDbError {
    StealthDbError::IllegalState("transaction scope is closed".into())
}

impl TransactionScope {
    /// Begin a scope with default options.
    ///
    /// # Errors
    /// See [`TransactionScope::begin_with`].
    pub fn begin(conn: Box<dyn Connection>) -> Result<Self, StealthDbError> {
        Self::begin_with(conn, TransactionOptions::default())
    }

    /// Turn `conn` into a transaction scope.
    ///
    /// # Errors
    /// Returns [`StealthDbError::IllegalState`] if `conn` is already a scope,
    /// and [`StealthDbError::ExecutionError`] if the connection does not
    /// support transactions. Any other failure preparing the connection is
    /// returned as is. When the options release the inner connection it is
    /// closed on failure, and a failure to close is chained behind the begin failure.
    pub fn begin_with(
        mut conn: Box<dyn Connection>,
        options: TransactionOptions,
    ) -> Result<Self, StealthDbError> {
        if conn.in_scoped_transaction() {
            return Err(StealthDbError::IllegalState(
                "unable to create nested transaction scopes".into(),
            ));
        }
        if let Err(err) = prepare(conn.as_mut(), options.isolation) {
            if options.release_inner
                && let Err(close_err) = conn.close()
            {
                return Err(StealthDbError::chain(err, close_err));
            }
            return Err(err);
        }
        tracing::debug!(isolation = ?options.isolation, "transaction scope opened");
        Ok(Self {
            inner: Some(conn),
            complete: false,
            release_inner: options.release_inner,
            finished: false,
        })
    }

    /// Mark the work as complete so the scope commits when it ends.
    pub fn complete(&mut self) {
        self.complete = true;
    }

    pub fn set_complete(&mut self, complete: bool) {
        self.complete = complete;
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// End the scope: commit if complete, roll back otherwise, then close the
    /// inner connection if configured to.
    ///
    /// Ending an already ended scope, or one whose inner connection was
    /// closed underneath it, reports [`TxOutcome::AlreadyClosed`].
    ///
    /// # Errors
    /// Returns the commit or rollback failure. If closing the inner
    /// connection also fails, that failure is chained behind it.
    pub fn close(&mut self) -> Result<TxOutcome, StealthDbError> {
        self.finish()
    }

    /// End the scope and hand back the inner connection when it is not
    /// released.
    ///
    /// # Errors
    /// See [`TransactionScope::close`].
    pub fn close_and_take(
        mut self,
    ) -> Result<(TxOutcome, Option<Box<dyn Connection>>), StealthDbError> {
        let outcome = self.finish()?;
        let conn = if self.release_inner {
            None
        } else {
            self.inner.take()
        };
        Ok((outcome, conn))
    }

    fn finish(&mut self) -> Result<TxOutcome, StealthDbError> {
        if self.finished {
            return Ok(TxOutcome::AlreadyClosed);
        }
        self.finished = true;
        let Some(conn) = self.inner.as_mut() else {
            return Ok(TxOutcome::AlreadyClosed);
        };
        if conn.is_closed()? {
            tracing::debug!("transaction scope ended on a closed connection");
            return Ok(TxOutcome::AlreadyClosed);
        }

        let decided = if self.complete {
            conn.commit().map(|()| TxOutcome::Committed)
        } else {
            conn.rollback().map(|()| TxOutcome::RolledBack)
        };
        let released = if self.release_inner {
            conn.close()
        } else {
            Ok(())
        };

        match (decided, released) {
            (Ok(outcome), Ok(())) => {
                tracing::debug!(?outcome, "transaction scope ended");
                Ok(outcome)
            }
            (Ok(_), Err(close_err)) => Err(close_err),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(close_err)) => Err(StealthDbError::chain(err, close_err)),
        }
    }

    fn open(&self) -> Result<&dyn Connection, StealthDbError> {
        match &self.inner {
            Some(conn) if !self.finished => Ok(conn.as_ref()),
            _ => Err(scope_closed()),
        }
    }

    fn open_mut(&mut self) -> Result<&mut dyn Connection, StealthDbError> {
        match &mut self.inner {
            Some(conn) if !self.finished => Ok(conn.as_mut()),
            _ => Err(scope_closed()),
        }
    }
}

fn prepare(
    conn: &mut dyn Connection,
    isolation: Option<IsolationLevel>,
) -> Result<(), StealthDbError> {
    if conn.isolation()? == IsolationLevel::None {
        return Err(StealthDbError::ExecutionError(
            "Transactions not supported.".into(),
        ));
    }
    if let Some(level) = isolation {
        conn.set_isolation(level)?;
    }
    conn.set_auto_commit(false)
}

impl Drop for TransactionScope {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        match self.finish() {
            Ok(outcome) => tracing::debug!(?outcome, "transaction scope ended on drop"),
            Err(err) => tracing::warn!(error = %err, "failed to end transaction scope on drop"),
        }
    }
}

impl Connection for TransactionScope {
    fn create_statement(&mut self) -> Result<Box<dyn Statement>, StealthDbError> {
        self.open_mut()?.create_statement()
    }

    fn auto_commit(&self) -> Result<bool, StealthDbError> {
        self.open()?.auto_commit()
    }

    fn set_auto_commit(&mut self, auto_commit: bool) -> Result<(), StealthDbError> {
        if auto_commit {
            return Err(StealthDbError::IllegalState(
                "failed to enable auto-commit inside a transaction scope".into(),
            ));
        }
        self.open()?;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StealthDbError> {
        self.open_mut()?.commit()
    }

    fn rollback(&mut self) -> Result<(), StealthDbError> {
        self.open_mut()?.rollback()
    }

    fn close(&mut self) -> Result<(), StealthDbError> {
        self.finish().map(|_| ())
    }

    fn is_closed(&self) -> Result<bool, StealthDbError> {
        match &self.inner {
            Some(conn) => conn.is_closed(),
            None => Ok(true),
        }
    }

    fn isolation(&self) -> Result<IsolationLevel, StealthDbError> {
        self.open()?.isolation()
    }

    fn set_isolation(&mut self, level: IsolationLevel) -> Result<(), StealthDbError> {
        self.open_mut()?.set_isolation(level)
    }

    fn holdability(&self) -> Result<Holdability, StealthDbError> {
        self.open()?.holdability()
    }

    fn set_holdability(&mut self, holdability: Holdability) -> Result<(), StealthDbError> {
        self.open_mut()?.set_holdability(holdability)
    }

    fn read_only(&self) -> Result<bool, StealthDbError> {
        self.open()?.read_only()
    }

    fn set_read_only(&mut self, read_only: bool) -> Result<(), StealthDbError> {
        self.open_mut()?.set_read_only(read_only)
    }

    fn catalog(&self) -> Result<Option<String>, StealthDbError> {
        self.open()?.catalog()
    }

    fn set_catalog(&mut self, catalog: Option<String>) -> Result<(), StealthDbError> {
        self.open_mut()?.set_catalog(catalog)
    }

    fn schema(&self) -> Result<Option<String>, StealthDbError> {
        self.open()?.schema()
    }

    fn set_schema(&mut self, schema: Option<String>) -> Result<(), StealthDbError> {
        self.open_mut()?.set_schema(schema)
    }

    fn client_info(&self) -> Result<ClientInfo, StealthDbError> {
        self.open()?.client_info()
    }

    fn set_client_info(&mut self, info: ClientInfo) -> Result<(), StealthDbError> {
        self.open_mut()?.set_client_info(info)
    }

    fn set_client_info_entry(&mut self, name: &str, value: &str) -> Result<(), StealthDbError> {
        self.open_mut()?.set_client_info_entry(name, value)
    }

    fn type_map(&self) -> Result<TypeMap, StealthDbError> {
        self.open()?.type_map()
    }

    fn set_type_map(&mut self, map: TypeMap) -> Result<(), StealthDbError> {
        self.open_mut()?.set_type_map(map)
    }

    fn in_scoped_transaction(&self) -> bool {
        true
    }
}
