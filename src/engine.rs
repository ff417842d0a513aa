//! High-level entry point tying providers, readers and transaction scopes
//! together.

use std::sync::Arc;

use chrono::{FixedOffset, Local};

use crate::config::EngineOptions;
use crate::connection::{Connection, ConnectionProvider};
use crate::error::StealthDbError;
use crate::pool::StickyProvider;
use crate::readers::{HasRecords, QueryReader, TableReader};
use crate::results::ResultTable;
use crate::transaction::{TransactionOptions, TransactionScope};

const BLANK_SQL: &str =
    "Unable to generate a SQL statement starting from a null or blank string.";

fn check_sql(sql: &str) -> Result<(), StealthDbError> {
    if sql.trim().is_empty() {
        Err(StealthDbError::ConfigError(BLANK_SQL.into()))
    } else {
        Ok(())
    }
}

fn check_batch(commands: &[&str]) -> Result<(), StealthDbError> {
    if commands.is_empty() {
        return Err(StealthDbError::ConfigError(
            "no SQL commands to execute".into(),
        ));
    }
    commands.iter().try_for_each(|sql| check_sql(sql))
}

fn add_count(total: i64, count: i64) -> Result<i64, StealthDbError> {
    total.checked_add(count).ok_or_else(|| {
        StealthDbError::ExecutionError(format!(
            "row count overflow adding {count} to {total}"
        ))
    })
}

/// Combine an operation's result with the result of releasing its connection.
fn settle<T>(
    result: Result<T, StealthDbError>,
    released: Result<(), StealthDbError>,
) -> Result<T, StealthDbError> {
    match (result, released) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(err)) | (Err(err), Ok(())) => Err(err),
        (Err(err), Err(close_err)) => Err(StealthDbError::chain(err, close_err)),
    }
}

/// Run `sql` on `conn` and read the cursor with `reader`.
///
/// # Errors
/// Returns [`StealthDbError::ConfigError`] for blank SQL, otherwise the
/// driver or reader failure.
pub fn query_with_on<R: QueryReader>(
    conn: &mut dyn Connection,
    sql: &str,
    reader: &R,
    zone: FixedOffset,
) -> Result<R::Output, StealthDbError> {
    check_sql(sql)?;
    let mut stmt = conn.create_statement()?;
    let mut cursor = stmt.execute_query(sql)?;
    reader.read(cursor.as_mut(), zone)
}

/// Run `sql` on `conn` and materialize the result in the local zone.
///
/// # Errors
/// See [`query_with_on`].
pub fn query_on(conn: &mut dyn Connection, sql: &str) -> Result<ResultTable, StealthDbError> {
    query_with_on(conn, sql, &TableReader, *Local::now().offset())
}

/// Run a data-modifying statement on `conn`.
///
/// # Errors
/// Returns [`StealthDbError::ConfigError`] for blank SQL, otherwise the
/// driver failure.
pub fn execute_on(conn: &mut dyn Connection, sql: &str) -> Result<i64, StealthDbError> {
    check_sql(sql)?;
    conn.create_statement()?.execute_update(sql)
}

/// Run several statements on `conn` and return the summed row count.
///
/// A negative count from any statement is returned as is and the remaining
/// statements are skipped.
///
/// # Errors
/// Returns [`StealthDbError::ConfigError`] for an empty batch or a blank
/// command, otherwise the driver failure.
pub fn execute_all_on(conn: &mut dyn Connection, commands: &[&str]) -> Result<i64, StealthDbError> {
    check_batch(commands)?;
    let mut stmt = conn.create_statement()?;
    let mut total = 0;
    for sql in commands {
        let count = stmt.execute_update(sql)?;
        if count < 0 {
            return Ok(count);
        }
        total = add_count(total, count)?;
    }
    Ok(total)
}

/// Runs queries and statements on connections from a sticky provider.
///
/// Every connection the engine obtains is closed when the operation ends;
/// with keep-alive on, that close restores the shared connection instead.
#[derive(Debug)]
pub struct SqlEngine {
    provider: StickyProvider,
    options: EngineOptions,
}

impl SqlEngine {
    /// # Errors
    /// Returns [`StealthDbError::ConfigError`] if the options are invalid.
    pub fn new(
        provider: Arc<dyn ConnectionProvider>,
        options: EngineOptions,
    ) -> Result<Self, StealthDbError> {
        options.validate()?;
        let provider = StickyProvider::new(provider);
        if options.keep_alive {
            provider.set_keep_alive(true)?;
        }
        Ok(Self { provider, options })
    }

    #[must_use]
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Zone results are materialized in.
    #[must_use]
    pub fn zone(&self) -> FixedOffset {
        self.options
            .time_zone
            .unwrap_or_else(|| *Local::now().offset())
    }

    fn with_connection<T>(
        &self,
        op: impl FnOnce(&mut dyn Connection) -> Result<T, StealthDbError>,
    ) -> Result<T, StealthDbError> {
        let mut conn = self.provider.acquire()?;
        let result = op(conn.as_mut());
        settle(result, conn.close())
    }

    fn in_transaction<T>(
        &self,
        op: impl FnOnce(&mut TransactionScope) -> Result<T, StealthDbError>,
    ) -> Result<T, StealthDbError> {
        let mut tran = self.begin_transaction()?;
        let result = op(&mut tran);
        settle(result, tran.close().map(|_| ()))
    }

    /// # Errors
    /// Returns [`StealthDbError::ConfigError`] for blank SQL, otherwise the
    /// connection, driver or materialization failure.
    pub fn query(&self, sql: &str) -> Result<ResultTable, StealthDbError> {
        self.query_with(sql, &TableReader)
    }

    /// # Errors
    /// Returns [`StealthDbError::ConfigError`] for blank SQL, otherwise the
    /// connection, driver or reader failure.
    pub fn query_with<R: QueryReader>(
        &self,
        sql: &str,
        reader: &R,
    ) -> Result<R::Output, StealthDbError> {
        check_sql(sql)?;
        let zone = self.zone();
        self.with_connection(|conn| query_with_on(conn, sql, reader, zone))
    }

    /// # Errors
    /// See [`SqlEngine::query_with`].
    pub fn has_record(&self, sql: &str) -> Result<bool, StealthDbError> {
        self.query_with(sql, &HasRecords)
    }

    /// # Errors
    /// Returns [`StealthDbError::ConfigError`] for blank SQL, otherwise the
    /// connection or driver failure.
    pub fn execute(&self, sql: &str) -> Result<i64, StealthDbError> {
        check_sql(sql)?;
        self.with_connection(|conn| execute_on(conn, sql))
    }

    /// Run `sql` either directly or inside a transaction scope.
    ///
    /// # Errors
    /// See [`SqlEngine::execute`] and [`SqlEngine::execute_tran`].
    pub fn execute_mode(&self, sql: &str, transactional: bool) -> Result<i64, StealthDbError> {
        if transactional {
            self.execute_tran(sql)
        } else {
            self.execute(sql)
        }
    }

    /// # Errors
    /// See [`execute_all_on`].
    pub fn execute_all(&self, commands: &[&str]) -> Result<i64, StealthDbError> {
        check_batch(commands)?;
        self.with_connection(|conn| execute_all_on(conn, commands))
    }

    /// Run `sql` in a transaction scope that commits when the row count is
    /// not negative.
    ///
    /// # Errors
    /// Returns [`StealthDbError::ConfigError`] for blank SQL, otherwise the
    /// failure opening, running or ending the transaction.
    pub fn execute_tran(&self, sql: &str) -> Result<i64, StealthDbError> {
        check_sql(sql)?;
        self.in_transaction(|tran| {
            let count = tran.create_statement()?.execute_update(sql)?;
            if count >= 0 {
                tran.complete();
            }
            Ok(count)
        })
    }

    /// Run a batch in one transaction scope that commits only when the summed
    /// row count is positive.
    ///
    /// A negative count is returned as is and the transaction rolls back.
    ///
    /// # Errors
    /// Returns [`StealthDbError::ConfigError`] for an empty batch or a blank
    /// command, otherwise the failure opening, running or ending the
    /// transaction.
    pub fn execute_tran_all(&self, commands: &[&str]) -> Result<i64, StealthDbError> {
        check_batch(commands)?;
        self.in_transaction(|tran| {
            let mut stmt = tran.create_statement()?;
            let mut total = 0;
            for sql in commands {
                let count = stmt.execute_update(sql)?;
                if count < 0 {
                    return Ok(count);
                }
                total = add_count(total, count)?;
            }
            if total > 0 {
                tran.complete();
            }
            Ok(total)
        })
    }

    /// Open a transaction scope on a connection from the provider.
    ///
    /// # Errors
    /// Returns the connection failure or the scope's own begin failure.
    pub fn begin_transaction(&self) -> Result<TransactionScope, StealthDbError> {
        let conn = self.provider.acquire()?;
        let mut options = TransactionOptions::new().with_release_inner(self.options.release_on_close);
        options.isolation = self.options.isolation;
        TransactionScope::begin_with(conn, options)
    }

    /// # Errors
    /// See [`StickyProvider::set_keep_alive`].
    pub fn set_keep_alive(&self, keep_alive: bool) -> Result<(), StealthDbError> {
        self.provider.set_keep_alive(keep_alive)
    }

    #[must_use]
    pub fn is_kept_alive(&self) -> bool {
        self.provider.is_kept_alive()
    }

    /// Close the kept-alive connection, if any.
    ///
    /// # Errors
    /// See [`StickyProvider::dispose`].
    pub fn dispose(&self) -> Result<bool, StealthDbError> {
        self.provider.dispose()
    }

    /// [`SqlEngine::query`] on the blocking thread pool.
    ///
    /// # Errors
    /// See [`SqlEngine::query`]; a panicked worker is reported as
    /// [`StealthDbError::ExecutionError`].
    pub async fn query_async(
        self: Arc<Self>,
        sql: impl Into<String>,
    ) -> Result<ResultTable, StealthDbError> {
        let sql = sql.into();
        run_blocking(move || self.query(&sql)).await
    }

    /// [`SqlEngine::execute`] on the blocking thread pool.
    ///
    /// # Errors
    /// See [`SqlEngine::execute`]; a panicked worker is reported as
    /// [`StealthDbError::ExecutionError`].
    pub async fn execute_async(
        self: Arc<Self>,
        sql: impl Into<String>,
    ) -> Result<i64, StealthDbError> {
        let sql = sql.into();
        run_blocking(move || self.execute(&sql)).await
    }
}

async fn run_blocking<F, R>(func: F) -> Result<R, StealthDbError>
where
    F: FnOnce() -> Result<R, StealthDbError> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(func)
        .await
        .map_err(|e| StealthDbError::ExecutionError(format!("spawn_blocking join error: {e}")))?
}
