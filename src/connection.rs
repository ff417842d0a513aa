//! Connection collaborator contracts.
//!
//! Drivers implement [`Connection`], [`Statement`] and [`ConnectionProvider`].
//! The lease and the transaction scope implement [`Connection`] themselves so
//! callers can use them wherever a plain handle is expected.

use std::collections::HashMap;

use crate::cursor::RowCursor;
use crate::error::StealthDbError;
use crate::types::{Holdability, IsolationLevel};

/// Client info properties of a connection.
pub type ClientInfo = HashMap<String, String>;

/// SQL type name to application type name mapping of a connection.
pub type TypeMap = HashMap<String, String>;

/// Statement issued against a connection.
pub trait Statement: Send {
    /// Run a query and return a cursor over its rows.
    ///
    /// # Errors
    /// Returns the driver failure running the query.
    fn execute_query(&mut self, sql: &str) -> Result<Box<dyn RowCursor + '_>, StealthDbError>;

    /// Run a data-modifying statement and return the affected row count.
    ///
    /// # Errors
    /// Returns the driver failure running the statement.
    fn execute_update(&mut self, sql: &str) -> Result<i64, StealthDbError>;
}

/// A database connection handle.
///
/// Every method reports driver failures as [`StealthDbError`]; wrappers add
/// their own state errors on top.
#[allow(clippy::missing_errors_doc)]
pub trait Connection: Send {
    fn create_statement(&mut self) -> Result<Box<dyn Statement>, StealthDbError>;

    fn auto_commit(&self) -> Result<bool, StealthDbError>;
    fn set_auto_commit(&mut self, auto_commit: bool) -> Result<(), StealthDbError>;

    fn commit(&mut self) -> Result<(), StealthDbError>;
    fn rollback(&mut self) -> Result<(), StealthDbError>;

    fn close(&mut self) -> Result<(), StealthDbError>;
    fn is_closed(&self) -> Result<bool, StealthDbError>;

    fn isolation(&self) -> Result<IsolationLevel, StealthDbError>;
    fn set_isolation(&mut self, level: IsolationLevel) -> Result<(), StealthDbError>;

    fn holdability(&self) -> Result<Holdability, StealthDbError>;
    fn set_holdability(&mut self, holdability: Holdability) -> Result<(), StealthDbError>;

    fn read_only(&self) -> Result<bool, StealthDbError>;
    fn set_read_only(&mut self, read_only: bool) -> Result<(), StealthDbError>;

    fn catalog(&self) -> Result<Option<String>, StealthDbError>;
    fn set_catalog(&mut self, catalog: Option<String>) -> Result<(), StealthDbError>;

    fn schema(&self) -> Result<Option<String>, StealthDbError>;
    fn set_schema(&mut self, schema: Option<String>) -> Result<(), StealthDbError>;

    fn client_info(&self) -> Result<ClientInfo, StealthDbError>;
    fn set_client_info(&mut self, info: ClientInfo) -> Result<(), StealthDbError>;
    fn set_client_info_entry(&mut self, name: &str, value: &str) -> Result<(), StealthDbError>;

    fn type_map(&self) -> Result<TypeMap, StealthDbError>;
    fn set_type_map(&mut self, map: TypeMap) -> Result<(), StealthDbError>;

    /// Whether this handle is itself a transaction scope.
    fn in_scoped_transaction(&self) -> bool {
        false
    }
}

/// Source of fresh connections.
pub trait ConnectionProvider: Send + Sync {
    /// # Errors
    /// Returns the driver failure opening the connection.
    fn connect(&self) -> Result<Box<dyn Connection>, StealthDbError>;
}
