//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::config::{EngineOptions, EngineOptionsBuilder};
pub use crate::connection::{Connection, ConnectionProvider, Statement};
pub use crate::cursor::{BinaryRead, ColumnMetadata, RowCursor};
pub use crate::engine::{SqlEngine, execute_on, query_on};
pub use crate::error::{ConversionError, DriverError, StealthDbError};
pub use crate::pool::{ConnectionLease, LeaseState, StickyProvider};
pub use crate::readers::{FirstValue, FromValue, HasRecords, QueryReader, TableReader};
pub use crate::results::{FieldRef, QueryRecord, ResultTable};
pub use crate::transaction::{TransactionOptions, TransactionScope};
pub use crate::tx_outcome::TxOutcome;
pub use crate::types::{FieldKind, Holdability, IsolationLevel, OffsetTime, Value};
