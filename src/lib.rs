//! Materialized, type-coercing query results plus sticky connection leases
//! and flag-decided transaction scopes over a pluggable SQL driver.
//!
//! Drivers supply three collaborators: a [`cursor::RowCursor`], a
//! [`connection::Connection`] and a [`connection::ConnectionProvider`].
//! Everything else in this crate is built on those.

pub mod config;
pub mod connection;
pub mod conversion;
pub mod cursor;
pub mod driver;
pub mod engine;
pub mod error;
pub mod pool;
pub mod prelude;
pub mod readers;
pub mod results;
pub mod transaction;
pub mod tx_outcome;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{EngineOptions, EngineOptionsBuilder};
pub use engine::SqlEngine;
pub use error::{ConversionError, DriverError, StealthDbError};
pub use results::{QueryRecord, ResultTable};
pub use transaction::{TransactionOptions, TransactionScope};
pub use tx_outcome::TxOutcome;
