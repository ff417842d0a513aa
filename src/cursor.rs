//! Row cursor contract consumed by materialization.
//!
//! A cursor is forward-only and single-pass. Drivers implement [`RowCursor`];
//! the crate never re-reads a row once it has advanced past it.

use crate::error::StealthDbError;
use crate::types::{FieldKind, Value};

/// Column description reported by a cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMetadata {
    pub name: String,
    pub kind: FieldKind,
    pub signed: bool,
}

impl ColumnMetadata {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            signed: true,
        }
    }

    /// Mark the column as unsigned.
    #[must_use]
    pub fn unsigned(mut self) -> Self {
        self.signed = false;
        self
    }
}

/// Result of one binary chunk read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryRead {
    /// The column is SQL NULL in the current row
    Null,
    /// This many bytes were written to the front of the buffer
    Bytes(usize),
    /// The column's byte stream is exhausted
    Eof,
}

/// Forward-only source of rows supplied by a driver.
pub trait RowCursor {
    /// Move to the next row. Returns `false` once the cursor is exhausted.
    ///
    /// # Errors
    /// Returns the driver failure that interrupted the scan.
    fn advance(&mut self) -> Result<bool, StealthDbError>;

    fn column_count(&self) -> usize;

    /// # Errors
    /// Returns an error if `index` is not a column of this cursor.
    fn column_metadata(&self, index: usize) -> Result<ColumnMetadata, StealthDbError>;

    /// Read the value of column `index` in the current row.
    ///
    /// `kind` is the kind the caller would like back. Drivers should honor it
    /// when they can, but may hand back any kind; the caller converts.
    ///
    /// # Errors
    /// Returns the driver failure reading the value.
    fn read_value(&mut self, index: usize, kind: FieldKind) -> Result<Value, StealthDbError>;

    /// Copy the next chunk of a binary column's byte stream into `buf`.
    ///
    /// Successive calls within one row continue where the last one stopped.
    ///
    /// # Errors
    /// Returns the driver failure reading the stream.
    fn read_binary_chunk(
        &mut self,
        index: usize,
        buf: &mut [u8],
    ) -> Result<BinaryRead, StealthDbError>;
}
