//! Strategies that turn a cursor into a caller-facing value.

use std::marker::PhantomData;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;

use crate::conversion::convert;
use crate::cursor::RowCursor;
use crate::error::StealthDbError;
use crate::results::ResultTable;
use crate::results::field::FieldCatalog;
use crate::results::materialize::{BinaryBuffer, read_field};
use crate::types::{FieldKind, OffsetTime, Value};

/// Consumes a cursor and produces a value.
///
/// Readers never keep the cursor past [`QueryReader::read`].
pub trait QueryReader {
    type Output;

    /// # Errors
    /// Returns the cursor, conversion or range failure met while reading.
    fn read(
        &self,
        cursor: &mut dyn RowCursor,
        zone: FixedOffset,
    ) -> Result<Self::Output, StealthDbError>;
}

/// Materializes the whole cursor.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableReader;

impl QueryReader for TableReader {
    type Output = ResultTable;

    fn read(
        &self,
        cursor: &mut dyn RowCursor,
        zone: FixedOffset,
    ) -> Result<ResultTable, StealthDbError> {
        ResultTable::from_cursor_in_zone(cursor, zone)
    }
}

/// True when the cursor yields at least one row.
#[derive(Debug, Clone, Copy, Default)]
pub struct HasRecords;

impl QueryReader for HasRecords {
    type Output = bool;

    fn read(&self, cursor: &mut dyn RowCursor, _zone: FixedOffset) -> Result<bool, StealthDbError> {
        cursor.advance()
    }
}

/// Rust types a single canonical value can be read back as.
pub trait FromValue: Sized {
    const KIND: FieldKind;

    /// Extract from a value already converted to [`FromValue::KIND`].
    fn from_value(value: Value) -> Option<Self>;
}

macro_rules! impl_from_value {
    ($ty:ty, $kind:ident, $variant:ident) => {
        impl FromValue for $ty {
            const KIND: FieldKind = FieldKind::$kind;

            fn from_value(value: Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

impl_from_value!(bool, Bool, Bool);
impl_from_value!(i8, Tiny, Tiny);
impl_from_value!(i16, Small, Small);
impl_from_value!(i32, Int32, Int32);
impl_from_value!(i64, Int64, Int64);
impl_from_value!(i128, BigInt, BigInt);
impl_from_value!(f32, Real32, Real32);
impl_from_value!(f64, Real64, Real64);
impl_from_value!(Decimal, Decimal, Decimal);
impl_from_value!(char, Char, Char);
impl_from_value!(String, String, Text);
impl_from_value!(NaiveDate, Date, Date);
impl_from_value!(NaiveTime, Time, Time);
impl_from_value!(NaiveDateTime, DateTime, DateTime);
impl_from_value!(OffsetTime, OffsetTime, OffsetTime);
impl_from_value!(DateTime<FixedOffset>, OffsetDateTime, OffsetDateTime);
impl_from_value!(Vec<u8>, Binary, Binary);

/// Reads the first field of the first row as `T`.
///
/// Yields the default (normally `None`) when there are no rows or the value
/// is SQL NULL.
#[derive(Debug, Clone)]
pub struct FirstValue<T> {
    default: Option<T>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Default for FirstValue<T> {
    fn default() -> Self {
        Self {
            default: None,
            _marker: PhantomData,
        }
    }
}

impl<T: FromValue + Clone> FirstValue<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fall back to `default` instead of `None`.
    #[must_use]
    pub fn with_default(default: T) -> Self {
        Self {
            default: Some(default),
            _marker: PhantomData,
        }
    }
}

impl<T: FromValue + Clone> QueryReader for FirstValue<T> {
    type Output = Option<T>;

    fn read(
        &self,
        cursor: &mut dyn RowCursor,
        zone: FixedOffset,
    ) -> Result<Option<T>, StealthDbError> {
        let catalog = FieldCatalog::from_cursor(cursor)?;
        let field = catalog.field(0)?;
        if !cursor.advance()? {
            return Ok(self.default.clone());
        }
        let mut buffer = BinaryBuffer::new();
        let stored = read_field(cursor, field, &mut buffer, zone)?;
        let converted = convert(&stored, T::KIND, zone)?;
        Ok(T::from_value(converted).or_else(|| self.default.clone()))
    }
}
