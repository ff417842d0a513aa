use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;

use crate::conversion::{convert, render};
use crate::error::StealthDbError;
use crate::types::{FieldKind, OffsetTime, Value};

use super::field::FieldCatalog;

/// Addresses a field either by ordinal or by case-insensitive name.
pub trait FieldRef {
    /// # Errors
    /// Returns an error if the field does not exist in `catalog`.
    fn resolve(&self, catalog: &FieldCatalog) -> Result<usize, StealthDbError>;
}

impl FieldRef for usize {
    fn resolve(&self, catalog: &FieldCatalog) -> Result<usize, StealthDbError> {
        catalog.field(*self).map(|field| field.ordinal())
    }
}

impl FieldRef for &str {
    fn resolve(&self, catalog: &FieldCatalog) -> Result<usize, StealthDbError> {
        catalog.resolve(self)
    }
}

impl FieldRef for &String {
    fn resolve(&self, catalog: &FieldCatalog) -> Result<usize, StealthDbError> {
        catalog.resolve(self)
    }
}

macro_rules! coerced_getter {
    ($(#[$meta:meta])* $name:ident, $kind:ident, $variant:ident, $ty:ty) => {
        $(#[$meta])*
        ///
        /// # Errors
        /// Returns an error if the field does not exist or its value cannot be
        /// converted to the requested kind.
        pub fn $name(&self, field: impl FieldRef) -> Result<Option<$ty>, StealthDbError> {
            match self.coerced(field, FieldKind::$kind)? {
                Value::$variant(value) => Ok(Some(value)),
                _ => Ok(None),
            }
        }
    };
}

/// One materialized row.
///
/// Getters return `Ok(None)` for SQL NULL and convert the stored canonical
/// value to the requested kind on every call.
#[derive(Debug, Clone)]
pub struct QueryRecord {
    catalog: Arc<FieldCatalog>,
    values: Box<[Value]>,
    zone: FixedOffset,
}

impl QueryRecord {
    pub(crate) fn new(catalog: Arc<FieldCatalog>, values: Box<[Value]>, zone: FixedOffset) -> Self {
        Self {
            catalog,
            values,
            zone,
        }
    }

    #[must_use]
    pub fn field_count(&self) -> usize {
        self.values.len()
    }

    /// # Errors
    /// Returns an error if the ordinal is out of range.
    pub fn field_name(&self, ordinal: usize) -> Result<&str, StealthDbError> {
        self.catalog.field(ordinal).map(|field| field.name())
    }

    /// # Errors
    /// Returns an error if the field does not exist.
    pub fn is_signed(&self, field: impl FieldRef) -> Result<bool, StealthDbError> {
        let ordinal = field.resolve(&self.catalog)?;
        self.catalog.field(ordinal).map(|field| field.is_signed())
    }

    /// The stored canonical value.
    ///
    /// # Errors
    /// Returns an error if the field does not exist.
    pub fn get_value(&self, field: impl FieldRef) -> Result<&Value, StealthDbError> {
        let ordinal = field.resolve(&self.catalog)?;
        self.values
            .get(ordinal)
            .ok_or(StealthDbError::FieldIndexOutOfRange {
                index: ordinal,
                count: self.values.len(),
            })
    }

    /// Whether the field holds SQL NULL.
    ///
    /// # Errors
    /// Returns an error if the field does not exist.
    pub fn is_null(&self, field: impl FieldRef) -> Result<bool, StealthDbError> {
        self.get_value(field).map(Value::is_null)
    }

    /// The stored value converted to `kind`.
    ///
    /// # Errors
    /// Returns an error if the field does not exist or the conversion fails.
    pub fn get_as(&self, field: impl FieldRef, kind: FieldKind) -> Result<Value, StealthDbError> {
        self.coerced(field, kind)
    }

    fn coerced(&self, field: impl FieldRef, kind: FieldKind) -> Result<Value, StealthDbError> {
        let value = self.get_value(field)?;
        Ok(convert(value, kind, self.zone)?)
    }

    /// Textual rendering of the field; never fails for an existing field.
    ///
    /// # Errors
    /// Returns an error only if the field does not exist.
    pub fn get_string(&self, field: impl FieldRef) -> Result<Option<String>, StealthDbError> {
        self.get_value(field).map(render)
    }

    coerced_getter!(get_bool, Bool, Bool, bool);
    coerced_getter!(
        /// 8-bit signed integer.
        get_i8, Tiny, Tiny, i8
    );
    coerced_getter!(get_i16, Small, Small, i16);
    coerced_getter!(get_i32, Int32, Int32, i32);
    coerced_getter!(get_i64, Int64, Int64, i64);
    coerced_getter!(
        /// Unbounded integer; every unsigned 64-bit value fits.
        get_i128, BigInt, BigInt, i128
    );
    coerced_getter!(get_f32, Real32, Real32, f32);
    coerced_getter!(get_f64, Real64, Real64, f64);
    coerced_getter!(get_decimal, Decimal, Decimal, Decimal);
    coerced_getter!(get_char, Char, Char, char);
    coerced_getter!(get_date, Date, Date, NaiveDate);
    coerced_getter!(get_time, Time, Time, NaiveTime);
    coerced_getter!(get_datetime, DateTime, DateTime, NaiveDateTime);
    coerced_getter!(
        /// Time of day with the offset of the result's zone attached when the
        /// stored value is local.
        get_offset_time, OffsetTime, OffsetTime, OffsetTime
    );
    coerced_getter!(
        get_offset_datetime,
        OffsetDateTime,
        OffsetDateTime,
        DateTime<FixedOffset>
    );
    coerced_getter!(get_bytes, Binary, Binary, Vec<u8>);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::ColumnMetadata;
    use crate::error::ConversionError;

    fn record() -> QueryRecord {
        let catalog = Arc::new(FieldCatalog::from_metadata(vec![
            ColumnMetadata::new("count", FieldKind::Int32),
            ColumnMetadata::new("label", FieldKind::String),
            ColumnMetadata::new("payload", FieldKind::Binary),
            ColumnMetadata::new("missing", FieldKind::Int64),
        ]));
        QueryRecord::new(
            catalog,
            vec![
                Value::Int32(40000),
                Value::Text("12".into()),
                Value::Binary(vec![0xde, 0xad]),
                Value::Null,
            ]
            .into_boxed_slice(),
            FixedOffset::east_opt(0).unwrap(),
        )
    }

    #[test]
    fn getters_by_ordinal_and_name_agree() {
        let record = record();
        assert_eq!(record.get_i64(0).unwrap(), Some(40000));
        assert_eq!(record.get_i64("COUNT").unwrap(), Some(40000));
        assert_eq!(record.get_i32("label").unwrap(), Some(12));
    }

    #[test]
    fn narrowing_overflow_names_target() {
        let record = record();
        let err = record.get_i16("count").unwrap_err();
        match err {
            StealthDbError::Conversion(ConversionError::Overflow { target, .. }) => {
                assert_eq!(target.name(), "small");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn strings_never_fail() {
        let record = record();
        assert_eq!(record.get_string(2).unwrap().as_deref(), Some("0xdead"));
        assert_eq!(record.get_string("missing").unwrap(), None);
        assert_eq!(record.get_i64("missing").unwrap(), None);
    }

    #[test]
    fn unknown_fields_are_reported() {
        let record = record();
        assert!(matches!(
            record.get_i32("nope"),
            Err(StealthDbError::FieldNotFound(name)) if name == "nope"
        ));
        assert!(matches!(
            record.get_i32(9),
            Err(StealthDbError::FieldIndexOutOfRange { index: 9, count: 4 })
        ));
    }
}
