use std::fmt;
use std::sync::Arc;

use chrono::{FixedOffset, Local};

use crate::cursor::RowCursor;
use crate::error::StealthDbError;
use crate::types::FieldKind;

use super::field::{Field, FieldCatalog};
use super::materialize::materialize;
use super::row::{FieldRef, QueryRecord};

const RULE_MIN_WIDTH: usize = 25;

/// Immutable, fully materialized query result.
///
/// Built in one pass from a cursor before it is returned; holds no external
/// resource and can be shared across threads for reading.
#[derive(Debug, Clone)]
pub struct ResultTable {
    catalog: Arc<FieldCatalog>,
    records: Vec<QueryRecord>,
    zone: FixedOffset,
}

impl ResultTable {
    /// Materialize `cursor` using the local offset as the result's zone.
    ///
    /// # Errors
    /// Returns the first cursor, conversion or range failure; no table is
    /// produced in that case.
    pub fn from_cursor(cursor: &mut dyn RowCursor) -> Result<Self, StealthDbError> {
        Self::from_cursor_in_zone(cursor, *Local::now().offset())
    }

    /// Materialize `cursor`, attaching `zone` to local temporal values whenever
    /// they are later read as offset kinds.
    ///
    /// # Errors
    /// Returns the first cursor, conversion or range failure; no table is
    /// produced in that case.
    pub fn from_cursor_in_zone(
        cursor: &mut dyn RowCursor,
        zone: FixedOffset,
    ) -> Result<Self, StealthDbError> {
        let (catalog, records) = materialize(cursor, zone)?;
        Ok(Self {
            catalog,
            records,
            zone,
        })
    }

    #[must_use]
    pub fn zone(&self) -> FixedOffset {
        self.zone
    }

    #[must_use]
    pub fn fields(&self) -> &[Field] {
        self.catalog.fields()
    }

    #[must_use]
    pub fn field_count(&self) -> usize {
        self.catalog.len()
    }

    /// Ordinal of the field called `name`, ignoring case.
    #[must_use]
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.catalog.index_of(name)
    }

    /// # Errors
    /// Returns an error if the ordinal is out of range.
    pub fn field_name(&self, ordinal: usize) -> Result<&str, StealthDbError> {
        self.catalog.field(ordinal).map(Field::name)
    }

    /// Declared kind of a field.
    ///
    /// # Errors
    /// Returns an error if the field does not exist.
    pub fn field_kind(&self, field: impl FieldRef) -> Result<FieldKind, StealthDbError> {
        let ordinal = field.resolve(&self.catalog)?;
        self.catalog.field(ordinal).map(Field::kind)
    }

    /// # Errors
    /// Returns an error if the field does not exist.
    pub fn is_signed(&self, field: impl FieldRef) -> Result<bool, StealthDbError> {
        let ordinal = field.resolve(&self.catalog)?;
        self.catalog.field(ordinal).map(Field::is_signed)
    }

    #[must_use]
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn has_records(&self) -> bool {
        !self.records.is_empty()
    }

    #[must_use]
    pub fn record(&self, index: usize) -> Option<&QueryRecord> {
        self.records.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, QueryRecord> {
        self.records.iter()
    }
}

impl<'a> IntoIterator for &'a ResultTable {
    type Item = &'a QueryRecord;
    type IntoIter = std::slice::Iter<'a, QueryRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl IntoIterator for ResultTable {
    type Item = QueryRecord;
    type IntoIter = std::vec::IntoIter<QueryRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl fmt::Display for ResultTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header = self.catalog.to_string();
        writeln!(f, "{header}")?;
        writeln!(f, "{}", "~".repeat(header.len().max(RULE_MIN_WIDTH)))?;
        if self.records.is_empty() {
            return writeln!(f, "(empty)");
        }
        for record in &self.records {
            let cells: Vec<String> = (0..record.field_count())
                .map(|i| match record.get_value(i) {
                    Ok(value) => value.to_string(),
                    Err(_) => String::new(),
                })
                .collect();
            writeln!(f, "{}", cells.join(", "))?;
        }
        Ok(())
    }
}
