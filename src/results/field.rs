use std::fmt;

use crate::cursor::{ColumnMetadata, RowCursor};
use crate::error::StealthDbError;
use crate::types::FieldKind;

/// Metadata of one result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    ordinal: usize,
    name: String,
    kind: FieldKind,
    signed: bool,
    canonical_kind: FieldKind,
}

impl Field {
    #[must_use]
    pub fn new(ordinal: usize, metadata: ColumnMetadata) -> Self {
        let signed = metadata.signed || !metadata.kind.has_sign();
        Self {
            ordinal,
            canonical_kind: metadata.kind.canonical(signed),
            name: metadata.name,
            kind: metadata.kind,
            signed,
        }
    }

    #[must_use]
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Kind declared by the cursor.
    #[must_use]
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    #[must_use]
    pub fn is_signed(&self) -> bool {
        self.signed
    }

    /// Kind the values of this field are stored as.
    #[must_use]
    pub fn canonical_kind(&self) -> FieldKind {
        self.canonical_kind
    }
}

/// Case-insensitive name lookup over a catalog.
///
/// Entries are sorted by folded name with a stable sort, so fields whose
/// names differ only by case stay in ordinal order and a lookup returns the
/// lowest ordinal among them.
#[derive(Debug, Clone, Default)]
pub struct NameIndex {
    sorted: Box<[(String, usize)]>,
}

impl NameIndex {
    fn build(fields: &[Field]) -> Self {
        let mut sorted: Vec<(String, usize)> = fields
            .iter()
            .map(|field| (fold(&field.name), field.ordinal))
            .collect();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));
        Self {
            sorted: sorted.into_boxed_slice(),
        }
    }

    /// Ordinal of the field called `name`, ignoring case.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<usize> {
        let key = fold(name);
        let pos = self
            .sorted
            .partition_point(|(candidate, _)| candidate.as_str() < key.as_str());
        self.sorted
            .get(pos)
            .filter(|(candidate, _)| *candidate == key)
            .map(|(_, ordinal)| *ordinal)
    }
}

fn fold(name: &str) -> String {
    name.to_lowercase()
}

/// Ordinal-ordered field list plus its name index.
#[derive(Debug, Clone, Default)]
pub struct FieldCatalog {
    fields: Box<[Field]>,
    index: NameIndex,
}

impl FieldCatalog {
    #[must_use]
    pub fn from_metadata(columns: Vec<ColumnMetadata>) -> Self {
        let fields: Vec<Field> = columns
            .into_iter()
            .enumerate()
            .map(|(ordinal, metadata)| Field::new(ordinal, metadata))
            .collect();
        let index = NameIndex::build(&fields);
        Self {
            fields: fields.into_boxed_slice(),
            index,
        }
    }

    /// Describe every column of `cursor`.
    ///
    /// # Errors
    /// Returns the cursor's failure to report metadata.
    pub fn from_cursor(cursor: &dyn RowCursor) -> Result<Self, StealthDbError> {
        let columns = (0..cursor.column_count())
            .map(|i| cursor.column_metadata(i))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_metadata(columns))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// # Errors
    /// Returns [`StealthDbError::FieldIndexOutOfRange`] for an unknown ordinal.
    pub fn field(&self, ordinal: usize) -> Result<&Field, StealthDbError> {
        self.fields
            .get(ordinal)
            .ok_or(StealthDbError::FieldIndexOutOfRange {
                index: ordinal,
                count: self.fields.len(),
            })
    }

    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.lookup(name)
    }

    /// # Errors
    /// Returns [`StealthDbError::FieldNotFound`] when no field has that name.
    pub fn resolve(&self, name: &str) -> Result<usize, StealthDbError> {
        self.index_of(name)
            .ok_or_else(|| StealthDbError::FieldNotFound(name.to_string()))
    }
}

impl fmt::Display for FieldCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.fields.iter().map(Field::name).collect();
        f.write_str(&names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(names: &[&str]) -> FieldCatalog {
        FieldCatalog::from_metadata(
            names
                .iter()
                .map(|name| ColumnMetadata::new(*name, FieldKind::Int32))
                .collect(),
        )
    }

    #[test]
    fn lookup_ignores_case() {
        let catalog = catalog(&["Id", "userName", "CREATED_AT"]);
        for (ordinal, field) in catalog.fields().iter().enumerate() {
            assert_eq!(catalog.index_of(field.name()), Some(ordinal));
            assert_eq!(catalog.index_of(&field.name().to_uppercase()), Some(ordinal));
            assert_eq!(catalog.index_of(&field.name().to_lowercase()), Some(ordinal));
        }
        assert_eq!(catalog.index_of("missing"), None);
    }

    #[test]
    fn duplicate_names_resolve_to_lowest_ordinal() {
        let catalog = catalog(&["b", "ID", "a", "id"]);
        assert_eq!(catalog.index_of("Id"), Some(1));
    }

    #[test]
    fn unsigned_small_is_promoted() {
        let catalog = FieldCatalog::from_metadata(vec![
            ColumnMetadata::new("flags", FieldKind::Small).unsigned(),
            ColumnMetadata::new("label", FieldKind::String).unsigned(),
        ]);
        let flags = catalog.field(0).unwrap();
        assert!(!flags.is_signed());
        assert_eq!(flags.canonical_kind(), FieldKind::Int32);
        // signedness is meaningless for text
        assert!(catalog.field(1).unwrap().is_signed());
    }

    #[test]
    fn out_of_range_ordinal() {
        let catalog = catalog(&["a"]);
        assert!(matches!(
            catalog.field(3),
            Err(StealthDbError::FieldIndexOutOfRange { index: 3, count: 1 })
        ));
    }
}
