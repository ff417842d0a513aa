//! Materialized query results.
//!
//! A [`ResultTable`] is built in a single pass over a [`crate::cursor::RowCursor`]
//! and then never changes. Values are stored in their canonical kind and
//! converted on demand by the getters of [`QueryRecord`].

pub mod field;
pub(crate) mod materialize;
pub mod result_set;
pub mod row;

pub use field::{Field, FieldCatalog, NameIndex};
pub use result_set::ResultTable;
pub use row::{FieldRef, QueryRecord};
