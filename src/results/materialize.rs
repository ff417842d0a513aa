use std::sync::Arc;

use chrono::FixedOffset;

use crate::conversion::convert;
use crate::cursor::{BinaryRead, RowCursor};
use crate::error::StealthDbError;
use crate::types::{FieldKind, Value};

use super::field::{Field, FieldCatalog};
use super::row::QueryRecord;

pub(crate) const INITIAL_BINARY_CAPACITY: usize = 1024;

/// Growable scratch buffer shared by every binary column of one pass.
#[derive(Debug)]
pub(crate) struct BinaryBuffer {
    buf: Vec<u8>,
}

impl BinaryBuffer {
    pub(crate) fn new() -> Self {
        Self {
            buf: vec![0; INITIAL_BINARY_CAPACITY],
        }
    }

    #[cfg(test)]
    pub(crate) fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Drain the byte stream of column `index` in the current row.
    pub(crate) fn read_column(
        &mut self,
        cursor: &mut dyn RowCursor,
        index: usize,
    ) -> Result<Value, StealthDbError> {
        let mut filled = 0;
        loop {
            if filled == self.buf.len() {
                let doubled = self.buf.len() * 2;
                self.buf.resize(doubled, 0);
            }
            match cursor.read_binary_chunk(index, &mut self.buf[filled..])? {
                BinaryRead::Null => return Ok(Value::Null),
                BinaryRead::Bytes(0) | BinaryRead::Eof => break,
                BinaryRead::Bytes(n) => filled += n,
            }
        }
        Ok(Value::Binary(self.buf[..filled].to_vec()))
    }
}

/// Drain `cursor` into records, failing as a whole on the first error.
pub(crate) fn materialize(
    cursor: &mut dyn RowCursor,
    zone: FixedOffset,
) -> Result<(Arc<FieldCatalog>, Vec<QueryRecord>), StealthDbError> {
    let catalog = Arc::new(FieldCatalog::from_cursor(cursor)?);
    tracing::debug!(fields = catalog.len(), "materializing result");

    let mut buffer = BinaryBuffer::new();
    let mut records = Vec::new();
    while cursor.advance()? {
        let mut values = Vec::with_capacity(catalog.len());
        for field in catalog.fields() {
            values.push(read_field(cursor, field, &mut buffer, zone)?);
        }
        records.push(QueryRecord::new(
            Arc::clone(&catalog),
            values.into_boxed_slice(),
            zone,
        ));
    }

    tracing::debug!(
        rows = records.len(),
        fields = catalog.len(),
        "materialized result"
    );
    Ok((catalog, records))
}

pub(crate) fn read_field(
    cursor: &mut dyn RowCursor,
    field: &Field,
    buffer: &mut BinaryBuffer,
    zone: FixedOffset,
) -> Result<Value, StealthDbError> {
    let target = field.canonical_kind();
    if target == FieldKind::Binary {
        return buffer.read_column(cursor, field.ordinal());
    }
    let raw = cursor.read_value(field.ordinal(), target)?;
    if !field.is_signed() {
        return read_unsigned(field, &raw, zone);
    }
    match (target, raw) {
        // no canonical form; kept as the driver handed it over
        (FieldKind::Other | FieldKind::Null, raw) => Ok(raw),
        (FieldKind::Char, Value::Text(text)) => Ok(char_or_text(text)),
        (_, raw) => Ok(convert(&raw, target, zone)?),
    }
}

/// CHAR(n) values longer than one character stay text.
fn char_or_text(text: String) -> Value {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Value::Char(c),
        _ => Value::Text(text),
    }
}

/// Read an unsigned column: range-check the exact integer first, then store
/// it in the canonical kind, which always holds the whole unsigned domain.
fn read_unsigned(field: &Field, raw: &Value, zone: FixedOffset) -> Result<Value, StealthDbError> {
    let number = match reinterpret_unsigned(field.kind(), raw) {
        Some(number) => number,
        None => match convert(raw, FieldKind::BigInt, zone)? {
            Value::BigInt(number) => number,
            _ => return Ok(Value::Null),
        },
    };
    check_unsigned(field, number)?;
    Ok(convert(&Value::BigInt(number), field.canonical_kind(), zone)?)
}

/// A driver that hands back the declared signed kind for an unsigned column
/// is handing back a two's-complement bit pattern.
fn reinterpret_unsigned(declared: FieldKind, raw: &Value) -> Option<i128> {
    match (declared, raw) {
        (FieldKind::Tiny, Value::Tiny(v)) => Some(i128::from(u8::from_ne_bytes(v.to_ne_bytes()))),
        (FieldKind::Small, Value::Small(v)) => {
            Some(i128::from(u16::from_ne_bytes(v.to_ne_bytes())))
        }
        (FieldKind::Int32, Value::Int32(v)) => {
            Some(i128::from(u32::from_ne_bytes(v.to_ne_bytes())))
        }
        (FieldKind::Int64, Value::Int64(v)) => {
            Some(i128::from(u64::from_ne_bytes(v.to_ne_bytes())))
        }
        _ => None,
    }
}

fn unsigned_max(kind: FieldKind) -> i128 {
    match kind {
        FieldKind::Tiny => i128::from(u8::MAX),
        FieldKind::Small => i128::from(u16::MAX),
        FieldKind::Int32 => i128::from(u32::MAX),
        _ => i128::from(u64::MAX),
    }
}

fn check_unsigned(field: &Field, number: i128) -> Result<(), StealthDbError> {
    let max = unsigned_max(field.kind());
    if (0..=max).contains(&number) {
        Ok(())
    } else {
        Err(StealthDbError::out_of_range(format!(
            "value {number} of field '{}' is outside the unsigned {} range [0, {max}]",
            field.name(),
            field.kind()
        )))
    }
}
