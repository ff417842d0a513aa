use crate::cursor::{BinaryRead, ColumnMetadata, RowCursor};
use crate::error::{DriverError, StealthDbError};
use crate::types::{FieldKind, Value};

/// Scripted cursor over in-memory rows.
///
/// `read_value` hands back the scripted value whatever kind is asked for,
/// the way a loosely typed driver would. Binary and text values can be
/// streamed with `read_binary_chunk`, `chunk_size` bytes at a time.
#[derive(Debug, Clone)]
pub struct MemoryCursor {
    columns: Vec<ColumnMetadata>,
    rows: Vec<Vec<Value>>,
    position: Option<usize>,
    fail_at_row: Option<usize>,
    chunk_size: usize,
    stream_offsets: Vec<usize>,
    advanced: usize,
}

impl MemoryCursor {
    #[must_use]
    pub fn new(columns: Vec<ColumnMetadata>) -> Self {
        let count = columns.len();
        Self {
            columns,
            rows: Vec::new(),
            position: None,
            fail_at_row: None,
            chunk_size: 64,
            stream_offsets: vec![0; count],
            advanced: 0,
        }
    }

    #[must_use]
    pub fn row(mut self, values: Vec<Value>) -> Self {
        self.rows.push(values);
        self
    }

    #[must_use]
    pub fn rows(mut self, rows: impl IntoIterator<Item = Vec<Value>>) -> Self {
        self.rows.extend(rows);
        self
    }

    /// Fail when asked for row `rows + 1`, after `rows` rows were produced.
    #[must_use]
    pub fn fail_after(mut self, rows: usize) -> Self {
        self.fail_at_row = Some(rows);
        self
    }

    #[must_use]
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Number of successful `advance` calls that produced a row.
    #[must_use]
    pub fn rows_produced(&self) -> usize {
        self.advanced
    }

    fn current(&self, index: usize) -> Result<&Value, StealthDbError> {
        let row = self
            .position
            .and_then(|pos| self.rows.get(pos))
            .ok_or_else(|| DriverError::new("cursor is not positioned on a row"))?;
        row.get(index)
            .ok_or_else(|| DriverError::new(format!("no column {index} in row")).into())
    }
}

impl RowCursor for MemoryCursor {
    fn advance(&mut self) -> Result<bool, StealthDbError> {
        let next = self.position.map_or(0, |pos| pos + 1);
        if self.fail_at_row.is_some_and(|limit| next >= limit) {
            return Err(DriverError::new("connection reset while fetching rows")
                .with_sql_state("08S01")
                .into());
        }
        if next >= self.rows.len() {
            self.position = Some(self.rows.len());
            return Ok(false);
        }
        self.position = Some(next);
        self.stream_offsets.iter_mut().for_each(|offset| *offset = 0);
        self.advanced += 1;
        Ok(true)
    }

    fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn column_metadata(&self, index: usize) -> Result<ColumnMetadata, StealthDbError> {
        self.columns
            .get(index)
            .cloned()
            .ok_or_else(|| DriverError::new(format!("no column {index}")).into())
    }

    fn read_value(&mut self, index: usize, _kind: FieldKind) -> Result<Value, StealthDbError> {
        self.current(index).cloned()
    }

    fn read_binary_chunk(
        &mut self,
        index: usize,
        buf: &mut [u8],
    ) -> Result<BinaryRead, StealthDbError> {
        let offset = self.stream_offsets.get(index).copied().unwrap_or(0);
        let bytes: &[u8] = match self.current(index)? {
            Value::Null => return Ok(BinaryRead::Null),
            Value::Binary(bytes) => bytes,
            Value::Text(text) => text.as_bytes(),
            other => {
                return Err(DriverError::new(format!(
                    "column {index} holds a {} value, not a byte stream",
                    other.kind()
                ))
                .into());
            }
        };
        if offset >= bytes.len() {
            return Ok(BinaryRead::Eof);
        }
        let n = self.chunk_size.min(buf.len()).min(bytes.len() - offset);
        buf[..n].copy_from_slice(&bytes[offset..offset + n]);
        if let Some(slot) = self.stream_offsets.get_mut(index) {
            *slot = offset + n;
        }
        Ok(BinaryRead::Bytes(n))
    }
}
