use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use clap::ValueEnum;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Logical category of a result column.
///
/// The set is closed: every column a cursor describes maps to exactly one kind,
/// and the coercion matrix in [`crate::conversion`] is written as an exhaustive
/// match over it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldKind {
    Bool,
    /// 8-bit integer
    Tiny,
    /// 16-bit integer
    Small,
    Int32,
    Int64,
    /// Integer wider than 64 bits (unsigned 64-bit values land here)
    BigInt,
    Real32,
    Real64,
    /// Exact decimal (`DECIMAL`/`NUMERIC`)
    Decimal,
    Char,
    String,
    Date,
    Time,
    DateTime,
    OffsetTime,
    OffsetDateTime,
    Binary,
    Null,
    Other,
}

impl FieldKind {
    /// Kind a value of this column is stored as once materialized.
    ///
    /// Unsigned integral columns are promoted one step so every value of the
    /// unsigned domain fits in the signed canonical representation.
    #[must_use]
    pub fn canonical(self, signed: bool) -> FieldKind {
        if signed {
            return self;
        }
        match self {
            FieldKind::Tiny => FieldKind::Small,
            FieldKind::Small => FieldKind::Int32,
            FieldKind::Int32 => FieldKind::Int64,
            FieldKind::Int64 => FieldKind::BigInt,
            other => other,
        }
    }

    /// Whether signedness is meaningful for this kind.
    #[must_use]
    pub fn has_sign(self) -> bool {
        matches!(
            self,
            FieldKind::Tiny | FieldKind::Small | FieldKind::Int32 | FieldKind::Int64
        )
    }

    #[must_use]
    pub fn is_integral(self) -> bool {
        matches!(
            self,
            FieldKind::Tiny
                | FieldKind::Small
                | FieldKind::Int32
                | FieldKind::Int64
                | FieldKind::BigInt
        )
    }

    #[must_use]
    pub fn is_numeric(self) -> bool {
        self.is_integral()
            || matches!(
                self,
                FieldKind::Real32 | FieldKind::Real64 | FieldKind::Decimal
            )
    }

    #[must_use]
    pub fn is_temporal(self) -> bool {
        matches!(
            self,
            FieldKind::Date
                | FieldKind::Time
                | FieldKind::DateTime
                | FieldKind::OffsetTime
                | FieldKind::OffsetDateTime
        )
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            FieldKind::Bool => "bool",
            FieldKind::Tiny => "tiny",
            FieldKind::Small => "small",
            FieldKind::Int32 => "int32",
            FieldKind::Int64 => "int64",
            FieldKind::BigInt => "bigint",
            FieldKind::Real32 => "real32",
            FieldKind::Real64 => "real64",
            FieldKind::Decimal => "decimal",
            FieldKind::Char => "char",
            FieldKind::String => "string",
            FieldKind::Date => "date",
            FieldKind::Time => "time",
            FieldKind::DateTime => "datetime",
            FieldKind::OffsetTime => "offset-time",
            FieldKind::OffsetDateTime => "offset-datetime",
            FieldKind::Binary => "binary",
            FieldKind::Null => "null",
            FieldKind::Other => "other",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A wall-clock time carrying a UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OffsetTime {
    pub time: NaiveTime,
    pub offset: FixedOffset,
}

impl OffsetTime {
    #[must_use]
    pub fn new(time: NaiveTime, offset: FixedOffset) -> Self {
        Self { time, offset }
    }
}

impl fmt::Display for OffsetTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.time.format("%H:%M:%S%.f"), self.offset)
    }
}

/// Canonical in-memory value of one field of one materialized row.
///
/// The variant matches the canonical kind of the field it belongs to, or is
/// [`Value::Null`]. Two exceptions: fields of kind `Other` or `Null` keep
/// whatever the driver returned, and a `Char` field holding more than one
/// character keeps it as [`Value::Text`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Tiny(i8),
    Small(i16),
    Int32(i32),
    Int64(i64),
    BigInt(i128),
    Real32(f32),
    Real64(f64),
    Decimal(Decimal),
    Char(char),
    Text(String),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    OffsetTime(OffsetTime),
    OffsetDateTime(DateTime<FixedOffset>),
    Binary(Vec<u8>),
    /// Driver-specific value with no dedicated kind
    Other(JsonValue),
}

impl Value {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The kind this value is an instance of.
    #[must_use]
    pub fn kind(&self) -> FieldKind {
        match self {
            Value::Null => FieldKind::Null,
            Value::Bool(_) => FieldKind::Bool,
            Value::Tiny(_) => FieldKind::Tiny,
            Value::Small(_) => FieldKind::Small,
            Value::Int32(_) => FieldKind::Int32,
            Value::Int64(_) => FieldKind::Int64,
            Value::BigInt(_) => FieldKind::BigInt,
            Value::Real32(_) => FieldKind::Real32,
            Value::Real64(_) => FieldKind::Real64,
            Value::Decimal(_) => FieldKind::Decimal,
            Value::Char(_) => FieldKind::Char,
            Value::Text(_) => FieldKind::String,
            Value::Date(_) => FieldKind::Date,
            Value::Time(_) => FieldKind::Time,
            Value::DateTime(_) => FieldKind::DateTime,
            Value::OffsetTime(_) => FieldKind::OffsetTime,
            Value::OffsetDateTime(_) => FieldKind::OffsetDateTime,
            Value::Binary(_) => FieldKind::Binary,
            Value::Other(_) => FieldKind::Other,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let Value::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let Value::Binary(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match crate::conversion::render(self) {
            Some(text) => f.write_str(&text),
            None => f.write_str("null"),
        }
    }
}

/// Transaction isolation level of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IsolationLevel {
    /// The connection does not support transactions
    None,
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

/// What happens to open cursors when a transaction commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Holdability {
    HoldCursorsOverCommit,
    CloseCursorsAtCommit,
}
