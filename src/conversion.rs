//! Cross-kind value coercion.
//!
//! Every conversion starts from a canonical [`Value`] and aims at a
//! [`FieldKind`]. Widening always succeeds; narrowing succeeds only when the
//! value survives unchanged, otherwise it reports an overflow naming the
//! target kind. Pairs outside the matrix are reported as incompatible.

use chrono::{FixedOffset, NaiveTime, TimeZone};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde_json::Value as JsonValue;

use crate::error::ConversionError;
use crate::types::{FieldKind, OffsetTime, Value};

/// Numeric view of a source value used while converting between numeric kinds.
#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i128),
    Real(f64),
    Dec(Decimal),
}

impl Num {
    fn kind(self) -> FieldKind {
        match self {
            Num::Int(_) => FieldKind::BigInt,
            Num::Real(_) => FieldKind::Real64,
            Num::Dec(_) => FieldKind::Decimal,
        }
    }
}

/// Convert `value` to `target`.
///
/// `zone` attaches an offset to local temporal values when the target carries
/// one; callers pass the zone the result was materialized in.
///
/// # Errors
///
/// Returns [`ConversionError::Incompatible`] for pairs outside the matrix,
/// [`ConversionError::Overflow`] for narrowing that would lose information and
/// [`ConversionError::Parse`] for text that does not read as the target.
pub fn convert(
    value: &Value,
    target: FieldKind,
    zone: FixedOffset,
) -> Result<Value, ConversionError> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    if value.kind() == target {
        return Ok(value.clone());
    }
    match target {
        FieldKind::Bool => to_bool(value).map(Value::Bool),
        FieldKind::Tiny
        | FieldKind::Small
        | FieldKind::Int32
        | FieldKind::Int64
        | FieldKind::BigInt
        | FieldKind::Real32
        | FieldKind::Real64
        | FieldKind::Decimal => {
            let num = numeric_source(value, target)?;
            from_num(num, target)
        }
        FieldKind::String => Ok(render(value).map_or(Value::Null, Value::Text)),
        FieldKind::Char => to_char(value).map(Value::Char),
        FieldKind::Binary => match value {
            Value::Text(text) => Ok(Value::Binary(text.as_bytes().to_vec())),
            other => Err(incompatible(other, target)),
        },
        FieldKind::Date => match value {
            Value::DateTime(dt) => Ok(Value::Date(dt.date())),
            Value::OffsetDateTime(dt) => Ok(Value::Date(dt.date_naive())),
            other => Err(incompatible(other, target)),
        },
        FieldKind::Time => match value {
            Value::DateTime(dt) => Ok(Value::Time(dt.time())),
            Value::OffsetDateTime(dt) => Ok(Value::Time(dt.time())),
            Value::OffsetTime(t) => Ok(Value::Time(t.time)),
            other => Err(incompatible(other, target)),
        },
        FieldKind::DateTime => match value {
            Value::Date(d) => Ok(Value::DateTime(d.and_time(NaiveTime::MIN))),
            Value::OffsetDateTime(dt) => Ok(Value::DateTime(dt.naive_local())),
            other => Err(incompatible(other, target)),
        },
        FieldKind::OffsetDateTime => {
            let local = match value {
                Value::Date(d) => d.and_time(NaiveTime::MIN),
                Value::DateTime(dt) => *dt,
                other => return Err(incompatible(other, target)),
            };
            zone.from_local_datetime(&local)
                .single()
                .map(Value::OffsetDateTime)
                .ok_or_else(|| overflow(target, &local))
        }
        FieldKind::OffsetTime => match value {
            Value::Time(t) => Ok(Value::OffsetTime(OffsetTime::new(*t, zone))),
            Value::DateTime(dt) => Ok(Value::OffsetTime(OffsetTime::new(dt.time(), zone))),
            Value::OffsetDateTime(dt) => {
                Ok(Value::OffsetTime(OffsetTime::new(dt.time(), *dt.offset())))
            }
            other => Err(incompatible(other, target)),
        },
        FieldKind::Null | FieldKind::Other => Err(incompatible(value, target)),
    }
}

/// Canonical textual rendering of a value; `None` only for SQL NULL.
#[must_use]
pub fn render(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::Bool(b) => b.to_string(),
        Value::Tiny(v) => v.to_string(),
        Value::Small(v) => v.to_string(),
        Value::Int32(v) => v.to_string(),
        Value::Int64(v) => v.to_string(),
        Value::BigInt(v) => v.to_string(),
        Value::Real32(v) => v.to_string(),
        Value::Real64(v) => v.to_string(),
        Value::Decimal(v) => v.to_string(),
        Value::Char(c) => c.to_string(),
        Value::Text(s) => s.clone(),
        Value::Date(d) => d.format("%Y-%m-%d").to_string(),
        Value::Time(t) => t.format("%H:%M:%S%.f").to_string(),
        Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
        Value::OffsetTime(t) => t.to_string(),
        Value::OffsetDateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S%.f%:z").to_string(),
        Value::Binary(bytes) => format!("0x{}", hex::encode(bytes)),
        Value::Other(JsonValue::String(s)) => s.clone(),
        Value::Other(json) => json.to_string(),
    };
    Some(text)
}

fn incompatible(value: &Value, target: FieldKind) -> ConversionError {
    ConversionError::Incompatible {
        from: value.kind(),
        to: target,
    }
}

fn overflow(target: FieldKind, value: &impl ToString) -> ConversionError {
    ConversionError::Overflow {
        target,
        value: value.to_string(),
    }
}

fn to_bool(value: &Value) -> Result<bool, ConversionError> {
    // zero is compared in the value's own canonical kind
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Tiny(v) => Ok(*v != 0),
        Value::Small(v) => Ok(*v != 0),
        Value::Int32(v) => Ok(*v != 0),
        Value::Int64(v) => Ok(*v != 0),
        Value::BigInt(v) => Ok(*v != 0),
        Value::Real32(v) => Ok(*v != 0.0),
        Value::Real64(v) => Ok(*v != 0.0),
        Value::Decimal(v) => Ok(!v.is_zero()),
        other => Err(incompatible(other, FieldKind::Bool)),
    }
}

fn to_char(value: &Value) -> Result<char, ConversionError> {
    if let Value::Char(c) = value {
        return Ok(*c);
    }
    let text = render(value).unwrap_or_default();
    let first = text.chars().next();
    first.ok_or(ConversionError::Parse {
        target: FieldKind::Char,
        text,
    })
}

fn numeric_source(value: &Value, target: FieldKind) -> Result<Num, ConversionError> {
    let num = match value {
        Value::Bool(b) => Num::Int(i128::from(*b)),
        Value::Tiny(v) => Num::Int(i128::from(*v)),
        Value::Small(v) => Num::Int(i128::from(*v)),
        Value::Int32(v) => Num::Int(i128::from(*v)),
        Value::Int64(v) => Num::Int(i128::from(*v)),
        Value::BigInt(v) => Num::Int(*v),
        Value::Real32(v) => Num::Real(f64::from(*v)),
        Value::Real64(v) => Num::Real(*v),
        Value::Decimal(v) => Num::Dec(*v),
        Value::Text(text) => parse_number(text, target)?,
        Value::Char(c) => parse_number(&c.to_string(), target)?,
        other => return Err(incompatible(other, target)),
    };
    Ok(num)
}

fn parse_number(text: &str, target: FieldKind) -> Result<Num, ConversionError> {
    let trimmed = text.trim();
    let parsed = if matches!(target, FieldKind::Real32 | FieldKind::Real64) {
        trimmed.parse::<f64>().ok().map(Num::Real)
    } else if let Ok(int) = trimmed.parse::<i128>() {
        Some(Num::Int(int))
    } else {
        Decimal::from_str_exact(trimmed)
            .or_else(|_| Decimal::from_scientific(trimmed))
            .ok()
            .map(Num::Dec)
    };
    parsed.ok_or_else(|| ConversionError::Parse {
        target,
        text: text.to_owned(),
    })
}

/// Integral value of `num`, failing if a fractional part or infinity would be dropped.
#[allow(clippy::cast_possible_truncation)]
fn exact_integer(num: Num, target: FieldKind) -> Result<i128, ConversionError> {
    match num {
        Num::Int(i) => Ok(i),
        Num::Real(f) => {
            if !f.is_finite() || f.fract() != 0.0 || f.abs() >= 1.0e38 {
                return Err(overflow(target, &f));
            }
            Ok(f as i128)
        }
        Num::Dec(d) => {
            if !d.fract().is_zero() {
                return Err(overflow(target, &d));
            }
            d.to_i128().ok_or_else(|| overflow(target, &d))
        }
    }
}

fn narrow<T: TryFrom<i128>>(value: i128, target: FieldKind) -> Result<T, ConversionError> {
    T::try_from(value).map_err(|_| overflow(target, &value))
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn from_num(num: Num, target: FieldKind) -> Result<Value, ConversionError> {
    let value = match target {
        FieldKind::Tiny => Value::Tiny(narrow(exact_integer(num, target)?, target)?),
        FieldKind::Small => Value::Small(narrow(exact_integer(num, target)?, target)?),
        FieldKind::Int32 => Value::Int32(narrow(exact_integer(num, target)?, target)?),
        FieldKind::Int64 => Value::Int64(narrow(exact_integer(num, target)?, target)?),
        FieldKind::BigInt => Value::BigInt(exact_integer(num, target)?),
        FieldKind::Real64 => match num {
            Num::Int(i) => Value::Real64(i as f64),
            Num::Real(f) => Value::Real64(f),
            Num::Dec(d) => Value::Real64(d.to_f64().ok_or_else(|| overflow(target, &d))?),
        },
        FieldKind::Real32 => {
            let wide = match num {
                Num::Int(i) => i as f64,
                Num::Real(f) => f,
                Num::Dec(d) => d.to_f64().ok_or_else(|| overflow(target, &d))?,
            };
            if wide.is_finite() && wide.abs() > f64::from(f32::MAX) {
                return Err(overflow(target, &wide));
            }
            Value::Real32(wide as f32)
        }
        FieldKind::Decimal => match num {
            Num::Int(i) => Value::Decimal(Decimal::from_i128(i).ok_or_else(|| overflow(target, &i))?),
            Num::Real(f) => {
                Value::Decimal(Decimal::from_f64(f).ok_or_else(|| overflow(target, &f))?)
            }
            Num::Dec(d) => Value::Decimal(d),
        },
        other => {
            return Err(ConversionError::Incompatible {
                from: num.kind(),
                to: other,
            });
        }
    };
    Ok(value)
}
