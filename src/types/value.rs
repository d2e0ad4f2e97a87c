use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{Result, RowForgeError};

/// Represents a SQL value in a driver-agnostic way.
/// Drivers are responsible for converting these to their native types.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Decimal(Decimal),
    String(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    /// Timestamp carrying its UTC offset.
    DateTimeTz(DateTime<FixedOffset>),
    Uuid(Uuid),
}

/// The shape a column value is fetched as.
///
/// Every mapped property declares one; [`Value::coerce`] is the typed getter
/// that turns whatever the driver returned into that shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlKind {
    String,
    Char,
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Decimal,
    Date,
    Time,
    DateTime,
    DateTimeTz,
    Bytes,
    Uuid,
    /// Enumerations: fetched as a string, or as an `Int32` ordinal.
    Enum,
    /// No coercion, the driver value is passed through.
    Any,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int8(n) => Some(i64::from(*n)),
            Value::Int16(n) => Some(i64::from(*n)),
            Value::Int32(n) => Some(i64::from(*n)),
            Value::Int64(n) => Some(*n),
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Decimal(d) => d.trunc().to_i64(),
            Value::Float32(f) => Some(*f as i64),
            Value::Float64(f) => Some(*f as i64),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float32(f) => Some(f64::from(*f)),
            Value::Float64(f) => Some(*f),
            Value::Decimal(d) => d.to_f64(),
            Value::String(s) => s.trim().parse().ok(),
            other => other.as_i64().map(|n| n as f64),
        }
    }

    /// Name of the variant, used in mismatch messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "Bool",
            Value::Int8(_) => "Int8",
            Value::Int16(_) => "Int16",
            Value::Int32(_) => "Int32",
            Value::Int64(_) => "Int64",
            Value::Float32(_) => "Float32",
            Value::Float64(_) => "Float64",
            Value::Decimal(_) => "Decimal",
            Value::String(_) => "String",
            Value::Bytes(_) => "Bytes",
            Value::Date(_) => "Date",
            Value::Time(_) => "Time",
            Value::DateTime(_) => "DateTime",
            Value::DateTimeTz(_) => "DateTimeTz",
            Value::Uuid(_) => "Uuid",
        }
    }

    fn is_integer(&self) -> bool {
        matches!(
            self,
            Value::Int8(_) | Value::Int16(_) | Value::Int32(_) | Value::Int64(_)
        )
    }

    /// Converts this value into the requested shape.
    ///
    /// NULL stays NULL for every kind. Lossy numeric narrowing is rejected,
    /// fractional parts are truncated when an integer is requested.
    ///
    /// Dropping the offset of a [`Value::DateTimeTz`] yields the UTC instant
    /// for `DateTime`, the same timestamp the MySQL driver writes for a bound
    /// offset timestamp. `Date` and `Time` keep the value's own wall clock.
    pub fn coerce(self, kind: SqlKind) -> Result<Value> {
        if self.is_null() {
            return Ok(self);
        }

        let type_name = self.type_name();

        let coerced = match kind {
            SqlKind::Any => Some(self),
            SqlKind::String => match self {
                Value::String(s) => Some(Value::String(s)),
                Value::Bytes(b) => String::from_utf8(b).ok().map(Value::String),
                ref other => Some(Value::String(other.to_string())),
            },
            SqlKind::Char => match self {
                Value::String(s) if s.chars().count() == 1 => Some(Value::String(s)),
                _ => None,
            },
            SqlKind::Bool => match self {
                Value::Bool(b) => Some(Value::Bool(b)),
                Value::String(ref s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "1" | "y" | "yes" => Some(Value::Bool(true)),
                    "false" | "0" | "n" | "no" => Some(Value::Bool(false)),
                    _ => None,
                },
                ref other => other.as_i64().map(|n| Value::Bool(n != 0)),
            },
            SqlKind::Int8 => self.as_i64().and_then(|n| i8::try_from(n).ok()).map(Value::Int8),
            SqlKind::Int16 => self
                .as_i64()
                .and_then(|n| i16::try_from(n).ok())
                .map(Value::Int16),
            SqlKind::Int32 => self
                .as_i64()
                .and_then(|n| i32::try_from(n).ok())
                .map(Value::Int32),
            SqlKind::Int64 => self.as_i64().map(Value::Int64),
            SqlKind::Float32 => self.as_f64().map(|f| Value::Float32(f as f32)),
            SqlKind::Float64 => self.as_f64().map(Value::Float64),
            SqlKind::Decimal => match self {
                Value::Decimal(d) => Some(Value::Decimal(d)),
                Value::Float32(f) => Decimal::from_f32(f).map(Value::Decimal),
                Value::Float64(f) => Decimal::from_f64(f).map(Value::Decimal),
                Value::String(ref s) => Decimal::from_str(s.trim()).ok().map(Value::Decimal),
                ref other if other.is_integer() => {
                    other.as_i64().map(|n| Value::Decimal(Decimal::from(n)))
                }
                _ => None,
            },
            SqlKind::Date => match self {
                Value::Date(d) => Some(Value::Date(d)),
                Value::DateTime(dt) => Some(Value::Date(dt.date())),
                Value::DateTimeTz(dt) => Some(Value::Date(dt.date_naive())),
                Value::String(ref s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                    .ok()
                    .map(Value::Date),
                _ => None,
            },
            SqlKind::Time => match self {
                Value::Time(t) => Some(Value::Time(t)),
                Value::DateTime(dt) => Some(Value::Time(dt.time())),
                Value::DateTimeTz(dt) => Some(Value::Time(dt.time())),
                Value::String(ref s) => NaiveTime::parse_from_str(s.trim(), "%H:%M:%S%.f")
                    .ok()
                    .map(Value::Time),
                _ => None,
            },
            SqlKind::DateTime => match self {
                Value::DateTime(dt) => Some(Value::DateTime(dt)),
                Value::Date(d) => d.and_hms_opt(0, 0, 0).map(Value::DateTime),
                Value::DateTimeTz(dt) => Some(Value::DateTime(dt.naive_utc())),
                Value::String(ref s) => {
                    let s = s.trim();
                    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
                        .ok()
                        .or_else(|| {
                            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                                .ok()
                                .and_then(|d| d.and_hms_opt(0, 0, 0))
                        })
                        .map(Value::DateTime)
                }
                _ => None,
            },
            SqlKind::DateTimeTz => match self {
                Value::DateTimeTz(dt) => Some(Value::DateTimeTz(dt)),
                Value::DateTime(dt) => Some(Value::DateTimeTz(dt.and_utc().fixed_offset())),
                Value::Date(d) => d
                    .and_hms_opt(0, 0, 0)
                    .map(|dt| Value::DateTimeTz(dt.and_utc().fixed_offset())),
                Value::String(ref s) => DateTime::parse_from_rfc3339(s.trim())
                    .ok()
                    .map(Value::DateTimeTz),
                _ => None,
            },
            SqlKind::Bytes => match self {
                Value::Bytes(b) => Some(Value::Bytes(b)),
                Value::String(s) => Some(Value::Bytes(s.into_bytes())),
                Value::Uuid(u) => Some(Value::Bytes(u.as_bytes().to_vec())),
                _ => None,
            },
            SqlKind::Uuid => match self {
                Value::Uuid(u) => Some(Value::Uuid(u)),
                Value::String(ref s) => Uuid::parse_str(s.trim()).ok().map(Value::Uuid),
                Value::Bytes(ref b) => Uuid::from_slice(b).ok().map(Value::Uuid),
                _ => None,
            },
            SqlKind::Enum => match self {
                Value::String(s) => Some(Value::String(s)),
                ref other if other.is_integer() => other
                    .as_i64()
                    .and_then(|n| i32::try_from(n).ok())
                    .map(Value::Int32),
                Value::Decimal(d) => d.trunc().to_i32().map(Value::Int32),
                ref other => Some(Value::String(other.to_string())),
            },
        };

        match coerced {
            Some(value) => Ok(value),
            None => Err(RowForgeError::TypeMismatch(format!(
                "cannot read {} value as {:?}",
                type_name, kind
            ))),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int8(n) => write!(f, "{}", n),
            Value::Int16(n) => write!(f, "{}", n),
            Value::Int32(n) => write!(f, "{}", n),
            Value::Int64(n) => write!(f, "{}", n),
            Value::Float32(n) => write!(f, "{}", n),
            Value::Float64(n) => write!(f, "{}", n),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::String(s) => f.write_str(s),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Time(t) => write!(f, "{}", t.format("%H:%M:%S%.f")),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S%.f")),
            Value::DateTimeTz(dt) => write!(f, "{}", dt.to_rfc3339()),
            Value::Uuid(u) => write!(f, "{}", u),
        }
    }
}

macro_rules! impl_from_for_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    };
}

impl_from_for_value! {
    bool => Bool,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    f32 => Float32,
    f64 => Float64,
    Decimal => Decimal,
    String => String,
    Vec<u8> => Bytes,
    NaiveDate => Date,
    NaiveTime => Time,
    NaiveDateTime => DateTime,
    DateTime<FixedOffset> => DateTimeTz,
    Uuid => Uuid,
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<char> for Value {
    fn from(value: char) -> Self {
        Value::String(value.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}
