//! Typed parameter binding.
//!
//! [`bind_value`] maps a value plus its declared [`SqlType`] onto the typed
//! setter of a [`PreparedStatement`]. Tags without a dedicated setter go
//! through the generic object bind, whose conversion is driver-dependent.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::traits::{PreparedStatement, SqlResult};
use crate::types::{SqlType, Value};

/// Strings longer than this many characters are streamed as CLOBs.
pub const CLOB_LENGTH: usize = 4000;

/// Binds `value` at `index` (1-based) using the declared type tag.
///
/// A NULL is always bound as a typed NULL of `sql_type`.
pub fn bind_value(
    statement: &mut dyn PreparedStatement,
    index: usize,
    sql_type: SqlType,
    value: Value,
) -> SqlResult<()> {
    if value.is_null() {
        return statement.set_null(index, sql_type);
    }

    match sql_type {
        SqlType::VarChar | SqlType::LongVarChar => match into_text(value) {
            Ok(text) => statement.set_string(index, text),
            Err(other) => statement.set_object(index, other, Some(sql_type)),
        },
        SqlType::NVarChar | SqlType::LongNVarChar => match into_text(value) {
            Ok(text) => statement.set_nstring(index, text),
            Err(other) => statement.set_object(index, other, Some(sql_type)),
        },
        SqlType::Clob | SqlType::NClob => match value {
            Value::String(text) => bind_large_text(statement, index, sql_type, text),
            Value::Bytes(bytes) => match String::from_utf8(bytes) {
                Ok(text) => bind_large_text(statement, index, sql_type, text),
                Err(e) => statement.set_object(index, Value::Bytes(e.into_bytes()), Some(sql_type)),
            },
            other => statement.set_object(index, other, Some(sql_type)),
        },
        SqlType::Decimal | SqlType::Numeric => match value {
            Value::Decimal(d) => statement.set_decimal(index, d),
            other => statement.set_object(index, other, Some(sql_type)),
        },
        SqlType::Boolean => match value {
            Value::Bool(b) => statement.set_bool(index, b),
            other => statement.set_object(index, other, Some(sql_type)),
        },
        SqlType::Date => bind_date(statement, index, value),
        SqlType::Time => bind_time(statement, index, value),
        SqlType::Timestamp => bind_timestamp(statement, index, value),
        other => statement.set_object(index, value, Some(other)),
    }
}

/// Binds `value` without a declared type; the driver picks the conversion.
pub fn bind_unknown(
    statement: &mut dyn PreparedStatement,
    index: usize,
    value: Value,
) -> SqlResult<()> {
    statement.set_object(index, value, None)
}

/// Text form of `value` for the string setters. Bytes that are not valid
/// UTF-8 come back unchanged.
fn into_text(value: Value) -> Result<String, Value> {
    match value {
        Value::String(s) => Ok(s),
        Value::Bytes(bytes) => String::from_utf8(bytes).map_err(|e| Value::Bytes(e.into_bytes())),
        other => Ok(other.to_string()),
    }
}

fn bind_large_text(
    statement: &mut dyn PreparedStatement,
    index: usize,
    sql_type: SqlType,
    text: String,
) -> SqlResult<()> {
    let streamed = text.chars().count() > CLOB_LENGTH;
    match (streamed, sql_type.is_national()) {
        (true, true) => statement.set_nclob(index, text),
        (true, false) => statement.set_clob(index, text),
        (false, true) => statement.set_nstring(index, text),
        (false, false) => statement.set_string(index, text),
    }
}

fn epoch() -> NaiveDate {
    NaiveDate::default()
}

fn bind_date(statement: &mut dyn PreparedStatement, index: usize, value: Value) -> SqlResult<()> {
    match value {
        Value::DateTimeTz(dt) => statement.set_date(index, dt.date_naive(), Some(*dt.offset())),
        Value::Date(d) => statement.set_date(index, d, None),
        Value::DateTime(dt) => statement.set_date(index, dt.date(), None),
        Value::Time(_) => statement.set_date(index, epoch(), None),
        other => statement.set_object(index, other, Some(SqlType::Date)),
    }
}

fn bind_time(statement: &mut dyn PreparedStatement, index: usize, value: Value) -> SqlResult<()> {
    match value {
        Value::DateTimeTz(dt) => statement.set_time(index, dt.time(), Some(*dt.offset())),
        Value::Time(t) => statement.set_time(index, t, None),
        Value::DateTime(dt) => statement.set_time(index, dt.time(), None),
        Value::Date(_) => statement.set_time(index, NaiveTime::MIN, None),
        other => statement.set_object(index, other, Some(SqlType::Time)),
    }
}

fn bind_timestamp(
    statement: &mut dyn PreparedStatement,
    index: usize,
    value: Value,
) -> SqlResult<()> {
    match value {
        // Local wall time travels with its offset; drivers that cannot store
        // the offset normalize to UTC, the same as `Value::coerce`.
        Value::DateTimeTz(dt) => {
            statement.set_timestamp(index, dt.naive_local(), Some(*dt.offset()))
        }
        Value::DateTime(dt) => statement.set_timestamp(index, dt, None),
        Value::Date(d) => statement.set_timestamp(index, NaiveDateTime::new(d, NaiveTime::MIN), None),
        Value::Time(t) => statement.set_timestamp(index, NaiveDateTime::new(epoch(), t), None),
        other => statement.set_object(index, other, Some(SqlType::Timestamp)),
    }
}
