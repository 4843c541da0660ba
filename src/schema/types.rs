// src/schema/types.rs

use chrono::NaiveDateTime;
use duckdb::types::{ToSql, ToSqlOutput, Value};
use std::fmt;

use crate::chunk::date_parser;

/// Declared scalar type of a record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Text,
    Integer,
    Float,
    Timestamp,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Text => "string",
            FieldKind::Integer => "integer",
            FieldKind::Float => "float",
            FieldKind::Timestamp => "timestamp",
        }
    }

    /// SQL column type used when the table is created.
    pub fn sql_type(&self) -> &'static str {
        match self {
            FieldKind::Text => "VARCHAR",
            FieldKind::Integer => "BIGINT",
            FieldKind::Float => "DOUBLE",
            FieldKind::Timestamp => "TIMESTAMP",
        }
    }

    /// Convert one raw cell into a typed value. `None` means the cell cannot
    /// be represented as this kind.
    pub fn coerce(&self, cell: &RawCell) -> Option<FieldValue> {
        match (self, cell) {
            (FieldKind::Timestamp, RawCell::Timestamp(ts)) => Some(FieldValue::Timestamp(*ts)),
            (_, RawCell::Timestamp(ts)) => match self {
                FieldKind::Text => Some(FieldValue::Text(
                    ts.format(date_parser::TIMESTAMP_FORMAT).to_string(),
                )),
                _ => None,
            },
            (FieldKind::Text, RawCell::Text(s)) => Some(if s.is_empty() {
                FieldValue::Null
            } else {
                FieldValue::Text(s.clone())
            }),
            (FieldKind::Integer, RawCell::Text(s)) => parse_integer(s).map(FieldValue::Integer),
            (FieldKind::Float, RawCell::Text(s)) => {
                if s.is_empty() {
                    Some(FieldValue::Null)
                } else {
                    s.parse::<f64>().ok().map(FieldValue::Float)
                }
            }
            (FieldKind::Timestamp, RawCell::Text(s)) => {
                date_parser::parse_timestamp(s).map(FieldValue::Timestamp)
            }
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Integers are sometimes written as `2.0` upstream; accept integral floats.
fn parse_integer(s: &str) -> Option<i64> {
    if let Ok(v) = s.parse::<i64>() {
        return Some(v);
    }
    let f = s.parse::<f64>().ok()?;
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

/// A field of the record schema: column name plus declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind }
    }
}

/// A cell as it leaves the chunk producer: trimmed text, or a timestamp for
/// the date columns parsed while chunking.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Text(String),
    Timestamp(NaiveDateTime),
}

impl RawCell {
    /// The cell as it appeared in the file, for error messages.
    pub fn display_value(&self) -> String {
        match self {
            RawCell::Text(s) => s.clone(),
            RawCell::Timestamp(ts) => ts.format(date_parser::TIMESTAMP_FORMAT).to_string(),
        }
    }
}

/// A coerced, store-ready value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Timestamp(NaiveDateTime),
}

impl ToSql for FieldValue {
    fn to_sql(&self) -> duckdb::Result<ToSqlOutput<'_>> {
        match self {
            FieldValue::Null => Ok(ToSqlOutput::Owned(Value::Null)),
            FieldValue::Text(s) => s.to_sql(),
            FieldValue::Integer(v) => v.to_sql(),
            FieldValue::Float(v) => v.to_sql(),
            FieldValue::Timestamp(ts) => ts.to_sql(),
        }
    }
}
