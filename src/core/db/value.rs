/// Value Module
///
/// Dynamically typed column values exchanged between records and the
/// database, and the `Row` mapping returned by queries.

use crate::core::{OrmError, Result};
use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::Serialize;
use std::fmt;

/// A single column value.
///
/// Mirrors SQLite's storage classes. Booleans are stored as integers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Name of the storage class, used in conversion errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "text",
            Value::Blob(_) => "blob",
        }
    }

    fn mismatch(&self, wanted: &str) -> OrmError {
        OrmError::Conversion(format!("cannot read {} value as {}", self.type_name(), wanted))
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::Text(t) => f.write_str(t),
            Value::Blob(b) => write!(f, "<BLOB: {} bytes>", b.len()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v.into())
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Integer(v.into())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl TryFrom<Value> for i64 {
    type Error = OrmError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Integer(i) => Ok(i),
            other => Err(other.mismatch("i64")),
        }
    }
}

impl TryFrom<Value> for f64 {
    type Error = OrmError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Real(r) => Ok(r),
            Value::Integer(i) => Ok(i as f64),
            other => Err(other.mismatch("f64")),
        }
    }
}

impl TryFrom<Value> for bool {
    type Error = OrmError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Integer(i) => Ok(i != 0),
            other => Err(other.mismatch("bool")),
        }
    }
}

impl TryFrom<Value> for String {
    type Error = OrmError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Text(t) => Ok(t),
            other => Err(other.mismatch("String")),
        }
    }
}

impl TryFrom<Value> for Vec<u8> {
    type Error = OrmError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Blob(b) => Ok(b),
            other => Err(other.mismatch("Vec<u8>")),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            Value::Real(r) => ToSqlOutput::Borrowed(ValueRef::Real(*r)),
            Value::Text(t) => ToSqlOutput::Borrowed(ValueRef::Text(t.as_bytes())),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

impl FromSql for Value {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(Value::from(value))
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(r) => Value::Real(r),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        }
    }
}

/// One result row: column names in select order mapped to their values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    entries: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Row::default()
    }

    pub fn push(&mut self, column: impl Into<String>, value: Value) {
        self.entries.push((column.into(), value));
    }

    /// Looks a value up by column name.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for Row {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Row {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_sqlite_rendering() {
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::from(42i64).to_string(), "42");
        assert_eq!(Value::from("abc").to_string(), "abc");
        assert_eq!(Value::Blob(vec![1, 2, 3]).to_string(), "<BLOB: 3 bytes>");
    }

    #[test]
    fn test_conversions() {
        assert_eq!(Value::from(true), Value::Integer(1));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(i64::try_from(Value::Integer(7)).unwrap(), 7);
        assert_eq!(f64::try_from(Value::Integer(2)).unwrap(), 2.0);
        assert!(bool::try_from(Value::Integer(1)).unwrap());

        match String::try_from(Value::Integer(1)) {
            Err(OrmError::Conversion(msg)) => assert!(msg.contains("integer")),
            other => panic!("Expected conversion error, got {:?}", other),
        }
    }

    #[test]
    fn test_sqlite_bridge() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let echoed: Value = conn
            .query_row("SELECT ?1", [Value::from("hello")], |row| row.get(0))
            .unwrap();
        assert_eq!(echoed, Value::Text("hello".to_string()));

        let null: Value = conn.query_row("SELECT NULL", [], |row| row.get(0)).unwrap();
        assert!(null.is_null());
    }

    #[test]
    fn test_row_lookup_by_column() {
        let mut row = Row::new();
        row.push("id", Value::Integer(1));
        row.push("name", Value::from("c"));

        assert_eq!(row.len(), 2);
        assert_eq!(row.get("name"), Some(&Value::from("c")));
        assert_eq!(row.get("missing"), None);
        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["id", "name"]);
    }

    #[test]
    fn test_json_serialization() {
        let json = serde_json::to_string(&vec![Value::Null, Value::Integer(3), Value::from("x")]).unwrap();
        assert_eq!(json, r#"[null,3,"x"]"#);
    }
}
