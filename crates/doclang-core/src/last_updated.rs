#![forbid(unsafe_code)]

//! The host-supplied page key → "last updated" display string table.

use std::collections::HashMap;

use serde_json::Value;

/// Errors from loading a [`LastUpdatedTable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    /// Malformed JSON.
    Json(String),
    /// The payload was valid JSON but not an object.
    NotAnObject(&'static str),
}

impl std::fmt::Display for TableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(msg) => write!(f, "last-updated table JSON error: {msg}"),
            Self::NotAnObject(kind) => {
                write!(f, "last-updated table must be an object, got {kind}")
            }
        }
    }
}

impl std::error::Error for TableError {}

/// Immutable lookup from page key to display timestamp.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LastUpdatedTable {
    entries: HashMap<String, String>,
}

impl LastUpdatedTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the table from JSON text. `null` loads as an empty table.
    pub fn from_json(json: &str) -> Result<Self, TableError> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| TableError::Json(e.to_string()))?;
        Self::from_value(value)
    }

    /// Build the table from an already parsed JSON value.
    ///
    /// String values are kept as-is, numbers keep their JSON text, and any
    /// other value is skipped.
    pub fn from_value(value: Value) -> Result<Self, TableError> {
        let map = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(map) => map,
            Value::Bool(_) => return Err(TableError::NotAnObject("boolean")),
            Value::Number(_) => return Err(TableError::NotAnObject("number")),
            Value::String(_) => return Err(TableError::NotAnObject("string")),
            Value::Array(_) => return Err(TableError::NotAnObject("array")),
        };
        let entries = map
            .into_iter()
            .filter_map(|(key, value)| match value {
                Value::String(text) => Some((key, text)),
                Value::Number(number) => Some((key, number.to_string())),
                _ => None,
            })
            .collect();
        Ok(Self { entries })
    }

    /// Display string for `key`. Empty strings count as missing.
    #[must_use]
    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.entries
            .get(key)
            .map(String::as_str)
            .filter(|text| !text.is_empty())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LastUpdatedTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_string_and_number_entries() {
        let table = LastUpdatedTable::from_json(
            r#"{"ch01.md":"2024-05-01","ch02.md":20240502,"ch03.md":null,"ch04.md":[1]}"#,
        )
        .expect("valid table");
        assert_eq!(table.lookup("ch01.md"), Some("2024-05-01"));
        assert_eq!(table.lookup("ch02.md"), Some("20240502"));
        assert_eq!(table.lookup("ch03.md"), None);
        assert_eq!(table.lookup("ch04.md"), None);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn null_payload_is_empty_table() {
        let table = LastUpdatedTable::from_json("null").expect("null accepted");
        assert!(table.is_empty());
    }

    #[test]
    fn non_object_payload_is_rejected() {
        assert_eq!(
            LastUpdatedTable::from_json("[]"),
            Err(TableError::NotAnObject("array"))
        );
        assert!(matches!(
            LastUpdatedTable::from_json("{"),
            Err(TableError::Json(_))
        ));
    }

    #[test]
    fn empty_display_string_counts_as_missing() {
        let table: LastUpdatedTable = [("a.md", "")].into_iter().collect();
        assert_eq!(table.lookup("a.md"), None);
    }
}
