//! In-memory table store
//!
//! Tables are keyed by entity name; each row is a JSON object. The data
//! file is a single document mapping table names to row arrays:
//!
//! ```json
//! {"User": [{"id": 1, "name": "a"}], "Article": []}
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde_json::{Map, Value};

use super::errors::{ExecutorError, ExecutorResult};

/// One stored row
pub type StoredRow = Map<String, Value>;

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: HashMap<String, Vec<StoredRow>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from a `{table: [rows]}` document
    pub fn from_json(doc: Value) -> ExecutorResult<Self> {
        let tables = match doc {
            Value::Object(tables) => tables,
            _ => {
                return Err(ExecutorError::Store(
                    "data must be a document of tables".into(),
                ))
            }
        };

        let mut store = Self::new();
        for (table, rows) in tables {
            let rows = match rows {
                Value::Array(rows) => rows,
                _ => {
                    return Err(ExecutorError::InvalidRow {
                        table,
                        reason: "table must be an array of rows".into(),
                    })
                }
            };
            store.create_table(&table);
            for row in rows {
                store.insert(&table, row)?;
            }
        }
        Ok(store)
    }

    /// Loads a data file from disk
    pub fn load_file(path: &Path) -> ExecutorResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| ExecutorError::Store(format!("Failed to read {}: {}", path.display(), e)))?;
        let doc: Value = serde_json::from_str(&content)
            .map_err(|e| ExecutorError::Store(format!("Invalid JSON in {}: {}", path.display(), e)))?;
        Self::from_json(doc)
    }

    /// Creates an empty table if it does not exist
    pub fn create_table(&mut self, table: &str) {
        self.tables.entry(table.to_string()).or_default();
    }

    /// Appends a row. Rows must be JSON objects.
    pub fn insert(&mut self, table: &str, row: Value) -> ExecutorResult<()> {
        match row {
            Value::Object(row) => {
                self.tables.entry(table.to_string()).or_default().push(row);
                Ok(())
            }
            other => Err(ExecutorError::InvalidRow {
                table: table.to_string(),
                reason: format!("expected an object, got {}", other),
            }),
        }
    }

    /// Rows of `table` in insertion order
    pub fn rows(&self, table: &str) -> ExecutorResult<&[StoredRow]> {
        self.get(table)
            .ok_or_else(|| ExecutorError::UnknownTable(table.to_string()))
    }

    /// Rows of `table`, or `None` if the table does not exist
    pub fn get(&self, table: &str) -> Option<&[StoredRow]> {
        self.tables.get(table).map(Vec::as_slice)
    }

    pub fn table_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tables.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_from_json() {
        let store = MemoryStore::from_json(json!({
            "User": [{"id": 1}, {"id": 2}],
            "Article": []
        }))
        .unwrap();

        assert_eq!(store.rows("User").unwrap().len(), 2);
        assert!(store.rows("Article").unwrap().is_empty());
        assert_eq!(store.table_names(), vec!["Article", "User"]);
    }

    #[test]
    fn test_unknown_table() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.rows("User"),
            Err(ExecutorError::UnknownTable(name)) if name == "User"
        ));
    }

    #[test]
    fn test_rows_must_be_objects() {
        let mut store = MemoryStore::new();
        let err = store.insert("User", json!([1, 2])).unwrap_err();
        assert!(matches!(err, ExecutorError::InvalidRow { .. }));

        let err = MemoryStore::from_json(json!({"User": {"id": 1}})).unwrap_err();
        assert!(matches!(err, ExecutorError::InvalidRow { .. }));
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"User": [{{"id": 1, "name": "a"}}]}}"#).unwrap();

        let store = MemoryStore::load_file(file.path()).unwrap();
        assert_eq!(store.rows("User").unwrap()[0]["name"], json!("a"));

        let missing = MemoryStore::load_file(Path::new("/nonexistent/data.json"));
        assert!(matches!(missing, Err(ExecutorError::Store(_))));
    }
}
