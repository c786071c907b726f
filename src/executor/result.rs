//! Result types for query execution

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::planner::TerminalMode;

use super::errors::{ExecutorError, ExecutorResult};

/// One result row: loaded columns, eagerly loaded relations and the names
/// of attributes left unloaded
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    columns: Vec<(String, Value)>,
    relations: BTreeMap<String, Vec<Row>>,
    unloaded: BTreeSet<String>,
}

impl Row {
    /// Creates a row with columns only
    pub fn new(columns: Vec<(String, Value)>) -> Self {
        Self {
            columns,
            relations: BTreeMap::new(),
            unloaded: BTreeSet::new(),
        }
    }

    pub(crate) fn with_relation(mut self, name: impl Into<String>, rows: Vec<Row>) -> Self {
        self.relations.insert(name.into(), rows);
        self
    }

    pub(crate) fn with_unloaded(mut self, unloaded: BTreeSet<String>) -> Self {
        self.unloaded = unloaded;
        self
    }

    /// Loaded column value
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Loaded columns in output order
    pub fn columns(&self) -> &[(String, Value)] {
        &self.columns
    }

    /// Eagerly loaded related rows
    pub fn related(&self, name: &str) -> Option<&[Row]> {
        self.relations.get(name).map(Vec::as_slice)
    }

    /// Fields deferred by projection and relationships not joined
    pub fn unloaded(&self) -> &BTreeSet<String> {
        &self.unloaded
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        !self.unloaded.contains(name)
    }

    /// JSON object of columns and related rows
    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        for (name, value) in &self.columns {
            object.insert(name.clone(), value.clone());
        }
        for (name, rows) in &self.relations {
            object.insert(name.clone(), Value::Array(rows.iter().map(Row::to_json).collect()));
        }
        Value::Object(object)
    }
}

/// Rows produced by executing one plan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultSet {
    mode: TerminalMode,
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl ResultSet {
    pub fn new(mode: TerminalMode, columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { mode, columns, rows }
    }

    pub fn mode(&self) -> TerminalMode {
        self.mode
    }

    /// Output column names
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// All rows in result order
    pub fn all(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    /// First row, if any
    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    /// Exactly one row
    pub fn one(&self) -> ExecutorResult<&Row> {
        match self.rows.len() {
            0 => Err(ExecutorError::NoResultFound),
            1 => Ok(&self.rows[0]),
            n => Err(ExecutorError::MultipleResultsFound(n)),
        }
    }

    /// First column of the first row
    pub fn scalar(&self) -> Option<&Value> {
        self.rows
            .first()
            .and_then(|row| row.columns().first())
            .map(|(_, v)| v)
    }

    /// Row count; for a count plan, the counted value
    pub fn count(&self) -> u64 {
        match self.mode {
            TerminalMode::Count => self.scalar().and_then(Value::as_u64).unwrap_or(0),
            _ => self.rows.len() as u64,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// JSON array of rows
    pub fn to_json(&self) -> Value {
        Value::Array(self.rows.iter().map(Row::to_json).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(n: usize) -> ResultSet {
        let rows = (0..n)
            .map(|i| Row::new(vec![("id".into(), json!(i))]))
            .collect();
        ResultSet::new(TerminalMode::Rows, vec!["id".into()], rows)
    }

    #[test]
    fn test_one() {
        assert!(matches!(rows(0).one(), Err(ExecutorError::NoResultFound)));
        assert_eq!(rows(1).one().unwrap().get("id"), Some(&json!(0)));
        assert!(matches!(
            rows(2).one(),
            Err(ExecutorError::MultipleResultsFound(2))
        ));
    }

    #[test]
    fn test_first_and_scalar() {
        let set = rows(3);
        assert_eq!(set.first().unwrap().get("id"), Some(&json!(0)));
        assert_eq!(set.scalar(), Some(&json!(0)));
        assert_eq!(rows(0).scalar(), None);
    }

    #[test]
    fn test_count_modes() {
        assert_eq!(rows(3).count(), 3);

        let counted = ResultSet::new(
            TerminalMode::Count,
            vec!["count".into()],
            vec![Row::new(vec![("count".into(), json!(7))])],
        );
        assert_eq!(counted.count(), 7);
        assert_eq!(counted.len(), 1);
    }

    #[test]
    fn test_row_json() {
        let row = Row::new(vec![("id".into(), json!(1))])
            .with_relation("articles", vec![Row::new(vec![("id".into(), json!(10))])])
            .with_unloaded(["comments".to_string()].into_iter().collect());

        assert_eq!(row.to_json(), json!({"id": 1, "articles": [{"id": 10}]}));
        assert!(!row.is_loaded("comments"));
        assert_eq!(row.related("articles").unwrap().len(), 1);
    }
}
