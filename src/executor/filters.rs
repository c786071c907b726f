//! Predicate evaluation
//!
//! Evaluates predicate trees against stored rows with relational semantics:
//! - comparisons against NULL are unknown, so `NOT` of them is unknown too
//! - a row matches only when its predicate is definitely true
//! - a dotted path over a to-many relationship matches if any related row
//!   matches; with no related rows the value is NULL

use std::cmp::Ordering;

use serde_json::Value;

use crate::planner::{Comparison, FieldRef, PredicateNode, PredicateOp};
use crate::schema::{parse_date, RelationshipDef, SchemaAdapter, SchemaError, ValueKind};

use super::errors::ExecutorResult;
use super::store::{MemoryStore, StoredRow};

/// Evaluates predicates and resolves field paths over a store
pub struct PredicateFilter<'a, S: SchemaAdapter + ?Sized> {
    adapter: &'a S,
    store: &'a MemoryStore,
}

impl<'a, S: SchemaAdapter + ?Sized> PredicateFilter<'a, S> {
    pub fn new(adapter: &'a S, store: &'a MemoryStore) -> Self {
        Self { adapter, store }
    }

    /// Returns true if `row` of `entity` satisfies `predicate`.
    /// No predicate matches every row.
    pub fn matches(&self, entity: &str, row: &StoredRow, predicate: Option<&PredicateNode>) -> ExecutorResult<bool> {
        match predicate {
            Some(node) => Ok(self.eval(entity, row, node)? == Some(true)),
            None => Ok(true),
        }
    }

    /// Three-valued evaluation; `None` is unknown
    pub fn eval(&self, entity: &str, row: &StoredRow, node: &PredicateNode) -> ExecutorResult<Option<bool>> {
        match node {
            PredicateNode::Compare(cmp) => {
                let values = self.values(entity, row, &cmp.field)?;
                Ok(any_of(values.iter().map(|v| Self::compare(v, cmp))))
            }
            PredicateNode::And(children) => {
                let mut result = Some(true);
                for child in children {
                    match self.eval(entity, row, child)? {
                        Some(false) => return Ok(Some(false)),
                        None => result = None,
                        Some(true) => {}
                    }
                }
                Ok(result)
            }
            PredicateNode::Or(children) => {
                let mut results = Vec::with_capacity(children.len());
                for child in children {
                    results.push(self.eval(entity, row, child)?);
                }
                Ok(any_of(results.into_iter()))
            }
            PredicateNode::Not(child) => Ok(self.eval(entity, row, child)?.map(|b| !b)),
        }
    }

    /// Rows of the relationship's target entity related to `row`
    pub fn related(&self, rel: &RelationshipDef, row: &StoredRow) -> Vec<&'a StoredRow> {
        let key = match row.get(&rel.local_field) {
            Some(key) if !key.is_null() => key,
            _ => return Vec::new(),
        };
        self.store
            .get(&rel.target)
            .unwrap_or(&[])
            .iter()
            .filter(|r| r.get(&rel.remote_field).map(|v| scalar_eq(v, key)).unwrap_or(false))
            .collect()
    }

    /// Every value `field` takes for `row`, following relationship hops.
    /// An empty relationship yields a single NULL.
    pub fn values(&self, entity: &str, row: &StoredRow, field: &FieldRef) -> ExecutorResult<Vec<Value>> {
        let mut current_entity = entity.to_string();
        let mut rows: Vec<&StoredRow> = vec![row];

        for hop in &field.path {
            let rel = self
                .adapter
                .entity(&current_entity)?
                .relationship(hop)
                .ok_or_else(|| SchemaError::unknown_relationship(&current_entity, hop))?;
            rows = rows.into_iter().flat_map(|r| self.related(rel, r)).collect();
            current_entity = rel.target.clone();
        }

        if rows.is_empty() {
            return Ok(vec![Value::Null]);
        }
        Ok(rows
            .into_iter()
            .map(|r| r.get(&field.field).cloned().unwrap_or(Value::Null))
            .collect())
    }

    /// First value of `field` for `row`; used for to-one sort and
    /// aggregate references.
    pub fn first_value(&self, entity: &str, row: &StoredRow, field: &FieldRef) -> ExecutorResult<Value> {
        Ok(self
            .values(entity, row, field)?
            .into_iter()
            .next()
            .unwrap_or(Value::Null))
    }

    fn compare(actual: &Value, cmp: &Comparison) -> Option<bool> {
        let operand = &cmp.value;
        let kind = cmp.field.kind;

        match cmp.op {
            PredicateOp::Exists => return Some(actual.is_null() != operand.as_bool().unwrap_or(true)),
            PredicateOp::Eq if operand.is_null() => return Some(actual.is_null()),
            PredicateOp::Ne if operand.is_null() => return Some(!actual.is_null()),
            _ => {}
        }
        if actual.is_null() {
            return None;
        }

        match cmp.op {
            PredicateOp::Eq => Some(equals(actual, operand, kind)),
            PredicateOp::Ne => Some(!equals(actual, operand, kind)),
            PredicateOp::Gt => order(actual, operand, kind).map(|o| o == Ordering::Greater),
            PredicateOp::Gte => order(actual, operand, kind).map(|o| o != Ordering::Less),
            PredicateOp::Lt => order(actual, operand, kind).map(|o| o == Ordering::Less),
            PredicateOp::Lte => order(actual, operand, kind).map(|o| o != Ordering::Greater),
            PredicateOp::In => Some(within(actual, operand, kind)),
            PredicateOp::Nin => Some(!within(actual, operand, kind)),
            PredicateOp::All => match (actual, operand) {
                (Value::Array(items), Value::Array(wanted)) => {
                    Some(wanted.iter().all(|w| items.iter().any(|i| scalar_eq(i, w))))
                }
                _ => Some(false),
            },
            PredicateOp::Size => match actual {
                Value::Array(items) => Some(Some(items.len() as u64) == operand.as_u64()),
                _ => Some(false),
            },
            PredicateOp::Exists => None,
        }
    }
}

/// SQL-style OR over unknowns: any true wins, else any unknown is unknown
fn any_of(results: impl Iterator<Item = Option<bool>>) -> Option<bool> {
    let mut result = Some(false);
    for r in results {
        match r {
            Some(true) => return Some(true),
            None => result = None,
            Some(false) => {}
        }
    }
    result
}

/// Equality without type coercion, except that numbers compare by value.
pub(crate) fn scalar_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}

/// `field = operand`. A scalar operand on an array field means "contains";
/// an array operand means exact match.
fn equals(actual: &Value, operand: &Value, kind: ValueKind) -> bool {
    match (kind, actual, operand) {
        (ValueKind::Array, Value::Array(items), Value::Array(wanted)) => {
            items.len() == wanted.len() && items.iter().zip(wanted).all(|(a, b)| scalar_eq(a, b))
        }
        (ValueKind::Array, Value::Array(items), scalar) => items.iter().any(|i| scalar_eq(i, scalar)),
        (ValueKind::Date, Value::String(a), Value::String(b)) => match (parse_date(a), parse_date(b)) {
            (Some(a), Some(b)) => a == b,
            _ => a == b,
        },
        _ => scalar_eq(actual, operand),
    }
}

/// `field IN operand`; on array fields, any element overlaps.
fn within(actual: &Value, operand: &Value, kind: ValueKind) -> bool {
    let candidates = match operand {
        Value::Array(candidates) => candidates,
        _ => return false,
    };
    match actual {
        Value::Array(items) => items.iter().any(|i| candidates.iter().any(|c| scalar_eq(i, c))),
        _ => candidates.iter().any(|c| equals(actual, c, kind)),
    }
}

/// Ordering between a value and an operand of the same kind; `None` when
/// they are not comparable.
fn order(actual: &Value, operand: &Value, kind: ValueKind) -> Option<Ordering> {
    match (actual, operand) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) if kind == ValueKind::Date => {
            Some(parse_date(a)?.cmp(&parse_date(b)?))
        }
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Cardinality, EntitySchema, SchemaRegistry};
    use serde_json::json;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::from_entities(vec![
            EntitySchema::new("User", "id")
                .with_field("id", ValueKind::Numeric)
                .with_field("age", ValueKind::Numeric)
                .with_field("tags", ValueKind::Array)
                .with_field("joined", ValueKind::Date)
                .with_relationship("articles", "Article", Cardinality::Many, "id", "uid"),
            EntitySchema::new("Article", "id")
                .with_field("id", ValueKind::Numeric)
                .with_field("uid", ValueKind::Numeric)
                .with_field("title", ValueKind::String),
        ])
        .unwrap()
    }

    fn store() -> MemoryStore {
        MemoryStore::from_json(json!({
            "User": [],
            "Article": [
                {"id": 10, "uid": 1, "title": "x"},
                {"id": 11, "uid": 1, "title": "y"},
                {"id": 12, "uid": 2, "title": "z"}
            ]
        }))
        .unwrap()
    }

    fn row(value: Value) -> StoredRow {
        value.as_object().cloned().unwrap()
    }

    fn leaf(field: &str, kind: ValueKind, op: PredicateOp, value: Value) -> PredicateNode {
        PredicateNode::compare(FieldRef::local(field, kind), op, value)
    }

    #[test]
    fn test_comparisons() {
        let (registry, store) = (registry(), store());
        let filter = PredicateFilter::new(&registry, &store);
        let user = row(json!({"id": 1, "age": 18}));

        let yes = leaf("age", ValueKind::Numeric, PredicateOp::Gte, json!(18.0));
        let no = leaf("age", ValueKind::Numeric, PredicateOp::Lt, json!(18));
        assert!(filter.matches("User", &user, Some(&yes)).unwrap());
        assert!(!filter.matches("User", &user, Some(&no)).unwrap());
        assert!(filter.matches("User", &user, None).unwrap());
    }

    #[test]
    fn test_null_semantics() {
        let (registry, store) = (registry(), store());
        let filter = PredicateFilter::new(&registry, &store);
        let user = row(json!({"id": 1, "age": null}));

        let gt = leaf("age", ValueKind::Numeric, PredicateOp::Gt, json!(5));
        assert_eq!(filter.eval("User", &user, &gt).unwrap(), None);
        assert!(!filter.matches("User", &user, Some(&PredicateNode::negate(gt))).unwrap());

        let is_null = leaf("age", ValueKind::Numeric, PredicateOp::Eq, Value::Null);
        assert!(filter.matches("User", &user, Some(&is_null)).unwrap());

        let missing = leaf("age", ValueKind::Numeric, PredicateOp::Exists, json!(false));
        assert!(filter.matches("User", &row(json!({"id": 2})), Some(&missing)).unwrap());
    }

    #[test]
    fn test_array_operators() {
        let (registry, store) = (registry(), store());
        let filter = PredicateFilter::new(&registry, &store);
        let user = row(json!({"id": 1, "tags": ["a", "b"]}));
        let check = |op, value| {
            let node = leaf("tags", ValueKind::Array, op, value);
            filter.matches("User", &user, Some(&node)).unwrap()
        };

        assert!(check(PredicateOp::Eq, json!("a")));
        assert!(!check(PredicateOp::Eq, json!(["b", "a"])));
        assert!(check(PredicateOp::Eq, json!(["a", "b"])));
        assert!(check(PredicateOp::In, json!(["b", "c"])));
        assert!(check(PredicateOp::Nin, json!(["c"])));
        assert!(check(PredicateOp::All, json!(["b", "a"])));
        assert!(!check(PredicateOp::All, json!(["a", "c"])));
        assert!(check(PredicateOp::Size, json!(2)));
    }

    #[test]
    fn test_date_comparison() {
        let (registry, store) = (registry(), store());
        let filter = PredicateFilter::new(&registry, &store);
        let user = row(json!({"id": 1, "joined": "2024-03-01T10:00:00Z"}));

        let after = leaf("joined", ValueKind::Date, PredicateOp::Gt, json!("2024-03-01"));
        assert!(filter.matches("User", &user, Some(&after)).unwrap());
    }

    #[test]
    fn test_to_many_any_match() {
        let (registry, store) = (registry(), store());
        let filter = PredicateFilter::new(&registry, &store);
        let title = FieldRef {
            path: vec!["articles".into()],
            field: "title".into(),
            kind: ValueKind::String,
        };
        let node = PredicateNode::compare(title.clone(), PredicateOp::Eq, json!("y"));

        assert!(filter.matches("User", &row(json!({"id": 1})), Some(&node)).unwrap());
        assert!(!filter.matches("User", &row(json!({"id": 2})), Some(&node)).unwrap());

        // No related rows: the joined value is NULL
        let none = row(json!({"id": 3}));
        assert_eq!(filter.values("User", &none, &title).unwrap(), vec![Value::Null]);
        let is_null = PredicateNode::compare(title, PredicateOp::Eq, Value::Null);
        assert!(filter.matches("User", &none, Some(&is_null)).unwrap());
    }
}
