//! Shared fixtures for integration tests
//!
//! Schema: User -> articles (many) -> comments (many), Article -> author (one).
//! Users 1..4 have ages 20, 16, 18, 18.

#![allow(dead_code)]

use mongoquery::executor::{ExecutionEngine, MemoryEngine, MemoryStore, ResultSet};
use mongoquery::planner::QueryPlan;
use mongoquery::schema::{Cardinality, EntitySchema, SchemaRegistry, ValueKind};
use serde_json::{json, Value};

pub fn registry() -> SchemaRegistry {
    SchemaRegistry::from_entities(vec![
        EntitySchema::new("User", "id")
            .with_field("id", ValueKind::Numeric)
            .with_field("name", ValueKind::String)
            .with_field("age", ValueKind::Numeric)
            .with_field("tags", ValueKind::Array)
            .with_relationship("articles", "Article", Cardinality::Many, "id", "uid"),
        EntitySchema::new("Article", "id")
            .with_field("id", ValueKind::Numeric)
            .with_field("uid", ValueKind::Numeric)
            .with_field("title", ValueKind::String)
            .with_field("published", ValueKind::Date)
            .with_relationship("author", "User", Cardinality::One, "uid", "id")
            .with_relationship("comments", "Comment", Cardinality::Many, "id", "article_id"),
        EntitySchema::new("Comment", "id")
            .with_field("id", ValueKind::Numeric)
            .with_field("article_id", ValueKind::Numeric)
            .with_field("body", ValueKind::String)
            .with_field("score", ValueKind::Numeric),
    ])
    .unwrap()
}

pub fn store() -> MemoryStore {
    MemoryStore::from_json(json!({
        "User": [
            {"id": 1, "name": "ada", "age": 20, "tags": ["admin", "staff"]},
            {"id": 2, "name": "bob", "age": 16, "tags": []},
            {"id": 3, "name": "cy", "age": 18, "tags": ["staff"]},
            {"id": 4, "name": "dee", "age": 18, "tags": null}
        ],
        "Article": [
            {"id": 10, "uid": 1, "title": "rust", "published": "2024-01-05"},
            {"id": 11, "uid": 1, "title": "go", "published": "2023-06-01"},
            {"id": 12, "uid": 3, "title": "sql", "published": null}
        ],
        "Comment": [
            {"id": 100, "article_id": 10, "body": "nice", "score": 5},
            {"id": 101, "article_id": 10, "body": "meh", "score": 2},
            {"id": 102, "article_id": 12, "body": "ok", "score": 3}
        ]
    }))
    .unwrap()
}

pub fn execute(registry: &SchemaRegistry, store: &MemoryStore, plan: &QueryPlan) -> ResultSet {
    MemoryEngine::new(registry, store).execute(plan).unwrap()
}

/// Values of one column across the result rows
pub fn column(result: &ResultSet, name: &str) -> Vec<Value> {
    result
        .all()
        .iter()
        .map(|row| row.get(name).cloned().unwrap_or(Value::Null))
        .collect()
}
