//! Compiler Property Tests
//!
//! Plan-level guarantees of the query facade:
//! - Clause application is atomic
//! - Join clauses are idempotent
//! - Finalized plans reject further clauses
//! - Terminal modes conflict deterministically

mod common;

use mongoquery::config::QueryConfig;
use mongoquery::planner::{PlannerErrorCode, Query, TerminalMode};
use serde_json::json;

// =============================================================================
// Finalization
// =============================================================================

#[test]
fn test_clause_after_end_fails() {
    let registry = common::registry();
    let mut query = Query::new(&registry, "User").unwrap();
    query.filter(json!({"age": 16})).unwrap();
    query.end().unwrap();

    assert_eq!(
        query.filter(json!({"age": 18})).unwrap_err().code(),
        PlannerErrorCode::FinalizedPlan
    );
    assert_eq!(query.limit(1).unwrap_err().code(), PlannerErrorCode::FinalizedPlan);
    assert_eq!(query.end().unwrap_err().code(), PlannerErrorCode::FinalizedPlan);
    assert!(query.is_finalized());
}

// =============================================================================
// Joins
// =============================================================================

/// Joining the same relationship twice gives the same plan as once.
#[test]
fn test_join_idempotent() {
    let registry = common::registry();

    let mut once = Query::new(&registry, "User").unwrap();
    once.join("articles").unwrap();

    let mut twice = Query::new(&registry, "User").unwrap();
    twice.join("articles").unwrap().join("articles").unwrap();

    assert_eq!(once.end().unwrap(), twice.end().unwrap());
}

#[test]
fn test_nested_join_registers_every_prefix() {
    let registry = common::registry();
    let mut query = Query::new(&registry, "User").unwrap();
    query.join("articles.comments").unwrap();
    let plan = query.end().unwrap();

    assert!(plan.has_join(&["articles".to_string()]));
    assert!(plan.has_join(&["articles".to_string(), "comments".to_string()]));
    assert_eq!(plan.eager_joins().count(), 2);
}

#[test]
fn test_two_hop_path_needs_explicit_join() {
    let registry = common::registry();
    let mut query = Query::new(&registry, "User").unwrap();

    let err = query
        .filter(json!({"articles.comments.score": {"$gt": 3}}))
        .unwrap_err();
    assert_eq!(err.code(), PlannerErrorCode::UnresolvedPath);

    query.join("articles.comments").unwrap();
    query
        .filter(json!({"articles.comments.score": {"$gt": 3}}))
        .unwrap();
    assert!(query.plan().predicate.is_some());
}

#[test]
fn test_one_hop_path_adds_implicit_join() {
    let registry = common::registry();
    let mut query = Query::new(&registry, "User").unwrap();
    query.filter(json!({"articles.title": "rust"})).unwrap();
    let plan = query.end().unwrap();

    let join = plan.join(&["articles".to_string()]).unwrap();
    assert!(!join.eager);
}

#[test]
fn test_join_depth_limit() {
    let registry = common::registry();
    let config = QueryConfig {
        max_join_depth: 1,
        ..QueryConfig::default()
    };
    let mut query = Query::with_config(&registry, "User", config).unwrap();
    assert_eq!(
        query.join("articles.comments").unwrap_err().code(),
        PlannerErrorCode::InvalidDocument
    );
}

// =============================================================================
// Atomicity
// =============================================================================

/// A rejected clause leaves the plan exactly as it was.
#[test]
fn test_rejected_clause_leaves_plan_unchanged() {
    let registry = common::registry();
    let mut query = Query::new(&registry, "User").unwrap();
    query.filter(json!({"age": {"$gte": 18}})).unwrap().sort("id").unwrap();
    let before = query.plan().clone();

    let bad = [
        json!({"age": 16, "nope": 1}),
        json!({"age": {"$regex": "1"}}),
        json!({"age": {"$gt": "old"}}),
        json!({"$or": [{"age": 16}, {"missing.field": 1}]}),
    ];
    for doc in bad {
        assert!(query.filter(doc).is_err());
        assert_eq!(query.plan(), &before);
    }
    assert_eq!(query.clauses().len(), 2);
}

#[test]
fn test_unknown_operator() {
    let registry = common::registry();
    let mut query = Query::new(&registry, "User").unwrap();
    let err = query.filter(json!({"age": {"$near": 1}})).unwrap_err();
    assert_eq!(err.code(), PlannerErrorCode::UnknownOperator);
    assert_eq!(err.clause(), Some("filter"));
}

#[test]
fn test_unknown_entity_and_field() {
    let registry = common::registry();
    assert_eq!(
        Query::new(&registry, "Ghost").unwrap_err().code(),
        PlannerErrorCode::Schema
    );

    let mut query = Query::new(&registry, "User").unwrap();
    assert_eq!(
        query.sort("height").unwrap_err().code(),
        PlannerErrorCode::Schema
    );
}

// =============================================================================
// Modes
// =============================================================================

#[test]
fn test_mode_conflicts() {
    let registry = common::registry();

    let mut counted = Query::new(&registry, "User").unwrap();
    counted.count().unwrap();
    assert_eq!(counted.project("name").unwrap_err().code(), PlannerErrorCode::ModeConflict);
    assert_eq!(counted.sort("age").unwrap_err().code(), PlannerErrorCode::ModeConflict);

    let mut projected = Query::new(&registry, "User").unwrap();
    projected.project("name").unwrap();
    assert_eq!(
        projected.aggregate(json!({"n": {"$sum": 1}})).unwrap_err().code(),
        PlannerErrorCode::ModeConflict
    );

    let mut plain = Query::new(&registry, "User").unwrap();
    assert_eq!(plain.group(json!(["age"])).unwrap_err().code(), PlannerErrorCode::ModeConflict);
}

#[test]
fn test_count_discards_projection() {
    let registry = common::registry();
    let mut query = Query::new(&registry, "User").unwrap();
    query.project(json!(["name"])).unwrap().count().unwrap();
    let plan = query.end().unwrap();

    assert_eq!(plan.mode, TerminalMode::Count);
    assert!(plan.deferred.is_empty());
}

#[test]
fn test_projection_conflict() {
    let registry = common::registry();
    let mut query = Query::new(&registry, "User").unwrap();
    assert_eq!(
        query.project(json!({"name": 1, "age": 0})).unwrap_err().code(),
        PlannerErrorCode::ProjectionConflict
    );
}

#[test]
fn test_aggregate_operand_checks() {
    let registry = common::registry();
    let mut query = Query::new(&registry, "User").unwrap();

    for doc in [
        json!({"m": {"$avg": "name"}}),
        json!({"m": {"$max": 3}}),
        json!({"m": {"$min": "tags"}}),
    ] {
        assert_eq!(
            query.aggregate(doc).unwrap_err().code(),
            PlannerErrorCode::InvalidOperand
        );
    }
    assert_eq!(
        query.aggregate(json!({"m": {"$median": "age"}})).unwrap_err().code(),
        PlannerErrorCode::UnknownOperator
    );
}

#[test]
fn test_from_document_matches_fluent_form() {
    let registry = common::registry();
    let doc = json!({
        "limit": 2,
        "sort": "age-",
        "filter": {"age": {"$gte": 16}},
        "project": ["name"],
        "join": "articles"
    });
    let from_doc = Query::from_document(&registry, "User", &doc).unwrap();

    let mut query = Query::new(&registry, "User").unwrap();
    query
        .join("articles")
        .unwrap()
        .project(json!(["name"]))
        .unwrap()
        .filter(json!({"age": {"$gte": 16}}))
        .unwrap()
        .sort("age-")
        .unwrap()
        .limit(2)
        .unwrap();

    assert_eq!(from_doc, query.end().unwrap());
}

#[test]
fn test_from_document_unknown_key() {
    let registry = common::registry();
    let err = Query::from_document(&registry, "User", &json!({"where": {}})).unwrap_err();
    assert_eq!(err.code(), PlannerErrorCode::InvalidDocument);
}
