//! mongoquery - compiles Mongo-style query documents into relational query plans
//!
//! A query is built clause by clause (or from one document) against a
//! read-only schema, validated eagerly, and finalized into an immutable
//! `QueryPlan`. The `executor` module runs plans over in-memory JSON tables.

pub mod cli;
pub mod config;
pub mod executor;
pub mod observability;
pub mod planner;
pub mod schema;
