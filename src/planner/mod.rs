//! Query compiler
//!
//! Translates Mongo-style query documents into relational query plans.
//!
//! # Design Principles
//!
//! - Deterministic: same schema and clauses produce the same plan
//! - Fail fast: every error is raised by the clause that introduced it
//! - Atomic: a rejected clause leaves the plan unchanged
//! - Explicit: operator tokens resolve through a static table, no reflection
//!
//! # Components
//!
//! - `operators`: token to predicate/aggregate operator table
//! - `parser`: per-clause document validation
//! - `plan`: folds validated clauses into a `QueryPlan`
//! - `query`: fluent facade over parser and builder

mod ast;
mod errors;
mod explain;
mod operators;
mod parser;
mod plan;
mod query;

pub use ast::{
    AggregateColumn, AggregateExpr, AggregateSource, ClauseSpec, Comparison, FieldRef, JoinClause,
    JoinOptions, PredicateNode, SortDirection, SortKey, SortTarget,
};
pub use errors::{PlannerError, PlannerErrorCode, PlannerResult};
pub use explain::ExplainPlan;
pub use operators::{AggregateOp, Combinator, OperatorTable, PredicateOp};
pub use parser::ClauseParser;
pub use plan::{PlanBuilder, QueryPlan, TerminalMode};
pub use query::Query;
