//! Query executor
//!
//! Reference in-memory execution engine for finalized plans.
//!
//! # Guarantees
//!
//! - Deterministic: same plan and data give the same rows in the same order
//! - Deferred fields and unjoined relationships are reported, not loaded
//! - Engine errors propagate unchanged to the caller

mod aggregate;
mod engine;
mod errors;
mod filters;
mod result;
mod sorter;
mod store;

pub use aggregate::Aggregator;
pub use engine::{ExecutionEngine, MemoryEngine};
pub use errors::{ExecutorError, ExecutorResult};
pub use filters::PredicateFilter;
pub use result::{ResultSet, Row};
pub use sorter::RowSorter;
pub use store::{MemoryStore, StoredRow};
