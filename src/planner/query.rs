//! Query facade
//!
//! Fluent entry point. Each clause method validates its document, folds it
//! into the plan and returns the same facade for chaining:
//!
//! ```ignore
//! let plan = Query::new(&registry, "User")?
//!     .filter(json!({"age": {"$gte": 18}}))?
//!     .sort(json!(["age-", "id"]))?
//!     .limit(10)?
//!     .end()?;
//! ```
//!
//! A rejected clause leaves the facade exactly as it was. After `end()`
//! every clause call fails with `MQ_FINALIZED_PLAN`.

use std::fmt;

use serde_json::Value;

use crate::config::QueryConfig;
use crate::observability::{log_event_with_fields, Event};
use crate::schema::SchemaAdapter;

use super::ast::ClauseSpec;
use super::errors::{PlannerError, PlannerResult};
use super::parser::ClauseParser;
use super::plan::{PlanBuilder, QueryPlan};

/// Top-level keys accepted by `Query::from_document`, in application order
const DOCUMENT_CLAUSES: [&str; 9] = [
    "join", "project", "filter", "aggregate", "group", "sort", "skip", "limit", "count",
];

/// Builder for one query over one root entity
pub struct Query<'a, S: SchemaAdapter + ?Sized> {
    adapter: &'a S,
    config: QueryConfig,
    builder: PlanBuilder,
    clauses: Vec<ClauseSpec>,
    finalized: bool,
}

impl<S: SchemaAdapter + ?Sized> fmt::Debug for Query<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("entity", &self.entity())
            .field("plan", self.builder.plan())
            .field("finalized", &self.finalized)
            .finish()
    }
}

impl<'a, S: SchemaAdapter + ?Sized> Query<'a, S> {
    /// Starts a query over `entity` with the default configuration
    pub fn new(adapter: &'a S, entity: &str) -> PlannerResult<Self> {
        Self::with_config(adapter, entity, QueryConfig::default())
    }

    /// Starts a query over `entity`. Fails with `MQ_SCHEMA_ERROR` if the
    /// entity is not registered.
    pub fn with_config(adapter: &'a S, entity: &str, config: QueryConfig) -> PlannerResult<Self> {
        adapter.entity(entity)?;
        Ok(Self {
            adapter,
            config,
            builder: PlanBuilder::new(entity),
            clauses: Vec::new(),
            finalized: false,
        })
    }

    /// Compiles a whole query document.
    ///
    /// Clauses are applied in a fixed order: join, project, filter,
    /// aggregate, group, sort, skip, limit, count.
    pub fn from_document(adapter: &'a S, entity: &str, doc: &Value) -> PlannerResult<QueryPlan> {
        Self::from_document_with_config(adapter, entity, doc, QueryConfig::default())
    }

    pub fn from_document_with_config(
        adapter: &'a S,
        entity: &str,
        doc: &Value,
        config: QueryConfig,
    ) -> PlannerResult<QueryPlan> {
        let map = doc.as_object().ok_or_else(|| {
            PlannerError::invalid_document("query must be a document").in_clause("document")
        })?;
        if let Some(key) = map.keys().find(|k| !DOCUMENT_CLAUSES.contains(&k.as_str())) {
            return Err(PlannerError::invalid_document(format!(
                "unknown clause '{}'",
                key
            ))
            .in_clause("document"));
        }

        let mut query = Self::with_config(adapter, entity, config)?;
        for clause in DOCUMENT_CLAUSES {
            let Some(spec) = map.get(clause) else {
                continue;
            };
            match clause {
                "join" => query.join(spec.clone())?,
                "project" => query.project(spec.clone())?,
                "filter" => query.filter(spec.clone())?,
                "aggregate" => query.aggregate(spec.clone())?,
                "group" => query.group(spec.clone())?,
                "sort" => query.sort(spec.clone())?,
                "skip" => query.apply("skip", |p| p.parse_skip(spec))?,
                "limit" => query.apply("limit", |p| p.parse_limit(spec))?,
                _ => match spec {
                    Value::Bool(true) => query.count()?,
                    Value::Bool(false) | Value::Null => &mut query,
                    _ => {
                        return Err(PlannerError::invalid_document("count expects a boolean")
                            .in_clause("count"))
                    }
                },
            };
        }
        query.end()
    }

    /// Root entity
    pub fn entity(&self) -> &str {
        &self.builder.plan().entity
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Restricts the root fields loaded immediately
    pub fn project(&mut self, spec: impl Into<Value>) -> PlannerResult<&mut Self> {
        let spec = spec.into();
        self.apply("project", |p| p.parse_projection(&spec))
    }

    /// Adds a filter, AND-ed with earlier filters
    pub fn filter(&mut self, spec: impl Into<Value>) -> PlannerResult<&mut Self> {
        let spec = spec.into();
        self.apply("filter", |p| p.parse_filter(&spec))
    }

    /// Appends sort keys
    pub fn sort(&mut self, spec: impl Into<Value>) -> PlannerResult<&mut Self> {
        let spec = spec.into();
        self.apply("sort", |p| p.parse_sort(&spec))
    }

    /// Loads relationships eagerly
    pub fn join(&mut self, spec: impl Into<Value>) -> PlannerResult<&mut Self> {
        let spec = spec.into();
        self.apply("join", |p| p.parse_join(&spec))
    }

    /// Switches to aggregate rows with the given output columns
    pub fn aggregate(&mut self, spec: impl Into<Value>) -> PlannerResult<&mut Self> {
        let spec = spec.into();
        self.apply("aggregate", |p| p.parse_aggregate(&spec))
    }

    /// Groups aggregate rows by passthrough fields
    pub fn group(&mut self, spec: impl Into<Value>) -> PlannerResult<&mut Self> {
        let spec = spec.into();
        self.apply("group", |p| p.parse_group(&spec))
    }

    pub fn limit(&mut self, n: u64) -> PlannerResult<&mut Self> {
        let spec = Value::from(n);
        self.apply("limit", |p| p.parse_limit(&spec))
    }

    pub fn skip(&mut self, n: u64) -> PlannerResult<&mut Self> {
        let spec = Value::from(n);
        self.apply("skip", |p| p.parse_skip(&spec))
    }

    /// Switches to a scalar row count, discarding projection, sort and
    /// aggregates
    pub fn count(&mut self) -> PlannerResult<&mut Self> {
        self.apply("count", |_| Ok(ClauseSpec::Count))
    }

    /// Plan composed so far
    pub fn plan(&self) -> &QueryPlan {
        self.builder.plan()
    }

    /// Clauses accepted so far, in call order
    pub fn clauses(&self) -> &[ClauseSpec] {
        &self.clauses
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Finalizes the query and returns the composed plan
    pub fn end(&mut self) -> PlannerResult<QueryPlan> {
        if self.finalized {
            return Err(self.reject("end", PlannerError::finalized_plan()));
        }
        self.finalized = true;

        let plan = self.builder.plan().clone();
        let clauses = self.clauses.len().to_string();
        let joins = plan.joins.len().to_string();
        log_event_with_fields(
            Event::PlanFinalized,
            &[
                ("entity", plan.entity.as_str()),
                ("mode", plan.mode.as_str()),
                ("clauses", clauses.as_str()),
                ("joins", joins.as_str()),
            ],
        );
        Ok(plan)
    }

    fn apply<F>(&mut self, clause: &'static str, parse: F) -> PlannerResult<&mut Self>
    where
        F: FnOnce(&ClauseParser<'_, S>) -> PlannerResult<ClauseSpec>,
    {
        if self.finalized {
            return Err(self.reject(clause, PlannerError::finalized_plan()));
        }

        let parsed = {
            let parser = ClauseParser::new(self.adapter, self.builder.plan(), &self.config);
            parse(&parser)
        };
        let applied = parsed.and_then(|spec| {
            self.builder.apply(spec.clone())?;
            Ok(spec)
        });

        match applied {
            Ok(spec) => {
                log_event_with_fields(
                    Event::ClauseApplied,
                    &[("entity", self.entity()), ("clause", spec.name())],
                );
                self.clauses.push(spec);
                Ok(self)
            }
            Err(err) => Err(self.reject(clause, err)),
        }
    }

    fn reject(&self, clause: &'static str, err: PlannerError) -> PlannerError {
        let err = err.in_clause(clause);
        log_event_with_fields(
            Event::ClauseRejected,
            &[
                ("entity", self.entity()),
                ("clause", clause),
                ("code", err.code().code()),
                ("reason", err.message()),
            ],
        );
        err
    }
}
