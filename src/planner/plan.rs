//! Plan builder
//!
//! Folds validated clauses into a single `QueryPlan`. Application is atomic:
//! the clause is folded into a copy and the copy replaces the plan only if
//! every rule holds.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::schema::EntitySchema;

use super::ast::{AggregateColumn, ClauseSpec, FieldRef, JoinClause, PredicateNode, SortKey, SortTarget};
use super::errors::{PlannerError, PlannerResult};

/// Shape of the rows the plan produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalMode {
    /// Entity rows
    Rows,
    /// One row holding the matching row count
    Count,
    /// One aggregate row
    Aggregate,
    /// One aggregate row per distinct group key
    GroupedAggregate,
}

impl TerminalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminalMode::Rows => "rows",
            TerminalMode::Count => "count",
            TerminalMode::Aggregate => "aggregate",
            TerminalMode::GroupedAggregate => "grouped_aggregate",
        }
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, TerminalMode::Aggregate | TerminalMode::GroupedAggregate)
    }
}

/// Composed relational plan, ready to hand to an execution engine
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryPlan {
    /// Root entity
    pub entity: String,
    pub mode: TerminalMode,
    /// Root fields not loaded immediately
    pub deferred: BTreeSet<String>,
    /// Whether a projection was applied
    pub projected: bool,
    /// Join graph, deduplicated by relationship path
    pub joins: Vec<JoinClause>,
    pub predicate: Option<PredicateNode>,
    pub sort: Vec<SortKey>,
    /// Output columns in aggregate modes
    pub aggregates: Vec<AggregateColumn>,
    pub group_by: Vec<FieldRef>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl QueryPlan {
    /// Empty row plan over `entity`
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            mode: TerminalMode::Rows,
            deferred: BTreeSet::new(),
            projected: false,
            joins: Vec::new(),
            predicate: None,
            sort: Vec::new(),
            aggregates: Vec::new(),
            group_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Join registered for `path`, if any
    pub fn join(&self, path: &[String]) -> Option<&JoinClause> {
        self.joins.iter().find(|j| j.path == path)
    }

    pub fn has_join(&self, path: &[String]) -> bool {
        self.join(path).is_some()
    }

    /// Joins whose rows are loaded with their parent
    pub fn eager_joins(&self) -> impl Iterator<Item = &JoinClause> {
        self.joins.iter().filter(|j| j.eager)
    }

    /// Output column named `name` in aggregate modes
    pub fn aggregate_column(&self, name: &str) -> Option<&AggregateColumn> {
        self.aggregates.iter().find(|c| c.name == name)
    }

    /// Column names the plan produces, in output order
    pub fn selected_columns(&self, schema: &EntitySchema) -> Vec<String> {
        match self.mode {
            TerminalMode::Rows => schema
                .field_names()
                .filter(|name| !self.deferred.contains(*name))
                .map(str::to_string)
                .collect(),
            TerminalMode::Count => vec!["count".to_string()],
            TerminalMode::Aggregate | TerminalMode::GroupedAggregate => {
                self.aggregates.iter().map(|c| c.name.clone()).collect()
            }
        }
    }
}

/// Incrementally composes a `QueryPlan`
#[derive(Debug, Clone)]
pub struct PlanBuilder {
    plan: QueryPlan,
}

impl PlanBuilder {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            plan: QueryPlan::new(entity),
        }
    }

    /// Plan as composed so far
    pub fn plan(&self) -> &QueryPlan {
        &self.plan
    }

    /// Folds one clause into the plan. On error the plan is unchanged.
    pub fn apply(&mut self, clause: ClauseSpec) -> PlannerResult<()> {
        let mut next = self.plan.clone();
        fold(&mut next, clause)?;
        self.plan = next;
        Ok(())
    }

    pub fn finish(self) -> QueryPlan {
        self.plan
    }
}

fn fold(plan: &mut QueryPlan, clause: ClauseSpec) -> PlannerResult<()> {
    match clause {
        ClauseSpec::Projection { deferred } => {
            match plan.mode {
                TerminalMode::Count => {
                    return Err(PlannerError::mode_conflict(
                        "project() after count(): a count has no row shape",
                    ));
                }
                TerminalMode::Aggregate | TerminalMode::GroupedAggregate => {
                    return Err(PlannerError::mode_conflict(
                        "project() after aggregate(): aggregate rows have no entity fields",
                    ));
                }
                TerminalMode::Rows => {}
            }
            plan.deferred = deferred;
            plan.projected = true;
        }
        ClauseSpec::Filter { predicate, joins } => {
            merge_joins(plan, joins);
            if let Some(node) = predicate {
                let existing = plan.predicate.take();
                plan.predicate = PredicateNode::all(existing.into_iter().chain(Some(node)).collect());
            }
        }
        ClauseSpec::Sort { keys, joins } => {
            if plan.mode == TerminalMode::Count {
                return Err(PlannerError::mode_conflict(
                    "sort() after count(): a count has no row order",
                ));
            }
            merge_joins(plan, joins);
            for key in keys {
                if !plan.sort.iter().any(|k| k.target.key() == key.target.key()) {
                    plan.sort.push(key);
                }
            }
        }
        ClauseSpec::Join { joins } => merge_joins(plan, joins),
        ClauseSpec::Aggregate { columns, joins } => {
            if plan.projected {
                return Err(PlannerError::mode_conflict(
                    "aggregate() after project(): the projection would be discarded",
                ));
            }
            if plan.mode == TerminalMode::GroupedAggregate {
                for field in &plan.group_by {
                    let kept = columns
                        .iter()
                        .any(|c| c.passthrough().map(|p| p == field).unwrap_or(false));
                    if !kept {
                        return Err(PlannerError::mode_conflict(format!(
                            "aggregate() must keep a passthrough for grouped field '{}'",
                            field
                        )));
                    }
                }
            } else {
                plan.mode = TerminalMode::Aggregate;
            }
            merge_joins(plan, joins);
            plan.aggregates = columns;
            retarget_sort(plan)?;
        }
        ClauseSpec::Group { fields } => {
            if !plan.mode.is_aggregate() {
                return Err(PlannerError::mode_conflict("group() requires aggregate()"));
            }
            for field in fields {
                if !plan.group_by.contains(&field) {
                    plan.group_by.push(field);
                }
            }
            plan.mode = TerminalMode::GroupedAggregate;
        }
        ClauseSpec::Limit(n) => plan.limit = Some(n),
        ClauseSpec::Skip(n) => plan.offset = Some(n),
        ClauseSpec::Count => {
            plan.mode = TerminalMode::Count;
            plan.deferred.clear();
            plan.projected = false;
            plan.sort.clear();
            plan.aggregates.clear();
            plan.group_by.clear();
        }
    }
    Ok(())
}

/// Registers joins, deduplicating by path. A repeated path becomes eager if
/// either request was eager; explicit sub-query options replace earlier ones.
fn merge_joins(plan: &mut QueryPlan, joins: Vec<JoinClause>) {
    for join in joins {
        match plan.joins.iter_mut().find(|j| j.path == join.path) {
            Some(existing) => {
                existing.eager |= join.eager;
                if !join.options.is_empty() {
                    existing.options = join.options;
                }
            }
            None => plan.joins.push(join),
        }
    }
}

/// Points field sort keys at aggregate output columns once the plan
/// produces aggregate rows.
fn retarget_sort(plan: &mut QueryPlan) -> PlannerResult<()> {
    for key in &mut plan.sort {
        let name = match &key.target {
            SortTarget::Output(name) => {
                if plan.aggregates.iter().any(|c| &c.name == name) {
                    continue;
                }
                name.clone()
            }
            SortTarget::Field(field) => {
                let column = plan
                    .aggregates
                    .iter()
                    .find(|c| c.passthrough() == Some(field) || c.name == field.dotted());
                match column {
                    Some(column) => {
                        key.target = SortTarget::Output(column.name.clone());
                        continue;
                    }
                    None => field.dotted(),
                }
            }
        };
        return Err(PlannerError::mode_conflict(format!(
            "sort key '{}' is not an output column of aggregate()",
            name
        )));
    }
    Ok(())
}
