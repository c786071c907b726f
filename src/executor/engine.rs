//! Reference execution engine
//!
//! Runs finalized plans over an in-memory store.
//!
//! Execution flow (strict order):
//! 1. Read the root table
//! 2. Filter rows by the plan predicate
//! 3. Rows mode: sort, apply offset/limit, load columns and eager joins
//! 4. Count mode: apply offset/limit, count
//! 5. Aggregate modes: group and aggregate, sort outputs, apply offset/limit

use std::collections::BTreeSet;

use serde_json::Value;

use crate::observability::{log_event_with_fields, Event};
use crate::planner::{
    AggregateColumn, AggregateExpr, AggregateOp, AggregateSource, QueryPlan, SortDirection, SortKey,
    SortTarget, TerminalMode,
};
use crate::schema::{SchemaAdapter, ValueKind};

use super::aggregate::Aggregator;
use super::errors::ExecutorResult;
use super::filters::PredicateFilter;
use super::result::{ResultSet, Row};
use super::sorter::RowSorter;
use super::store::{MemoryStore, StoredRow};

/// Consumes finalized plans and produces result sets
pub trait ExecutionEngine {
    fn execute(&self, plan: &QueryPlan) -> ExecutorResult<ResultSet>;
}

/// Executes plans against a `MemoryStore`
pub struct MemoryEngine<'a, S: SchemaAdapter + ?Sized> {
    adapter: &'a S,
    store: &'a MemoryStore,
}

impl<'a, S: SchemaAdapter + ?Sized> MemoryEngine<'a, S> {
    pub fn new(adapter: &'a S, store: &'a MemoryStore) -> Self {
        Self { adapter, store }
    }

    fn run(&self, plan: &QueryPlan) -> ExecutorResult<ResultSet> {
        let schema = self.adapter.entity(&plan.entity)?;
        let table = self.store.rows(&plan.entity)?;
        let filter = PredicateFilter::new(self.adapter, self.store);

        let mut matched = Vec::new();
        for row in table {
            if filter.matches(&plan.entity, row, plan.predicate.as_ref())? {
                matched.push(row);
            }
        }

        let columns = plan.selected_columns(schema);
        let rows = match plan.mode {
            TerminalMode::Rows => {
                let sorted = self.sort_rows(&filter, &plan.entity, matched, &plan.sort)?;
                let mut rows = Vec::new();
                for row in window(sorted, plan) {
                    rows.push(self.materialize(&filter, plan, &plan.entity, row, &plan.deferred, &[])?);
                }
                rows
            }
            TerminalMode::Count => {
                let n = window(matched, plan).len() as u64;
                vec![Row::new(vec![("count".to_string(), Value::from(n))])]
            }
            TerminalMode::Aggregate | TerminalMode::GroupedAggregate => {
                let rows = Aggregator::new(&filter, &plan.entity).run(plan, &matched)?;
                let mut keyed: Vec<(Vec<Value>, Row)> = rows
                    .into_iter()
                    .map(|row| (output_key(plan, &row), row))
                    .collect();
                RowSorter::sort(&mut keyed, &directions(&plan.sort));
                window(keyed.into_iter().map(|(_, row)| row).collect(), plan)
            }
        };

        Ok(ResultSet::new(plan.mode, columns, rows))
    }

    /// Stable sort by entity field keys
    fn sort_rows<'r>(
        &self,
        filter: &PredicateFilter<'a, S>,
        entity: &str,
        rows: Vec<&'r StoredRow>,
        keys: &[SortKey],
    ) -> ExecutorResult<Vec<&'r StoredRow>> {
        if keys.is_empty() {
            return Ok(rows);
        }

        let mut keyed = Vec::with_capacity(rows.len());
        for row in rows {
            let mut values = Vec::with_capacity(keys.len());
            for key in keys {
                values.push(match &key.target {
                    SortTarget::Field(field) => {
                        RowSorter::canonical(&filter.first_value(entity, row, field)?, field.kind)
                    }
                    SortTarget::Output(_) => Value::Null,
                });
            }
            keyed.push((values, row));
        }
        RowSorter::sort(&mut keyed, &directions(keys));
        Ok(keyed.into_iter().map(|(_, row)| row).collect())
    }

    /// Builds a result row: non-deferred columns plus eagerly joined
    /// relations registered under `prefix`.
    fn materialize(
        &self,
        filter: &PredicateFilter<'a, S>,
        plan: &QueryPlan,
        entity: &str,
        row: &StoredRow,
        deferred: &BTreeSet<String>,
        prefix: &[String],
    ) -> ExecutorResult<Row> {
        let schema = self.adapter.entity(entity)?;
        let columns = schema
            .field_names()
            .filter(|f| !deferred.contains(*f))
            .map(|f| (f.to_string(), row.get(f).cloned().unwrap_or(Value::Null)))
            .collect();

        let mut out = Row::new(columns);
        let mut unloaded = deferred.clone();

        for rel in &schema.relationships {
            let mut path = prefix.to_vec();
            path.push(rel.name.clone());

            let join = match plan.join(&path).filter(|j| j.eager) {
                Some(join) => join,
                None => {
                    unloaded.insert(rel.name.clone());
                    continue;
                }
            };

            let mut related = Vec::new();
            for candidate in filter.related(rel, row) {
                if filter.matches(&rel.target, candidate, join.options.predicate.as_ref())? {
                    related.push(candidate);
                }
            }
            let related = self.sort_rows(filter, &rel.target, related, &join.options.sort)?;

            let mut children = Vec::with_capacity(related.len());
            for child in related {
                children.push(self.materialize(
                    filter,
                    plan,
                    &rel.target,
                    child,
                    &join.options.deferred,
                    &path,
                )?);
            }
            out = out.with_relation(rel.name.clone(), children);
        }

        Ok(out.with_unloaded(unloaded))
    }
}

impl<'a, S: SchemaAdapter + ?Sized> ExecutionEngine for MemoryEngine<'a, S> {
    fn execute(&self, plan: &QueryPlan) -> ExecutorResult<ResultSet> {
        match self.run(plan) {
            Ok(result) => {
                let rows = result.len().to_string();
                log_event_with_fields(
                    Event::QueryExecuted,
                    &[
                        ("entity", plan.entity.as_str()),
                        ("mode", plan.mode.as_str()),
                        ("rows", rows.as_str()),
                    ],
                );
                Ok(result)
            }
            Err(err) => {
                let reason = err.to_string();
                log_event_with_fields(
                    Event::QueryFailed,
                    &[
                        ("entity", plan.entity.as_str()),
                        ("code", err.code()),
                        ("reason", reason.as_str()),
                    ],
                );
                Err(err)
            }
        }
    }
}

fn directions(keys: &[SortKey]) -> Vec<SortDirection> {
    keys.iter().map(|k| k.direction).collect()
}

/// Sort key of an aggregate output row. Columns that carry field values
/// (passthroughs, `$max`, `$min`) compare by the field's kind.
fn output_key(plan: &QueryPlan, row: &Row) -> Vec<Value> {
    plan.sort
        .iter()
        .map(|key| {
            let name = match &key.target {
                SortTarget::Output(name) => name.clone(),
                SortTarget::Field(field) => field.dotted(),
            };
            let value = row.get(&name).cloned().unwrap_or(Value::Null);
            match plan.aggregate_column(&name).and_then(output_kind) {
                Some(kind) => RowSorter::canonical(&value, kind),
                None => value,
            }
        })
        .collect()
}

fn output_kind(column: &AggregateColumn) -> Option<ValueKind> {
    match &column.expr {
        AggregateExpr::Field(field) => Some(field.kind),
        AggregateExpr::Apply {
            op: AggregateOp::Max | AggregateOp::Min,
            source: AggregateSource::Field(field),
        } => Some(field.kind),
        AggregateExpr::Apply { .. } => None,
    }
}

/// Applies the plan's offset and limit
fn window<T>(items: Vec<T>, plan: &QueryPlan) -> Vec<T> {
    let offset = plan.offset.unwrap_or(0) as usize;
    let limit = plan.limit.map(|l| l as usize).unwrap_or(usize::MAX);
    items.into_iter().skip(offset).take(limit).collect()
}
