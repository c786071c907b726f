//! Aggregate evaluation
//!
//! Groups filtered rows by the plan's group fields (first-seen order) and
//! computes one output row per group. Without group fields the whole input
//! is one group, so an empty input still yields one row.

use std::collections::HashMap;

use serde_json::{Number, Value};

use crate::planner::{AggregateColumn, AggregateExpr, AggregateOp, AggregateSource, QueryPlan};
use crate::schema::{SchemaAdapter, ValueKind};

use super::errors::ExecutorResult;
use super::filters::PredicateFilter;
use super::result::Row;
use super::sorter::RowSorter;
use super::store::StoredRow;

pub struct Aggregator<'f, 'a, S: SchemaAdapter + ?Sized> {
    filter: &'f PredicateFilter<'a, S>,
    entity: &'f str,
}

impl<'f, 'a, S: SchemaAdapter + ?Sized> Aggregator<'f, 'a, S> {
    pub fn new(filter: &'f PredicateFilter<'a, S>, entity: &'f str) -> Self {
        Self { filter, entity }
    }

    /// One output row per group
    pub fn run(&self, plan: &QueryPlan, rows: &[&StoredRow]) -> ExecutorResult<Vec<Row>> {
        let groups = self.group(plan, rows)?;
        let mut out = Vec::with_capacity(groups.len());
        for members in groups {
            let mut columns = Vec::with_capacity(plan.aggregates.len());
            for column in &plan.aggregates {
                columns.push((column.name.clone(), self.column(column, &members)?));
            }
            out.push(Row::new(columns));
        }
        Ok(out)
    }

    fn group<'r>(&self, plan: &QueryPlan, rows: &[&'r StoredRow]) -> ExecutorResult<Vec<Vec<&'r StoredRow>>> {
        if plan.group_by.is_empty() {
            return Ok(vec![rows.to_vec()]);
        }

        let mut index: HashMap<String, usize> = HashMap::new();
        let mut groups: Vec<Vec<&'r StoredRow>> = Vec::new();
        for row in rows {
            let mut key = Vec::with_capacity(plan.group_by.len());
            for field in &plan.group_by {
                let value = self.filter.first_value(self.entity, row, field)?;
                key.push(RowSorter::canonical(&value, field.kind));
            }
            let key = Value::Array(key).to_string();
            let slot = *index.entry(key).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[slot].push(*row);
        }
        Ok(groups)
    }

    fn column(&self, column: &AggregateColumn, rows: &[&StoredRow]) -> ExecutorResult<Value> {
        let (op, source) = match &column.expr {
            AggregateExpr::Field(field) => {
                return match rows.first() {
                    Some(row) => self.filter.first_value(self.entity, row, field),
                    None => Ok(Value::Null),
                };
            }
            AggregateExpr::Apply { op, source } => (*op, source),
        };

        match source {
            AggregateSource::Literal(n) => Ok(match op {
                AggregateOp::Count => Value::from(rows.len() as u64),
                _ => scale(n, rows.len() as u64),
            }),
            AggregateSource::Filter(node) => {
                let mut matched = 0u64;
                for row in rows {
                    if self.filter.matches(self.entity, row, Some(node))? {
                        matched += 1;
                    }
                }
                Ok(Value::from(matched))
            }
            AggregateSource::Field(field) => {
                let mut values = Vec::with_capacity(rows.len());
                for row in rows {
                    let value = self.filter.first_value(self.entity, row, field)?;
                    if !value.is_null() {
                        values.push(value);
                    }
                }
                Ok(reduce(op, values, field.kind))
            }
        }
    }
}

/// Applies `op` to the non-null values of one group.
fn reduce(op: AggregateOp, values: Vec<Value>, kind: ValueKind) -> Value {
    match op {
        AggregateOp::Count => Value::from(values.len() as u64),
        AggregateOp::Max => values
            .into_iter()
            .max_by(|a, b| RowSorter::compare_as(a, b, kind))
            .unwrap_or(Value::Null),
        AggregateOp::Min => values
            .into_iter()
            .min_by(|a, b| RowSorter::compare_as(a, b, kind))
            .unwrap_or(Value::Null),
        AggregateOp::Sum => sum(&values),
        AggregateOp::Avg => {
            let numbers: Vec<f64> = values.iter().filter_map(Value::as_f64).collect();
            if numbers.is_empty() {
                return Value::Null;
            }
            let mean = numbers.iter().sum::<f64>() / numbers.len() as f64;
            Number::from_f64(mean).map(Value::Number).unwrap_or(Value::Null)
        }
    }
}

/// Sum that stays integral while every input is an integer
fn sum(values: &[Value]) -> Value {
    let mut int_total: i64 = 0;
    let mut integral = true;
    let mut float_total = 0.0;

    for value in values {
        if let Some(n) = value.as_i64() {
            match int_total.checked_add(n) {
                Some(total) => int_total = total,
                None => integral = false,
            }
        } else {
            integral = false;
        }
        float_total += value.as_f64().unwrap_or(0.0);
    }

    if integral {
        return Value::from(int_total);
    }
    Number::from_f64(float_total).map(Value::Number).unwrap_or(Value::Null)
}

/// `literal * rows`
fn scale(n: &Number, rows: u64) -> Value {
    if let Some(i) = n.as_i64() {
        if let Some(total) = i64::try_from(rows).ok().and_then(|r| i.checked_mul(r)) {
            return Value::from(total);
        }
    }
    let total = n.as_f64().unwrap_or(0.0) * rows as f64;
    Number::from_f64(total).map(Value::Number).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sum_stays_integral() {
        assert_eq!(sum(&[json!(1), json!(2)]), json!(3));
        assert_eq!(sum(&[json!(1), json!(2.5)]), json!(3.5));
        assert_eq!(sum(&[]), json!(0));
    }

    #[test]
    fn test_scale_literal() {
        assert_eq!(scale(&Number::from(10), 3), json!(30));
        assert_eq!(scale(&Number::from(10), 0), json!(0));
        assert_eq!(scale(&Number::from_f64(0.5).unwrap(), 3), json!(1.5));
    }

    #[test]
    fn test_reduce_empty() {
        assert_eq!(reduce(AggregateOp::Max, vec![], ValueKind::Numeric), Value::Null);
        assert_eq!(reduce(AggregateOp::Avg, vec![], ValueKind::Numeric), Value::Null);
        assert_eq!(reduce(AggregateOp::Count, vec![], ValueKind::Numeric), json!(0));
        assert_eq!(reduce(AggregateOp::Sum, vec![], ValueKind::Numeric), json!(0));
    }

    #[test]
    fn test_reduce_dates_by_instant() {
        let dates = vec![json!("2024-03-01T10:00:00+02:00"), json!("2024-03-01T09:00:00Z")];
        assert_eq!(
            reduce(AggregateOp::Max, dates.clone(), ValueKind::Date),
            json!("2024-03-01T09:00:00Z")
        );
        assert_eq!(
            reduce(AggregateOp::Min, dates, ValueKind::Date),
            json!("2024-03-01T10:00:00+02:00")
        );
    }

    #[test]
    fn test_reduce_values() {
        let ages = vec![json!(18), json!(16), json!(18)];
        assert_eq!(reduce(AggregateOp::Max, ages.clone(), ValueKind::Numeric), json!(18));
        assert_eq!(reduce(AggregateOp::Min, ages.clone(), ValueKind::Numeric), json!(16));
        assert_eq!(reduce(AggregateOp::Count, ages.clone(), ValueKind::Numeric), json!(3));
        assert_eq!(reduce(AggregateOp::Avg, vec![json!(1), json!(2)], ValueKind::Numeric), json!(1.5));
    }
}
