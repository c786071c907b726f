//! Result sorting
//!
//! Multi-key, stable, deterministic.
//!
//! Ordering rules:
//! - null < bool < number < string < array < object
//! - numbers compare numerically regardless of integer/float encoding
//! - NULLs sort first ascending, last descending
//! - date fields compare by instant, not by their text

use std::cmp::Ordering;

use serde_json::{Number, Value};

use crate::planner::SortDirection;
use crate::schema::{parse_date, ValueKind};

pub struct RowSorter;

impl RowSorter {
    /// Sorts items by precomputed key values, one value per direction.
    pub fn sort<T>(items: &mut [(Vec<Value>, T)], directions: &[SortDirection]) {
        items.sort_by(|(a, _), (b, _)| Self::compare_keys(a, b, directions));
    }

    fn compare_keys(a: &[Value], b: &[Value], directions: &[SortDirection]) -> Ordering {
        for ((a, b), direction) in a.iter().zip(b).zip(directions) {
            let ordering = match direction {
                SortDirection::Asc => Self::compare_values(a, b),
                SortDirection::Desc => Self::compare_values(a, b).reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    /// Comparable form of a field value. Dates become fixed-width UTC
    /// timestamps and numbers become floats, so equal instants and equal
    /// numbers share one form.
    pub fn canonical(value: &Value, kind: ValueKind) -> Value {
        match value {
            Value::String(s) if kind == ValueKind::Date => match parse_date(s) {
                Some(ts) => Value::String(ts.format("%Y-%m-%dT%H:%M:%S%.9f").to_string()),
                None => value.clone(),
            },
            Value::Number(n) => n
                .as_f64()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .unwrap_or_else(|| value.clone()),
            _ => value.clone(),
        }
    }

    /// `compare_values` over the canonical forms for `kind`
    pub fn compare_as(a: &Value, b: &Value, kind: ValueKind) -> Ordering {
        Self::compare_values(&Self::canonical(a, kind), &Self::canonical(b, kind))
    }

    /// Total order over JSON values used for sorting and `$max`/`$min`.
    pub fn compare_values(a: &Value, b: &Value) -> Ordering {
        let type_order = |v: &Value| -> u8 {
            match v {
                Value::Null => 0,
                Value::Bool(_) => 1,
                Value::Number(_) => 2,
                Value::String(_) => 3,
                Value::Array(_) => 4,
                Value::Object(_) => 5,
            }
        };

        let a_type = type_order(a);
        let b_type = type_order(b);
        if a_type != b_type {
            return a_type.cmp(&b_type);
        }

        match (a, b) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Number(a), Value::Number(b)) => {
                let a = a.as_f64().unwrap_or(0.0);
                let b = b.as_f64().unwrap_or(0.0);
                a.partial_cmp(&b).unwrap_or(Ordering::Equal)
            }
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Array(a), Value::Array(b)) => a
                .iter()
                .zip(b)
                .map(|(x, y)| Self::compare_values(x, y))
                .find(|o| *o != Ordering::Equal)
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            _ => Ordering::Equal,
        }
    }
}
