//! Operator table
//!
//! Maps `$` tokens to predicate, combinator and aggregate operators. The
//! table is built once from the enum variants and shared; builders on each
//! operator validate operands against the field's value kind.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::Serialize;
use serde_json::Value;

use crate::schema::{parse_date, ValueKind};

use super::ast::{AggregateColumn, AggregateExpr, AggregateSource, FieldRef, PredicateNode};
use super::errors::{PlannerError, PlannerResult};

/// Leaf comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PredicateOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
    Exists,
    /// Array field contains every operand element
    All,
    /// Array field length equals operand
    Size,
}

impl PredicateOp {
    pub const ALL: [PredicateOp; 11] = [
        PredicateOp::Eq,
        PredicateOp::Ne,
        PredicateOp::Gt,
        PredicateOp::Gte,
        PredicateOp::Lt,
        PredicateOp::Lte,
        PredicateOp::In,
        PredicateOp::Nin,
        PredicateOp::Exists,
        PredicateOp::All,
        PredicateOp::Size,
    ];

    pub fn token(&self) -> &'static str {
        match self {
            PredicateOp::Eq => "$eq",
            PredicateOp::Ne => "$ne",
            PredicateOp::Gt => "$gt",
            PredicateOp::Gte => "$gte",
            PredicateOp::Lt => "$lt",
            PredicateOp::Lte => "$lte",
            PredicateOp::In => "$in",
            PredicateOp::Nin => "$nin",
            PredicateOp::Exists => "$exists",
            PredicateOp::All => "$all",
            PredicateOp::Size => "$size",
        }
    }

    /// Relational rendering used by explain output
    pub fn symbol(&self) -> &'static str {
        match self {
            PredicateOp::Eq => "=",
            PredicateOp::Ne => "!=",
            PredicateOp::Gt => ">",
            PredicateOp::Gte => ">=",
            PredicateOp::Lt => "<",
            PredicateOp::Lte => "<=",
            PredicateOp::In => "IN",
            PredicateOp::Nin => "NOT IN",
            PredicateOp::Exists => "EXISTS",
            PredicateOp::All => "CONTAINS ALL",
            PredicateOp::Size => "HAS LENGTH",
        }
    }

    /// Builds a leaf for `field`, validating the operand.
    ///
    /// Operator/kind compatibility is always checked; operand types are
    /// checked only when `strict` is set.
    pub fn build(&self, field: &FieldRef, operand: &Value, strict: bool) -> PlannerResult<PredicateNode> {
        let kind = field.kind;
        let name = field.dotted();

        match self {
            PredicateOp::Eq | PredicateOp::Ne => {
                if strict && !operand.is_null() {
                    check_equality_operand(&name, kind, operand)?;
                }
            }
            PredicateOp::Gt | PredicateOp::Gte | PredicateOp::Lt | PredicateOp::Lte => {
                if !kind.is_orderable() {
                    return Err(self.not_for_kind(&name, kind));
                }
                if strict {
                    if operand.is_null() {
                        return Err(PlannerError::invalid_operand(
                            &name,
                            format!("{} cannot compare against null", self.token()),
                        ));
                    }
                    check_scalar(&name, kind, operand)?;
                }
            }
            PredicateOp::In | PredicateOp::Nin | PredicateOp::All => {
                if *self == PredicateOp::All && kind != ValueKind::Array {
                    return Err(self.not_for_kind(&name, kind));
                }
                let items = operand.as_array().ok_or_else(|| {
                    PlannerError::invalid_operand(
                        &name,
                        format!("{} expects an array operand", self.token()),
                    )
                })?;
                if strict {
                    for item in items {
                        check_scalar(&name, kind, item)?;
                    }
                }
            }
            PredicateOp::Exists => {
                if !operand.is_boolean() {
                    return Err(PlannerError::invalid_operand(
                        &name,
                        "$exists expects a boolean operand",
                    ));
                }
            }
            PredicateOp::Size => {
                if kind != ValueKind::Array {
                    return Err(self.not_for_kind(&name, kind));
                }
                if operand.as_u64().is_none() {
                    return Err(PlannerError::invalid_operand(
                        &name,
                        "$size expects a non-negative integer",
                    ));
                }
            }
        }

        Ok(PredicateNode::compare(field.clone(), *self, operand.clone()))
    }

    fn not_for_kind(&self, field: &str, kind: ValueKind) -> PlannerError {
        PlannerError::invalid_operand(
            field,
            format!("{} is not valid for a {} field", self.token(), kind.type_name()),
        )
    }
}

fn check_equality_operand(field: &str, kind: ValueKind, operand: &Value) -> PlannerResult<()> {
    if kind == ValueKind::Array {
        if let Value::Array(items) = operand {
            for item in items {
                check_scalar(field, kind, item)?;
            }
            return Ok(());
        }
    }
    check_scalar(field, kind, operand)
}

/// Checks that a single operand value fits the field's value kind.
/// For array fields this checks one element.
fn check_scalar(field: &str, kind: ValueKind, value: &Value) -> PlannerResult<()> {
    let ok = match kind {
        ValueKind::Numeric => value.is_number(),
        ValueKind::String => value.is_string(),
        ValueKind::Boolean => value.is_boolean(),
        ValueKind::Date => value.as_str().and_then(parse_date).is_some(),
        ValueKind::Array => !value.is_array() && !value.is_object() && !value.is_null(),
    };
    if ok {
        return Ok(());
    }
    Err(PlannerError::invalid_operand(
        field,
        format!("expected a {} operand, got {}", kind.type_name(), value),
    ))
}

/// Boolean combinators over nested filter documents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    And,
    Or,
    Nor,
    Not,
}

impl Combinator {
    pub const ALL: [Combinator; 4] = [Combinator::And, Combinator::Or, Combinator::Nor, Combinator::Not];

    pub fn token(&self) -> &'static str {
        match self {
            Combinator::And => "$and",
            Combinator::Or => "$or",
            Combinator::Nor => "$nor",
            Combinator::Not => "$not",
        }
    }

    /// Combines already-built children
    pub fn combine(&self, children: Vec<PredicateNode>) -> Option<PredicateNode> {
        match self {
            Combinator::And => PredicateNode::all(children),
            Combinator::Or if children.len() == 1 => children.into_iter().next(),
            Combinator::Or => Some(PredicateNode::Or(children)),
            Combinator::Nor => Combinator::Or.combine(children).map(PredicateNode::negate),
            Combinator::Not => PredicateNode::all(children).map(PredicateNode::negate),
        }
    }
}

/// Aggregate functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateOp {
    Max,
    Min,
    Sum,
    Avg,
    Count,
}

impl AggregateOp {
    pub const ALL: [AggregateOp; 5] = [
        AggregateOp::Max,
        AggregateOp::Min,
        AggregateOp::Sum,
        AggregateOp::Avg,
        AggregateOp::Count,
    ];

    pub fn token(&self) -> &'static str {
        match self {
            AggregateOp::Max => "$max",
            AggregateOp::Min => "$min",
            AggregateOp::Sum => "$sum",
            AggregateOp::Avg => "$avg",
            AggregateOp::Count => "$count",
        }
    }

    pub fn function_name(&self) -> &'static str {
        match self {
            AggregateOp::Max => "MAX",
            AggregateOp::Min => "MIN",
            AggregateOp::Sum => "SUM",
            AggregateOp::Avg => "AVG",
            AggregateOp::Count => "COUNT",
        }
    }

    /// Builds the named output column, validating the operand.
    ///
    /// - `$max`/`$min`: any non-array field
    /// - `$avg`: numeric field
    /// - `$sum`: numeric field, number literal or filter document
    /// - `$count`: field (non-null count), literal (row count) or filter
    pub fn build(&self, name: &str, source: AggregateSource) -> PlannerResult<AggregateColumn> {
        match (self, &source) {
            (AggregateOp::Max | AggregateOp::Min, AggregateSource::Field(field)) => {
                if field.kind == ValueKind::Array {
                    return Err(self.bad_field(field));
                }
            }
            (AggregateOp::Avg | AggregateOp::Sum, AggregateSource::Field(field)) => {
                if field.kind != ValueKind::Numeric {
                    return Err(self.bad_field(field));
                }
            }
            (AggregateOp::Sum, AggregateSource::Literal(_) | AggregateSource::Filter(_)) => {}
            (AggregateOp::Count, _) => {}
            (_, AggregateSource::Literal(_) | AggregateSource::Filter(_)) => {
                return Err(PlannerError::invalid_value(format!(
                    "Output '{}': {} expects a field operand",
                    name,
                    self.token()
                )));
            }
        }

        Ok(AggregateColumn {
            name: name.to_string(),
            expr: AggregateExpr::Apply { op: *self, source },
        })
    }

    fn bad_field(&self, field: &FieldRef) -> PlannerError {
        PlannerError::invalid_operand(
            field.dotted(),
            format!(
                "{} is not valid for a {} field",
                self.token(),
                field.kind.type_name()
            ),
        )
    }
}

/// Token lookup for every operator family
pub struct OperatorTable {
    predicates: HashMap<&'static str, PredicateOp>,
    combinators: HashMap<&'static str, Combinator>,
    aggregates: HashMap<&'static str, AggregateOp>,
}

impl OperatorTable {
    fn new() -> Self {
        Self {
            predicates: PredicateOp::ALL.iter().map(|op| (op.token(), *op)).collect(),
            combinators: Combinator::ALL.iter().map(|c| (c.token(), *c)).collect(),
            aggregates: AggregateOp::ALL.iter().map(|op| (op.token(), *op)).collect(),
        }
    }

    /// Shared table, built on first use
    pub fn standard() -> &'static OperatorTable {
        static TABLE: OnceLock<OperatorTable> = OnceLock::new();
        TABLE.get_or_init(OperatorTable::new)
    }

    pub fn resolve_predicate_operator(&self, token: &str) -> PlannerResult<PredicateOp> {
        self.predicates
            .get(token)
            .copied()
            .ok_or_else(|| PlannerError::unknown_operator(token))
    }

    /// Returns `None` when the token is not a combinator
    pub fn resolve_combinator(&self, token: &str) -> Option<Combinator> {
        self.combinators.get(token).copied()
    }

    pub fn resolve_aggregate_operator(&self, token: &str) -> PlannerResult<AggregateOp> {
        self.aggregates
            .get(token)
            .copied()
            .ok_or_else(|| PlannerError::unknown_operator(token))
    }
}
