//! Validated clause structures
//!
//! Everything here has already been resolved against the entity schema:
//! field references carry their value kind and relationship path, and
//! operators are enum variants rather than tokens.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use serde_json::{Number, Value};

use crate::schema::{Cardinality, ValueKind};

use super::operators::{AggregateOp, PredicateOp};

/// A field resolved against the schema, optionally through relationships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldRef {
    /// Relationship hops from the root entity
    pub path: Vec<String>,
    /// Field name on the entity at the end of `path`
    pub field: String,
    pub kind: ValueKind,
}

impl FieldRef {
    /// A field on the root entity
    pub fn local(field: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            path: Vec::new(),
            field: field.into(),
            kind,
        }
    }

    /// Dotted form, e.g. `articles.title`
    pub fn dotted(&self) -> String {
        if self.path.is_empty() {
            return self.field.clone();
        }
        format!("{}.{}", self.path.join("."), self.field)
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dotted())
    }
}

/// Leaf predicate: `field <op> value`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub field: FieldRef,
    pub op: PredicateOp,
    pub value: Value,
}

/// Boolean predicate tree
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateNode {
    Compare(Comparison),
    And(Vec<PredicateNode>),
    Or(Vec<PredicateNode>),
    Not(Box<PredicateNode>),
}

impl PredicateNode {
    pub fn compare(field: FieldRef, op: PredicateOp, value: Value) -> Self {
        PredicateNode::Compare(Comparison { field, op, value })
    }

    pub fn negate(node: PredicateNode) -> Self {
        PredicateNode::Not(Box::new(node))
    }

    /// Conjunction of `nodes`, flattening nested ANDs.
    ///
    /// Returns `None` for an empty list and the node itself for one element.
    pub fn all(nodes: Vec<PredicateNode>) -> Option<Self> {
        let mut flat = Vec::with_capacity(nodes.len());
        for node in nodes {
            match node {
                PredicateNode::And(children) => flat.extend(children),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => None,
            1 => flat.pop(),
            _ => Some(PredicateNode::And(flat)),
        }
    }

}

impl fmt::Display for PredicateNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredicateNode::Compare(c) => match (&c.op, &c.value) {
                (PredicateOp::Eq, Value::Null) => write!(f, "{} IS NULL", c.field),
                (PredicateOp::Ne, Value::Null) => write!(f, "{} IS NOT NULL", c.field),
                (PredicateOp::Exists, Value::Bool(true)) => write!(f, "{} IS NOT NULL", c.field),
                (PredicateOp::Exists, _) => write!(f, "{} IS NULL", c.field),
                (op, value) => write!(f, "{} {} {}", c.field, op.symbol(), value),
            },
            PredicateNode::And(children) => write_joined(f, children, " AND "),
            PredicateNode::Or(children) => write_joined(f, children, " OR "),
            PredicateNode::Not(child) => write!(f, "NOT ({})", child),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, nodes: &[PredicateNode], sep: &str) -> fmt::Result {
    write!(f, "(")?;
    for (i, node) in nodes.iter().enumerate() {
        if i > 0 {
            write!(f, "{}", sep)?;
        }
        write!(f, "{}", node)?;
    }
    write!(f, ")")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// What a sort key orders by
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortTarget {
    /// An entity field
    Field(FieldRef),
    /// An aggregate output column
    Output(String),
}

impl SortTarget {
    /// Name used to detect duplicate sort keys
    pub fn key(&self) -> String {
        match self {
            SortTarget::Field(field) => field.dotted(),
            SortTarget::Output(name) => name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortKey {
    pub target: SortTarget,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(field: FieldRef) -> Self {
        Self {
            target: SortTarget::Field(field),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: FieldRef) -> Self {
        Self {
            target: SortTarget::Field(field),
            direction: SortDirection::Desc,
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.target.key(), self.direction.as_str())
    }
}

/// Operand of an aggregate function
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateSource {
    /// Per-row field value
    Field(FieldRef),
    /// Rows matching the filter (counted)
    Filter(PredicateNode),
    /// Constant per row (`$sum: 10` weights the row count)
    Literal(Number),
}

impl fmt::Display for AggregateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateSource::Field(field) => write!(f, "{}", field),
            AggregateSource::Filter(node) => write!(f, "CASE WHEN {} THEN 1 ELSE 0 END", node),
            AggregateSource::Literal(n) => write!(f, "{}", n),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateExpr {
    /// Group key passthrough
    Field(FieldRef),
    /// Aggregate function application
    Apply { op: AggregateOp, source: AggregateSource },
}

/// One named output column of an aggregate query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateColumn {
    pub name: String,
    pub expr: AggregateExpr,
}

impl AggregateColumn {
    /// Source field when this column is a passthrough
    pub fn passthrough(&self) -> Option<&FieldRef> {
        match &self.expr {
            AggregateExpr::Field(field) => Some(field),
            AggregateExpr::Apply { .. } => None,
        }
    }
}

impl fmt::Display for AggregateColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.expr {
            AggregateExpr::Field(field) => write!(f, "{} AS {}", field, self.name),
            AggregateExpr::Apply { op, source } => {
                write!(f, "{}({}) AS {}", op.function_name(), source, self.name)
            }
        }
    }
}

/// Options restricting the rows loaded through an eager join
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JoinOptions {
    /// Target fields not loaded immediately
    pub deferred: BTreeSet<String>,
    pub predicate: Option<PredicateNode>,
    pub sort: Vec<SortKey>,
}

impl JoinOptions {
    pub fn is_empty(&self) -> bool {
        self.deferred.is_empty() && self.predicate.is_none() && self.sort.is_empty()
    }
}

/// One relationship path in the plan's join graph
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinClause {
    /// Relationship names from the root entity
    pub path: Vec<String>,
    /// Target entity
    pub target: String,
    pub cardinality: Cardinality,
    /// Join key on the parent entity
    pub local_field: String,
    /// Join key on the target entity
    pub remote_field: String,
    /// Related rows are loaded with the parent (explicit `join()`); implicit
    /// joins only back dotted filter/sort/aggregate references
    pub eager: bool,
    pub options: JoinOptions,
}

impl JoinClause {
    pub fn dotted(&self) -> String {
        self.path.join(".")
    }
}

impl fmt::Display for JoinClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} ON {} = {}.{} [{}{}]",
            self.dotted(),
            self.target,
            self.local_field,
            self.target,
            self.remote_field,
            self.cardinality.as_str(),
            if self.eager { ", eager" } else { "" }
        )
    }
}

/// One validated clause, ready to be folded into a plan
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "clause", rename_all = "snake_case")]
pub enum ClauseSpec {
    Projection {
        deferred: BTreeSet<String>,
    },
    Filter {
        predicate: Option<PredicateNode>,
        joins: Vec<JoinClause>,
    },
    Sort {
        keys: Vec<SortKey>,
        joins: Vec<JoinClause>,
    },
    Join {
        joins: Vec<JoinClause>,
    },
    Aggregate {
        columns: Vec<AggregateColumn>,
        joins: Vec<JoinClause>,
    },
    Group {
        fields: Vec<FieldRef>,
    },
    Limit(u64),
    Skip(u64),
    Count,
}

impl ClauseSpec {
    pub fn name(&self) -> &'static str {
        match self {
            ClauseSpec::Projection { .. } => "project",
            ClauseSpec::Filter { .. } => "filter",
            ClauseSpec::Sort { .. } => "sort",
            ClauseSpec::Join { .. } => "join",
            ClauseSpec::Aggregate { .. } => "aggregate",
            ClauseSpec::Group { .. } => "group",
            ClauseSpec::Limit(_) => "limit",
            ClauseSpec::Skip(_) => "skip",
            ClauseSpec::Count => "count",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn age() -> FieldRef {
        FieldRef::local("age", ValueKind::Numeric)
    }

    #[test]
    fn test_dotted_path() {
        let field = FieldRef {
            path: vec!["articles".into()],
            field: "title".into(),
            kind: ValueKind::String,
        };
        assert_eq!(field.dotted(), "articles.title");
    }

    #[test]
    fn test_all_flattens_and_unwraps() {
        assert_eq!(PredicateNode::all(vec![]), None);

        let leaf = PredicateNode::compare(age(), PredicateOp::Gte, json!(18));
        assert_eq!(PredicateNode::all(vec![leaf.clone()]), Some(leaf.clone()));

        let nested = PredicateNode::And(vec![leaf.clone(), leaf.clone()]);
        match PredicateNode::all(vec![nested, leaf]) {
            Some(PredicateNode::And(children)) => assert_eq!(children.len(), 3),
            other => panic!("expected flat AND, got {:?}", other),
        }
    }

    #[test]
    fn test_predicate_display() {
        let node = PredicateNode::Or(vec![
            PredicateNode::compare(age(), PredicateOp::Gte, json!(18)),
            PredicateNode::negate(PredicateNode::compare(
                FieldRef::local("name", ValueKind::String),
                PredicateOp::Eq,
                Value::Null,
            )),
        ]);
        assert_eq!(node.to_string(), "(age >= 18 OR NOT (name IS NULL))");
    }

    #[test]
    fn test_aggregate_display() {
        let column = AggregateColumn {
            name: "adults".into(),
            expr: AggregateExpr::Apply {
                op: AggregateOp::Sum,
                source: AggregateSource::Filter(PredicateNode::compare(
                    age(),
                    PredicateOp::Gte,
                    json!(18),
                )),
            },
        };
        assert_eq!(
            column.to_string(),
            "SUM(CASE WHEN age >= 18 THEN 1 ELSE 0 END) AS adults"
        );
        assert!(column.passthrough().is_none());
    }
}
