//! Explain output
//!
//! Deterministic description of an accepted plan or a rejected query.

use std::fmt;

use serde::Serialize;

use crate::schema::EntitySchema;

use super::errors::PlannerError;
use super::plan::QueryPlan;

/// Explain output for one query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExplainPlan {
    /// Whether compilation succeeded
    pub accepted: bool,
    pub entity: Option<String>,
    /// Terminal mode (`rows`, `count`, `aggregate`, `grouped_aggregate`)
    pub mode: Option<String>,
    /// Output columns
    pub columns: Vec<String>,
    /// Root fields loaded lazily
    pub deferred: Vec<String>,
    pub joins: Vec<String>,
    pub predicate: Option<String>,
    pub sort: Vec<String>,
    pub aggregates: Vec<String>,
    pub group_by: Vec<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// Clause that rejected the query
    pub rejection_clause: Option<String>,
    pub rejection_code: Option<String>,
    pub rejection_reason: Option<String>,
}

impl ExplainPlan {
    /// Creates an explain plan from a finalized query plan
    pub fn from_plan(plan: &QueryPlan, schema: &EntitySchema) -> Self {
        Self {
            accepted: true,
            entity: Some(plan.entity.clone()),
            mode: Some(plan.mode.as_str().to_string()),
            columns: plan.selected_columns(schema),
            deferred: plan.deferred.iter().cloned().collect(),
            joins: plan.joins.iter().map(|j| j.to_string()).collect(),
            predicate: plan.predicate.as_ref().map(|p| p.to_string()),
            sort: plan.sort.iter().map(|k| k.to_string()).collect(),
            aggregates: plan.aggregates.iter().map(|c| c.to_string()).collect(),
            group_by: plan.group_by.iter().map(|f| f.dotted()).collect(),
            limit: plan.limit,
            offset: plan.offset,
            rejection_clause: None,
            rejection_code: None,
            rejection_reason: None,
        }
    }

    /// Creates an explain plan from a compilation error
    pub fn from_error(err: &PlannerError) -> Self {
        Self {
            accepted: false,
            entity: None,
            mode: None,
            columns: Vec::new(),
            deferred: Vec::new(),
            joins: Vec::new(),
            predicate: None,
            sort: Vec::new(),
            aggregates: Vec::new(),
            group_by: Vec::new(),
            limit: None,
            offset: None,
            rejection_clause: err.clause().map(str::to_string),
            rejection_code: Some(err.code().code().to_string()),
            rejection_reason: Some(err.message().to_string()),
        }
    }
}

impl fmt::Display for ExplainPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== EXPLAIN PLAN ===")?;

        if !self.accepted {
            writeln!(f, "Status: REJECTED")?;
            if let Some(clause) = &self.rejection_clause {
                writeln!(f, "Clause: {}", clause)?;
            }
            if let Some(code) = &self.rejection_code {
                writeln!(f, "Error Code: {}", code)?;
            }
            if let Some(reason) = &self.rejection_reason {
                writeln!(f, "Reason: {}", reason)?;
            }
            return Ok(());
        }

        writeln!(f, "Status: ACCEPTED")?;
        if let Some(entity) = &self.entity {
            writeln!(f, "Entity: {}", entity)?;
        }
        if let Some(mode) = &self.mode {
            writeln!(f, "Mode: {}", mode)?;
        }
        writeln!(f, "Columns: {}", self.columns.join(", "))?;
        if !self.deferred.is_empty() {
            writeln!(f, "Deferred: {}", self.deferred.join(", "))?;
        }
        if !self.joins.is_empty() {
            writeln!(f, "Joins:")?;
            for join in &self.joins {
                writeln!(f, "  - {}", join)?;
            }
        }
        if let Some(predicate) = &self.predicate {
            writeln!(f, "Where: {}", predicate)?;
        }
        if !self.aggregates.is_empty() {
            writeln!(f, "Aggregates:")?;
            for column in &self.aggregates {
                writeln!(f, "  - {}", column)?;
            }
        }
        if !self.group_by.is_empty() {
            writeln!(f, "Group By: {}", self.group_by.join(", "))?;
        }
        if !self.sort.is_empty() {
            writeln!(f, "Order By: {}", self.sort.join(", "))?;
        }
        if let Some(offset) = self.offset {
            writeln!(f, "Offset: {}", offset)?;
        }
        if let Some(limit) = self.limit {
            writeln!(f, "Limit: {}", limit)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::Query;
    use crate::schema::{SchemaAdapter, SchemaRegistry, ValueKind};
    use serde_json::json;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::from_entities(vec![EntitySchema::new("User", "id")
            .with_field("id", ValueKind::Numeric)
            .with_field("name", ValueKind::String)
            .with_field("age", ValueKind::Numeric)])
        .unwrap()
    }

    #[test]
    fn test_explain_accepted() {
        let registry = registry();
        let plan = Query::from_document(
            &registry,
            "User",
            &json!({"filter": {"age": {"$gte": 18}}, "sort": "age-", "project": "-name", "limit": 3}),
        )
        .unwrap();
        let explain = ExplainPlan::from_plan(&plan, registry.entity("User").unwrap());

        assert!(explain.accepted);
        assert_eq!(explain.columns, vec!["id", "age"]);
        assert_eq!(explain.deferred, vec!["name"]);
        assert_eq!(explain.predicate.as_deref(), Some("age >= 18"));
        assert_eq!(explain.sort, vec!["age desc"]);

        let text = explain.to_string();
        assert!(text.contains("Status: ACCEPTED"));
        assert!(text.contains("Where: age >= 18"));
        assert!(text.contains("Limit: 3"));
    }

    #[test]
    fn test_explain_rejected() {
        let registry = registry();
        let err = Query::from_document(&registry, "User", &json!({"filter": {"age": {"$near": 1}}}))
            .unwrap_err();
        let explain = ExplainPlan::from_error(&err);

        assert!(!explain.accepted);
        assert_eq!(explain.rejection_code.as_deref(), Some("MQ_UNKNOWN_OPERATOR"));
        assert_eq!(explain.rejection_clause.as_deref(), Some("filter"));
        assert!(explain.to_string().contains("Status: REJECTED"));
    }

    #[test]
    fn test_explain_is_deterministic() {
        let registry = registry();
        let doc = json!({"aggregate": {"age": "age", "n": {"$count": "id"}}, "group": ["age"]});
        let a = Query::from_document(&registry, "User", &doc).unwrap();
        let b = Query::from_document(&registry, "User", &doc).unwrap();
        let schema = registry.entity("User").unwrap();

        let a = serde_json::to_string(&ExplainPlan::from_plan(&a, schema)).unwrap();
        let b = serde_json::to_string(&ExplainPlan::from_plan(&b, schema)).unwrap();
        assert_eq!(a, b);
    }
}
