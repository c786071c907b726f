//! Document parser and validator
//!
//! One method per clause. Each method validates the clause document against
//! the schema and the plan composed so far and returns a `ClauseSpec`; it
//! never modifies the plan itself.
//!
//! Dotted paths (`articles.title`) traverse relationships. A single hop is
//! backed by an implicit join added with the clause; longer paths need the
//! full path registered by an explicit `join()`.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::config::QueryConfig;
use crate::schema::{Cardinality, RelationshipDef, SchemaAdapter, SchemaError};

use super::ast::{
    AggregateColumn, AggregateExpr, AggregateSource, ClauseSpec, FieldRef, JoinClause, JoinOptions,
    PredicateNode, SortDirection, SortKey, SortTarget,
};
use super::errors::{PlannerError, PlannerResult};
use super::operators::{Combinator, OperatorTable, PredicateOp};
use super::plan::QueryPlan;

/// How a field reference is used; sort and aggregate values must be
/// single-valued, so they cannot cross to-many relationships.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Usage {
    Filter,
    Sort,
    Aggregate,
}

impl Usage {
    fn single_valued(&self) -> bool {
        !matches!(self, Usage::Filter)
    }
}

/// Entity that field names resolve against
#[derive(Debug, Clone, Copy)]
struct Scope<'s> {
    entity: &'s str,
    /// Inside a join sub-query only the joined entity's own fields resolve
    local_only: bool,
}

/// Validates clause documents for one query
pub struct ClauseParser<'a, S: SchemaAdapter + ?Sized> {
    adapter: &'a S,
    plan: &'a QueryPlan,
    config: &'a QueryConfig,
    table: &'static OperatorTable,
}

impl<'a, S: SchemaAdapter + ?Sized> ClauseParser<'a, S> {
    pub fn new(adapter: &'a S, plan: &'a QueryPlan, config: &'a QueryConfig) -> Self {
        Self {
            adapter,
            plan,
            config,
            table: OperatorTable::standard(),
        }
    }

    fn root(&self) -> Scope<'_> {
        Scope {
            entity: &self.plan.entity,
            local_only: false,
        }
    }

    // ==================
    // Projection
    // ==================

    /// Parses a projection into the set of fields to defer.
    ///
    /// Accepts `["a", "b"]`, `["-a", "-b"]`, `"a,b"`, `"-a,b"` and
    /// `{"a": 1, "b": 1}` / `{"a": 0}`.
    pub fn parse_projection(&self, spec: &Value) -> PlannerResult<ClauseSpec> {
        let deferred = self.projection_in(self.root(), spec)?;
        Ok(ClauseSpec::Projection { deferred })
    }

    fn projection_in(&self, scope: Scope<'_>, spec: &Value) -> PlannerResult<BTreeSet<String>> {
        let (exclude, names) = projection_names(spec)?;
        let schema = self.adapter.entity(scope.entity)?;

        let mut named = BTreeSet::new();
        for name in names {
            if !schema.has_field(&name) {
                return Err(SchemaError::unknown_field(scope.entity, name).into());
            }
            named.insert(name);
        }

        let deferred = if exclude {
            named
        } else {
            schema
                .field_names()
                .filter(|f| !named.contains(*f))
                .map(str::to_string)
                .collect()
        };

        Ok(deferred
            .into_iter()
            .filter(|f| *f != schema.primary_key)
            .collect())
    }

    // ==================
    // Filter
    // ==================

    /// Parses a filter document into a predicate tree.
    ///
    /// An empty document yields no predicate.
    pub fn parse_filter(&self, spec: &Value) -> PlannerResult<ClauseSpec> {
        let doc = expect_object("filter", spec)?;
        let mut joins = Vec::new();
        let nodes = self.filter_doc(self.root(), doc, 0, &mut joins)?;
        Ok(ClauseSpec::Filter {
            predicate: PredicateNode::all(nodes),
            joins,
        })
    }

    fn filter_doc(
        &self,
        scope: Scope<'_>,
        doc: &Map<String, Value>,
        depth: usize,
        joins: &mut Vec<JoinClause>,
    ) -> PlannerResult<Vec<PredicateNode>> {
        if depth > self.config.max_filter_depth {
            return Err(PlannerError::invalid_document(format!(
                "filter nesting exceeds {} levels",
                self.config.max_filter_depth
            )));
        }

        let mut nodes = Vec::with_capacity(doc.len());
        for (key, value) in doc {
            if key.starts_with('$') {
                let combinator = self
                    .table
                    .resolve_combinator(key)
                    .ok_or_else(|| PlannerError::unknown_operator(key))?;
                if let Some(node) = self.combinator(scope, combinator, value, depth, joins)? {
                    nodes.push(node);
                }
            } else {
                let field = self.resolve_field(scope, key, Usage::Filter, joins)?;
                nodes.push(self.field_condition(&field, value, depth)?);
            }
        }
        Ok(nodes)
    }

    fn combinator(
        &self,
        scope: Scope<'_>,
        combinator: Combinator,
        value: &Value,
        depth: usize,
        joins: &mut Vec<JoinClause>,
    ) -> PlannerResult<Option<PredicateNode>> {
        let mut children = Vec::new();
        match combinator {
            Combinator::Not => {
                let doc = expect_nonempty_object(combinator.token(), value)?;
                children = self.filter_doc(scope, doc, depth + 1, joins)?;
            }
            Combinator::And | Combinator::Or | Combinator::Nor => {
                let items = value.as_array().filter(|a| !a.is_empty()).ok_or_else(|| {
                    PlannerError::invalid_document(format!(
                        "{} expects a non-empty array of filter documents",
                        combinator.token()
                    ))
                })?;
                for item in items {
                    let doc = expect_nonempty_object(combinator.token(), item)?;
                    let nodes = self.filter_doc(scope, doc, depth + 1, joins)?;
                    children.extend(PredicateNode::all(nodes));
                }
            }
        }
        Ok(combinator.combine(children))
    }

    /// Condition on one field: a literal (implicit `$eq`) or an operator
    /// document such as `{"$gte": 18, "$lt": 65}`.
    fn field_condition(&self, field: &FieldRef, value: &Value, depth: usize) -> PlannerResult<PredicateNode> {
        let ops = match value {
            Value::Object(ops) => ops,
            _ => return PredicateOp::Eq.build(field, value, self.config.strict_operands),
        };

        if ops.is_empty() || !ops.keys().all(|k| k.starts_with('$')) {
            return Err(PlannerError::invalid_document(format!(
                "condition on '{}' must be a literal or a document of operators",
                field
            )));
        }
        if depth > self.config.max_filter_depth {
            return Err(PlannerError::invalid_document(format!(
                "filter nesting exceeds {} levels",
                self.config.max_filter_depth
            )));
        }

        let mut nodes = Vec::with_capacity(ops.len());
        for (token, operand) in ops {
            if self.table.resolve_combinator(token) == Some(Combinator::Not) {
                if !operand.is_object() {
                    return Err(PlannerError::invalid_document(format!(
                        "$not on '{}' expects an operator document",
                        field
                    )));
                }
                let inner = self.field_condition(field, operand, depth + 1)?;
                nodes.push(PredicateNode::negate(inner));
                continue;
            }
            let op = self.table.resolve_predicate_operator(token)?;
            nodes.push(op.build(field, operand, self.config.strict_operands)?);
        }

        PredicateNode::all(nodes).ok_or_else(|| {
            PlannerError::invalid_document(format!("empty condition on '{}'", field))
        })
    }

    // ==================
    // Sort
    // ==================

    /// Parses sort keys. `age-` sorts descending, `age` or `age+` ascending.
    ///
    /// Accepts a list, a comma string, or `{"age": -1, "id": 1}`. Repeated
    /// fields keep their first occurrence.
    pub fn parse_sort(&self, spec: &Value) -> PlannerResult<ClauseSpec> {
        let mut joins = Vec::new();
        let keys = self.sort_in(self.root(), spec, &mut joins)?;
        Ok(ClauseSpec::Sort { keys, joins })
    }

    fn sort_in(&self, scope: Scope<'_>, spec: &Value, joins: &mut Vec<JoinClause>) -> PlannerResult<Vec<SortKey>> {
        let tokens = sort_tokens(spec)?;
        let aggregate_rows = !scope.local_only && self.plan.mode.is_aggregate();

        let mut keys: Vec<SortKey> = Vec::with_capacity(tokens.len());
        for (name, direction) in tokens {
            let target = if aggregate_rows {
                self.output_target(scope, &name, joins)?
            } else {
                SortTarget::Field(self.resolve_field(scope, &name, Usage::Sort, joins)?)
            };
            if keys.iter().any(|k| k.target.key() == target.key()) {
                continue;
            }
            keys.push(SortKey { target, direction });
        }
        Ok(keys)
    }

    /// Resolves a sort name against aggregate output columns, by output
    /// name or by passthrough source field.
    fn output_target(&self, scope: Scope<'_>, name: &str, joins: &mut Vec<JoinClause>) -> PlannerResult<SortTarget> {
        if let Some(column) = self.plan.aggregate_column(name) {
            return Ok(SortTarget::Output(column.name.clone()));
        }
        let field = self.resolve_field(scope, name, Usage::Sort, joins)?;
        self.plan
            .aggregates
            .iter()
            .find(|c| c.passthrough() == Some(&field))
            .map(|c| SortTarget::Output(c.name.clone()))
            .ok_or_else(|| {
                PlannerError::invalid_operand(name, "not an output column of aggregate()")
            })
    }

    // ==================
    // Join
    // ==================

    /// Parses relationships to load eagerly.
    ///
    /// Accepts `"articles,comments"`, `["articles", "articles.comments"]`
    /// or `{"articles": {"filter": ..., "sort": ..., "project": ..., "join": ...}}`.
    pub fn parse_join(&self, spec: &Value) -> PlannerResult<ClauseSpec> {
        let mut joins = Vec::new();
        self.join_in(&self.plan.entity, &[], spec, &mut joins)?;
        Ok(ClauseSpec::Join { joins })
    }

    fn join_in(
        &self,
        entity: &str,
        prefix: &[String],
        spec: &Value,
        joins: &mut Vec<JoinClause>,
    ) -> PlannerResult<()> {
        match spec {
            Value::String(s) => {
                for name in split_list(s)? {
                    self.join_path(entity, prefix, &name, None, joins)?;
                }
            }
            Value::Array(items) if !items.is_empty() => {
                for item in items {
                    match item {
                        Value::String(name) => self.join_path(entity, prefix, name, None, joins)?,
                        Value::Object(_) => self.join_in(entity, prefix, item, joins)?,
                        _ => {
                            return Err(PlannerError::invalid_document(
                                "join entries must be relationship names or documents",
                            ))
                        }
                    }
                }
            }
            Value::Object(map) if !map.is_empty() => {
                for (name, sub) in map {
                    let sub = match sub {
                        Value::Null | Value::Bool(true) => None,
                        Value::Number(n) if n.as_u64() == Some(1) => None,
                        Value::Object(doc) if doc.is_empty() => None,
                        Value::Object(doc) => Some(doc),
                        _ => {
                            return Err(PlannerError::invalid_document(format!(
                                "join '{}' expects a sub-query document",
                                name
                            )))
                        }
                    };
                    self.join_path(entity, prefix, name, sub, joins)?;
                }
            }
            _ => {
                return Err(PlannerError::invalid_document(
                    "join expects relationship names",
                ))
            }
        }
        Ok(())
    }

    /// Registers every prefix of a dotted relationship path as an eager
    /// join; sub-query options apply to the last hop.
    fn join_path(
        &self,
        entity: &str,
        prefix: &[String],
        dotted: &str,
        sub: Option<&Map<String, Value>>,
        joins: &mut Vec<JoinClause>,
    ) -> PlannerResult<()> {
        let names = split_path(dotted)?;
        let mut path = prefix.to_vec();
        let mut current = entity.to_string();

        for (i, name) in names.iter().enumerate() {
            let rel = self.relationship(&current, name)?;
            path.push(name.clone());
            if path.len() > self.config.max_join_depth {
                return Err(PlannerError::invalid_document(format!(
                    "join path '{}' exceeds {} relationship hops",
                    path.join("."),
                    self.config.max_join_depth
                )));
            }

            push_join(joins, join_clause(rel, path.clone(), true, JoinOptions::default()));
            if let Some(doc) = sub.filter(|_| i + 1 == names.len()) {
                let options = self.join_options(&rel.target, &path, doc, joins)?;
                push_join(joins, join_clause(rel, path.clone(), true, options));
            }
            current = rel.target.clone();
        }
        Ok(())
    }

    fn join_options(
        &self,
        target: &str,
        path: &[String],
        doc: &Map<String, Value>,
        joins: &mut Vec<JoinClause>,
    ) -> PlannerResult<JoinOptions> {
        let scope = Scope {
            entity: target,
            local_only: true,
        };
        let mut options = JoinOptions::default();
        let mut scratch = Vec::new();

        for (key, value) in doc {
            match key.as_str() {
                "project" => options.deferred = self.projection_in(scope, value)?,
                "filter" => {
                    let filter = expect_object("filter", value)?;
                    let nodes = self.filter_doc(scope, filter, 0, &mut scratch)?;
                    options.predicate = PredicateNode::all(nodes);
                }
                "sort" => options.sort = self.sort_in(scope, value, &mut scratch)?,
                "join" => self.join_in(target, path, value, joins)?,
                other => {
                    return Err(PlannerError::invalid_document(format!(
                        "unknown join option '{}' for '{}'",
                        other,
                        path.join(".")
                    )))
                }
            }
        }
        Ok(options)
    }

    // ==================
    // Aggregate / group
    // ==================

    /// Parses `{output: "field"}` passthroughs and `{output: {"$op": operand}}`
    /// aggregate columns.
    pub fn parse_aggregate(&self, spec: &Value) -> PlannerResult<ClauseSpec> {
        let doc = expect_nonempty_object("aggregate", spec)?;
        let scope = self.root();
        let mut joins = Vec::new();
        let mut columns = Vec::with_capacity(doc.len());

        for (name, value) in doc {
            if name.is_empty() || name.starts_with('$') || name.contains('.') {
                return Err(PlannerError::invalid_document(format!(
                    "invalid aggregate output name '{}'",
                    name
                )));
            }
            let column = match value {
                Value::String(path) => AggregateColumn {
                    name: name.clone(),
                    expr: AggregateExpr::Field(self.resolve_field(scope, path, Usage::Aggregate, &mut joins)?),
                },
                Value::Object(ops) if ops.len() == 1 => {
                    let (token, operand) = ops.iter().next().ok_or_else(|| {
                        PlannerError::invalid_document(format!("empty aggregate '{}'", name))
                    })?;
                    let op = self.table.resolve_aggregate_operator(token)?;
                    let source = self.aggregate_source(scope, name, operand, &mut joins)?;
                    op.build(name, source)?
                }
                _ => {
                    return Err(PlannerError::invalid_document(format!(
                        "aggregate '{}' must be a field name or a single-operator document",
                        name
                    )))
                }
            };
            columns.push(column);
        }

        Ok(ClauseSpec::Aggregate { columns, joins })
    }

    fn aggregate_source(
        &self,
        scope: Scope<'_>,
        name: &str,
        operand: &Value,
        joins: &mut Vec<JoinClause>,
    ) -> PlannerResult<AggregateSource> {
        match operand {
            Value::String(path) => Ok(AggregateSource::Field(self.resolve_field(
                scope,
                path,
                Usage::Aggregate,
                joins,
            )?)),
            Value::Number(n) => Ok(AggregateSource::Literal(n.clone())),
            Value::Object(doc) if !doc.is_empty() => {
                let nodes = self.filter_doc(scope, doc, 0, joins)?;
                PredicateNode::all(nodes)
                    .map(AggregateSource::Filter)
                    .ok_or_else(|| PlannerError::invalid_document(format!("empty filter in aggregate '{}'", name)))
            }
            Value::Object(_) => Err(PlannerError::invalid_document(format!(
                "empty filter in aggregate '{}'",
                name
            ))),
            _ => Err(PlannerError::invalid_value(format!(
                "Output '{}': operand must be a field name, a number or a filter document",
                name
            ))),
        }
    }

    /// Parses group fields. Each must name a passthrough column of the
    /// aggregate, by output name or source field.
    pub fn parse_group(&self, spec: &Value) -> PlannerResult<ClauseSpec> {
        if !self.plan.mode.is_aggregate() {
            return Err(PlannerError::mode_conflict("group() requires aggregate()"));
        }

        let names = match spec {
            Value::String(s) => split_list(s)?,
            Value::Array(items) if !items.is_empty() => string_items("group", items)?,
            _ => {
                return Err(PlannerError::invalid_document(
                    "group expects a list of field names",
                ))
            }
        };

        let mut fields: Vec<FieldRef> = Vec::with_capacity(names.len());
        for name in names {
            let field = self
                .plan
                .aggregates
                .iter()
                .filter_map(|c| c.passthrough().map(|p| (c, p)))
                .find(|(c, p)| c.name == name || p.dotted() == name)
                .map(|(_, p)| p.clone())
                .ok_or_else(|| {
                    PlannerError::invalid_operand(&name, "group field must be a passthrough column of aggregate()")
                })?;
            if !fields.contains(&field) {
                fields.push(field);
            }
        }

        Ok(ClauseSpec::Group { fields })
    }

    // ==================
    // Window
    // ==================

    pub fn parse_limit(&self, spec: &Value) -> PlannerResult<ClauseSpec> {
        let n = window_value("limit", spec)?;
        if let Some(max) = self.config.max_limit {
            if n > max {
                return Err(PlannerError::invalid_value(format!(
                    "limit {} exceeds the maximum of {}",
                    n, max
                )));
            }
        }
        Ok(ClauseSpec::Limit(n))
    }

    pub fn parse_skip(&self, spec: &Value) -> PlannerResult<ClauseSpec> {
        Ok(ClauseSpec::Skip(window_value("skip", spec)?))
    }

    // ==================
    // Path resolution
    // ==================

    fn relationship(&self, entity: &str, name: &str) -> PlannerResult<&'a RelationshipDef> {
        self.adapter
            .entity(entity)?
            .relationship(name)
            .ok_or_else(|| SchemaError::unknown_relationship(entity, name).into())
    }

    /// Resolves `field` or `rel.field` / `rel.sub.field` in `scope`.
    fn resolve_field(
        &self,
        scope: Scope<'_>,
        dotted: &str,
        usage: Usage,
        joins: &mut Vec<JoinClause>,
    ) -> PlannerResult<FieldRef> {
        let mut segments = split_path(dotted)?;
        let field = segments.pop().unwrap_or_default();
        let hops = segments;

        if !hops.is_empty() && scope.local_only {
            return Err(PlannerError::unresolved_path(
                dotted,
                "relationship paths are not allowed inside a join sub-query",
            ));
        }

        let mut entity = scope.entity.to_string();
        let mut first_hop = None;
        for hop in &hops {
            let rel = self.relationship(&entity, hop)?;
            if usage.single_valued() && rel.cardinality == Cardinality::Many {
                return Err(PlannerError::invalid_operand(
                    dotted,
                    format!("cannot sort or aggregate across to-many relationship '{}'", hop),
                ));
            }
            if first_hop.is_none() {
                first_hop = Some(rel);
            }
            entity = rel.target.clone();
        }

        let kind = self
            .adapter
            .entity(&entity)?
            .field(&field)
            .map(|f| f.kind)
            .ok_or_else(|| SchemaError::unknown_field(&entity, &field))?;

        if hops.len() > self.config.max_join_depth {
            return Err(PlannerError::invalid_document(format!(
                "path '{}' exceeds {} relationship hops",
                dotted, self.config.max_join_depth
            )));
        }

        match (hops.len(), first_hop) {
            (1, Some(rel)) => {
                if !self.plan.has_join(&hops) {
                    push_join(joins, join_clause(rel, hops.clone(), false, JoinOptions::default()));
                }
            }
            (n, _) if n >= 2 && !self.plan.has_join(&hops) => {
                return Err(PlannerError::unresolved_path(
                    dotted,
                    format!("requires join('{}')", hops.join(".")),
                ));
            }
            _ => {}
        }

        Ok(FieldRef {
            path: hops,
            field,
            kind,
        })
    }
}

fn join_clause(rel: &RelationshipDef, path: Vec<String>, eager: bool, options: JoinOptions) -> JoinClause {
    JoinClause {
        path,
        target: rel.target.clone(),
        cardinality: rel.cardinality,
        local_field: rel.local_field.clone(),
        remote_field: rel.remote_field.clone(),
        eager,
        options,
    }
}

/// Adds `join` to a clause's join list, merging repeated paths.
fn push_join(joins: &mut Vec<JoinClause>, join: JoinClause) {
    match joins.iter_mut().find(|j| j.path == join.path) {
        Some(existing) => {
            existing.eager |= join.eager;
            if !join.options.is_empty() {
                existing.options = join.options;
            }
        }
        None => joins.push(join),
    }
}

fn expect_object<'v>(what: &str, value: &'v Value) -> PlannerResult<&'v Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| PlannerError::invalid_document(format!("{} expects a document", what)))
}

fn expect_nonempty_object<'v>(what: &str, value: &'v Value) -> PlannerResult<&'v Map<String, Value>> {
    let map = expect_object(what, value)?;
    if map.is_empty() {
        return Err(PlannerError::invalid_document(format!(
            "{} expects a non-empty document",
            what
        )));
    }
    Ok(map)
}

fn split_path(dotted: &str) -> PlannerResult<Vec<String>> {
    let segments: Vec<String> = dotted.split('.').map(str::to_string).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(PlannerError::invalid_document(format!(
            "malformed path '{}'",
            dotted
        )));
    }
    Ok(segments)
}

/// Splits `"a, b,c"` into trimmed names
fn split_list(s: &str) -> PlannerResult<Vec<String>> {
    let names: Vec<String> = s.split(',').map(|n| n.trim().to_string()).collect();
    if names.iter().any(|n| n.is_empty()) {
        return Err(PlannerError::invalid_document(format!(
            "malformed name list '{}'",
            s
        )));
    }
    Ok(names)
}

fn string_items(what: &str, items: &[Value]) -> PlannerResult<Vec<String>> {
    items
        .iter()
        .map(|item| {
            item.as_str().map(str::to_string).ok_or_else(|| {
                PlannerError::invalid_document(format!("{} entries must be strings", what))
            })
        })
        .collect()
}

/// Returns `(exclude, names)` for any accepted projection form.
fn projection_names(spec: &Value) -> PlannerResult<(bool, Vec<String>)> {
    match spec {
        Value::String(s) => {
            let trimmed = s.trim();
            match trimmed.strip_prefix('-') {
                Some(rest) => Ok((true, split_list(rest)?)),
                None => Ok((false, split_list(trimmed)?)),
            }
        }
        Value::Array(items) if !items.is_empty() => {
            let mut mode = None;
            let mut names = Vec::with_capacity(items.len());
            for name in string_items("project", items)? {
                let (exclude, name) = match name.strip_prefix('-') {
                    Some(rest) => (true, rest.to_string()),
                    None => (false, name),
                };
                mark_mode(&mut mode, exclude)?;
                names.push(name);
            }
            Ok((mode.unwrap_or(false), names))
        }
        Value::Object(map) if !map.is_empty() => {
            let mut mode = None;
            let mut names = Vec::with_capacity(map.len());
            for (name, flag) in map {
                let include = match flag {
                    Value::Bool(b) => *b,
                    Value::Number(n) if n.as_i64() == Some(1) => true,
                    Value::Number(n) if n.as_i64() == Some(0) => false,
                    _ => {
                        return Err(PlannerError::invalid_document(format!(
                            "projection flag for '{}' must be 1 or 0",
                            name
                        )))
                    }
                };
                mark_mode(&mut mode, !include)?;
                names.push(name.clone());
            }
            Ok((mode.unwrap_or(false), names))
        }
        _ => Err(PlannerError::invalid_document(
            "project expects a non-empty list, string or document of field names",
        )),
    }
}

fn mark_mode(mode: &mut Option<bool>, exclude: bool) -> PlannerResult<()> {
    if let Some(current) = *mode {
        if current != exclude {
            return Err(PlannerError::projection_conflict(
                "cannot mix included and excluded fields in one projection",
            ));
        }
    }
    *mode = Some(exclude);
    Ok(())
}

/// Returns `(name, direction)` pairs for any accepted sort form.
fn sort_tokens(spec: &Value) -> PlannerResult<Vec<(String, SortDirection)>> {
    let tokens = match spec {
        Value::String(s) => split_list(s)?,
        Value::Array(items) if !items.is_empty() => string_items("sort", items)?,
        Value::Object(map) if !map.is_empty() => {
            return map
                .iter()
                .map(|(name, dir)| match dir.as_i64() {
                    Some(1) => Ok((name.clone(), SortDirection::Asc)),
                    Some(-1) => Ok((name.clone(), SortDirection::Desc)),
                    _ => Err(PlannerError::invalid_document(format!(
                        "sort direction for '{}' must be 1 or -1",
                        name
                    ))),
                })
                .collect();
        }
        _ => {
            return Err(PlannerError::invalid_document(
                "sort expects a non-empty list, string or document of field names",
            ))
        }
    };

    tokens
        .into_iter()
        .map(|token| {
            let (name, direction) = if let Some(name) = token.strip_suffix('-') {
                (name, SortDirection::Desc)
            } else if let Some(name) = token.strip_suffix('+') {
                (name, SortDirection::Asc)
            } else {
                (token.as_str(), SortDirection::Asc)
            };
            if name.is_empty() {
                return Err(PlannerError::invalid_document("empty sort field"));
            }
            Ok((name.to_string(), direction))
        })
        .collect()
}

fn window_value(what: &str, spec: &Value) -> PlannerResult<u64> {
    spec.as_u64().ok_or_else(|| {
        PlannerError::invalid_value(format!("{} expects a non-negative integer, got {}", what, spec))
    })
}
