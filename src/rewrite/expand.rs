//! Expansion of context calls into correlated scalar subqueries.
//!
//! After [`super::scan`] has reduced the extended statement to plain SQL
//! with placeholder identifiers, this pass parses the statement, works out
//! the grouping context of the outer query, builds one scalar subquery per
//! context call, and splices it back in place of the placeholder.
//!
//! A call's subquery reads the measure's model from its base relation. The
//! folded modifiers decide which grouping dimensions stay correlated to
//! the outer row, which are pinned to fixed values, and whether the outer
//! WHERE clause is copied in. Correlation predicates use null-safe
//! equality so NULL group keys still match their own rows.

use std::cell::Cell;
use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use sqlparser::ast::{
    Expr as SqlExpr, FunctionArg, FunctionArgExpr, FunctionArguments, GroupByExpr, SelectItem,
    SetExpr, Statement, TableFactor, Value,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

use super::scan::{scan, ContextCall, ContextModifier, SetValue};
use crate::error::{SemanticError, SemanticResult};
use crate::graph::EntityGraph;
use crate::model::{AggregateFunction, Metric, MetricKind, Model};
use crate::sql::{Dialect, SqlDialect};

/// Rewrites extended `SEMANTIC` SQL into plain SQL.
pub struct ContextRewriter<'g> {
    graph: &'g EntityGraph,
    dialect: Dialect,
}

/// One relation in the outer FROM clause.
#[derive(Debug, Clone)]
struct Relation {
    table: String,
    qualifier: String,
}

/// One outer grouping dimension.
#[derive(Debug, Clone)]
struct GroupDim {
    /// Column name, or the projection alias for expression dimensions.
    name: String,
    /// The grouping expression as written.
    expr_sql: String,
    is_expr: bool,
}

static CURRENT_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bCURRENT\s+([A-Za-z_]\w*)").unwrap());
static OVER_CLAUSE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)\s+OVER\s*\([^()]*(?:\([^()]*\)[^()]*)*\)").unwrap()
});

const AGGREGATE_NAMES: [&str; 5] = ["SUM", "COUNT", "AVG", "MIN", "MAX"];

impl<'g> ContextRewriter<'g> {
    pub fn new(graph: &'g EntityGraph) -> Self {
        Self {
            graph,
            dialect: Dialect::default(),
        }
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Rewrite one statement. Plain SQL without the `SEMANTIC` marker is
    /// returned untouched; a marked statement without context calls just
    /// loses the marker.
    pub fn rewrite(&self, input: &str) -> SemanticResult<String> {
        let scanned = scan(input)?;
        if scanned.calls.is_empty() {
            if scanned.is_semantic {
                return Ok(scanned.sql.trim().to_string());
            }
            return Ok(input.to_string());
        }

        let mut statements = Parser::parse_sql(&GenericDialect {}, &scanned.sql)
            .map_err(|e| SemanticError::InvalidSyntaxContext(e.to_string()))?;
        if statements.len() != 1 {
            return Err(SemanticError::InvalidSyntaxContext(
                "expected a single statement".into(),
            ));
        }
        let mut statement = statements.remove(0);
        let Statement::Query(query) = &mut statement else {
            return Err(SemanticError::InvalidSyntaxContext(
                "contexts are only valid in SELECT statements".into(),
            ));
        };
        let SetExpr::Select(select) = query.body.as_mut() else {
            return Err(SemanticError::InvalidSyntaxContext(
                "contexts are only valid in plain SELECT statements".into(),
            ));
        };

        // === Analysis over the outer statement ===

        let mut relations: Vec<Relation> = vec![];
        for twj in &select.from {
            collect_relation(&twj.relation, &mut relations);
            for join in &twj.joins {
                collect_relation(&join.relation, &mut relations);
            }
        }
        let multi_relation = relations.len() > 1;
        let outer_where = select.selection.as_ref().map(|e| e.to_string());

        let placeholders: HashSet<&str> = scanned
            .calls
            .iter()
            .map(|c| c.placeholder.as_str())
            .collect();

        let projection: Vec<(SqlExpr, Option<String>)> = select
            .projection
            .iter()
            .filter_map(|item| match item {
                SelectItem::UnnamedExpr(e) => Some((e.clone(), None)),
                SelectItem::ExprWithAlias { expr, alias } => {
                    Some((expr.clone(), Some(alias.value.clone())))
                }
                _ => None,
            })
            .collect();

        let explicit_group: Vec<SqlExpr> = match &select.group_by {
            GroupByExpr::Expressions(exprs, _) => exprs.clone(),
            _ => vec![],
        };

        let group_dims: Vec<GroupDim>;
        if !explicit_group.is_empty() {
            group_dims = explicit_group
                .iter()
                .map(|e| resolve_group_expr(e, &projection))
                .collect();
        } else {
            // Implied grouping: every non-aggregate projection groups.
            let implied: Vec<(SqlExpr, Option<String>)> = projection
                .iter()
                .filter(|(e, _)| !contains_aggregate(e, &placeholders))
                .cloned()
                .collect();
            let has_aggregate = projection
                .iter()
                .any(|(e, _)| contains_aggregate(e, &placeholders));
            group_dims = implied
                .iter()
                .map(|(e, alias)| group_dim_for(e, alias.clone()))
                .collect();
            if has_aggregate && !implied.is_empty() {
                select.group_by = GroupByExpr::Expressions(
                    implied.into_iter().map(|(e, _)| e).collect(),
                    vec![],
                );
            }
        }

        // === Build one replacement per call ===

        let mut replacements: HashMap<String, SqlExpr> = HashMap::new();
        for call in &scanned.calls {
            let text = self.expand_call(
                call,
                &relations,
                multi_relation,
                &group_dims,
                outer_where.as_deref(),
            )?;
            let expr = Parser::new(&GenericDialect {})
                .try_with_sql(&text)
                .map_err(|e| SemanticError::InvalidSyntaxContext(e.to_string()))?
                .parse_expr()
                .map_err(|e| SemanticError::InvalidSyntaxContext(e.to_string()))?;
            replacements.insert(call.placeholder.clone(), expr);
        }

        for item in &mut select.projection {
            match item {
                SelectItem::UnnamedExpr(e) | SelectItem::ExprWithAlias { expr: e, .. } => {
                    replace_placeholders(e, &replacements)
                }
                _ => {}
            }
        }
        if let Some(selection) = &mut select.selection {
            replace_placeholders(selection, &replacements);
        }
        if let Some(having) = &mut select.having {
            replace_placeholders(having, &replacements);
        }
        if let GroupByExpr::Expressions(exprs, _) = &mut select.group_by {
            for e in exprs {
                replace_placeholders(e, &replacements);
            }
        }
        if let Some(order_by) = &mut query.order_by {
            for item in &mut order_by.exprs {
                replace_placeholders(&mut item.expr, &replacements);
            }
        }

        Ok(statement.to_string())
    }

    /// Build the scalar-subquery text for one context call.
    fn expand_call(
        &self,
        call: &ContextCall,
        relations: &[Relation],
        multi_relation: bool,
        group_dims: &[GroupDim],
        outer_where: Option<&str>,
    ) -> SemanticResult<String> {
        let reference = match &call.qualifier {
            Some(q) if !call.arg.contains('.') => format!("{}.{}", q, call.arg),
            _ => call.arg.clone(),
        };
        let (model_name, metric) = self.graph.resolve_metric(&reference)?;
        let model_name = model_name.ok_or_else(|| {
            SemanticError::UnsupportedAggregateRecomputation(format!(
                "{} has no base relation to recompute against",
                metric.name
            ))
        })?;
        let model = self.graph.model(model_name)?;

        let outer_qual = relations
            .iter()
            .find(|r| {
                model.table.as_deref() == Some(r.table.as_str()) || r.table == model.name
            })
            .map(|r| r.qualifier.clone())
            .or_else(|| relations.first().map(|r| r.qualifier.clone()))
            .unwrap_or_else(|| model.name.clone());

        let (source, inner_alias) = match (&model.table, &model.sql) {
            (Some(table), _) => {
                let alias = format!("{}_ctx", model.name);
                (format!("{} AS {}", table, alias), alias)
            }
            (None, Some(sql)) => {
                let trimmed = sql.trim();
                let alias = "_inner".to_string();
                if trimmed.get(..6).map(|p| p.eq_ignore_ascii_case("select")).unwrap_or(false) {
                    (format!("({}) AS {}", trimmed, alias), alias)
                } else {
                    (format!("(SELECT * FROM {}) AS {}", trimmed, alias), alias)
                }
            }
            (None, None) => {
                return Err(SemanticError::InvalidModel(format!(
                    "model {} has no relation",
                    model.name
                )))
            }
        };

        // === Fold modifiers ===

        let mut freed: HashSet<String> = HashSet::new();
        let mut grand_total = false;
        let mut pins: Vec<(String, String)> = vec![];
        let mut predicates: Vec<String> = vec![];
        // A wrapped AGGREGATE respects the visible rows by default; a bare
        // measure reference reads the unfiltered base relation.
        let mut visible = call.wrapped;
        let null_result = Cell::new(false);

        for clause in &call.modifiers {
            for modifier in clause {
                match modifier {
                    ContextModifier::All(dims) if dims.is_empty() => {
                        grand_total = true;
                        pins.clear();
                        freed.clear();
                    }
                    ContextModifier::All(dims) => {
                        for dim in dims {
                            freed.insert(dim.clone());
                            pins.retain(|(p, _)| p != dim);
                        }
                    }
                    ContextModifier::Set { dim, value } => {
                        pins.retain(|(p, _)| p != dim);
                        freed.remove(dim);
                        let predicate = match value {
                            SetValue::Expr(text) => {
                                let resolved = self.resolve_value_expr(
                                    text,
                                    model,
                                    group_dims,
                                    &outer_qual,
                                    outer_where,
                                    &null_result,
                                )?;
                                format!("{}.{} = ({})", inner_alias, dim, resolved)
                            }
                            SetValue::In(values) => {
                                format!("{}.{} IN ({})", inner_alias, dim, values.join(", "))
                            }
                        };
                        pins.push((dim.clone(), predicate));
                    }
                    ContextModifier::Where(cond) => {
                        // Bare columns in a WHERE modifier address the inner
                        // rows; only CURRENT pulls in the outer context.
                        predicates.push(self.resolve_current(
                            cond,
                            model,
                            group_dims,
                            &outer_qual,
                            outer_where,
                            &null_result,
                        )?);
                    }
                    ContextModifier::Visible => visible = true,
                }
            }
        }

        if null_result.get() {
            return Ok("NULL".to_string());
        }

        let widened_by_all = call
            .modifiers
            .iter()
            .flatten()
            .any(|m| matches!(m, ContextModifier::All(_)));

        let agg = self.measure_agg_sql(model, metric, &inner_alias, widened_by_all, 0)?;

        // === Correlation predicates ===

        let mut where_parts: Vec<String> = vec![];
        if !grand_total {
            for dim in group_dims {
                if freed.contains(&dim.name) || pins.iter().any(|(p, _)| p == &dim.name) {
                    continue;
                }
                if dim.is_expr {
                    // Expression dimensions only correlate reliably when
                    // there is a single outer relation to requalify from.
                    if multi_relation {
                        continue;
                    }
                    let outer = qualify_bare(&dim.expr_sql, model, &outer_qual);
                    let inner = qualify_bare(
                        &dim.expr_sql
                            .replace(&format!("{}.", outer_qual), &format!("{}.", inner_alias)),
                        model,
                        &inner_alias,
                    );
                    where_parts.push(self.dialect.null_safe_eq(&inner, &outer));
                } else {
                    if model.dimension(&dim.name).is_none() {
                        continue;
                    }
                    where_parts.push(self.dialect.null_safe_eq(
                        &format!("{}.{}", inner_alias, dim.name),
                        &format!("{}.{}", outer_qual, dim.name),
                    ));
                }
            }
        }
        for (_, predicate) in &pins {
            where_parts.push(predicate.clone());
        }
        where_parts.extend(predicates);
        if visible {
            if let Some(where_text) = outer_where {
                let copied = qualify_bare(
                    &where_text
                        .replace(&format!("{}.", outer_qual), &format!("{}.", inner_alias)),
                    model,
                    &inner_alias,
                );
                where_parts.push(format!("({})", copied));
            }
        }

        Ok(if where_parts.is_empty() {
            format!("(SELECT {} FROM {})", agg, source)
        } else {
            format!("(SELECT {} FROM {} WHERE {})", agg, source, where_parts.join(" AND "))
        })
    }

    /// Resolve a SET value: `CURRENT dim` references and bare dimension
    /// names both read the outer row's context.
    fn resolve_value_expr(
        &self,
        text: &str,
        model: &Model,
        group_dims: &[GroupDim],
        outer_qual: &str,
        outer_where: Option<&str>,
        null_result: &Cell<bool>,
    ) -> SemanticResult<String> {
        let resolved =
            self.resolve_current(text, model, group_dims, outer_qual, outer_where, null_result)?;

        // Bare dimension names refer to the outer row too. One pass, with a
        // guard against already-qualified references, so substituted text
        // is never rescanned.
        let mut dims: Vec<&str> = model.dimensions.iter().map(|d| d.name.as_str()).collect();
        dims.sort_by_key(|d| std::cmp::Reverse(d.len()));
        if dims.is_empty() {
            return Ok(resolved);
        }
        let alternation = dims
            .iter()
            .map(|d| regex::escape(d))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = format!(r"(^|[^.\w])({})\b", alternation);
        let re = Regex::new(&pattern).map_err(|_| {
            SemanticError::InvalidSyntaxContext("unresolvable dimension set".into())
        })?;
        Ok(re
            .replace_all(&resolved, |caps: &regex::Captures| {
                let value = self.outer_dim_value(
                    &caps[2],
                    group_dims,
                    outer_qual,
                    outer_where,
                    null_result,
                );
                format!("{}{}", &caps[1], value)
            })
            .into_owned())
    }

    /// Substitute `CURRENT dim` references with the outer row's value.
    fn resolve_current(
        &self,
        text: &str,
        model: &Model,
        group_dims: &[GroupDim],
        outer_qual: &str,
        outer_where: Option<&str>,
        null_result: &Cell<bool>,
    ) -> SemanticResult<String> {
        let mut resolved = text.to_string();
        while let Some(caps) = CURRENT_REF.captures(&resolved) {
            let whole = caps.get(0).ok_or_else(|| {
                SemanticError::InvalidSyntaxContext("malformed CURRENT reference".into())
            })?;
            let dim = caps[1].to_string();
            if model.dimension(&dim).is_none() {
                return Err(SemanticError::AmbiguousContext(format!(
                    "CURRENT {} does not name a dimension of {}",
                    dim, model.name
                )));
            }
            let replacement =
                self.outer_dim_value(&dim, group_dims, outer_qual, outer_where, null_result);
            resolved = format!(
                "{}{}{}",
                &resolved[..whole.start()],
                replacement,
                &resolved[whole.end()..]
            );
        }
        Ok(resolved)
    }

    /// The outer row's value for one dimension: the grouped column when the
    /// query groups by it, the pinned literal when the outer WHERE fixes
    /// it, otherwise NULL (flagging the whole expansion).
    fn outer_dim_value(
        &self,
        dim: &str,
        group_dims: &[GroupDim],
        outer_qual: &str,
        outer_where: Option<&str>,
        null_result: &Cell<bool>,
    ) -> String {
        if group_dims.iter().any(|g| g.name == dim) {
            return format!("{}.{}", outer_qual, dim);
        }
        if let Some(where_text) = outer_where {
            if let Some(literal) = pinned_literal(where_text, dim) {
                return literal;
            }
        }
        null_result.set(true);
        "NULL".to_string()
    }

    /// Recomputable aggregate expression for a metric, over the inner
    /// relation's (unqualified) columns.
    fn measure_agg_sql(
        &self,
        model: &Model,
        metric: &Metric,
        inner_alias: &str,
        widened_by_all: bool,
        depth: usize,
    ) -> SemanticResult<String> {
        if depth > 8 {
            return Err(SemanticError::UnsupportedAggregateRecomputation(
                metric.name.clone(),
            ));
        }
        if metric.is_windowed() && widened_by_all {
            // A window's frame is defined by the query's own rows; there is
            // no meaningful recomputation under a widened grouping.
            return Err(SemanticError::UnsupportedAggregateRecomputation(
                metric.name.clone(),
            ));
        }

        match &metric.kind {
            MetricKind::Simple { agg, expr } => {
                let mut base = match expr {
                    Some(e) => OVER_CLAUSE.replace_all(e, "").into_owned(),
                    None if *agg == AggregateFunction::Count => "*".to_string(),
                    None => metric.name.clone(),
                };
                if !metric.filters.is_empty() {
                    let cond = metric
                        .filters
                        .iter()
                        .map(|f| f.replace("{model}", inner_alias))
                        .collect::<Vec<_>>()
                        .join(" AND ");
                    let value = if base == "*" { "1".to_string() } else { base };
                    base = format!("CASE WHEN {} THEN {} END", cond, value);
                }
                Ok(match agg {
                    AggregateFunction::Sum => format!("SUM({})", base),
                    AggregateFunction::Count => format!("COUNT({})", base),
                    AggregateFunction::CountDistinct => format!("COUNT(DISTINCT {})", base),
                    AggregateFunction::Avg => format!("AVG({})", base),
                    AggregateFunction::Min => format!("MIN({})", base),
                    AggregateFunction::Max => format!("MAX({})", base),
                })
            }
            MetricKind::Ratio {
                numerator,
                denominator,
            } => {
                let (num_model, num) = self.graph.resolve_metric(numerator)?;
                let (den_model, den) = self.graph.resolve_metric(denominator)?;
                // Both components must read this call's base relation.
                for owner in [num_model, den_model].into_iter().flatten() {
                    if owner != model.name {
                        return Err(SemanticError::UnsupportedAggregateRecomputation(
                            metric.name.clone(),
                        ));
                    }
                }
                let num_sql =
                    self.measure_agg_sql(model, num, inner_alias, widened_by_all, depth + 1)?;
                let den_sql =
                    self.measure_agg_sql(model, den, inner_alias, widened_by_all, depth + 1)?;
                Ok(format!("{} / NULLIF({}, 0)", num_sql, den_sql))
            }
            MetricKind::Cumulative { measure, .. } => {
                let (_, base) = self.graph.resolve_metric(measure)?;
                self.measure_agg_sql(model, base, inner_alias, widened_by_all, depth + 1)
            }
            MetricKind::TimeComparison { base, .. } => {
                let (_, base) = self.graph.resolve_metric(base)?;
                self.measure_agg_sql(model, base, inner_alias, widened_by_all, depth + 1)
            }
            MetricKind::Derived { .. } | MetricKind::Conversion { .. } => Err(
                SemanticError::UnsupportedAggregateRecomputation(metric.name.clone()),
            ),
        }
    }
}

fn collect_relation(factor: &TableFactor, out: &mut Vec<Relation>) {
    if let TableFactor::Table { name, alias, .. } = factor {
        let table = name
            .0
            .last()
            .map(|i| i.value.clone())
            .unwrap_or_default();
        let qualifier = alias
            .as_ref()
            .map(|a| a.name.value.clone())
            .unwrap_or_else(|| table.clone());
        out.push(Relation { table, qualifier });
    }
}

/// Resolve a GROUP BY expression (possibly an ordinal) to a grouping dim.
fn resolve_group_expr(expr: &SqlExpr, projection: &[(SqlExpr, Option<String>)]) -> GroupDim {
    if let SqlExpr::Value(Value::Number(n, _)) = expr {
        if let Ok(ordinal) = n.parse::<usize>() {
            if ordinal >= 1 && ordinal <= projection.len() {
                let (e, alias) = &projection[ordinal - 1];
                return group_dim_for(e, alias.clone());
            }
        }
    }
    let alias = projection
        .iter()
        .find(|(e, _)| e == expr)
        .and_then(|(_, a)| a.clone());
    group_dim_for(expr, alias)
}

fn group_dim_for(expr: &SqlExpr, alias: Option<String>) -> GroupDim {
    match expr {
        SqlExpr::Identifier(ident) => GroupDim {
            name: ident.value.clone(),
            expr_sql: ident.value.clone(),
            is_expr: false,
        },
        SqlExpr::CompoundIdentifier(parts) => {
            let name = parts
                .last()
                .map(|i| i.value.clone())
                .unwrap_or_default();
            GroupDim {
                name,
                expr_sql: expr.to_string(),
                is_expr: false,
            }
        }
        other => GroupDim {
            name: alias.unwrap_or_else(|| other.to_string()),
            expr_sql: other.to_string(),
            is_expr: true,
        },
    }
}

/// Whether an expression contains an aggregate function call or one of the
/// scanner's placeholders (which always stand for aggregates).
fn contains_aggregate(expr: &SqlExpr, placeholders: &HashSet<&str>) -> bool {
    match expr {
        SqlExpr::Identifier(ident) => placeholders.contains(ident.value.as_str()),
        SqlExpr::Function(func) => {
            let name = func
                .name
                .0
                .last()
                .map(|i| i.value.to_uppercase())
                .unwrap_or_default();
            if AGGREGATE_NAMES.contains(&name.as_str()) {
                return true;
            }
            if let FunctionArguments::List(list) = &func.args {
                for arg in &list.args {
                    let inner = match arg {
                        FunctionArg::Unnamed(FunctionArgExpr::Expr(e)) => e,
                        FunctionArg::Named {
                            arg: FunctionArgExpr::Expr(e),
                            ..
                        } => e,
                        _ => continue,
                    };
                    if contains_aggregate(inner, placeholders) {
                        return true;
                    }
                }
            }
            false
        }
        SqlExpr::BinaryOp { left, right, .. } => {
            contains_aggregate(left, placeholders) || contains_aggregate(right, placeholders)
        }
        SqlExpr::UnaryOp { expr, .. }
        | SqlExpr::Nested(expr)
        | SqlExpr::Cast { expr, .. } => contains_aggregate(expr, placeholders),
        _ => false,
    }
}

/// Replace placeholder identifiers with their expansion, recursively.
fn replace_placeholders(expr: &mut SqlExpr, replacements: &HashMap<String, SqlExpr>) {
    if let SqlExpr::Identifier(ident) = expr {
        if let Some(replacement) = replacements.get(&ident.value) {
            *expr = replacement.clone();
            return;
        }
    }

    match expr {
        SqlExpr::BinaryOp { left, right, .. } => {
            replace_placeholders(left, replacements);
            replace_placeholders(right, replacements);
        }
        SqlExpr::UnaryOp { expr, .. }
        | SqlExpr::Nested(expr)
        | SqlExpr::Cast { expr, .. }
        | SqlExpr::IsNull(expr)
        | SqlExpr::IsNotNull(expr) => replace_placeholders(expr, replacements),
        SqlExpr::InList { expr, list, .. } => {
            replace_placeholders(expr, replacements);
            for item in list {
                replace_placeholders(item, replacements);
            }
        }
        SqlExpr::Between {
            expr, low, high, ..
        } => {
            replace_placeholders(expr, replacements);
            replace_placeholders(low, replacements);
            replace_placeholders(high, replacements);
        }
        SqlExpr::Function(func) => {
            if let FunctionArguments::List(list) = &mut func.args {
                for arg in &mut list.args {
                    match arg {
                        FunctionArg::Unnamed(FunctionArgExpr::Expr(e)) => {
                            replace_placeholders(e, replacements)
                        }
                        FunctionArg::Named {
                            arg: FunctionArgExpr::Expr(e),
                            ..
                        } => replace_placeholders(e, replacements),
                        _ => {}
                    }
                }
            }
        }
        _ => {}
    }
}

/// Qualify bare references to the model's dimensions with an alias, leaving
/// already-qualified references alone.
fn qualify_bare(text: &str, model: &Model, qualifier: &str) -> String {
    let mut dims: Vec<&str> = model.dimensions.iter().map(|d| d.name.as_str()).collect();
    if dims.is_empty() {
        return text.to_string();
    }
    dims.sort_by_key(|d| std::cmp::Reverse(d.len()));
    let alternation = dims
        .iter()
        .map(|d| regex::escape(d))
        .collect::<Vec<_>>()
        .join("|");
    let pattern = format!(r"(^|[^.\w])({})\b", alternation);
    match Regex::new(&pattern) {
        Ok(re) => re
            .replace_all(text, |caps: &regex::Captures| {
                format!("{}{}.{}", &caps[1], qualifier, &caps[2])
            })
            .into_owned(),
        Err(_) => text.to_string(),
    }
}

/// A literal the outer WHERE pins a dimension to, if it does.
fn pinned_literal(where_text: &str, dim: &str) -> Option<String> {
    let pattern = format!(
        r"(?i)\b{}\s*=\s*('(?:[^']|'')*'|[0-9][\w.]*)",
        regex::escape(dim)
    );
    let re = Regex::new(&pattern).ok()?;
    re.captures(where_text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
