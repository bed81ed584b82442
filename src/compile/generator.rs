//! The SQL generator - semantic query spec to executable SQL.
//!
//! Compilation has a fixed shape: one CTE per participating model that
//! projects join keys, requested dimensions, and raw (ungrouped) measure
//! columns, then an outer statement that joins the CTEs, applies
//! cross-model filters, and aggregates. Keeping measures raw in the CTEs
//! lets the outer query own grouping, which is what makes composite
//! metrics and window measures composable.
//!
//! When the join tree fans out and more than one model carries measures,
//! the fan-out models' CTEs are instead pre-aggregated to join-key grain
//! and the outer aggregation re-folds them, so no measure is counted
//! through duplicated join rows.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{SemanticError, SemanticResult};
use crate::graph::{EntityGraph, JoinStep};
use crate::model::{
    AggregateFunction, Metric, MetricKind, Model, PreAggregation, TimeGranularity,
};
use crate::sql::{Dialect, Expr, OrderByExpr, Query, SelectExpr, SqlDialect, TableRef};

/// A semantic query: what to measure, how to slice it, what to keep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySpec {
    pub metrics: Vec<String>,
    pub dimensions: Vec<String>,
    pub filters: Vec<String>,
    pub order_by: Vec<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// Skip the outer aggregation and return row-level values.
    pub ungrouped: bool,
}

impl QuerySpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metric(mut self, reference: &str) -> Self {
        self.metrics.push(reference.into());
        self
    }

    pub fn dimension(mut self, reference: &str) -> Self {
        self.dimensions.push(reference.into());
        self
    }

    pub fn filter(mut self, predicate: &str) -> Self {
        self.filters.push(predicate.into());
        self
    }

    pub fn order_by(mut self, field: &str) -> Self {
        self.order_by.push(field.into());
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    pub fn ungrouped(mut self) -> Self {
        self.ungrouped = true;
        self
    }
}

/// A requested dimension after resolution.
#[derive(Debug, Clone)]
struct DimPlan {
    model: String,
    field: String,
    granularity: Option<TimeGranularity>,
    alias: String,
}

/// One simple measure a requested metric ultimately reads.
#[derive(Debug, Clone, PartialEq)]
struct LeafMeasure {
    model: String,
    name: String,
}

static FIELD_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Za-z_]\w*)\.([A-Za-z_]\w*)").unwrap());

const MAX_METRIC_DEPTH: usize = 16;

/// Compiles [`QuerySpec`]s against one [`EntityGraph`].
pub struct SqlGenerator<'g> {
    graph: &'g EntityGraph,
    dialect: Dialect,
}

impl<'g> SqlGenerator<'g> {
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

    /// Compile a semantic query to SQL.
    pub fn generate(&self, spec: &QuerySpec) -> SemanticResult<String> {
        // Conversion funnels compile through a dedicated self-join shape.
        for reference in &spec.metrics {
            let (model, metric) = self.graph.resolve_metric(reference)?;
            if matches!(metric.kind, MetricKind::Conversion { .. }) {
                if spec.metrics.len() > 1 || !spec.dimensions.is_empty() {
                    return Err(SemanticError::InvalidModel(format!(
                        "conversion metric {} must be queried alone, without dimensions",
                        metric.name
                    )));
                }
                let model = model.ok_or_else(|| {
                    SemanticError::UnresolvedField(reference.clone())
                })?;
                return self.generate_conversion(spec, model, metric);
            }
        }

        let dims = self.plan_dimensions(spec)?;
        let leaves = self.plan_leaves(spec)?;

        let models = participating_models(&leaves, &dims);
        let Some(base) = models.first().cloned() else {
            return Err(SemanticError::UnresolvedField(
                "query selects no metrics and no dimensions".into(),
            ));
        };
        let targets: Vec<&str> = models.iter().skip(1).map(String::as_str).collect();
        let steps = self.graph.resolve_joins(&base, &targets)?;

        let measure_models: HashSet<&str> = leaves.iter().map(|l| l.model.as_str()).collect();
        let prefold = self.prefold_models(&steps, &leaves, &measure_models);

        let (pushed, outer_filters) = self.classify_filters(spec, &models)?;

        let mut query = Query::new();
        for model_name in &models {
            let model = self.graph.model(model_name)?;
            let cte = self.build_cte(
                model,
                &dims,
                &leaves,
                &steps,
                pushed.get(model_name.as_str()).map(Vec::as_slice).unwrap_or(&[]),
                prefold.contains(model_name.as_str()),
            )?;
            query = query.with_cte(&format!("{}_cte", model_name), cte);
        }

        query = query.from(TableRef::new(&format!("{}_cte", base)));
        for step in &steps {
            let from_cte = format!("{}_cte", step.from_model);
            let to_cte = format!("{}_cte", step.to_model);
            query = query.left_join(
                TableRef::new(&to_cte),
                Expr::table_col(&from_cte, &step.from_column)
                    .eq(Expr::table_col(&to_cte, &step.to_column)),
            );
        }

        for dim in &dims {
            query = query.select(SelectExpr::aliased(
                Expr::table_col(&format!("{}_cte", dim.model), &dim.alias),
                &dim.alias,
            ));
        }

        let time_dim = self.query_time_dimension(&dims)?;

        if spec.ungrouped {
            for reference in &spec.metrics {
                let (model, metric) = self.graph.resolve_metric(reference)?;
                let MetricKind::Simple { .. } = metric.kind else {
                    return Err(SemanticError::InvalidModel(format!(
                        "metric {} cannot be selected ungrouped",
                        metric.name
                    )));
                };
                let model = model.ok_or_else(|| {
                    SemanticError::UnresolvedField(reference.clone())
                })?;
                query = query.select(SelectExpr::aliased(
                    Expr::table_col(&format!("{}_cte", model), &format!("{}_raw", metric.name)),
                    &metric.name,
                ));
            }
        } else {
            for reference in &spec.metrics {
                let (_, metric) = self.graph.resolve_metric(reference)?;
                let sql =
                    self.metric_select_sql(reference, &prefold, time_dim.as_ref(), 0)?;
                query = query.select(SelectExpr::aliased(Expr::raw(sql), &metric.name));
            }
        }

        for predicate in outer_filters {
            query = query.filter(Expr::raw(predicate));
        }

        if !spec.ungrouped && !spec.metrics.is_empty() && !dims.is_empty() {
            for i in 1..=dims.len() {
                query = query.group_by(Expr::lit_int(i as i64));
            }
        }

        for entry in &spec.order_by {
            query = query.order_by(self.order_by_item(entry, &dims, spec));
        }
        if let Some(n) = spec.limit {
            query = query.limit(n);
        }
        if let Some(n) = spec.offset {
            query = query.offset(n);
        }

        Ok(query.to_sql(self.dialect))
    }

    /// Compile a query against a matched rollup table instead of the base
    /// relations. The caller is responsible for having checked eligibility
    /// with [`super::find_matching_preagg`].
    pub fn generate_from_preagg(
        &self,
        spec: &QuerySpec,
        model_name: &str,
        preagg: &PreAggregation,
    ) -> SemanticResult<String> {
        let model = self.graph.model(model_name)?;
        let dims = self.plan_dimensions(spec)?;

        // Dimensional coverage vs what the rollup stores.
        let stored_dims: HashSet<&str> = preagg.dimensions.iter().map(String::as_str).collect();
        let mut requested_plain: HashSet<&str> = HashSet::new();
        let mut gran_coarser = false;
        let mut covers_time = preagg.time_dimension.is_none();

        let mut query = Query::new().from(TableRef::new(&preagg.table_name(model_name)));

        let mut projections: Vec<SelectExpr> = vec![];
        for dim in &dims {
            if dim.model != model_name {
                return Err(SemanticError::UnresolvedField(format!(
                    "{}.{} is outside the rollup's model",
                    dim.model, dim.field
                )));
            }
            if preagg.time_dimension.as_deref() == Some(dim.field.as_str()) {
                covers_time = true;
                let stored = preagg.time_column().unwrap_or_else(|| dim.field.clone());
                match (dim.granularity, preagg.granularity) {
                    (Some(requested), Some(held)) if requested > held => {
                        gran_coarser = true;
                        projections.push(SelectExpr::aliased(
                            Expr::raw(self.dialect.date_trunc(requested.as_str(), &stored)),
                            &dim.alias,
                        ));
                    }
                    _ => {
                        projections.push(SelectExpr::aliased(Expr::raw(stored), &dim.alias));
                    }
                }
            } else {
                requested_plain.insert(dim.field.as_str());
                projections.push(SelectExpr::aliased(Expr::raw(dim.field.clone()), &dim.alias));
            }
        }

        let needs_reagg = gran_coarser
            || !covers_time
            || requested_plain != stored_dims;

        for reference in &spec.metrics {
            let (_, metric) = self.graph.resolve_metric(reference)?;
            let MetricKind::Simple { agg, .. } = metric.kind else {
                return Err(SemanticError::InvalidModel(format!(
                    "metric {} cannot be read from a rollup",
                    metric.name
                )));
            };
            let n = &metric.name;
            let sql = if !needs_reagg {
                n.clone()
            } else {
                match agg {
                    AggregateFunction::Sum | AggregateFunction::Count => format!("SUM({})", n),
                    AggregateFunction::Min => format!("MIN({})", n),
                    AggregateFunction::Max => format!("MAX({})", n),
                    AggregateFunction::CountDistinct => format!("COUNT(DISTINCT {})", n),
                    AggregateFunction::Avg => {
                        let cnt = self.rollup_count_measure(model, preagg).ok_or_else(|| {
                            SemanticError::InvalidModel(format!(
                                "rollup {} has no count measure to reweight {}",
                                preagg.name, n
                            ))
                        })?;
                        format!("SUM({} * {}) / NULLIF(SUM({}), 0)", n, cnt, cnt)
                    }
                }
            };
            projections.push(SelectExpr::aliased(Expr::raw(sql), n));
        }

        let dim_count = dims.len();
        for item in projections {
            query = query.select(item);
        }

        for filter in &spec.filters {
            let rewritten = filter.replace(&format!("{}.", model_name), "");
            query = query.filter(Expr::raw(rewritten));
        }

        if needs_reagg && !spec.metrics.is_empty() && dim_count > 0 {
            for i in 1..=dim_count {
                query = query.group_by(Expr::lit_int(i as i64));
            }
        }

        for entry in &spec.order_by {
            query = query.order_by(self.order_by_item(entry, &dims, spec));
        }
        if let Some(n) = spec.limit {
            query = query.limit(n);
        }
        if let Some(n) = spec.offset {
            query = query.offset(n);
        }

        Ok(query.to_sql(self.dialect))
    }

    /// Compile a conversion funnel: entities with a base event, left-joined
    /// to their conversion events within the window, counted distinct on
    /// both sides.
    fn generate_conversion(
        &self,
        spec: &QuerySpec,
        model_name: &str,
        metric: &Metric,
    ) -> SemanticResult<String> {
        let MetricKind::Conversion {
            entity,
            base_event,
            conversion_event,
            window,
        } = &metric.kind
        else {
            return Err(SemanticError::InvalidModel(format!(
                "{} is not a conversion metric",
                metric.name
            )));
        };
        let model = self.graph.model(model_name)?;

        // The funnel reads the model's event stream: one event type column
        // and one timestamp.
        let mut event_dim: Option<String> = None;
        let mut time_col: Option<String> = None;
        for dim in &model.dimensions {
            if dim.is_time() && time_col.is_none() {
                time_col = Some(dim.sql_expr().to_string());
            }
            let lower = dim.name.to_ascii_lowercase();
            if event_dim.is_none() && lower.contains("event") && lower.contains("type") {
                event_dim = Some(dim.sql_expr().to_string());
            }
        }
        let event_dim = event_dim.ok_or_else(|| {
            SemanticError::InvalidModel(format!(
                "model {} has no event type dimension for {}",
                model.name, metric.name
            ))
        })?;
        let time_col = time_col.ok_or_else(|| SemanticError::MissingTimeDimension {
            metric: metric.name.clone(),
        })?;

        let mut query = Query::new();
        for (cte_name, event) in [
            ("base_events", base_event),
            ("conversion_events", conversion_event),
        ] {
            let source = match (&model.table, &model.sql) {
                (Some(table), _) => TableRef::aliased(table, &model.name),
                (None, Some(sql)) => TableRef::derived(sql, &model.name),
                (None, None) => {
                    return Err(SemanticError::InvalidModel(format!(
                        "model {} has no relation",
                        model.name
                    )))
                }
            };
            let mut cte = Query::new()
                .select(SelectExpr::aliased(Expr::raw(entity.clone()), "entity"))
                .select(SelectExpr::aliased(Expr::raw(time_col.clone()), "event_time"))
                .from(source)
                .filter(Expr::raw(format!(
                    "{} = {}",
                    event_dim,
                    self.dialect.quote_string(event)
                )));
            for filter in &spec.filters {
                cte = cte.filter(Expr::raw(filter.clone()));
            }
            query = query.with_cte(cte_name, cte);
        }

        let window = window.as_deref().unwrap_or("7 days");
        let on = format!(
            "base_events.entity = conversion_events.entity \
             AND conversion_events.event_time BETWEEN base_events.event_time \
             AND base_events.event_time + INTERVAL '{}'",
            window
        );
        let mut rate = "COUNT(DISTINCT conversion_events.entity) * 1.0 \
                        / NULLIF(COUNT(DISTINCT base_events.entity), 0)"
            .to_string();
        if let Some(value) = &metric.fill_nulls_with {
            rate = format!("COALESCE({}, {})", rate, json_literal(value, self.dialect));
        }

        query = query
            .select(SelectExpr::aliased(Expr::raw(rate), &metric.name))
            .from(TableRef::new("base_events"))
            .left_join(TableRef::new("conversion_events"), Expr::raw(on));
        if let Some(n) = spec.limit {
            query = query.limit(n);
        }
        if let Some(n) = spec.offset {
            query = query.offset(n);
        }

        Ok(query.to_sql(self.dialect))
    }

    // === Planning ===

    fn plan_dimensions(&self, spec: &QuerySpec) -> SemanticResult<Vec<DimPlan>> {
        let mut dims = vec![];
        for reference in &spec.dimensions {
            let field_ref = self.graph.parse_reference(reference)?;
            let model = self.graph.model(&field_ref.model)?;
            if model.dimension(&field_ref.field).is_none() {
                return Err(SemanticError::UnresolvedField(reference.clone()));
            }
            let alias = match field_ref.granularity {
                Some(g) => format!("{}__{}", field_ref.field, g.as_str()),
                None => field_ref.field.clone(),
            };
            dims.push(DimPlan {
                model: field_ref.model,
                field: field_ref.field,
                granularity: field_ref.granularity,
                alias,
            });
        }
        Ok(dims)
    }

    /// Decompose every requested metric into the simple measures it reads.
    fn plan_leaves(&self, spec: &QuerySpec) -> SemanticResult<Vec<LeafMeasure>> {
        let mut leaves: Vec<LeafMeasure> = vec![];
        for reference in &spec.metrics {
            self.collect_leaves(reference, &mut leaves, 0)?;
        }
        Ok(leaves)
    }

    fn collect_leaves(
        &self,
        reference: &str,
        out: &mut Vec<LeafMeasure>,
        depth: usize,
    ) -> SemanticResult<()> {
        if depth > MAX_METRIC_DEPTH {
            return Err(SemanticError::InvalidModel(format!(
                "metric {} exceeds the composition depth limit",
                reference
            )));
        }
        let (model, metric) = self.graph.resolve_metric(reference)?;
        match &metric.kind {
            MetricKind::Simple { .. } => {
                let model = model.ok_or_else(|| {
                    SemanticError::UnresolvedField(format!(
                        "simple metric {} has no owning model",
                        metric.name
                    ))
                })?;
                let leaf = LeafMeasure {
                    model: model.into(),
                    name: metric.name.clone(),
                };
                if !out.contains(&leaf) {
                    out.push(leaf);
                }
            }
            _ => {
                for dep in self.graph.metric_dependencies(metric) {
                    self.collect_leaves(&dep, out, depth + 1)?;
                }
            }
        }
        Ok(())
    }

    /// Models whose CTEs get pre-aggregated to join-key grain.
    ///
    /// Only when the join tree fans out somewhere AND at least two models
    /// carry measures: a single measure-bearing model with a fan-out join
    /// cannot double-count itself through the outer aggregation, while two
    /// fact relations meeting through a shared dimension multiply each
    /// other's rows. A model keeps raw rows when a COUNT DISTINCT measure
    /// is requested from it, since distinct counting is immune to join
    /// duplication and loses information under pre-grouping.
    fn prefold_models(
        &self,
        steps: &[JoinStep],
        leaves: &[LeafMeasure],
        measure_models: &HashSet<&str>,
    ) -> HashSet<String> {
        let fans_out = steps.iter().any(JoinStep::fans_out);
        if !fans_out || measure_models.len() < 2 {
            return HashSet::new();
        }

        let mut prefold = HashSet::new();
        for model in measure_models {
            let has_count_distinct = leaves.iter().any(|l| {
                l.model == *model
                    && self
                        .graph
                        .get_model(model)
                        .and_then(|m| m.metric(&l.name))
                        .map(|m| {
                            matches!(
                                m.kind,
                                MetricKind::Simple {
                                    agg: AggregateFunction::CountDistinct,
                                    ..
                                }
                            )
                        })
                        .unwrap_or(false)
            });
            if !has_count_distinct {
                prefold.insert(model.to_string());
            }
        }
        prefold
    }

    /// Split query filters into per-model pushdowns and outer predicates.
    ///
    /// A filter that references exactly one participating model and touches
    /// no measures runs inside that model's CTE, before joins multiply
    /// rows. Everything else runs in the outer statement with references
    /// rewritten to CTE columns.
    fn classify_filters(
        &self,
        spec: &QuerySpec,
        models: &[String],
    ) -> SemanticResult<(HashMap<String, Vec<String>>, Vec<String>)> {
        let model_set: HashSet<&str> = models.iter().map(String::as_str).collect();
        let mut pushed: HashMap<String, Vec<String>> = HashMap::new();
        let mut outer: Vec<String> = vec![];

        for filter in &spec.filters {
            let mut referenced: HashSet<&str> = HashSet::new();
            let mut touches_measure = false;
            for caps in FIELD_REF.captures_iter(filter) {
                let model_name = caps.get(1).map(|m| m.as_str()).unwrap_or("");
                let field = caps.get(2).map(|m| m.as_str()).unwrap_or("");
                if !model_set.contains(model_name) {
                    continue;
                }
                referenced.insert(model_name);
                if let Some(model) = self.graph.get_model(model_name) {
                    if model.metric(field).is_some() {
                        touches_measure = true;
                    }
                }
            }

            if referenced.len() == 1 && !touches_measure {
                let owner = referenced.into_iter().next().unwrap_or_default();
                pushed
                    .entry(owner.to_string())
                    .or_default()
                    .push(filter.clone());
                continue;
            }

            let rewritten = FIELD_REF.replace_all(filter, |caps: &regex::Captures| {
                let model_name = &caps[1];
                let field = &caps[2];
                if !model_set.contains(model_name) {
                    return caps[0].to_string();
                }
                let is_measure = self
                    .graph
                    .get_model(model_name)
                    .map(|m| m.metric(field).is_some())
                    .unwrap_or(false);
                if is_measure {
                    format!("{}_cte.{}_raw", model_name, field)
                } else {
                    format!("{}_cte.{}", model_name, field)
                }
            });
            outer.push(rewritten.into_owned());
        }

        Ok((pushed, outer))
    }

    // === CTE construction ===

    fn build_cte(
        &self,
        model: &Model,
        dims: &[DimPlan],
        leaves: &[LeafMeasure],
        steps: &[JoinStep],
        pushed_filters: &[String],
        prefold: bool,
    ) -> SemanticResult<Query> {
        let mut cte = Query::new();

        // Join key columns used by any step touching this model.
        let mut join_cols: Vec<&str> = vec![];
        for step in steps {
            if step.from_model == model.name && !join_cols.contains(&step.from_column.as_str()) {
                join_cols.push(&step.from_column);
            }
            if step.to_model == model.name && !join_cols.contains(&step.to_column.as_str()) {
                join_cols.push(&step.to_column);
            }
        }
        for col in &join_cols {
            cte = cte.select(SelectExpr::new(Expr::raw((*col).to_string())));
        }

        let mut grouped_cols = join_cols.len();
        for dim in dims.iter().filter(|d| d.model == model.name) {
            let def = model.dimension(&dim.field).ok_or_else(|| {
                SemanticError::UnresolvedField(format!("{}.{}", dim.model, dim.field))
            })?;
            let base_expr = def.sql_expr().to_string();
            let expr = match dim.granularity {
                Some(g) => self.dialect.date_trunc(g.as_str(), &base_expr),
                None => base_expr,
            };
            cte = cte.select(SelectExpr::aliased(Expr::raw(expr), &dim.alias));
            grouped_cols += 1;
        }

        for leaf in leaves.iter().filter(|l| l.model == model.name) {
            let metric = model.metric(&leaf.name).ok_or_else(|| {
                SemanticError::UnresolvedField(format!("{}.{}", leaf.model, leaf.name))
            })?;
            for item in self.measure_columns(model, metric, prefold)? {
                cte = cte.select(item);
            }
        }

        let source = match (&model.table, &model.sql) {
            (Some(table), _) => TableRef::aliased(table, &model.name),
            (None, Some(sql)) => TableRef::derived(sql, &model.name),
            (None, None) => {
                return Err(SemanticError::InvalidModel(format!(
                    "model {} has no relation",
                    model.name
                )))
            }
        };
        cte = cte.from(source);

        for filter in pushed_filters {
            cte = cte.filter(Expr::raw(filter.clone()));
        }

        if prefold {
            for i in 1..=grouped_cols {
                cte = cte.group_by(Expr::lit_int(i as i64));
            }
        }

        Ok(cte)
    }

    /// Raw (or pre-folded) columns a simple measure contributes to its CTE.
    fn measure_columns(
        &self,
        model: &Model,
        metric: &Metric,
        prefold: bool,
    ) -> SemanticResult<Vec<SelectExpr>> {
        let MetricKind::Simple { agg, expr } = &metric.kind else {
            return Err(SemanticError::InvalidModel(format!(
                "{} is not a simple measure",
                metric.name
            )));
        };

        let mut base = match expr {
            Some(e) => e.clone(),
            // A bare count measures rows.
            None if *agg == AggregateFunction::Count => "1".to_string(),
            None => metric.name.clone(),
        };

        if !metric.filters.is_empty() {
            let cond = metric
                .filters
                .iter()
                .map(|f| f.replace("{model}", &model.name))
                .collect::<Vec<_>>()
                .join(" AND ");
            base = format!("CASE WHEN {} THEN {} END", cond, base);
        }

        let n = &metric.name;
        if !prefold {
            return Ok(vec![SelectExpr::aliased(
                Expr::raw(base),
                &format!("{}_raw", n),
            )]);
        }

        Ok(match agg {
            AggregateFunction::Sum => vec![SelectExpr::aliased(
                Expr::raw(format!("SUM({})", base)),
                &format!("{}_raw", n),
            )],
            AggregateFunction::Count => vec![SelectExpr::aliased(
                Expr::raw(format!("COUNT({})", base)),
                &format!("{}_raw", n),
            )],
            AggregateFunction::Min => vec![SelectExpr::aliased(
                Expr::raw(format!("MIN({})", base)),
                &format!("{}_raw", n),
            )],
            AggregateFunction::Max => vec![SelectExpr::aliased(
                Expr::raw(format!("MAX({})", base)),
                &format!("{}_raw", n),
            )],
            AggregateFunction::Avg => vec![
                SelectExpr::aliased(
                    Expr::raw(format!("SUM({})", base)),
                    &format!("{}_sum_raw", n),
                ),
                SelectExpr::aliased(
                    Expr::raw(format!("COUNT({})", base)),
                    &format!("{}_cnt_raw", n),
                ),
            ],
            // Distinct counting skips pre-folding entirely.
            AggregateFunction::CountDistinct => vec![SelectExpr::aliased(
                Expr::raw(base),
                &format!("{}_raw", n),
            )],
        })
    }

    // === Outer select SQL ===

    /// Aggregate select expression for one metric reference.
    fn metric_select_sql(
        &self,
        reference: &str,
        prefold: &HashSet<String>,
        time_dim: Option<&DimPlan>,
        depth: usize,
    ) -> SemanticResult<String> {
        if depth > MAX_METRIC_DEPTH {
            return Err(SemanticError::InvalidModel(format!(
                "metric {} exceeds the composition depth limit",
                reference
            )));
        }

        let (model, metric) = self.graph.resolve_metric(reference)?;
        let sql = match &metric.kind {
            MetricKind::Simple { agg, .. } => {
                let model = model.ok_or_else(|| {
                    SemanticError::UnresolvedField(format!(
                        "simple metric {} has no owning model",
                        metric.name
                    ))
                })?;
                self.leaf_agg_sql(model, &metric.name, *agg, prefold.contains(model))
            }
            MetricKind::Ratio {
                numerator,
                denominator,
            } => {
                let num = self.metric_select_sql(numerator, prefold, time_dim, depth + 1)?;
                let den = self.metric_select_sql(denominator, prefold, time_dim, depth + 1)?;
                format!("{} / NULLIF({}, 0)", num, den)
            }
            MetricKind::Derived { expr } => {
                let mut deps = self.graph.metric_dependencies(metric);
                deps.sort_by_key(|d| std::cmp::Reverse(d.len()));

                // Two passes so a substituted formula is never re-scanned
                // for shorter dependency names.
                let mut result = expr.clone();
                let mut replacements: Vec<(String, String)> = vec![];
                for (i, dep) in deps.iter().enumerate() {
                    let dep_sql =
                        self.metric_select_sql(dep, prefold, time_dim, depth + 1)?;
                    let marker = format!("\u{1}{}\u{1}", i);
                    let pattern = format!(r"\b{}\b", regex::escape(dep));
                    let re = Regex::new(&pattern).map_err(|_| {
                        SemanticError::UnresolvedField(dep.clone())
                    })?;
                    result = re.replace_all(&result, marker.as_str()).into_owned();
                    replacements.push((marker, format!("({})", dep_sql)));
                }
                for (marker, dep_sql) in replacements {
                    result = result.replace(&marker, &dep_sql);
                }
                result
            }
            MetricKind::Cumulative { measure, window } => {
                let base = self.metric_select_sql(measure, prefold, time_dim, depth + 1)?;
                let time = time_dim.ok_or_else(|| SemanticError::MissingTimeDimension {
                    metric: metric.name.clone(),
                })?;
                let order_col = format!("{}_cte.{}", time.model, time.alias);
                let frame = match window {
                    Some(n) => format!("{} PRECEDING", n.saturating_sub(1)),
                    None => "UNBOUNDED PRECEDING".to_string(),
                };
                format!(
                    "SUM({}) OVER (ORDER BY {} ROWS BETWEEN {} AND CURRENT ROW)",
                    base, order_col, frame
                )
            }
            MetricKind::TimeComparison { base, comparison } => {
                let base_sql = self.metric_select_sql(base, prefold, time_dim, depth + 1)?;
                let time = time_dim.ok_or_else(|| SemanticError::MissingTimeDimension {
                    metric: metric.name.clone(),
                })?;
                let order_col = format!("{}_cte.{}", time.model, time.alias);
                let offset = comparison.lag_offset(time.granularity);
                format!(
                    "{} - LAG({}, {}) OVER (ORDER BY {})",
                    base_sql, base_sql, offset, order_col
                )
            }
            MetricKind::Conversion { .. } => {
                return Err(SemanticError::InvalidModel(format!(
                    "conversion metric {} must be queried alone, without dimensions",
                    metric.name
                )))
            }
        };

        Ok(match &metric.fill_nulls_with {
            Some(value) => format!("COALESCE({}, {})", sql, json_literal(value, self.dialect)),
            None => sql,
        })
    }

    fn leaf_agg_sql(
        &self,
        model: &str,
        name: &str,
        agg: AggregateFunction,
        prefolded: bool,
    ) -> String {
        let q = format!("{}_cte", model);
        let raw = format!("{}.{}_raw", q, name);
        if prefolded {
            match agg {
                // Pre-folded counts are already counts per group; re-folding sums them.
                AggregateFunction::Sum | AggregateFunction::Count => format!("SUM({})", raw),
                AggregateFunction::Min => format!("MIN({})", raw),
                AggregateFunction::Max => format!("MAX({})", raw),
                AggregateFunction::Avg => format!(
                    "SUM({q}.{n}_sum_raw) / NULLIF(SUM({q}.{n}_cnt_raw), 0)",
                    q = q,
                    n = name
                ),
                AggregateFunction::CountDistinct => format!("COUNT(DISTINCT {})", raw),
            }
        } else {
            match agg {
                AggregateFunction::Sum => format!("SUM({})", raw),
                AggregateFunction::Count => format!("COUNT({})", raw),
                AggregateFunction::CountDistinct => format!("COUNT(DISTINCT {})", raw),
                AggregateFunction::Avg => format!("AVG({})", raw),
                AggregateFunction::Min => format!("MIN({})", raw),
                AggregateFunction::Max => format!("MAX({})", raw),
            }
        }
    }

    /// First time dimension in the request, used to order window measures.
    fn query_time_dimension(&self, dims: &[DimPlan]) -> SemanticResult<Option<DimPlan>> {
        for dim in dims {
            if dim.granularity.is_some() {
                return Ok(Some(dim.clone()));
            }
            let model = self.graph.model(&dim.model)?;
            if model.dimension(&dim.field).map(|d| d.is_time()).unwrap_or(false) {
                return Ok(Some(dim.clone()));
            }
        }
        Ok(None)
    }

    /// Resolve an ORDER BY entry to an output alias. A leading `-` sorts
    /// descending.
    fn order_by_item(&self, entry: &str, dims: &[DimPlan], spec: &QuerySpec) -> OrderByExpr {
        let (field, desc) = match entry.strip_prefix('-') {
            Some(rest) => (rest, true),
            None => (entry, false),
        };

        let alias = dims
            .iter()
            .find(|d| d.alias == field || d.field == field)
            .map(|d| d.alias.clone())
            .or_else(|| {
                spec.metrics.iter().find_map(|m| {
                    let tail = m.rsplit_once('.').map(|(_, t)| t).unwrap_or(m);
                    (tail == field || m == field).then(|| tail.to_string())
                })
            })
            .unwrap_or_else(|| field.to_string());

        if desc {
            OrderByExpr::desc(Expr::raw(alias))
        } else {
            OrderByExpr::asc(Expr::raw(alias))
        }
    }

    fn rollup_count_measure(&self, model: &Model, preagg: &PreAggregation) -> Option<String> {
        preagg.measures.iter().find_map(|name| {
            model.metric(name).and_then(|m| match m.kind {
                MetricKind::Simple {
                    agg: AggregateFunction::Count,
                    ..
                } => Some(name.clone()),
                _ => None,
            })
        })
    }
}

/// Participating models in deterministic order: measure owners first (the
/// first one anchors the join tree), then dimension owners.
fn participating_models(leaves: &[LeafMeasure], dims: &[DimPlan]) -> Vec<String> {
    let mut models: Vec<String> = vec![];
    for leaf in leaves {
        if !models.contains(&leaf.model) {
            models.push(leaf.model.clone());
        }
    }
    for dim in dims {
        if !models.contains(&dim.model) {
            models.push(dim.model.clone());
        }
    }
    models
}

fn json_literal(value: &serde_json::Value, dialect: Dialect) -> String {
    match value {
        serde_json::Value::String(s) => dialect.quote_string(s),
        serde_json::Value::Bool(b) => dialect.format_bool(*b).to_string(),
        serde_json::Value::Null => "NULL".to_string(),
        other => other.to_string(),
    }
}
