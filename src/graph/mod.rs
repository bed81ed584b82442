//! The entity graph - the whole modeled universe.
//!
//! An [`EntityGraph`] holds every model, the graph-level metrics, and a
//! directed relationship graph used for join-path resolution. It is built
//! once by a translator and treated as read-only afterwards; every
//! compilation entry point borrows it immutably, so concurrent compilations
//! against the same graph need no synchronization.

pub mod path;

pub use path::{JoinPath, JoinStep};

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use petgraph::graph::{DiGraph, NodeIndex};
use regex::Regex;

use crate::error::{SemanticError, SemanticResult};
use crate::model::{Cardinality, Metric, MetricKind, Model, Relationship, TimeGranularity};

/// Node payload: one modeled entity.
#[derive(Debug, Clone)]
pub struct EntityNode {
    pub name: String,
}

/// Edge payload: join columns and cardinality for one traversal direction.
#[derive(Debug, Clone)]
pub struct RelationshipEdge {
    pub from_column: String,
    pub to_column: String,
    pub cardinality: Cardinality,
}

/// A parsed `model.field` reference, optionally carrying a granularity
/// suffix (`model.created_at__month`).
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRef {
    pub model: String,
    pub field: String,
    pub granularity: Option<TimeGranularity>,
}

static QUALIFIED_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z_]\w*)\.([A-Za-z_]\w*?)(?:__([a-z]+))?$").unwrap());

/// The read-only compilation universe.
#[derive(Debug, Default)]
pub struct EntityGraph {
    models: HashMap<String, Model>,
    metrics: HashMap<String, Metric>,
    pub(crate) entity_graph: DiGraph<EntityNode, RelationshipEdge>,
    pub(crate) node_indices: HashMap<String, NodeIndex>,
    linked: HashSet<(String, String)>,
}

impl EntityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a model. Relationship edges to already-present targets are wired
    /// immediately; edges to models added later are wired when the target
    /// arrives. A target that never arrives surfaces as an unreachable join
    /// at query time.
    pub fn add_model(&mut self, model: Model) -> SemanticResult<()> {
        model.validate()?;
        if self.models.contains_key(&model.name) {
            return Err(SemanticError::InvalidModel(format!(
                "duplicate model {}",
                model.name
            )));
        }

        let idx = self.entity_graph.add_node(EntityNode {
            name: model.name.clone(),
        });
        self.node_indices.insert(model.name.clone(), idx);
        self.models.insert(model.name.clone(), model);
        self.link_pending();
        Ok(())
    }

    /// Add a graph-level (cross-model) metric.
    pub fn add_metric(&mut self, metric: Metric) -> SemanticResult<()> {
        if self.metrics.contains_key(&metric.name) {
            return Err(SemanticError::InvalidModel(format!(
                "duplicate graph-level metric {}",
                metric.name
            )));
        }
        self.metrics.insert(metric.name.clone(), metric);
        Ok(())
    }

    /// Wire relationship edges whose endpoints are both present.
    fn link_pending(&mut self) {
        let mut pending = vec![];
        for (owner_name, owner) in &self.models {
            for rel in &owner.relationships {
                let key = (owner_name.clone(), rel.name.clone());
                if self.linked.contains(&key) {
                    continue;
                }
                let Some(target) = self.models.get(&rel.name) else {
                    continue;
                };
                let (from_column, to_column) = join_columns(owner, rel, target);
                pending.push((key, from_column, to_column, rel.cardinality));
            }
        }

        for ((owner, target), from_column, to_column, cardinality) in pending {
            let from_idx = self.node_indices[&owner];
            let to_idx = self.node_indices[&target];
            self.entity_graph.add_edge(
                from_idx,
                to_idx,
                RelationshipEdge {
                    from_column: from_column.clone(),
                    to_column: to_column.clone(),
                    cardinality,
                },
            );
            // Reverse edge so paths traverse relationships in either direction.
            self.entity_graph.add_edge(
                to_idx,
                from_idx,
                RelationshipEdge {
                    from_column: to_column,
                    to_column: from_column,
                    cardinality: cardinality.inverse(),
                },
            );
            self.linked.insert((owner, target));
        }
    }

    pub fn get_model(&self, name: &str) -> Option<&Model> {
        self.models.get(name)
    }

    pub fn model(&self, name: &str) -> SemanticResult<&Model> {
        self.models
            .get(name)
            .ok_or_else(|| SemanticError::UnknownModel(name.into()))
    }

    pub fn models(&self) -> impl Iterator<Item = &Model> {
        self.models.values()
    }

    pub fn graph_metric(&self, name: &str) -> Option<&Metric> {
        self.metrics.get(name)
    }

    /// Parse a field reference: `model.field`, `model.field__granularity`,
    /// or a bare `field` resolved by searching every model.
    pub fn parse_reference(&self, raw: &str) -> SemanticResult<FieldRef> {
        if let Some(caps) = QUALIFIED_REF.captures(raw) {
            let model = &caps[1];
            let field = &caps[2];
            let granularity = match caps.get(3) {
                Some(g) => Some(TimeGranularity::parse(g.as_str()).ok_or_else(|| {
                    SemanticError::UnresolvedField(format!(
                        "{} has an unrecognized granularity suffix",
                        raw
                    ))
                })?),
                None => None,
            };
            if self.models.contains_key(model) {
                return Ok(FieldRef {
                    model: model.into(),
                    field: field.into(),
                    granularity,
                });
            }
        }

        // Bare reference: search all models for a unique owner.
        let (name, granularity) = match raw.rsplit_once("__") {
            Some((base, suffix)) => match TimeGranularity::parse(suffix) {
                Some(g) => (base, Some(g)),
                None => (raw, None),
            },
            None => (raw, None),
        };
        for model in self.models.values() {
            if model.dimension(name).is_some() || model.metric(name).is_some() {
                return Ok(FieldRef {
                    model: model.name.clone(),
                    field: name.into(),
                    granularity,
                });
            }
        }
        Err(SemanticError::UnresolvedField(raw.into()))
    }

    /// Resolve a metric reference to its owning model (if any) and metric.
    ///
    /// Accepts `model.metric`, a graph-level metric name, or a bare model
    /// metric name.
    pub fn resolve_metric(&self, reference: &str) -> SemanticResult<(Option<&str>, &Metric)> {
        if let Some((model_name, metric_name)) = reference.split_once('.') {
            if let Some(model) = self.models.get(model_name) {
                if let Some(metric) = model.metric(metric_name) {
                    return Ok((Some(model.name.as_str()), metric));
                }
            }
            return Err(SemanticError::UnresolvedField(reference.into()));
        }
        if let Some(metric) = self.metrics.get(reference) {
            return Ok((None, metric));
        }
        for model in self.models.values() {
            if let Some(metric) = model.metric(reference) {
                return Ok((Some(model.name.as_str()), metric));
            }
        }
        Err(SemanticError::UnresolvedField(reference.into()))
    }

    /// Metric references a composite metric depends on, discovered by
    /// scanning its formula for known metric names.
    pub fn metric_dependencies(&self, metric: &Metric) -> Vec<String> {
        match &metric.kind {
            MetricKind::Simple { .. } => vec![],
            MetricKind::Ratio {
                numerator,
                denominator,
            } => vec![numerator.clone(), denominator.clone()],
            MetricKind::Cumulative { measure, .. } => vec![measure.clone()],
            MetricKind::TimeComparison { base, .. } => vec![base.clone()],
            MetricKind::Conversion { .. } => vec![],
            MetricKind::Derived { expr } => {
                let mut candidates: Vec<String> = vec![];
                for model in self.models.values() {
                    for m in &model.metrics {
                        candidates.push(format!("{}.{}", model.name, m.name));
                        candidates.push(m.name.clone());
                    }
                }
                for name in self.metrics.keys() {
                    if name != &metric.name {
                        candidates.push(name.clone());
                    }
                }
                // Longer names first so `revenue_net` is not shadowed by `revenue`.
                candidates.sort_by_key(|c| std::cmp::Reverse(c.len()));
                candidates.dedup();

                let mut found = vec![];
                let mut masked = expr.clone();
                for candidate in candidates {
                    if candidate == metric.name {
                        continue;
                    }
                    let pattern = format!(r"\b{}\b", regex::escape(&candidate));
                    let re = match Regex::new(&pattern) {
                        Ok(re) => re,
                        Err(_) => continue,
                    };
                    if re.is_match(&masked) {
                        masked = re.replace_all(&masked, " ").into_owned();
                        found.push(candidate);
                    }
                }
                found
            }
        }
    }
}

/// Derive the physical join columns for an edge from the declared
/// cardinality: the foreign key always lives on the "many" side.
fn join_columns(owner: &Model, rel: &Relationship, target: &Model) -> (String, String) {
    match rel.cardinality {
        Cardinality::ManyToOne | Cardinality::ManyToMany => (
            rel.foreign_key
                .clone()
                .unwrap_or_else(|| format!("{}_id", rel.name)),
            rel.primary_key
                .clone()
                .unwrap_or_else(|| target.key_column().to_string()),
        ),
        Cardinality::OneToMany => (
            rel.primary_key
                .clone()
                .unwrap_or_else(|| owner.key_column().to_string()),
            rel.foreign_key
                .clone()
                .unwrap_or_else(|| format!("{}_id", owner.name)),
        ),
        Cardinality::OneToOne => (
            rel.primary_key
                .clone()
                .unwrap_or_else(|| owner.key_column().to_string()),
            rel.foreign_key
                .clone()
                .unwrap_or_else(|| target.key_column().to_string()),
        ),
    }
}
