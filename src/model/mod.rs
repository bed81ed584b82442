//! Model types - the entities a semantic query is expressed against.
//!
//! A [`Model`] describes one fact/dimension table (or derived relation)
//! together with its dimensions, metrics, relationships, and declared
//! rollups. Models are produced by external translators, placed in an
//! [`crate::graph::EntityGraph`], and never mutated during compilation.

pub mod dimension;
pub mod metric;
pub mod preagg;
pub mod relationship;

pub use dimension::{Dimension, DimensionKind, TimeGranularity};
pub use metric::{AggregateFunction, ComparisonKind, Metric, MetricKind};
pub use preagg::PreAggregation;
pub use relationship::{Cardinality, Relationship};

use serde::{Deserialize, Serialize};

use crate::error::{SemanticError, SemanticResult};

/// One modeled table-like entity.
///
/// Exactly one of `table` and `sql` must be set: a physical table name, or
/// a defining SQL query for a derived relation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Model {
    pub name: String,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub sql: Option<String>,
    /// Single or composite primary key. Defaults to `id` when empty.
    #[serde(default)]
    pub primary_key: Vec<String>,
    #[serde(default)]
    pub dimensions: Vec<Dimension>,
    #[serde(default)]
    pub metrics: Vec<Metric>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    #[serde(default)]
    pub pre_aggregations: Vec<PreAggregation>,
}

impl Model {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_table(mut self, table: &str) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn with_sql(mut self, sql: &str) -> Self {
        self.sql = Some(sql.into());
        self
    }

    pub fn with_primary_key(mut self, key: &str) -> Self {
        self.primary_key.push(key.into());
        self
    }

    pub fn with_dimension(mut self, dimension: Dimension) -> Self {
        self.dimensions.push(dimension);
        self
    }

    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metrics.push(metric);
        self
    }

    pub fn with_relationship(mut self, relationship: Relationship) -> Self {
        self.relationships.push(relationship);
        self
    }

    pub fn with_pre_aggregation(mut self, preagg: PreAggregation) -> Self {
        self.pre_aggregations.push(preagg);
        self
    }

    pub fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    pub fn metric(&self, name: &str) -> Option<&Metric> {
        self.metrics.iter().find(|m| m.name == name)
    }

    /// First primary key column, falling back to the `id` convention.
    pub fn key_column(&self) -> &str {
        self.primary_key
            .first()
            .map(String::as_str)
            .unwrap_or("id")
    }

    /// Structural validation run when the model enters a graph.
    pub fn validate(&self) -> SemanticResult<()> {
        if self.name.is_empty() {
            return Err(SemanticError::InvalidModel("model name is empty".into()));
        }
        match (&self.table, &self.sql) {
            (Some(_), Some(_)) => {
                return Err(SemanticError::InvalidModel(format!(
                    "model {} declares both a table and a defining query",
                    self.name
                )))
            }
            (None, None) => {
                return Err(SemanticError::InvalidModel(format!(
                    "model {} declares neither a table nor a defining query",
                    self.name
                )))
            }
            _ => {}
        }

        let mut seen = std::collections::HashSet::new();
        for name in self
            .dimensions
            .iter()
            .map(|d| &d.name)
            .chain(self.metrics.iter().map(|m| &m.name))
        {
            if !seen.insert(name) {
                return Err(SemanticError::InvalidModel(format!(
                    "duplicate field {} on model {}",
                    name, self.name
                )));
            }
        }

        for metric in &self.metrics {
            if let MetricKind::Ratio {
                numerator,
                denominator,
            } = &metric.kind
            {
                if numerator.is_empty() || denominator.is_empty() {
                    return Err(SemanticError::InvalidModel(format!(
                        "ratio metric {} is missing a numerator or denominator",
                        metric.name
                    )));
                }
            }
        }

        Ok(())
    }
}
