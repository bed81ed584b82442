//! Pre-aggregations - declared rollups over a model.

use serde::{Deserialize, Serialize};

use super::TimeGranularity;

/// A declared rollup: a precomputed summary table carrying a subset of a
/// model's measures at a coarser grain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreAggregation {
    pub name: String,
    #[serde(default)]
    pub measures: Vec<String>,
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default)]
    pub time_dimension: Option<String>,
    #[serde(default)]
    pub granularity: Option<TimeGranularity>,
    #[serde(default)]
    pub partition_granularity: Option<TimeGranularity>,
}

impl PreAggregation {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            measures: vec![],
            dimensions: vec![],
            time_dimension: None,
            granularity: None,
            partition_granularity: None,
        }
    }

    pub fn with_measures(mut self, measures: &[&str]) -> Self {
        self.measures = measures.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_dimensions(mut self, dimensions: &[&str]) -> Self {
        self.dimensions = dimensions.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_time_dimension(mut self, dim: &str, granularity: TimeGranularity) -> Self {
        self.time_dimension = Some(dim.into());
        self.granularity = Some(granularity);
        self
    }

    /// Physical table name of the rollup.
    pub fn table_name(&self, model: &str) -> String {
        format!("{}_preagg_{}", model, self.name)
    }

    /// Stored column name for the time dimension at the rollup's grain.
    pub fn time_column(&self) -> Option<String> {
        match (&self.time_dimension, self.granularity) {
            (Some(dim), Some(gran)) => Some(format!("{}__{}", dim, gran.as_str())),
            (Some(dim), None) => Some(dim.clone()),
            _ => None,
        }
    }
}
