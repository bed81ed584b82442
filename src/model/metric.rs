//! Metrics - simple and composite measures.

use serde::{Deserialize, Serialize};

use super::TimeGranularity;

/// Aggregation functions for simple metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateFunction {
    Sum,
    Count,
    CountDistinct,
    Avg,
    Min,
    Max,
}

/// Time-comparison flavor: which prior period a metric is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonKind {
    Dod,
    Wow,
    Mom,
    Qoq,
    Yoy,
    PriorPeriod,
}

impl ComparisonKind {
    /// LAG offset in rows, given the time granularity the query groups by.
    ///
    /// With no granularity the data is assumed to sit at a matching grain
    /// (monthly rows for a year-over-year comparison).
    pub fn lag_offset(self, granularity: Option<TimeGranularity>) -> u32 {
        use TimeGranularity::*;
        match self {
            ComparisonKind::Dod | ComparisonKind::PriorPeriod => 1,
            ComparisonKind::Wow => match granularity {
                Some(Day) => 7,
                _ => 1,
            },
            ComparisonKind::Mom => match granularity {
                Some(Day) => 30,
                Some(Week) => 4,
                _ => 1,
            },
            ComparisonKind::Qoq => match granularity {
                Some(Day) => 90,
                Some(Week) => 13,
                Some(Month) => 3,
                _ => 1,
            },
            ComparisonKind::Yoy => match granularity {
                Some(Day) => 365,
                Some(Week) => 52,
                Some(Month) => 12,
                Some(Quarter) => 4,
                Some(Year) | Some(Hour) => 1,
                None => 12,
            },
        }
    }
}

/// Closed set of metric kinds.
///
/// The SQL generator matches this exhaustively, so adding a kind is a
/// compile-time decision rather than a runtime fallthrough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricKind {
    /// A single aggregation over an expression. `expr` defaults to a column
    /// named after the metric.
    Simple {
        agg: AggregateFunction,
        #[serde(default)]
        expr: Option<String>,
    },
    /// `numerator / NULLIF(denominator, 0)`. Both are qualified
    /// `model.measure` references.
    Ratio { numerator: String, denominator: String },
    /// A formula over other metric names.
    Derived { expr: String },
    /// Running total of a base measure over the query's time dimension.
    /// `window` limits the frame to the last N periods when set.
    Cumulative {
        measure: String,
        #[serde(default)]
        window: Option<u32>,
    },
    /// Base measure minus its value one comparison period earlier.
    TimeComparison {
        base: String,
        comparison: ComparisonKind,
    },
    /// Share of entities with a base event that reach the conversion
    /// event within the window. Compiled as a funnel self-join on the
    /// owning model's event stream.
    Conversion {
        entity: String,
        base_event: String,
        conversion_event: String,
        /// Interval text like `7 days`; defaults to seven days.
        #[serde(default)]
        window: Option<String>,
    },
}

/// A measure owned by a model, or a graph-level (cross-model) metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    #[serde(flatten)]
    pub kind: MetricKind,
    /// Metric-level predicates applied to the underlying relation before
    /// aggregation. `{model}` is substituted with the owning relation.
    #[serde(default)]
    pub filters: Vec<String>,
    /// Wraps the final expression in COALESCE when set.
    #[serde(default)]
    pub fill_nulls_with: Option<serde_json::Value>,
}

impl Metric {
    pub fn simple(name: &str, agg: AggregateFunction) -> Self {
        Self {
            name: name.into(),
            kind: MetricKind::Simple { agg, expr: None },
            filters: vec![],
            fill_nulls_with: None,
        }
    }

    pub fn conversion(name: &str, entity: &str, base_event: &str, conversion_event: &str) -> Self {
        Self {
            name: name.into(),
            kind: MetricKind::Conversion {
                entity: entity.into(),
                base_event: base_event.into(),
                conversion_event: conversion_event.into(),
                window: None,
            },
            filters: vec![],
            fill_nulls_with: None,
        }
    }

    pub fn with_conversion_window(mut self, window: &str) -> Self {
        if let MetricKind::Conversion { window: w, .. } = &mut self.kind {
            *w = Some(window.into());
        }
        self
    }

    pub fn with_expr(mut self, expr: &str) -> Self {
        if let MetricKind::Simple { expr: e, .. } = &mut self.kind {
            *e = Some(expr.into());
        }
        self
    }

    pub fn with_filter(mut self, filter: &str) -> Self {
        self.filters.push(filter.into());
        self
    }

    /// Whether this metric compiles to a window function.
    pub fn is_windowed(&self) -> bool {
        match &self.kind {
            MetricKind::Cumulative { .. } | MetricKind::TimeComparison { .. } => true,
            MetricKind::Simple { expr, .. } => expr
                .as_deref()
                .map(|e| e.to_ascii_uppercase().contains(" OVER"))
                .unwrap_or(false),
            _ => false,
        }
    }
}
