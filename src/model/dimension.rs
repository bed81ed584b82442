//! Dimensions - groupable attributes of a model.

use serde::{Deserialize, Serialize};

/// Kind of a dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionKind {
    #[default]
    Categorical,
    Numeric,
    Boolean,
    Time,
}

/// Time truncation levels, ordered finest to coarsest.
///
/// The derived `Ord` makes a coarser granularity compare greater, which is
/// what rollup compatibility checks rely on: a query at granularity `g`
/// can be answered by a rollup stored at `g` or finer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeGranularity {
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl TimeGranularity {
    /// Numeric level with the finest granularity highest (hour = 6, year = 1).
    pub fn level(self) -> i32 {
        match self {
            TimeGranularity::Hour => 6,
            TimeGranularity::Day => 5,
            TimeGranularity::Week => 4,
            TimeGranularity::Month => 3,
            TimeGranularity::Quarter => 2,
            TimeGranularity::Year => 1,
        }
    }

    /// Distance in levels between two granularities.
    pub fn distance(self, other: TimeGranularity) -> i32 {
        (self.level() - other.level()).abs()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimeGranularity::Hour => "hour",
            TimeGranularity::Day => "day",
            TimeGranularity::Week => "week",
            TimeGranularity::Month => "month",
            TimeGranularity::Quarter => "quarter",
            TimeGranularity::Year => "year",
        }
    }

    /// Parse a granularity suffix. Returns `None` for anything outside the
    /// fixed set.
    pub fn parse(s: &str) -> Option<TimeGranularity> {
        match s {
            "hour" => Some(TimeGranularity::Hour),
            "day" => Some(TimeGranularity::Day),
            "week" => Some(TimeGranularity::Week),
            "month" => Some(TimeGranularity::Month),
            "quarter" => Some(TimeGranularity::Quarter),
            "year" => Some(TimeGranularity::Year),
            _ => None,
        }
    }
}

/// A groupable attribute owned by exactly one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    #[serde(default)]
    pub kind: DimensionKind,
    /// SQL expression template. Defaults to a column named after the
    /// dimension when absent.
    #[serde(default)]
    pub expr: Option<String>,
    /// Native granularity of the stored column. Only meaningful for
    /// time dimensions.
    #[serde(default)]
    pub granularity: Option<TimeGranularity>,
}

impl Dimension {
    pub fn new(name: &str, kind: DimensionKind) -> Self {
        Self {
            name: name.into(),
            kind,
            expr: None,
            granularity: None,
        }
    }

    pub fn with_expr(mut self, expr: &str) -> Self {
        self.expr = Some(expr.into());
        self
    }

    pub fn with_granularity(mut self, granularity: TimeGranularity) -> Self {
        self.granularity = Some(granularity);
        self
    }

    /// The SQL expression backing this dimension.
    pub fn sql_expr(&self) -> &str {
        self.expr.as_deref().unwrap_or(&self.name)
    }

    pub fn is_time(&self) -> bool {
        self.kind == DimensionKind::Time
    }
}
