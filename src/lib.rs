//! Strata - a semantic layer compiler.
//!
//! Strata turns a declarative model of entities, dimensions, metrics, and
//! relationships into executable SQL. It resolves join paths over the
//! entity graph, compiles metric queries into CTE-structured statements,
//! routes eligible queries to declared rollup tables, and rewrites an
//! extended SQL dialect (`SEMANTIC` / `AGGREGATE(...)` / `AT (...)`) into
//! plain SQL with correlated subqueries.
//!
//! # Example
//!
//! ```
//! use strata::{
//!     AggregateFunction, Dimension, DimensionKind, EntityGraph, Metric, Model, QuerySpec,
//!     SqlGenerator,
//! };
//!
//! let mut graph = EntityGraph::new();
//! graph
//!     .add_model(
//!         Model::new("orders")
//!             .with_table("orders")
//!             .with_dimension(Dimension::new("region", DimensionKind::Categorical))
//!             .with_metric(Metric::simple("revenue", AggregateFunction::Sum).with_expr("amount")),
//!     )
//!     .unwrap();
//!
//! let sql = SqlGenerator::new(&graph)
//!     .generate(&QuerySpec::new().metric("orders.revenue").dimension("orders.region"))
//!     .unwrap();
//! assert!(sql.contains("SUM(orders_cte.revenue_raw)"));
//! ```

pub mod compile;
pub mod error;
pub mod graph;
pub mod model;
pub mod rewrite;
pub mod sql;

pub use compile::{find_matching_preagg, QuerySpec, SqlGenerator};
pub use error::{SemanticError, SemanticResult};
pub use graph::{EntityGraph, FieldRef, JoinPath, JoinStep};
pub use model::{
    AggregateFunction, Cardinality, ComparisonKind, Dimension, DimensionKind, Metric, MetricKind,
    Model, PreAggregation, Relationship, TimeGranularity,
};
pub use rewrite::ContextRewriter;
pub use sql::Dialect;
