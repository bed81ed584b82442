//! Rewriting of extended `SEMANTIC` SQL into plain SQL.
//!
//! The extended dialect adds a `SEMANTIC` statement marker, an
//! `AGGREGATE(measure)` call, and `AT (...)` context clauses that widen,
//! pin, or filter the grouping context a measure is recomputed under.

pub mod expand;
pub mod scan;

pub use expand::ContextRewriter;
pub use scan::{scan, ContextCall, ContextModifier, ScanOutput, SetValue};
