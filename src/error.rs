//! Error types for the semantic layer.

use thiserror::Error;

/// Every way compilation can fail.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SemanticError {
    #[error("unknown model: {0}")]
    UnknownModel(String),

    #[error("unresolved field reference: {0}")]
    UnresolvedField(String),

    #[error("no join path from {from} to {to}")]
    UnreachableJoin { from: String, to: String },

    #[error("ambiguous context: {0}")]
    AmbiguousContext(String),

    #[error("cannot recompute aggregate under a widened context: {0}")]
    UnsupportedAggregateRecomputation(String),

    #[error("invalid context syntax: {0}")]
    InvalidSyntaxContext(String),

    #[error("metric {metric} needs a time dimension in the query")]
    MissingTimeDimension { metric: String },

    #[error("invalid model: {0}")]
    InvalidModel(String),
}

pub type SemanticResult<T> = Result<T, SemanticError>;
