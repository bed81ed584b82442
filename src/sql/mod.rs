//! SQL construction and serialization.
//!
//! The compiler builds statements out of [`token::Token`] streams wrapped
//! in a structural [`query::Query`] builder; [`dialect::Dialect`] owns the
//! engine-specific formatting decisions.

pub mod dialect;
pub mod expr;
pub mod query;
pub mod test_utils;
pub mod token;

pub use dialect::{AnsiDialect, Dialect, DuckDbDialect, PostgresDialect, SqlDialect};
pub use expr::{BinaryOperator, Expr, Literal, UnaryOperator};
pub use query::{Cte, Join, JoinType, OrderByExpr, Query, SelectExpr, SortDir, TableRef};
pub use token::{Token, TokenStream};
