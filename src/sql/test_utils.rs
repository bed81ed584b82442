//! Test-only helpers for checking that generated SQL parses.

use sqlparser::dialect::{Dialect as ParserDialect, DuckDbDialect, GenericDialect, PostgreSqlDialect};
use sqlparser::parser::Parser;

use super::dialect::{Dialect, SqlDialect};

/// Parse generated SQL with the matching sqlparser dialect, panicking with
/// the offending statement on failure.
pub fn validate_sql(sql: &str, dialect: Dialect) {
    let parser_dialect: Box<dyn ParserDialect> = match dialect {
        Dialect::Ansi => Box::new(GenericDialect {}),
        Dialect::DuckDb => Box::new(DuckDbDialect {}),
        Dialect::Postgres => Box::new(PostgreSqlDialect {}),
    };

    if let Err(err) = Parser::parse_sql(parser_dialect.as_ref(), sql) {
        panic!(
            "generated SQL failed to parse ({}): {}\n{}",
            dialect.name(),
            err,
            sql
        );
    }
}
