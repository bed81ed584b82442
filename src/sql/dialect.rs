//! Dialect abstraction for SQL output.
//!
//! The generator emits dialect-agnostic tokens; everything engine-specific
//! (quoting, literals, date truncation, null-safe comparison) goes through
//! [`SqlDialect`].

/// Engine-specific SQL formatting rules.
pub trait SqlDialect {
    fn name(&self) -> &'static str;

    /// Quote an identifier. ANSI double quotes by default.
    fn quote_identifier(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    /// Quote a string literal, doubling embedded single quotes.
    fn quote_string(&self, s: &str) -> String {
        format!("'{}'", s.replace('\'', "''"))
    }

    fn format_bool(&self, value: bool) -> &'static str {
        if value {
            "TRUE"
        } else {
            "FALSE"
        }
    }

    /// LIMIT/OFFSET clause. Most engines share the ANSI form.
    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        let mut out = String::new();
        if let Some(n) = limit {
            out.push_str(&format!("LIMIT {}", n));
        }
        if let Some(n) = offset {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(&format!("OFFSET {}", n));
        }
        out
    }

    /// Truncate a time expression to a granularity.
    fn date_trunc(&self, granularity: &str, expr: &str) -> String {
        format!("DATE_TRUNC('{}', {})", granularity, expr)
    }

    /// Null-safe equality used for correlated context predicates, so NULL
    /// grouping keys still match their own rows.
    fn null_safe_eq(&self, left: &str, right: &str) -> String {
        format!("{} IS NOT DISTINCT FROM ({})", left, right)
    }
}

/// Plain ANSI SQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnsiDialect;

impl SqlDialect for AnsiDialect {
    fn name(&self) -> &'static str {
        "ansi"
    }
}

/// DuckDB. ANSI-compatible for everything we emit.
#[derive(Debug, Clone, Copy, Default)]
pub struct DuckDbDialect;

impl SqlDialect for DuckDbDialect {
    fn name(&self) -> &'static str {
        "duckdb"
    }
}

/// PostgreSQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl SqlDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }
}

/// The supported output dialects, as a copyable selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    #[default]
    Ansi,
    DuckDb,
    Postgres,
}

impl Dialect {
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::Ansi => &AnsiDialect,
            Dialect::DuckDb => &DuckDbDialect,
            Dialect::Postgres => &PostgresDialect,
        }
    }
}

impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.dialect().quote_identifier(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        self.dialect().quote_string(s)
    }

    fn format_bool(&self, value: bool) -> &'static str {
        self.dialect().format_bool(value)
    }

    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        self.dialect().emit_limit_offset(limit, offset)
    }

    fn date_trunc(&self, granularity: &str, expr: &str) -> String {
        self.dialect().date_trunc(granularity, expr)
    }

    fn null_safe_eq(&self, left: &str, right: &str) -> String {
        self.dialect().null_safe_eq(left, right)
    }
}
