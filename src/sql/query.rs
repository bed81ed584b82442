//! SELECT statement builder.
//!
//! A structural representation of the statements the compiler emits: CTEs,
//! a projection, joins, filters, grouping, ordering, and pagination. The
//! builder produces tokens; [`Dialect`] turns tokens into text.

use std::fmt;

use super::dialect::{Dialect, SqlDialect};
use super::expr::Expr;
use super::token::{Token, TokenStream};

/// A projected expression with an optional alias.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectExpr {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl SelectExpr {
    pub fn new(expr: Expr) -> Self {
        Self { expr, alias: None }
    }

    pub fn aliased(expr: Expr, alias: &str) -> Self {
        Self {
            expr,
            alias: Some(alias.into()),
        }
    }

    fn to_tokens(&self, out: &mut TokenStream) {
        self.expr.to_tokens(out);
        if let Some(alias) = &self.alias {
            out.space().push(Token::As).space().push(Token::Raw(alias.clone()));
        }
    }
}

/// A relation in the FROM clause: a named table or an inline derived query.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    pub name: String,
    pub alias: Option<String>,
    /// When set, the relation is `({derived_sql}) AS {alias}` and `name`
    /// is ignored for emission.
    pub derived_sql: Option<String>,
}

impl TableRef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            alias: None,
            derived_sql: None,
        }
    }

    pub fn aliased(name: &str, alias: &str) -> Self {
        Self {
            name: name.into(),
            alias: Some(alias.into()),
            derived_sql: None,
        }
    }

    pub fn derived(sql: &str, alias: &str) -> Self {
        Self {
            name: String::new(),
            alias: Some(alias.into()),
            derived_sql: Some(sql.into()),
        }
    }

    /// Name the relation is referenced by in column qualifiers.
    pub fn reference_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    fn to_tokens(&self, out: &mut TokenStream) {
        match &self.derived_sql {
            Some(sql) => {
                out.lparen().push(Token::Raw(sql.clone())).rparen();
            }
            None => {
                out.push(Token::Raw(self.name.clone()));
            }
        }
        if let Some(alias) = &self.alias {
            out.space().push(Token::As).space().push(Token::Raw(alias.clone()));
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinType {
    #[default]
    Inner,
    Left,
}

/// One JOIN clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub join_type: JoinType,
    pub table: TableRef,
    pub on: Expr,
}

impl Join {
    fn to_tokens(&self, out: &mut TokenStream) {
        match self.join_type {
            JoinType::Inner => {
                out.push(Token::Inner).space();
            }
            JoinType::Left => {
                out.push(Token::Left).space();
            }
        }
        out.push(Token::Join).space();
        self.table.to_tokens(out);
        out.space().push(Token::On).space();
        self.on.to_tokens(out);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

/// ORDER BY element.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByExpr {
    pub expr: Expr,
    pub dir: SortDir,
}

impl OrderByExpr {
    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            dir: SortDir::Asc,
        }
    }

    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            dir: SortDir::Desc,
        }
    }
}

/// A named common table expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Cte {
    pub name: String,
    pub query: Query,
}

/// A SELECT statement under construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub ctes: Vec<Cte>,
    pub projection: Vec<SelectExpr>,
    pub from: Option<TableRef>,
    pub joins: Vec<Join>,
    pub filters: Vec<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Vec<Expr>,
    pub order_by: Vec<OrderByExpr>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cte(mut self, name: &str, query: Query) -> Self {
        self.ctes.push(Cte {
            name: name.into(),
            query,
        });
        self
    }

    pub fn select(mut self, item: SelectExpr) -> Self {
        self.projection.push(item);
        self
    }

    pub fn from(mut self, table: TableRef) -> Self {
        self.from = Some(table);
        self
    }

    pub fn join(mut self, table: TableRef, on: Expr) -> Self {
        self.joins.push(Join {
            join_type: JoinType::Inner,
            table,
            on,
        });
        self
    }

    pub fn left_join(mut self, table: TableRef, on: Expr) -> Self {
        self.joins.push(Join {
            join_type: JoinType::Left,
            table,
            on,
        });
        self
    }

    pub fn filter(mut self, predicate: Expr) -> Self {
        self.filters.push(predicate);
        self
    }

    pub fn group_by(mut self, expr: Expr) -> Self {
        self.group_by.push(expr);
        self
    }

    pub fn having(mut self, predicate: Expr) -> Self {
        self.having.push(predicate);
        self
    }

    pub fn order_by(mut self, item: OrderByExpr) -> Self {
        self.order_by.push(item);
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    /// Serialize the body (no CTE prefix) into the stream.
    fn body_to_tokens(&self, out: &mut TokenStream, dialect: Dialect) {
        out.push(Token::Select);
        for (i, item) in self.projection.iter().enumerate() {
            if i > 0 {
                out.comma();
            }
            out.newline().indent(1);
            item.to_tokens(out);
        }

        if let Some(from) = &self.from {
            out.newline().push(Token::From).space();
            from.to_tokens(out);
        }

        for join in &self.joins {
            out.newline();
            join.to_tokens(out);
        }

        if !self.filters.is_empty() {
            out.newline().push(Token::Where).space();
            for (i, pred) in self.filters.iter().enumerate() {
                if i > 0 {
                    out.space().push(Token::And).space();
                }
                pred.to_tokens(out);
            }
        }

        if !self.group_by.is_empty() {
            out.newline().push(Token::GroupBy).space();
            for (i, expr) in self.group_by.iter().enumerate() {
                if i > 0 {
                    out.comma().space();
                }
                expr.to_tokens(out);
            }
        }

        if !self.having.is_empty() {
            out.newline().push(Token::Having).space();
            for (i, pred) in self.having.iter().enumerate() {
                if i > 0 {
                    out.space().push(Token::And).space();
                }
                pred.to_tokens(out);
            }
        }

        if !self.order_by.is_empty() {
            out.newline().push(Token::OrderBy).space();
            for (i, item) in self.order_by.iter().enumerate() {
                if i > 0 {
                    out.comma().space();
                }
                item.expr.to_tokens(out);
                if item.dir == SortDir::Desc {
                    out.space().push(Token::Desc);
                }
            }
        }

        if self.limit.is_some() || self.offset.is_some() {
            let clause = dialect.emit_limit_offset(self.limit, self.offset);
            out.newline().push(Token::Raw(clause));
        }
    }

    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut out = TokenStream::new();

        if !self.ctes.is_empty() {
            out.push(Token::With).space();
            for (i, cte) in self.ctes.iter().enumerate() {
                if i > 0 {
                    out.comma().newline();
                }
                out.push(Token::Raw(cte.name.clone()))
                    .space()
                    .push(Token::As)
                    .space()
                    .lparen()
                    .newline();
                cte.query.body_to_tokens(&mut out, dialect);
                out.newline().rparen();
            }
            out.newline();
        }

        self.body_to_tokens(&mut out, dialect);
        out
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens_for_dialect(dialect).serialize(dialect)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql(Dialect::Ansi))
    }
}
