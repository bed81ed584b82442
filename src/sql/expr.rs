//! Expression AST for generated SQL.
//!
//! A small, compiler-owned expression tree. Anything the compiler builds
//! structurally uses typed variants; measure and filter SQL supplied by the
//! model author passes through [`Expr::Raw`].

use super::dialect::Dialect;
use super::token::{Token, TokenStream};

/// Binary operators the compiler emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,
    And,
    Or,
    Plus,
    Minus,
    Mul,
    Div,
}

impl BinaryOperator {
    fn token(&self) -> Token {
        match self {
            BinaryOperator::Eq => Token::Eq,
            BinaryOperator::Ne => Token::Ne,
            BinaryOperator::Lt => Token::Lt,
            BinaryOperator::Gt => Token::Gt,
            BinaryOperator::Lte => Token::Lte,
            BinaryOperator::Gte => Token::Gte,
            BinaryOperator::And => Token::And,
            BinaryOperator::Or => Token::Or,
            BinaryOperator::Plus => Token::Plus,
            BinaryOperator::Minus => Token::Minus,
            BinaryOperator::Mul => Token::Mul,
            BinaryOperator::Div => Token::Div,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Neg,
}

/// Literal values.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
    Null,
}

/// A SQL expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Optionally qualified column reference.
    Column {
        table: Option<String>,
        column: String,
    },
    Literal(Literal),
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expr>,
    },
    Function {
        name: String,
        distinct: bool,
        args: Vec<Expr>,
    },
    Star,
    Paren(Box<Expr>),
    /// Trusted SQL text emitted verbatim.
    Raw(String),
}

impl Expr {
    pub fn col(column: &str) -> Self {
        Expr::Column {
            table: None,
            column: column.into(),
        }
    }

    pub fn table_col(table: &str, column: &str) -> Self {
        Expr::Column {
            table: Some(table.into()),
            column: column.into(),
        }
    }

    pub fn lit_int(n: i64) -> Self {
        Expr::Literal(Literal::Int(n))
    }

    pub fn lit_str(s: &str) -> Self {
        Expr::Literal(Literal::String(s.into()))
    }

    pub fn raw(sql: impl Into<String>) -> Self {
        Expr::Raw(sql.into())
    }

    pub fn func(name: &str, args: Vec<Expr>) -> Self {
        Expr::Function {
            name: name.into(),
            distinct: false,
            args,
        }
    }

    pub fn sum(arg: Expr) -> Self {
        Expr::func("SUM", vec![arg])
    }

    pub fn count_star() -> Self {
        Expr::func("COUNT", vec![Expr::Star])
    }

    pub fn count_distinct(arg: Expr) -> Self {
        Expr::Function {
            name: "COUNT".into(),
            distinct: true,
            args: vec![arg],
        }
    }

    pub fn eq(self, other: Expr) -> Self {
        Expr::BinaryOp {
            left: Box::new(self),
            op: BinaryOperator::Eq,
            right: Box::new(other),
        }
    }

    pub fn and(self, other: Expr) -> Self {
        Expr::BinaryOp {
            left: Box::new(self),
            op: BinaryOperator::And,
            right: Box::new(other),
        }
    }

    pub fn to_tokens(&self, out: &mut TokenStream) {
        match self {
            Expr::Column { table, column } => {
                if let Some(t) = table {
                    out.push(Token::Raw(t.clone())).push(Token::Dot);
                }
                out.push(Token::Raw(column.clone()));
            }
            Expr::Literal(lit) => match lit {
                Literal::Int(n) => {
                    out.push(Token::LitInt(*n));
                }
                Literal::Float(f) => {
                    out.push(Token::LitFloat(*f));
                }
                Literal::String(s) => {
                    out.push(Token::LitString(s.clone()));
                }
                Literal::Bool(b) => {
                    out.push(Token::LitBool(*b));
                }
                Literal::Null => {
                    out.push(Token::LitNull);
                }
            },
            Expr::BinaryOp { left, op, right } => {
                left.to_tokens(out);
                out.space().push(op.token()).space();
                right.to_tokens(out);
            }
            Expr::UnaryOp { op, operand } => {
                match op {
                    UnaryOperator::Not => {
                        out.push(Token::Not).space();
                    }
                    UnaryOperator::Neg => {
                        out.push(Token::Minus);
                    }
                }
                operand.to_tokens(out);
            }
            Expr::Function {
                name,
                distinct,
                args,
            } => {
                out.push(Token::FunctionName(name.clone())).lparen();
                if *distinct {
                    out.push(Token::Distinct).space();
                }
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        out.comma().space();
                    }
                    arg.to_tokens(out);
                }
                out.rparen();
            }
            Expr::Star => {
                out.push(Token::Star);
            }
            Expr::Paren(inner) => {
                out.lparen();
                inner.to_tokens(out);
                out.rparen();
            }
            Expr::Raw(sql) => {
                out.push(Token::Raw(sql.clone()));
            }
        }
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        let mut ts = TokenStream::new();
        self.to_tokens(&mut ts);
        ts.serialize(dialect)
    }
}
