//! Lexical pass over extended SQL.
//!
//! Finds `SEMANTIC` prefixes, `AGGREGATE(...)` calls, and bare
//! `measure AT (...)` references, replacing each call with an opaque
//! placeholder identifier so the remaining text is plain SQL a parser
//! accepts. Modifier lists inside `AT (...)` are parsed here; expansion
//! happens in [`super::expand`].

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{SemanticError, SemanticResult};

/// Value side of a `SET` modifier.
#[derive(Debug, Clone, PartialEq)]
pub enum SetValue {
    /// `SET region = 'emea'` or `SET year = CURRENT year - 1`.
    Expr(String),
    /// `SET region IN ('emea', 'apac')`.
    In(Vec<String>),
}

/// One modifier inside an `AT (...)` clause.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextModifier {
    /// `ALL` widens away every grouping (grand total) when the list is
    /// empty, or just the named dimensions.
    All(Vec<String>),
    Set { dim: String, value: SetValue },
    Where(String),
    Visible,
}

/// One extracted context call, wrapped (`AGGREGATE(x)`) or bare
/// (`x AT (...)`).
#[derive(Debug, Clone, PartialEq)]
pub struct ContextCall {
    pub placeholder: String,
    /// Measure reference text inside the call.
    pub arg: String,
    /// Model qualifier written before `AGGREGATE`, when present.
    pub qualifier: Option<String>,
    pub wrapped: bool,
    /// One modifier list per chained `AT (...)` clause, outermost first.
    pub modifiers: Vec<Vec<ContextModifier>>,
}

/// Result of scanning: placeholder-substituted SQL plus the calls.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOutput {
    pub sql: String,
    pub is_semantic: bool,
    pub calls: Vec<ContextCall>,
}

static SEMANTIC_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*SEMANTIC\b").unwrap());
static AGGREGATE_CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:([A-Za-z_]\w*)\s*\.\s*)?AGGREGATE\s*\(").unwrap());
static AT_CLAUSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*AT\s*\(").unwrap());
static BARE_AT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b([A-Za-z_]\w*(?:\s*\.\s*[A-Za-z_]\w*)?)\s+AT\s*\(").unwrap()
});

/// Scan extended SQL, stripping the dialect extensions out of the text.
pub fn scan(input: &str) -> SemanticResult<ScanOutput> {
    let mut sql = input.to_string();

    let is_semantic = SEMANTIC_PREFIX.is_match(&sql);
    if is_semantic {
        sql = SEMANTIC_PREFIX.replace(&sql, "").into_owned();
    }

    let mut calls = vec![];

    // AGGREGATE(...) calls, with optional chained AT clauses.
    loop {
        let Some(caps) = AGGREGATE_CALL.captures(&sql) else {
            break;
        };
        let whole = caps.get(0).ok_or_else(|| {
            SemanticError::InvalidSyntaxContext("malformed AGGREGATE call".into())
        })?;
        let qualifier = caps.get(1).map(|m| m.as_str().to_string());
        let open = whole.end() - 1;
        let close = matching_paren(&sql, open)?;
        let arg = sql[open + 1..close].trim().to_string();

        let (modifiers, end) = parse_at_chain(&sql, close + 1)?;

        let placeholder = format!("__ctx_agg_{}", calls.len());
        calls.push(ContextCall {
            placeholder: placeholder.clone(),
            arg,
            qualifier,
            wrapped: true,
            modifiers,
        });
        sql = format!("{}{}{}", &sql[..whole.start()], placeholder, &sql[end..]);
    }

    if !calls.is_empty() && !is_semantic {
        return Err(SemanticError::InvalidSyntaxContext(
            "AGGREGATE(...) requires the SEMANTIC prefix".into(),
        ));
    }

    // Bare `measure AT (...)` references.
    loop {
        let Some(caps) = BARE_AT.captures(&sql) else {
            break;
        };
        let whole = caps.get(0).ok_or_else(|| {
            SemanticError::InvalidSyntaxContext("malformed AT clause".into())
        })?;
        let arg = caps
            .get(1)
            .map(|m| m.as_str().replace(char::is_whitespace, ""))
            .unwrap_or_default();

        // Re-scan from the start of the AT keyword.
        let at_start = whole.start() + caps.get(1).map(|m| m.as_str().len()).unwrap_or(0);
        let (modifiers, end) = parse_at_chain(&sql, at_start)?;

        let placeholder = format!("__ctx_agg_{}", calls.len());
        calls.push(ContextCall {
            placeholder: placeholder.clone(),
            arg,
            qualifier: None,
            wrapped: false,
            modifiers,
        });
        sql = format!("{}{}{}", &sql[..whole.start()], placeholder, &sql[end..]);
    }

    Ok(ScanOutput {
        sql,
        is_semantic,
        calls,
    })
}

/// Parse zero or more chained `AT (...)` clauses starting at `pos`.
/// Returns the modifier lists and the byte offset just past the last one.
fn parse_at_chain(sql: &str, pos: usize) -> SemanticResult<(Vec<Vec<ContextModifier>>, usize)> {
    let mut modifiers = vec![];
    let mut cursor = pos;
    while let Some(m) = AT_CLAUSE.find(&sql[cursor..]) {
        let open = cursor + m.end() - 1;
        let close = matching_paren(sql, open)?;
        modifiers.push(parse_modifiers(&sql[open + 1..close])?);
        cursor = close + 1;
    }
    Ok((modifiers, cursor))
}

/// Find the `)` matching the `(` at `open`, respecting nested parens and
/// single-quoted strings.
fn matching_paren(sql: &str, open: usize) -> SemanticResult<usize> {
    let bytes = sql.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => in_string = !in_string,
            b'(' if !in_string => depth += 1,
            b')' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    Err(SemanticError::InvalidSyntaxContext(
        "unbalanced parentheses in context clause".into(),
    ))
}

/// Split a modifier list on top-level commas and parse each entry.
fn parse_modifiers(body: &str) -> SemanticResult<Vec<ContextModifier>> {
    let mut out = vec![];
    for piece in split_top_level(body) {
        let piece = piece.trim();
        if piece.is_empty() {
            continue;
        }
        out.push(parse_modifier(piece)?);
    }
    if out.is_empty() {
        return Err(SemanticError::InvalidSyntaxContext(
            "empty AT clause".into(),
        ));
    }
    Ok(out)
}

fn parse_modifier(piece: &str) -> SemanticResult<ContextModifier> {
    let upper = piece.to_ascii_uppercase();

    if upper == "ALL" {
        return Ok(ContextModifier::All(vec![]));
    }
    // `ALL (a, b)`, `ALL(a, b)`, or a single bare `ALL region`.
    if upper.starts_with("ALL") {
        let rest = piece[3..].trim_start();
        if let Some(inner) = rest.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
            let dims = split_top_level(inner)
                .into_iter()
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty())
                .collect();
            return Ok(ContextModifier::All(dims));
        }
        if strip_keyword(piece, "ALL").is_some() && !rest.is_empty() {
            return Ok(ContextModifier::All(vec![rest.to_string()]));
        }
    }
    if upper == "VISIBLE" {
        return Ok(ContextModifier::Visible);
    }
    if let Some(rest) = strip_keyword(piece, "SET") {
        return parse_set(rest);
    }
    if let Some(rest) = strip_keyword(piece, "WHERE") {
        return Ok(ContextModifier::Where(rest.trim().to_string()));
    }

    Err(SemanticError::InvalidSyntaxContext(format!(
        "unrecognized context modifier: {}",
        piece
    )))
}

static SET_IN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)^([A-Za-z_][\w.]*)\s+IN\s*\((.*)\)\s*$").unwrap());

fn parse_set(rest: &str) -> SemanticResult<ContextModifier> {
    let rest = rest.trim();
    if let Some(caps) = SET_IN.captures(rest) {
        let dim = caps[1].to_string();
        let values = split_top_level(&caps[2])
            .into_iter()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();
        return Ok(ContextModifier::Set {
            dim,
            value: SetValue::In(values),
        });
    }

    let Some((dim, value)) = rest.split_once('=') else {
        return Err(SemanticError::InvalidSyntaxContext(format!(
            "SET modifier needs `dim = value` or `dim IN (...)`: {}",
            rest.trim()
        )));
    };
    Ok(ContextModifier::Set {
        dim: dim.trim().to_string(),
        value: SetValue::Expr(value.trim().to_string()),
    })
}

/// Case-insensitive keyword prefix followed by whitespace.
fn strip_keyword<'a>(piece: &'a str, keyword: &str) -> Option<&'a str> {
    if piece.len() <= keyword.len() {
        return None;
    }
    let (head, tail) = piece.split_at(keyword.len());
    if head.eq_ignore_ascii_case(keyword) && tail.starts_with(char::is_whitespace) {
        Some(tail)
    } else {
        None
    }
}

/// Split on commas outside parentheses and strings.
fn split_top_level(body: &str) -> Vec<String> {
    let mut parts = vec![];
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_string = false;
    for ch in body.chars() {
        match ch {
            '\'' => {
                in_string = !in_string;
                current.push(ch);
            }
            '(' if !in_string => {
                depth += 1;
                current.push(ch);
            }
            ')' if !in_string => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ',' if !in_string && depth == 0 => {
                parts.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current);
    }
    parts
}
