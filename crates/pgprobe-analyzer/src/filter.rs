//! Filter and condition text analysis
//!
//! PostgreSQL prints deparsed expressions in `Filter`, `Hash Cond`, `Sort Key`
//! and friends, e.g. `((status)::text = 'F'::text) AND (o.custkey = 123)`.
//! This module tokenizes that text and recovers the column references the
//! index suggestions are built from. The extraction is heuristic:
//!
//! - type casts (`::text`, `::character varying`, `::numeric(10,2)`) are dropped
//! - quoted identifiers are unquoted, string literals are opaque
//! - a column is the identifier directly in front of a comparison operator
//! - SQL keywords are never columns

use thiserror::Error;

/// Errors raised while tokenizing expression text
#[derive(Debug, Error, PartialEq)]
pub enum FilterParseError {
    #[error("unterminated string literal starting at byte {0}")]
    UnterminatedLiteral(usize),

    #[error("unterminated quoted identifier starting at byte {0}")]
    UnterminatedIdentifier(usize),

    #[error("unterminated type modifier starting at byte {0}")]
    UnterminatedModifier(usize),
}

/// A lexical token of a deparsed PostgreSQL expression
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identifier, with the qualifier (table alias) when written as `alias.name`
    Ident {
        qualifier: Option<String>,
        name: String,
    },
    /// String, numeric or parameter literal
    Literal(String),
    /// Operator such as `=`, `<>`, `~~`
    Operator(String),
    LParen,
    RParen,
    Comma,
    LBracket,
    RBracket,
}

impl Token {
    fn ident_name(&self) -> Option<&str> {
        match self {
            Token::Ident { name, .. } => Some(name),
            _ => None,
        }
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        self.ident_name()
            .is_some_and(|name| name.eq_ignore_ascii_case(keyword))
    }
}

const KEYWORDS: &[&str] = &[
    "AND", "OR", "NOT", "NULL", "TRUE", "FALSE", "IS", "IN", "LIKE", "ILIKE", "BETWEEN", "ANY",
    "ALL", "SOME", "ARRAY", "CASE", "WHEN", "THEN", "ELSE", "END", "DISTINCT", "FROM", "SIMILAR",
    "TO", "ASC", "DESC", "NULLS", "FIRST", "LAST", "USING", "COLLATE",
];

/// Words that continue a multi-word type name after `::`
const TYPE_CONTINUATIONS: &[&str] = &["varying", "precision", "without", "with", "time", "zone"];

const COMPARISON_OPERATORS: &[&str] = &[
    "=", "<>", "!=", "<", ">", "<=", ">=", "~~", "!~~", "~~*", "!~~*", "~", "~*", "!~", "!~*",
];

const COMPARISON_KEYWORDS: &[&str] = &["IS", "LIKE", "ILIKE", "IN", "BETWEEN", "SIMILAR"];

fn is_keyword(word: &str) -> bool {
    KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(word))
}

fn is_operator_char(c: char) -> bool {
    matches!(
        c,
        '=' | '<' | '>' | '!' | '~' | '*' | '+' | '-' | '/' | '%' | '^' | '|' | '&' | '#' | '@' | '?'
    )
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Splits expression text into tokens, dropping type casts
pub fn tokenize(text: &str) -> Result<Vec<Token>, FilterParseError> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (offset, c) = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c == ':' && chars.get(i + 1).map(|(_, c)| *c) == Some(':') {
            i = skip_cast(&chars, i + 2)?;
            continue;
        }

        match c {
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '\'' => {
                let (literal, next) = read_quoted(&chars, i, '\'')
                    .ok_or(FilterParseError::UnterminatedLiteral(offset))?;
                tokens.push(Token::Literal(literal));
                i = next;
            }
            '"' => {
                let (name, next) = read_quoted(&chars, i, '"')
                    .ok_or(FilterParseError::UnterminatedIdentifier(offset))?;
                i = push_identifier(&mut tokens, &chars, name, next)?;
            }
            '$' if chars.get(i + 1).is_some_and(|(_, c)| c.is_ascii_digit()) => {
                let mut j = i + 1;
                while j < chars.len() && chars[j].1.is_ascii_digit() {
                    j += 1;
                }
                tokens.push(Token::Literal(collect(&chars, i, j)));
                i = j;
            }
            c if c.is_ascii_digit() => {
                let mut j = i;
                while j < chars.len() && (chars[j].1.is_ascii_alphanumeric() || chars[j].1 == '.')
                {
                    j += 1;
                }
                tokens.push(Token::Literal(collect(&chars, i, j)));
                i = j;
            }
            c if is_ident_start(c) => {
                let mut j = i;
                while j < chars.len() && is_ident_char(chars[j].1) {
                    j += 1;
                }
                let name = collect(&chars, i, j);
                i = push_identifier(&mut tokens, &chars, name, j)?;
            }
            c if is_operator_char(c) => {
                let mut j = i;
                while j < chars.len() && is_operator_char(chars[j].1) {
                    j += 1;
                }
                tokens.push(Token::Operator(collect(&chars, i, j)));
                i = j;
            }
            _ => i += 1,
        }
    }

    Ok(tokens)
}

fn collect(chars: &[(usize, char)], start: usize, end: usize) -> String {
    chars[start..end].iter().map(|(_, c)| *c).collect()
}

/// Reads a quoted run starting at `start` (the opening quote); doubled quotes
/// are an escaped quote. Returns the unquoted content and the index after the
/// closing quote.
fn read_quoted(chars: &[(usize, char)], start: usize, quote: char) -> Option<(String, usize)> {
    let mut content = String::new();
    let mut j = start + 1;
    while j < chars.len() {
        let c = chars[j].1;
        if c == quote {
            if chars.get(j + 1).map(|(_, c)| *c) == Some(quote) {
                content.push(quote);
                j += 2;
                continue;
            }
            return Some((content, j + 1));
        }
        content.push(c);
        j += 1;
    }
    None
}

/// Pushes an identifier, folding a following `.name` into a qualified token
fn push_identifier(
    tokens: &mut Vec<Token>,
    chars: &[(usize, char)],
    first: String,
    mut i: usize,
) -> Result<usize, FilterParseError> {
    let mut parts = vec![first];

    while chars.get(i).map(|(_, c)| *c) == Some('.') {
        match chars.get(i + 1) {
            Some((_, '"')) => {
                let offset = chars[i + 1].0;
                let (name, next) = read_quoted(chars, i + 1, '"')
                    .ok_or(FilterParseError::UnterminatedIdentifier(offset))?;
                parts.push(name);
                i = next;
            }
            Some((_, c)) if is_ident_start(*c) => {
                let mut j = i + 1;
                while j < chars.len() && is_ident_char(chars[j].1) {
                    j += 1;
                }
                parts.push(collect(chars, i + 1, j));
                i = j;
            }
            _ => break,
        }
    }

    let name = parts.pop().unwrap_or_default();
    let qualifier = parts.pop();
    tokens.push(Token::Ident { qualifier, name });
    Ok(i)
}

/// Skips a type name after `::`, including multi-word names, modifiers and array brackets
fn skip_cast(chars: &[(usize, char)], mut i: usize) -> Result<usize, FilterParseError> {
    let skip_ws = |mut i: usize| {
        while i < chars.len() && chars[i].1.is_whitespace() {
            i += 1;
        }
        i
    };

    i = skip_ws(i);
    if chars.get(i).map(|(_, c)| *c) == Some('"') {
        let offset = chars[i].0;
        let (_, next) = read_quoted(chars, i, '"')
            .ok_or(FilterParseError::UnterminatedIdentifier(offset))?;
        i = next;
    } else {
        while i < chars.len() && (is_ident_char(chars[i].1) || chars[i].1 == '.') {
            i += 1;
        }
    }

    loop {
        let after_ws = skip_ws(i);
        let mut j = after_ws;
        while j < chars.len() && is_ident_char(chars[j].1) {
            j += 1;
        }
        let word = collect(chars, after_ws, j);
        if !word.is_empty() && TYPE_CONTINUATIONS.iter().any(|w| w.eq_ignore_ascii_case(&word)) {
            i = j;
            continue;
        }

        match chars.get(i).map(|(_, c)| *c) {
            Some('(') => {
                // Type modifier such as numeric(10,2)
                let offset = chars[i].0;
                while i < chars.len() && chars[i].1 != ')' {
                    i += 1;
                }
                if i == chars.len() {
                    return Err(FilterParseError::UnterminatedModifier(offset));
                }
                i += 1;
            }
            Some('[') if chars.get(i + 1).map(|(_, c)| *c) == Some(']') => i += 2,
            _ => return Ok(i),
        }
    }
}

/// How the predicates of a filter are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connective {
    /// A single predicate
    Single,
    And,
    Or,
}

/// Columns referenced by a filter and how its predicates combine
#[derive(Debug, Clone, PartialEq)]
pub struct FilterShape {
    /// Distinct columns in order of first appearance
    pub columns: Vec<String>,
    pub connective: Connective,
}

/// Extracts the filtered columns and the AND/OR structure of a filter.
///
/// An `OR` anywhere wins over `AND`, since a composite index cannot serve a
/// disjunction.
pub fn analyze_filter(filter: &str) -> Result<FilterShape, FilterParseError> {
    let tokens = tokenize(filter)?;

    let connective = if tokens.iter().any(|t| t.is_keyword("OR")) {
        Connective::Or
    } else if tokens.iter().any(|t| t.is_keyword("AND")) {
        Connective::And
    } else {
        Connective::Single
    };

    let mut columns: Vec<String> = Vec::new();
    for (idx, token) in tokens.iter().enumerate() {
        if !is_comparison(token) {
            continue;
        }
        if let Some(column) = column_before(&tokens, idx)
            && !columns.contains(&column)
        {
            columns.push(column);
        }
    }

    Ok(FilterShape {
        columns,
        connective,
    })
}

fn is_comparison(token: &Token) -> bool {
    match token {
        Token::Operator(op) => COMPARISON_OPERATORS.contains(&op.as_str()),
        Token::Ident { .. } => COMPARISON_KEYWORDS.iter().any(|k| token.is_keyword(k)),
        _ => false,
    }
}

/// The column directly in front of the comparison at `idx`, skipping closing
/// parentheses and a negating `NOT`
fn column_before(tokens: &[Token], idx: usize) -> Option<String> {
    let mut j = idx;
    while j > 0 {
        j -= 1;
        match &tokens[j] {
            Token::RParen => continue,
            token if token.is_keyword("NOT") => continue,
            Token::Ident { name, .. } if !is_keyword(name) => return Some(name.clone()),
            _ => return None,
        }
    }
    None
}

/// Columns of `condition` qualified with `alias` (e.g. `o.custkey` for alias `o`)
pub fn columns_for_alias(condition: &str, alias: &str) -> Result<Vec<String>, FilterParseError> {
    let mut columns: Vec<String> = Vec::new();
    for token in tokenize(condition)? {
        if let Token::Ident {
            qualifier: Some(qualifier),
            name,
        } = token
            && qualifier == alias
            && !is_keyword(&name)
            && !columns.contains(&name)
        {
            columns.push(name);
        }
    }
    Ok(columns)
}

/// A plain column reference in a `Sort Key` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortColumn {
    pub name: String,
    pub descending: bool,
}

impl SortColumn {
    /// Column as written in an index definition
    pub fn index_expr(&self) -> String {
        if self.descending {
            format!("{} DESC", self.name)
        } else {
            self.name.clone()
        }
    }
}

/// Parses one `Sort Key` entry such as `o.created_at DESC NULLS LAST`.
///
/// Returns `Ok(None)` for expression keys (function calls, arithmetic), which
/// a plain column index cannot serve.
pub fn parse_sort_key(key: &str) -> Result<Option<SortColumn>, FilterParseError> {
    let tokens = tokenize(key)?;
    let mut tokens = tokens.as_slice();

    // A parenthesized bare column: "(created_at)"
    while let [Token::LParen, inner @ .., Token::RParen] = tokens {
        tokens = inner;
    }

    let Some((Token::Ident { name, .. }, rest)) = tokens.split_first() else {
        return Ok(None);
    };
    if is_keyword(name) {
        return Ok(None);
    }

    let mut descending = false;
    for token in rest {
        if token.is_keyword("DESC") {
            descending = true;
        } else if token.is_keyword("ASC")
            || token.is_keyword("NULLS")
            || token.is_keyword("FIRST")
            || token.is_keyword("LAST")
        {
            continue;
        } else {
            return Ok(None);
        }
    }

    Ok(Some(SortColumn {
        name: name.clone(),
        descending,
    }))
}

/// Builds the index name fragment for a table, e.g. `sales.orders` -> `sales_orders`
fn index_name_part(table: &str) -> String {
    table.replace('.', "_")
}

/// Synthesizes index DDL for a filtered scan.
///
/// - several columns joined by `AND` give one composite index
/// - several columns joined by `OR` give one index per column
/// - otherwise a single-column index on the first column
pub fn suggest_filter_indexes(table: &str, shape: &FilterShape) -> Vec<String> {
    let name_part = index_name_part(table);
    match (shape.columns.as_slice(), shape.connective) {
        ([], _) => Vec::new(),
        (columns, Connective::Or) if columns.len() > 1 => columns
            .iter()
            .map(|c| format!("CREATE INDEX idx_{}_{} ON {}({});", name_part, c, table, c))
            .collect(),
        (columns, Connective::And) if columns.len() > 1 => vec![format!(
            "CREATE INDEX idx_{}_composite ON {}({});",
            name_part,
            table,
            columns.join(", ")
        )],
        ([first, ..], _) => vec![format!(
            "CREATE INDEX idx_{}_{} ON {}({});",
            name_part, first, table, first
        )],
    }
}

/// Synthesizes a single index over `columns` (join or sort columns)
pub fn suggest_column_index(table: &str, columns: &[String]) -> String {
    let name_columns: Vec<&str> = columns
        .iter()
        .map(|c| c.split_whitespace().next().unwrap_or(c))
        .collect();
    format!(
        "CREATE INDEX idx_{}_{} ON {}({});",
        index_name_part(table),
        name_columns.join("_"),
        table,
        columns.join(", ")
    )
}

#[cfg(test)]
mod tests;
