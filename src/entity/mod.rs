//! Query Entity Resolution
//!
//! Labels a query with the root entity named in its `FROM` clause. The label is
//! shown next to query results and stored with saved queries.
//!
//! # Resolution Strategy
//! - Comments are stripped first (`-- ...` and `/* ... */`)
//! - Single-quoted string literals are opaque: keywords, comment markers and
//!   `;` inside them are ignored
//! - The clause runs from the first `FROM` keyword to the first `WHERE`,
//!   `GROUP BY`, `ORDER BY`, `LIMIT`, `FOR UPDATE`, `;` or end of input
//! - A derived table (`FROM (SELECT ...)`) is reported as [`COMPLEX_QUERY`]
//! - Otherwise the leading identifier of the clause is returned upper-cased
//!
//! This is a labelling heuristic, not a parser. Any shape it cannot read
//! degrades to [`COMPLEX_QUERY`]; it never fails.

/// Label returned when the target entity cannot be determined
pub const COMPLEX_QUERY: &str = "(complex query)";

/// Resolve the root entity of a query
///
/// # Examples
/// ```
/// use litehouse::resolve_entity;
///
/// assert_eq!(resolve_entity("SELECT Id FROM account WHERE Status = 'ACTIVE'"), "ACCOUNT");
/// assert_eq!(resolve_entity("SELECT 1"), "(complex query)");
/// ```
#[must_use]
pub fn resolve_entity(query: &str) -> String {
    let stripped = strip_comments(query);

    from_clause(&stripped)
        .and_then(leading_entity)
        .unwrap_or_else(|| COMPLEX_QUERY.to_string())
}

/// Strip SQL comments from query
///
/// Handles:
/// - Line comments: -- comment (newline is kept)
/// - Block comments: /* comment */ (replaced with a space, may span lines)
///
/// String literals are copied through untouched.
fn strip_comments(sql: &str) -> String {
    let mut result = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\'' => {
                result.push(ch);
                for ch in chars.by_ref() {
                    result.push(ch);
                    if ch == '\'' {
                        break;
                    }
                }
            }
            '-' if chars.peek() == Some(&'-') => {
                chars.next();
                for ch in chars.by_ref() {
                    if ch == '\n' {
                        result.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = ' ';
                for ch in chars.by_ref() {
                    if prev == '*' && ch == '/' {
                        break;
                    }
                    prev = ch;
                }
                result.push(' ');
            }
            _ => result.push(ch),
        }
    }

    result
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

/// Byte spans of every maximal run of word characters outside string literals
fn word_spans(sql: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = None;
    let mut in_literal = false;

    for (idx, ch) in sql.char_indices() {
        if ch == '\'' {
            in_literal = !in_literal;
        }

        match (!in_literal && is_word_char(ch), start) {
            (true, None) => start = Some(idx),
            (false, Some(s)) => {
                spans.push((s, idx));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        spans.push((s, sql.len()));
    }

    spans
}

/// Locate the text between the first `FROM` keyword and the clause terminator
fn from_clause(sql: &str) -> Option<&str> {
    let spans = word_spans(sql);
    let from_idx = spans.iter().position(|&(s, e)| sql[s..e].eq_ignore_ascii_case("FROM"))?;
    let clause_start = spans[from_idx].1;

    let mut clause_end = statement_end(sql, clause_start);

    let rest = &spans[from_idx + 1..];
    for (i, &(start, end)) in rest.iter().enumerate() {
        if start >= clause_end {
            break;
        }

        let word = &sql[start..end];
        // Two-word terminators only count when nothing but whitespace separates them
        let followed_by = |keyword: &str| {
            rest.get(i + 1).is_some_and(|&(ns, ne)| {
                sql[end..ns].trim().is_empty() && sql[ns..ne].eq_ignore_ascii_case(keyword)
            })
        };

        let terminates = word.eq_ignore_ascii_case("WHERE")
            || word.eq_ignore_ascii_case("LIMIT")
            || ((word.eq_ignore_ascii_case("GROUP") || word.eq_ignore_ascii_case("ORDER"))
                && followed_by("BY"))
            || (word.eq_ignore_ascii_case("FOR") && followed_by("UPDATE"));

        if terminates {
            clause_end = start;
            break;
        }
    }

    Some(&sql[clause_start..clause_end])
}

/// Byte offset of the first `;` at or after `from` that is not inside a literal
fn statement_end(sql: &str, from: usize) -> usize {
    let mut in_literal = false;

    for (idx, ch) in sql[from..].char_indices() {
        match ch {
            '\'' => in_literal = !in_literal,
            ';' if !in_literal => return from + idx,
            _ => {}
        }
    }

    sql.len()
}

/// Extract the upper-cased leading identifier of a `FROM` clause
fn leading_entity(clause: &str) -> Option<String> {
    let clause = clause.trim();

    if let Some(inner) = clause.strip_prefix('(') {
        if starts_with_keyword(inner.trim_start(), "SELECT") {
            return None;
        }
    }

    let end = clause.find(|ch: char| !is_word_char(ch)).unwrap_or(clause.len());
    let ident = &clause[..end];

    if ident.is_empty() {
        None
    } else {
        Some(ident.to_uppercase())
    }
}

fn starts_with_keyword(text: &str, keyword: &str) -> bool {
    text.get(..keyword.len()).is_some_and(|head| head.eq_ignore_ascii_case(keyword))
        && !text[keyword.len()..].starts_with(is_word_char)
}
