//! Placeholder rewriting for drivers that bind by position
//!
//! Finds `@name` placeholders (and `?` where the dialect uses it) in SQL text.
//! String literals, quoted identifiers and comments are copied through
//! untouched.

use std::iter::Peekable;
use std::str::CharIndices;

/// Lexical rules of one SQL dialect
#[derive(Debug, Clone, Copy)]
pub(crate) struct Dialect {
    quotes: &'static [char],
    backslash_escapes: bool,
    dollar_quotes: bool,
    hash_comments: bool,
    question_marks: bool,
}

#[cfg(feature = "postgres")]
pub(crate) const POSTGRES: Dialect = Dialect {
    quotes: &['\'', '"'],
    backslash_escapes: false,
    dollar_quotes: true,
    hash_comments: false,
    question_marks: false,
};

#[cfg(feature = "mysql")]
pub(crate) const MYSQL: Dialect = Dialect {
    quotes: &['\'', '"', '`'],
    backslash_escapes: true,
    dollar_quotes: false,
    hash_comments: true,
    question_marks: true,
};

/// A placeholder found in SQL text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placeholder<'s> {
    /// `@name`, without the `@`
    Named(&'s str),
    /// `?`
    Positional,
}

/// Copy `sql`, replacing each placeholder with what `replace` returns for it.
///
/// Placeholders `replace` answers `None` for stay as written. `@@name` system
/// variables are never placeholders.
pub(crate) fn rewrite<F>(sql: &str, dialect: Dialect, mut replace: F) -> String
where
    F: FnMut(Placeholder<'_>) -> Option<String>,
{
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        let rest = &sql[start..];
        let verbatim = match c {
            q if dialect.quotes.contains(&q) => {
                Some(quoted_end(sql, start, q, dialect.backslash_escapes))
            }
            '-' if rest.starts_with("--") => Some(line_end(sql, start)),
            '#' if dialect.hash_comments => Some(line_end(sql, start)),
            '/' if rest.starts_with("/*") => Some(block_comment_end(sql, start)),
            '$' if dialect.dollar_quotes => dollar_tag(rest).map(|tag| {
                let body = start + tag.len();
                sql[body..]
                    .find(tag)
                    .map_or(sql.len(), |i| body + i + tag.len())
            }),
            '@' if rest.starts_with("@@") => Some(name_end(sql, start + 2)),
            _ => None,
        };

        if let Some(end) = verbatim {
            out.push_str(&sql[start..end]);
            skip_to(&mut chars, end);
            continue;
        }

        match c {
            '@' => {
                let end = name_end(sql, start + 1);
                let replaced = if end > start + 1 {
                    replace(Placeholder::Named(&sql[start + 1..end]))
                } else {
                    None
                };
                out.push_str(replaced.as_deref().unwrap_or(&sql[start..end]));
                skip_to(&mut chars, end);
            }
            '?' if dialect.question_marks => {
                let replaced = replace(Placeholder::Positional);
                out.push_str(replaced.as_deref().unwrap_or("?"));
            }
            other => out.push(other),
        }
    }

    out
}

fn skip_to(chars: &mut Peekable<CharIndices<'_>>, end: usize) {
    while chars.next_if(|&(i, _)| i < end).is_some() {}
}

fn name_end(sql: &str, from: usize) -> usize {
    sql[from..]
        .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_'))
        .map_or(sql.len(), |i| from + i)
}

/// End of the literal opened by `quote` at `start`
fn quoted_end(sql: &str, start: usize, quote: char, backslash_escapes: bool) -> usize {
    let body = start + quote.len_utf8();
    let mut chars = sql[body..].char_indices();
    while let Some((i, ch)) = chars.next() {
        if backslash_escapes && ch == '\\' {
            chars.next();
        } else if ch == quote {
            return body + i + ch.len_utf8();
        }
    }
    sql.len()
}

fn line_end(sql: &str, start: usize) -> usize {
    sql[start..].find('\n').map_or(sql.len(), |i| start + i + 1)
}

/// End of the block comment opened at `start`; comments nest
fn block_comment_end(sql: &str, start: usize) -> usize {
    let bytes = sql.as_bytes();
    let mut depth = 0usize;
    let mut i = start;
    while i + 1 < bytes.len() {
        match (bytes[i], bytes[i + 1]) {
            (b'/', b'*') => {
                depth += 1;
                i += 2;
            }
            (b'*', b'/') => {
                depth -= 1;
                i += 2;
                if depth == 0 {
                    return i;
                }
            }
            _ => i += 1,
        }
    }
    sql.len()
}

/// The `$tag$` opening a dollar-quoted string at the start of `rest`
fn dollar_tag(rest: &str) -> Option<&str> {
    let body = rest.strip_prefix('$')?;
    let close = body.find('$')?;
    let valid = body[..close]
        .chars()
        .enumerate()
        .all(|(i, ch)| ch == '_' || ch.is_alphabetic() || (i > 0 && ch.is_ascii_digit()));
    valid.then(|| &rest[..close + 2])
}
