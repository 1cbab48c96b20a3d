//! Minimal reader for MySQL `INSERT ... VALUES` dumps.
//!
//! Only what a forum dump needs: locate every insert statement for a table
//! and split its tuples into values. Quoted strings honour backslash
//! escapes and doubled quotes, and a `;` inside a string does not end the
//! statement.

use once_cell::sync::Lazy;
use regex::Regex;

/// One column value from a tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Null,
    /// Unquoted literal, usually a number.
    Bare(String),
    /// Quoted string with escapes resolved.
    Text(String),
}

impl SqlValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Bare(s) | Self::Text(s) => s.trim().parse().ok(),
            Self::Null => None,
        }
    }

    /// String content; `NULL` reads as empty.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Bare(s) | Self::Text(s) => s,
            Self::Null => "",
        }
    }
}

pub type Row = Vec<SqlValue>;

static INSERT_HEAD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)INSERT\s+(?:IGNORE\s+)?INTO\s+`?([A-Za-z0-9_]+)`?\s*(?:\([^)]*\))?\s*VALUES\s*")
        .expect("insert regex")
});

/// All rows inserted into `table`, in dump order.
pub fn insert_rows(dump: &str, table: &str) -> Vec<Row> {
    let mut rows = Vec::new();
    let mut offset = 0;
    while let Some(caps) = INSERT_HEAD.captures_at(dump, offset) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            break;
        };
        let body_start = whole.end();
        let consumed = if name.as_str() == table {
            parse_values(&dump[body_start..], &mut rows)
        } else {
            skip_statement(&dump[body_start..])
        };
        offset = body_start + consumed;
    }
    rows
}

/// Byte length up to and including the `;` ending the statement.
fn skip_statement(body: &str) -> usize {
    let mut scanner = Scanner::new(body);
    while let Some(ch) = scanner.next() {
        match ch {
            '\'' | '"' => {
                scanner.quoted(ch);
            }
            ';' => break,
            _ => {}
        }
    }
    scanner.pos
}

/// Parse tuples from a `VALUES` body into `rows`; returns bytes consumed.
pub fn parse_values(body: &str, rows: &mut Vec<Row>) -> usize {
    let mut scanner = Scanner::new(body);
    let mut current: Option<Row> = None;
    let mut bare = String::new();

    while let Some(ch) = scanner.next() {
        let Some(row) = current.as_mut() else {
            match ch {
                ';' => break,
                '(' => current = Some(Vec::new()),
                _ => {}
            }
            continue;
        };
        match ch {
            '\'' | '"' => row.push(SqlValue::Text(scanner.quoted(ch))),
            ',' => flush_bare(&mut bare, row),
            ')' => {
                flush_bare(&mut bare, row);
                rows.extend(current.take());
            }
            c if !c.is_whitespace() => bare.push(c),
            _ => {}
        }
    }
    scanner.pos
}

fn flush_bare(bare: &mut String, row: &mut Row) {
    if bare.is_empty() {
        return;
    }
    let value = std::mem::take(bare);
    if value.eq_ignore_ascii_case("null") {
        row.push(SqlValue::Null);
    } else {
        row.push(SqlValue::Bare(value));
    }
}

struct Scanner<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn next(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    /// Read a quoted string whose opening `quote` was just consumed.
    fn quoted(&mut self, quote: char) -> String {
        let mut out = String::new();
        while let Some(ch) = self.next() {
            if ch == '\\' {
                match self.next() {
                    Some('n') => out.push('\n'),
                    Some('r') => out.push('\r'),
                    Some('t') => out.push('\t'),
                    Some('0') => out.push('\0'),
                    Some('Z') => out.push('\u{1a}'),
                    Some(other) => out.push(other),
                    None => break,
                }
            } else if ch == quote {
                if self.peek() == Some(quote) {
                    self.next();
                    out.push(quote);
                } else {
                    break;
                }
            } else {
                out.push(ch);
            }
        }
        out
    }
}
