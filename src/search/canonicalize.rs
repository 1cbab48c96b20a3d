//! Text normalization shared by indexing-time folding and query parsing.
//!
//! Folding is applied one character at a time (NFKC compatibility mapping,
//! then lowercase) so that a byte offset in folded text can always be
//! traced back to the character it came from in the original. Matching and
//! highlighting therefore agree on what "contains" means.

use std::ops::Range;

use unicode_normalization::UnicodeNormalization;

/// Fold a single character into `out`.
fn fold_char_into(ch: char, out: &mut String) {
    for mapped in std::iter::once(ch).nfkc() {
        for lower in mapped.to_lowercase() {
            out.push(lower);
        }
    }
}

/// Case- and width-insensitive form of `text`.
pub fn fold(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        fold_char_into(ch, &mut out);
    }
    out
}

/// Normalize a raw query: fold, collapse whitespace runs, trim.
pub fn normalize_query(query: &str) -> String {
    fold(query).split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split a normalized query into distinct tokens, keeping first-seen order.
pub fn tokenize(normalized: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for tok in normalized.split_whitespace() {
        if !tokens.iter().any(|t| t == tok) {
            tokens.push(tok.to_string());
        }
    }
    tokens
}

/// Byte ranges in `text` covered by any token, under [`fold`] semantics.
///
/// Ranges are sorted and overlapping or touching ranges are merged.
/// Tokens must already be folded.
pub fn match_ranges(text: &str, tokens: &[String]) -> Vec<Range<usize>> {
    if text.is_empty() || tokens.is_empty() {
        return Vec::new();
    }

    // For each byte of the folded text, the original char it came from.
    let mut folded = String::with_capacity(text.len());
    let mut origin: Vec<(usize, usize)> = Vec::with_capacity(text.len());
    for (start, ch) in text.char_indices() {
        let before = folded.len();
        fold_char_into(ch, &mut folded);
        let end = start + ch.len_utf8();
        origin.extend(std::iter::repeat_n((start, end), folded.len() - before));
    }

    let mut ranges: Vec<Range<usize>> = Vec::new();
    for token in tokens.iter().filter(|t| !t.is_empty()) {
        for (pos, matched) in folded.match_indices(token.as_str()) {
            let first = origin[pos];
            let last = origin[pos + matched.len() - 1];
            ranges.push(first.0..last.1);
        }
    }

    ranges.sort_by_key(|r| (r.start, r.end));
    let mut merged: Vec<Range<usize>> = Vec::with_capacity(ranges.len());
    for r in ranges {
        match merged.last_mut() {
            Some(prev) if r.start <= prev.end => prev.end = prev.end.max(r.end),
            _ => merged.push(r),
        }
    }
    merged
}
