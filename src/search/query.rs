use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Instant;

use clap::ValueEnum;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::canonicalize::{fold, match_ranges, normalize_query, tokenize};
use crate::model::SearchIndex;

pub const DEFAULT_LIMIT: usize = 50;
pub const DEFAULT_SNIPPET_LEN: usize = 160;

/// How multi-token queries decide whether a record is a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Every token must occur somewhere in the record.
    #[default]
    All,
    /// At least one token must occur.
    Any,
}

impl MatchMode {
    fn accepts(self, score: usize, seen: &[bool]) -> bool {
        match self {
            Self::All => score > 0 && seen.iter().all(|s| *s),
            Self::Any => score > 0,
        }
    }
}

/// Which record kinds a search scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SearchScope {
    Threads,
    Forums,
    #[default]
    All,
}

impl SearchScope {
    fn threads(self) -> bool {
        matches!(self, Self::Threads | Self::All)
    }

    fn forums(self) -> bool {
        matches!(self, Self::Forums | Self::All)
    }
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub limit: usize,
    /// Snippet length in characters, excluding ellipses.
    pub snippet_len: usize,
    pub match_mode: MatchMode,
    pub scope: SearchScope,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            snippet_len: DEFAULT_SNIPPET_LEN,
            match_mode: MatchMode::default(),
            scope: SearchScope::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HitKind {
    Thread,
    Forum,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub kind: HitKind,
    /// Page the hit links to.
    pub file: String,
    pub title: String,
    pub score: usize,
    /// Matching posts for a thread, matching listed threads for a forum.
    pub matched_entries: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub snippet: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchResults {
    /// Normalized query text.
    pub query: String,
    pub tokens: Vec<String>,
    /// Number of matching records before `limit` was applied.
    pub total: usize,
    pub hits: Vec<SearchHit>,
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

struct PreparedPost {
    content: String,
    author: String,
}

struct PreparedThread {
    key: String,
    title: String,
    posts: Vec<PreparedPost>,
}

struct PreparedForum {
    key: String,
    title: String,
    thread_titles: Vec<String>,
}

struct Candidate<'a> {
    kind: HitKind,
    key: &'a str,
    score: usize,
    matched_entries: usize,
    /// First matching post or listed thread.
    first_entry: Option<usize>,
    /// First post whose content matched; snippet source for threads.
    first_content: Option<usize>,
}

/// Linear scan-and-score search over one loaded index.
///
/// Searchable fields are folded once here; each query then folds only
/// itself.
pub struct SearchClient {
    index: Arc<SearchIndex>,
    threads: Vec<PreparedThread>,
    forums: Vec<PreparedForum>,
}

impl SearchClient {
    pub fn new(index: Arc<SearchIndex>) -> Self {
        let threads = index
            .threads
            .iter()
            .map(|(key, t)| PreparedThread {
                key: key.clone(),
                title: fold(&t.title),
                posts: t
                    .posts
                    .iter()
                    .map(|p| PreparedPost {
                        content: fold(&p.content),
                        author: fold(&p.author),
                    })
                    .collect(),
            })
            .collect();
        let forums = index
            .forums
            .iter()
            .map(|(key, f)| PreparedForum {
                key: key.clone(),
                title: fold(&f.title),
                thread_titles: f.threads.iter().map(|t| fold(&t.title)).collect(),
            })
            .collect();
        Self {
            index,
            threads,
            forums,
        }
    }

    pub fn search(&self, query: &str, options: &SearchOptions) -> SearchResults {
        let started = Instant::now();
        let normalized = normalize_query(query);
        let tokens = tokenize(&normalized);
        tracing::info!(
            query = %normalized,
            tokens = tokens.len(),
            mode = ?options.match_mode,
            scope = ?options.scope,
            "search_start"
        );

        if tokens.is_empty() {
            return SearchResults {
                query: normalized,
                ..Default::default()
            };
        }

        let mut candidates: Vec<Candidate<'_>> = Vec::new();
        if options.scope.threads() {
            candidates.par_extend(
                self.threads
                    .par_iter()
                    .filter_map(|t| scan_thread(t, &tokens, options.match_mode)),
            );
        }
        if options.scope.forums() {
            candidates.par_extend(
                self.forums
                    .par_iter()
                    .filter_map(|f| scan_forum(f, &tokens, options.match_mode)),
            );
        }

        candidates.sort_by(|a, b| match b.score.cmp(&a.score) {
            Ordering::Equal => a.key.cmp(b.key),
            other => other,
        });
        let total = candidates.len();
        candidates.truncate(options.limit);

        let hits: Vec<SearchHit> = candidates
            .iter()
            .filter_map(|c| self.materialize(c, &tokens, options.snippet_len))
            .collect();

        tracing::info!(
            total,
            returned = hits.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "search_done"
        );

        SearchResults {
            query: normalized,
            tokens,
            total,
            hits,
        }
    }

    fn materialize(&self, c: &Candidate<'_>, tokens: &[String], snippet_len: usize) -> Option<SearchHit> {
        match c.kind {
            HitKind::Thread => {
                let thread = self.index.threads.get(c.key)?;
                let content_post = c.first_content.and_then(|i| thread.posts.get(i));
                let post =
                    content_post.or_else(|| c.first_entry.and_then(|i| thread.posts.get(i)));
                let source = content_post
                    .map(|p| p.content.as_str())
                    .unwrap_or(thread.title.as_str());
                Some(SearchHit {
                    kind: HitKind::Thread,
                    file: file_or_key(&thread.file, c.key),
                    title: thread.title.clone(),
                    score: c.score,
                    matched_entries: c.matched_entries,
                    author: post.map(|p| p.author.clone()).filter(|a| !a.is_empty()),
                    date: post.map(|p| p.date.clone()).filter(|d| !d.is_empty()),
                    snippet: make_snippet(source, tokens, snippet_len),
                })
            }
            HitKind::Forum => {
                let forum = self.index.forums.get(c.key)?;
                let source = c
                    .first_entry
                    .and_then(|i| forum.threads.get(i))
                    .map(|t| t.title.as_str())
                    .unwrap_or(forum.title.as_str());
                Some(SearchHit {
                    kind: HitKind::Forum,
                    file: file_or_key(&forum.file, c.key),
                    title: forum.title.clone(),
                    score: c.score,
                    matched_entries: c.matched_entries,
                    author: None,
                    date: None,
                    snippet: make_snippet(source, tokens, snippet_len),
                })
            }
        }
    }
}

fn file_or_key(file: &str, key: &str) -> String {
    if file.is_empty() { key } else { file }.to_string()
}

/// Count tokens contained in `field`, marking each one seen.
fn count_matches(field: &str, tokens: &[String], seen: &mut [bool]) -> usize {
    let mut n = 0;
    for (i, tok) in tokens.iter().enumerate() {
        if field.contains(tok.as_str()) {
            seen[i] = true;
            n += 1;
        }
    }
    n
}

fn scan_thread<'a>(t: &'a PreparedThread, tokens: &[String], mode: MatchMode) -> Option<Candidate<'a>> {
    let mut seen = vec![false; tokens.len()];
    let mut score = count_matches(&t.title, tokens, &mut seen);
    let mut matched_entries = 0;
    let mut first_entry = None;
    let mut first_content = None;
    for (i, post) in t.posts.iter().enumerate() {
        let in_content = count_matches(&post.content, tokens, &mut seen);
        let n = in_content + count_matches(&post.author, tokens, &mut seen);
        if in_content > 0 {
            first_content.get_or_insert(i);
        }
        if n > 0 {
            matched_entries += 1;
            first_entry.get_or_insert(i);
        }
        score += n;
    }
    mode.accepts(score, &seen).then_some(Candidate {
        kind: HitKind::Thread,
        key: &t.key,
        score,
        matched_entries,
        first_entry,
        first_content,
    })
}

fn scan_forum<'a>(f: &'a PreparedForum, tokens: &[String], mode: MatchMode) -> Option<Candidate<'a>> {
    let mut seen = vec![false; tokens.len()];
    let mut score = count_matches(&f.title, tokens, &mut seen);
    let mut matched_entries = 0;
    let mut first_entry = None;
    for (i, title) in f.thread_titles.iter().enumerate() {
        let n = count_matches(title, tokens, &mut seen);
        if n > 0 {
            matched_entries += 1;
            first_entry.get_or_insert(i);
        }
        score += n;
    }
    mode.accepts(score, &seen).then_some(Candidate {
        kind: HitKind::Forum,
        key: &f.key,
        score,
        matched_entries,
        first_entry,
        first_content: None,
    })
}

/// Cut `text` to `max_chars` characters around the first token match.
///
/// The window starts a third of its length before the match so some
/// leading context survives. Cut ends are marked with `...`.
pub fn make_snippet(text: &str, tokens: &[String], max_chars: usize) -> String {
    let total = text.chars().count();
    if max_chars == 0 || total <= max_chars {
        return text.to_string();
    }

    let anchor = match_ranges(text, tokens)
        .first()
        .map(|r| text[..r.start].chars().count())
        .unwrap_or(0);
    let start = anchor.saturating_sub(max_chars / 3).min(total - max_chars);
    let end = start + max_chars;

    let mut out = String::with_capacity(max_chars + 6);
    if start > 0 {
        out.push_str("...");
    }
    out.extend(text.chars().skip(start).take(max_chars));
    if end < total {
        out.push_str("...");
    }
    out
}
