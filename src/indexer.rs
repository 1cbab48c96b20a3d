//! Search index generation from a static archive site.
//!
//! Reads the `thread_*.html` and `forum_*.html` pages the archive generator
//! writes and flattens them into a [`SearchIndex`]. Pages that cannot be
//! read or parsed are logged and skipped; they never abort the run.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

use crate::model::{ForumEntry, PostEntry, SearchIndex, ThreadEntry, ThreadLink};

pub const INDEX_FILE_NAME: &str = "search_index.json";

const AUTHOR_MARK: &str = "👤";
const DATE_MARK: &str = "🕐";
const FORUM_MARK: &str = "📁";

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Site directory not found: {0}")]
    MissingSite(PathBuf),

    #[error("Invalid page pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Failed to write index: {0}")]
    Write(#[from] std::io::Error),

    #[error("Failed to serialize index: {0}")]
    Serialize(#[from] serde_json::Error),
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {css}: {e:?}"))
}

static H1: Lazy<Selector> = Lazy::new(|| selector("h1"));
static POST: Lazy<Selector> = Lazy::new(|| selector("div.post"));
static POST_AUTHOR: Lazy<Selector> = Lazy::new(|| selector("span.post-author"));
static POST_DATE: Lazy<Selector> = Lazy::new(|| selector("span.post-date"));
static POST_CONTENT: Lazy<Selector> = Lazy::new(|| selector("div.post-content"));
static THREAD_ITEM: Lazy<Selector> = Lazy::new(|| selector("li.thread-item"));
static THREAD_TITLE_LINK: Lazy<Selector> = Lazy::new(|| selector("div.thread-title a"));
static THREAD_META: Lazy<Selector> = Lazy::new(|| selector("div.thread-meta"));

static BR_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").expect("br regex"));
static ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("tag regex"));

/// Flatten an HTML fragment to searchable text.
///
/// `<br>` becomes a space, other tags are dropped, entities are decoded and
/// whitespace runs collapse to one space.
pub fn extract_text_content(html: &str) -> String {
    let text = BR_TAG.replace_all(html, " ");
    let text = ANY_TAG.replace_all(&text, "");
    let text = html_escape::decode_html_entities(&text);
    collapse_whitespace(&text)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn element_text(el: ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<String>())
}

fn first_text(scope: ElementRef<'_>, sel: &Selector) -> Option<String> {
    scope.select(sel).next().map(element_text)
}

fn strip_mark(text: &str, mark: &str) -> String {
    text.trim().trim_start_matches(mark).trim().to_string()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Parse one thread page.
pub fn parse_thread_page(file: &str, html: &str) -> ThreadEntry {
    let doc = Html::parse_document(html);
    let root = doc.root_element();

    let title = first_text(root, &H1).unwrap_or_default();
    let posts = root
        .select(&POST)
        .filter_map(|post| {
            let content = post.select(&POST_CONTENT).next()?;
            Some(PostEntry {
                author: first_text(post, &POST_AUTHOR)
                    .map(|a| strip_mark(&a, AUTHOR_MARK))
                    .unwrap_or_default(),
                date: first_text(post, &POST_DATE)
                    .map(|d| strip_mark(&d, DATE_MARK))
                    .unwrap_or_default(),
                content: extract_text_content(&content.html()),
            })
        })
        .collect();

    ThreadEntry {
        file: file.to_string(),
        title,
        posts,
    }
}

/// Parse one forum listing page.
pub fn parse_forum_page(file: &str, html: &str) -> ForumEntry {
    let doc = Html::parse_document(html);
    let root = doc.root_element();

    let title = first_text(root, &H1)
        .map(|t| strip_mark(&t, FORUM_MARK))
        .unwrap_or_default();
    let threads = root
        .select(&THREAD_ITEM)
        .filter_map(|item| {
            let link = item.select(&THREAD_TITLE_LINK).next()?;
            Some(ThreadLink {
                link: link.value().attr("href").unwrap_or_default().to_string(),
                title: element_text(link),
                meta: first_text(item, &THREAD_META).unwrap_or_default(),
            })
        })
        .collect();

    ForumEntry {
        file: file.to_string(),
        title,
        threads,
    }
}

fn pages(site_dir: &Path, prefix: &str) -> Result<Vec<PathBuf>, IndexError> {
    let dir = glob::Pattern::escape(&site_dir.to_string_lossy());
    let pattern = Path::new(&dir).join(format!("{prefix}_*.html"));
    let mut found: Vec<PathBuf> = glob::glob(&pattern.to_string_lossy())?
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(err) => {
                tracing::warn!("skipping unreadable page entry: {err}");
                None
            }
        })
        .collect();
    found.sort();
    Ok(found)
}

fn read_page(path: &Path) -> Option<String> {
    match std::fs::read(path) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(err) => {
            tracing::warn!("failed to read {}: {err}", path.display());
            None
        }
    }
}

/// Build the index for every thread and forum page in `site_dir`.
#[tracing::instrument(skip_all, fields(site = %site_dir.display()))]
pub fn generate_search_index(site_dir: &Path) -> Result<SearchIndex, IndexError> {
    if !site_dir.is_dir() {
        return Err(IndexError::MissingSite(site_dir.to_path_buf()));
    }

    let mut index = SearchIndex {
        generated_at: chrono::Utc::now().to_rfc3339(),
        ..Default::default()
    };

    let thread_pages = pages(site_dir, "thread")?;
    tracing::debug!(count = thread_pages.len(), "found thread pages");
    for path in thread_pages {
        if let Some(html) = read_page(&path) {
            let file = file_name(&path);
            let entry = parse_thread_page(&file, &html);
            index.threads.insert(file, entry);
        }
    }

    let forum_pages = pages(site_dir, "forum")?;
    tracing::debug!(count = forum_pages.len(), "found forum pages");
    for path in forum_pages {
        if let Some(html) = read_page(&path) {
            let file = file_name(&path);
            let entry = parse_forum_page(&file, &html);
            index.forums.insert(file, entry);
        }
    }

    if index.is_empty() {
        tracing::warn!("no thread or forum pages found in {}", site_dir.display());
    }
    tracing::info!(
        threads = index.threads.len(),
        forums = index.forums.len(),
        posts = index.post_count(),
        "index_generated"
    );
    Ok(index)
}

/// Serialize `index` as pretty JSON to `path`, creating parent directories.
pub fn write_index(index: &SearchIndex, path: &Path) -> Result<(), IndexError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(index)?;
    std::fs::write(path, json)?;
    Ok(())
}
