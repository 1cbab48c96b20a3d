//! Search index document.
//!
//! The index is a single JSON file (`search_index.json`) generated from a
//! static forum site. Threads and forums are keyed by the page file name so
//! a hit can link straight back to the page it came from.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root of `search_index.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchIndex {
    #[serde(default)]
    pub threads: BTreeMap<String, ThreadEntry>,
    #[serde(default)]
    pub forums: BTreeMap<String, ForumEntry>,
    #[serde(default)]
    pub generated_at: String,
}

/// One thread page and its posts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreadEntry {
    /// Page file name, e.g. `thread_12.html`.
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub posts: Vec<PostEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostEntry {
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub date: String,
    /// Plain text with markup already stripped.
    #[serde(default)]
    pub content: String,
}

/// One forum listing page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForumEntry {
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub threads: Vec<ThreadLink>,
}

/// A thread as listed on a forum page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreadLink {
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub meta: String,
}

impl SearchIndex {
    pub fn is_empty(&self) -> bool {
        self.threads.is_empty() && self.forums.is_empty()
    }

    pub fn post_count(&self) -> usize {
        self.threads.values().map(|t| t.posts.len()).sum()
    }
}
