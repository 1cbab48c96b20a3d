//! Fetch-and-cache of the search index document.
//!
//! The index is read once per session: from disk, or with a single HTTP GET
//! when the source is a URL. Concurrent callers wait on the same in-flight
//! load. A failed load leaves the cache empty so the next call retries.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::OnceCell;

use crate::model::SearchIndex;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to read index file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to fetch index: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("Index request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Failed to parse index JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid index URL: {0}")]
    Url(String),
}

/// Where the index document lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexSource {
    File(PathBuf),
    Url(reqwest::Url),
}

impl FromStr for IndexSource {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            reqwest::Url::parse(trimmed)
                .map(Self::Url)
                .map_err(|e| LoadError::Url(format!("{trimmed}: {e}")))
        } else {
            Ok(Self::File(PathBuf::from(trimmed)))
        }
    }
}

impl fmt::Display for IndexSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Url(url) => write!(f, "{url}"),
        }
    }
}

pub struct IndexLoader {
    source: IndexSource,
    http: reqwest::Client,
    cached: OnceCell<Arc<SearchIndex>>,
}

impl IndexLoader {
    pub fn new(source: IndexSource) -> Self {
        Self {
            source,
            http: reqwest::Client::new(),
            cached: OnceCell::new(),
        }
    }

    pub fn source(&self) -> &IndexSource {
        &self.source
    }

    pub fn is_loaded(&self) -> bool {
        self.cached.initialized()
    }

    /// Return the index, loading it on first use.
    pub async fn load(&self) -> Result<Arc<SearchIndex>, LoadError> {
        self.cached
            .get_or_try_init(|| async {
                let index = self.fetch().await?;
                tracing::info!(
                    source = %self.source,
                    threads = index.threads.len(),
                    forums = index.forums.len(),
                    "index_load"
                );
                Ok::<_, LoadError>(Arc::new(index))
            })
            .await
            .cloned()
    }

    async fn fetch(&self) -> Result<SearchIndex, LoadError> {
        let bytes = match &self.source {
            IndexSource::File(path) => {
                tokio::fs::read(path).await.map_err(|source| LoadError::Read {
                    path: path.clone(),
                    source,
                })?
            }
            IndexSource::Url(url) => {
                tracing::debug!(%url, "fetching index");
                let resp = self.http.get(url.clone()).send().await?;
                let status = resp.status();
                if !status.is_success() {
                    return Err(LoadError::Status {
                        url: url.to_string(),
                        status: status.as_u16(),
                    });
                }
                resp.bytes().await?.to_vec()
            }
        };
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX_JSON: &str = r#"{
        "threads": {
            "thread_7.html": {"file": "thread_7.html", "title": "Chaos Emeralds", "posts": []}
        },
        "forums": {},
        "generated_at": "2018-02-15T00:00:00Z"
    }"#;

    #[test]
    fn source_parses_urls_and_paths() {
        let url: IndexSource = "https://example.org/search_index.json".parse().unwrap();
        assert!(matches!(url, IndexSource::Url(_)));

        let upper: IndexSource = "HTTP://example.org/x.json".parse().unwrap();
        assert!(matches!(upper, IndexSource::Url(_)));

        let path: IndexSource = "website/search_index.json".parse().unwrap();
        assert_eq!(path, IndexSource::File(PathBuf::from("website/search_index.json")));
    }

    #[tokio::test]
    async fn file_source_loads_once() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("search_index.json");
        std::fs::write(&path, INDEX_JSON).unwrap();

        let loader = IndexLoader::new(IndexSource::File(path.clone()));
        assert!(!loader.is_loaded());
        let first = loader.load().await.unwrap();
        assert_eq!(first.threads["thread_7.html"].title, "Chaos Emeralds");

        // The cached copy survives the file going away.
        std::fs::remove_file(&path).unwrap();
        let second = loader.load().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn failed_load_is_retried() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("search_index.json");
        let loader = IndexLoader::new(IndexSource::File(path.clone()));

        let err = loader.load().await.unwrap_err();
        assert!(matches!(err, LoadError::Read { .. }));
        assert!(!loader.is_loaded());

        std::fs::write(&path, INDEX_JSON).unwrap();
        assert!(loader.load().await.is_ok());
    }

    #[tokio::test]
    async fn invalid_json_is_parse_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("search_index.json");
        std::fs::write(&path, "{not json").unwrap();
        let loader = IndexLoader::new(IndexSource::File(path));
        assert!(matches!(loader.load().await, Err(LoadError::Parse(_))));
    }
}
