//! User configuration.
//!
//! Stored in TOML format at `~/.config/forum-search/config.toml` (or the
//! XDG equivalent). Every key is optional; command-line flags override
//! whatever the file says.
//!
//! # Example Configuration
//!
//! ```toml
//! [search]
//! index = "https://archive.example.org/search_index.json"
//! limit = 20
//! snippet_len = 120
//! match_mode = "any"
//!
//! [site]
//! title = "SonicHub 討論區備份"
//! lang = "zh-TW"
//! backup_date = "2018年2月15日"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::search::query::{DEFAULT_LIMIT, DEFAULT_SNIPPET_LEN};
use crate::search::{MatchMode, SearchOptions};

const APP_DIR: &str = "forum-search";
const CONFIG_FILE: &str = "config.toml";
const MIN_SNIPPET_LEN: usize = 16;

/// Errors that can occur when loading or saving configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub site: SiteConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Index location: a file path or an http(s) URL.
    pub index: String,
    pub limit: usize,
    pub snippet_len: usize,
    pub match_mode: MatchMode,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            index: "website/search_index.json".into(),
            limit: DEFAULT_LIMIT,
            snippet_len: DEFAULT_SNIPPET_LEN,
            match_mode: MatchMode::All,
        }
    }
}

impl SearchConfig {
    pub fn options(&self) -> SearchOptions {
        SearchOptions {
            limit: self.limit,
            snippet_len: self.snippet_len,
            match_mode: self.match_mode,
            ..SearchOptions::default()
        }
    }
}

/// Presentation settings for generated archive pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub title: String,
    pub lang: String,
    /// Shown in the index page footer when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_date: Option<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "討論區備份".into(),
            lang: "zh-TW".into(),
            backup_date: None,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns defaults if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Get the default configuration file path.
    ///
    /// `$XDG_CONFIG_HOME/forum-search/config.toml` first, then the
    /// platform config dir.
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            return Ok(PathBuf::from(xdg_config).join(APP_DIR).join(CONFIG_FILE));
        }

        dirs::config_dir()
            .map(|p| p.join(APP_DIR).join(CONFIG_FILE))
            .ok_or(ConfigError::NoConfigDir)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.search.limit == 0 {
            return Err(ConfigError::Validation(
                "search.limit must be at least 1".into(),
            ));
        }

        if self.search.snippet_len < MIN_SNIPPET_LEN {
            return Err(ConfigError::Validation(format!(
                "search.snippet_len must be at least {MIN_SNIPPET_LEN}"
            )));
        }

        if self.search.index.trim().is_empty() {
            return Err(ConfigError::Validation(
                "search.index cannot be empty".into(),
            ));
        }

        if self.site.title.trim().is_empty() {
            return Err(ConfigError::Validation(
                "site.title cannot be empty".into(),
            ));
        }

        Ok(())
    }
}
