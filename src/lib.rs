pub mod archive;
pub mod config;
pub mod export;
pub mod indexer;
pub mod loader;
pub mod model;
pub mod search;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use archive::ForumArchive;
use config::Config;
use export::{ExportFormat, export_results};
use loader::{IndexLoader, IndexSource};
use search::{MatchMode, SearchClient, SearchScope};

/// Command-line interface.
#[derive(Parser, Debug)]
#[command(
    name = "forum-search",
    version,
    about = "Static forum archives: build them, index them, search them"
)]
pub struct Cli {
    /// Path to config.toml (defaults to the platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert a forum SQL dump into a static archive site
    Convert {
        /// MySQL dump containing cdb_forums, cdb_posts and cdb_attachments
        #[arg(long)]
        sql: PathBuf,

        /// Output directory for the site
        #[arg(long, default_value = "website")]
        out: PathBuf,

        /// Attachment files to copy into the site
        #[arg(long)]
        attachments: Option<PathBuf>,

        /// Also write search_index.json for the generated site
        #[arg(long)]
        index: bool,
    },
    /// Generate search_index.json from an archive site
    Index {
        /// Site directory containing thread_*.html and forum_*.html
        #[arg(long, default_value = "website")]
        site: PathBuf,

        /// Where to write the index (defaults to <site>/search_index.json)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Search an index and render the matches
    Search {
        /// Query words
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        /// Index file path or http(s) URL (overrides config)
        #[arg(long)]
        index: Option<String>,

        #[arg(long, value_enum, default_value_t = ExportFormat::Html)]
        format: ExportFormat,

        /// Maximum number of hits to show
        #[arg(long)]
        limit: Option<usize>,

        /// Snippet length in characters
        #[arg(long)]
        snippet_len: Option<usize>,

        /// Whether all or any query words must match
        #[arg(long, value_enum)]
        mode: Option<MatchMode>,

        #[arg(long, value_enum, default_value_t = SearchScope::All)]
        scope: SearchScope,

        /// Write the rendered results to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

/// Install the global tracing subscriber. `RUST_LOG` wins over `verbosity`.
pub fn init_tracing(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub async fn run_with(cli: Cli) -> Result<()> {
    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Convert {
            sql,
            out,
            attachments,
            index,
        } => run_convert(&config, &sql, &out, attachments.as_deref(), index),
        Commands::Index { site, output } => run_index(&site, output.as_deref()),
        Commands::Search {
            query,
            index,
            format,
            limit,
            snippet_len,
            mode,
            scope,
            output,
        } => {
            if let Some(index) = index {
                config.search.index = index;
            }
            if let Some(limit) = limit {
                config.search.limit = limit;
            }
            if let Some(len) = snippet_len {
                config.search.snippet_len = len;
            }
            if let Some(mode) = mode {
                config.search.match_mode = mode;
            }
            config.validate().context("invalid search options")?;

            let mut options = config.search.options();
            options.scope = scope;
            let rendered =
                run_search(&config.search.index, &query.join(" "), &options, format).await?;
            emit(&rendered, output.as_deref())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Config::load().context("loading config"),
    }
}

fn run_convert(
    config: &Config,
    sql: &Path,
    out: &Path,
    attachments: Option<&Path>,
    write_search_index: bool,
) -> Result<()> {
    let archive = ForumArchive::load(sql)?;
    let summary = archive::site::generate(&archive, out, &config.site, attachments)
        .with_context(|| format!("generating site in {}", out.display()))?;
    println!(
        "Wrote {} forum pages and {} thread pages to {}",
        summary.forum_pages,
        summary.thread_pages,
        out.display()
    );

    if write_search_index {
        run_index(out, None)?;
    }
    Ok(())
}

fn run_index(site: &Path, output: Option<&Path>) -> Result<()> {
    let index = indexer::generate_search_index(site)
        .with_context(|| format!("indexing {}", site.display()))?;
    let target = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| site.join(indexer::INDEX_FILE_NAME));
    indexer::write_index(&index, &target)
        .with_context(|| format!("writing {}", target.display()))?;
    println!(
        "Indexed {} threads and {} forums into {}",
        index.threads.len(),
        index.forums.len(),
        target.display()
    );
    Ok(())
}

/// Load the index from `location` once and render the results for `query`.
pub async fn run_search(
    location: &str,
    query: &str,
    options: &search::SearchOptions,
    format: ExportFormat,
) -> Result<String> {
    let source: IndexSource = location.parse()?;
    let loader = IndexLoader::new(source);
    let index = loader
        .load()
        .await
        .with_context(|| format!("loading search index from {}", loader.source()))?;
    let client = SearchClient::new(index);
    let results = client.search(query, options);
    Ok(export_results(&results, format))
}

fn emit(rendered: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, rendered)
            .with_context(|| format!("writing {}", path.display())),
        None => {
            print!("{rendered}");
            Ok(())
        }
    }
}
