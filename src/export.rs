//! Rendering of search results.
//!
//! - HTML - fragment for the archive site's search page (default)
//! - Markdown - headers and metadata tables
//! - JSON - structured data for programmatic use
//! - Plain Text - simple, copy-paste friendly format

use std::ops::Range;

use clap::ValueEnum;
use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::search::canonicalize::match_ranges;
use crate::search::{HitKind, SearchHit, SearchResults};

/// Supported output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ExportFormat {
    #[default]
    Html,
    Markdown,
    Json,
    #[value(name = "text")]
    PlainText,
}

/// Render search results in the requested format.
///
/// A query that normalized to nothing renders as an empty string in every
/// format except JSON, which always produces a document.
pub fn export_results(results: &SearchResults, format: ExportFormat) -> String {
    match format {
        ExportFormat::Html => render_html(results),
        ExportFormat::Markdown => export_markdown(results),
        ExportFormat::Json => export_json(results),
        ExportFormat::PlainText => export_plain_text(results),
    }
}

/// Escape `text` and wrap every token occurrence in `<mark>`.
pub fn highlight_html(text: &str, tokens: &[String]) -> String {
    let ranges = match_ranges(text, tokens);
    wrap_ranges(text, &ranges, |s| encode_text(s).into_owned(), "<mark>", "</mark>")
}

fn wrap_ranges(
    text: &str,
    ranges: &[Range<usize>],
    escape: impl Fn(&str) -> String,
    open: &str,
    close: &str,
) -> String {
    let mut out = String::with_capacity(text.len() + ranges.len() * (open.len() + close.len()));
    let mut cursor = 0;
    for r in ranges {
        out.push_str(&escape(&text[cursor..r.start]));
        out.push_str(open);
        out.push_str(&escape(&text[r.clone()]));
        out.push_str(close);
        cursor = r.end;
    }
    out.push_str(&escape(&text[cursor..]));
    out
}

fn render_html(results: &SearchResults) -> String {
    if results.tokens.is_empty() {
        return String::new();
    }

    let query = encode_text(&results.query);
    if results.hits.is_empty() {
        return format!("<p class=\"no-results\">No results for “{query}”</p>\n");
    }

    let mut out = String::new();
    let shown = if results.total > results.hits.len() {
        format!(" (showing {})", results.hits.len())
    } else {
        String::new()
    };
    out.push_str(&format!(
        "<p class=\"search-summary\">{} result{} for “{query}”{shown}</p>\n",
        results.total,
        if results.total == 1 { "" } else { "s" },
    ));
    out.push_str("<div class=\"search-results\">\n");

    for hit in &results.hits {
        let kind = match hit.kind {
            HitKind::Thread => "thread",
            HitKind::Forum => "forum",
        };
        out.push_str(&format!("  <div class=\"search-result {kind}\">\n"));
        out.push_str(&format!(
            "    <div class=\"result-title\"><a href=\"{}\">{}</a></div>\n",
            encode_double_quoted_attribute(&hit.file),
            highlight_html(&hit.title, &results.tokens),
        ));

        let mut meta = Vec::new();
        if let Some(author) = &hit.author {
            meta.push(format!("👤 {}", encode_text(author)));
        }
        if let Some(date) = &hit.date {
            meta.push(format!("🕐 {}", encode_text(date)));
        }
        meta.push(match hit.kind {
            HitKind::Thread => format!("{} matching posts", hit.matched_entries),
            HitKind::Forum => format!("{} matching threads", hit.matched_entries),
        });
        out.push_str(&format!(
            "    <div class=\"result-meta\">{}</div>\n",
            meta.join(" | ")
        ));

        out.push_str(&format!(
            "    <div class=\"result-snippet\">{}</div>\n",
            highlight_html(&hit.snippet, &results.tokens)
        ));
        out.push_str("  </div>\n");
    }

    out.push_str("</div>\n");
    out
}

/// Escape special Markdown characters to prevent formatting issues or injection.
fn escape_markdown(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('|', "\\|")
        .replace('*', "\\*")
        .replace('_', "\\_")
        .replace('[', "\\[")
        .replace(']', "\\]")
        .replace('<', "\\<")
        .replace('>', "\\>")
        .replace('`', "\\`")
}

fn export_markdown(results: &SearchResults) -> String {
    if results.tokens.is_empty() {
        return String::new();
    }

    let mut output = String::new();
    output.push_str("# Search Results\n\n");
    output.push_str(&format!(
        "**Query:** `{}` | **Results:** {}\n\n",
        results.query.replace('`', ""),
        results.total
    ));
    output.push_str("---\n\n");

    for (i, hit) in results.hits.iter().enumerate() {
        output.push_str(&format!(
            "## {}. [{}]({})\n\n",
            i + 1,
            escape_markdown(&hit.title),
            hit.file.replace(['(', ')', ' '], "")
        ));

        output.push_str("| Field | Value |\n");
        output.push_str("|-------|-------|\n");
        output.push_str(&format!("| Kind | {} |\n", kind_label(hit)));
        output.push_str(&format!("| Score | {} |\n", hit.score));
        if let Some(author) = &hit.author {
            output.push_str(&format!("| Author | {} |\n", escape_markdown(author)));
        }
        if let Some(date) = &hit.date {
            output.push_str(&format!("| Date | {} |\n", escape_markdown(date)));
        }
        output.push('\n');

        let ranges = match_ranges(&hit.snippet, &results.tokens);
        output.push_str("> ");
        output.push_str(&wrap_ranges(&hit.snippet, &ranges, escape_markdown, "**", "**"));
        output.push_str("\n\n---\n\n");
    }

    output
}

fn export_json(results: &SearchResults) -> String {
    let doc = serde_json::json!({
        "query": results.query,
        "tokens": results.tokens,
        "total": results.total,
        "count": results.hits.len(),
        "hits": results.hits,
    });

    serde_json::to_string_pretty(&doc).unwrap_or_else(|_| "{}".to_string())
}

fn export_plain_text(results: &SearchResults) -> String {
    if results.tokens.is_empty() {
        return String::new();
    }

    let mut output = String::new();
    output.push_str("SEARCH RESULTS\n");
    output.push_str(&"=".repeat(60));
    output.push('\n');
    output.push_str(&format!("Query: {}\n", results.query));
    output.push_str(&format!(
        "Results: {} (showing {})\n",
        results.total,
        results.hits.len()
    ));
    output.push_str(&"=".repeat(60));
    output.push_str("\n\n");

    for (i, hit) in results.hits.iter().enumerate() {
        output.push_str(&format!("[{}] {}\n", i + 1, hit.title));
        output.push_str(&"-".repeat(60));
        output.push('\n');
        output.push_str(&format!("Page: {} ({})\n", hit.file, kind_label(hit)));
        output.push_str(&format!("Score: {}\n", hit.score));
        if let Some(author) = &hit.author {
            output.push_str(&format!("Author: {author}\n"));
        }
        if let Some(date) = &hit.date {
            output.push_str(&format!("Date: {date}\n"));
        }
        output.push('\n');
        for line in hit.snippet.lines() {
            output.push_str(&format!("  {line}\n"));
        }
        output.push('\n');
    }

    output
}

fn kind_label(hit: &SearchHit) -> &'static str {
    match hit.kind {
        HitKind::Thread => "thread",
        HitKind::Forum => "forum",
    }
}
