//! Static site writer.
//!
//! Page structure (class names, the 👤/🕐/📁 markers) is what
//! [`crate::indexer`] reads back, so the two must change together.

use std::path::{Path, PathBuf};

use chrono::{Local, TimeZone};
use html_escape::{encode_double_quoted_attribute, encode_text};
use walkdir::WalkDir;

use super::{ArchiveError, Forum, ForumArchive, Thread, bbcode};
use crate::config::SiteConfig;

const STYLE_CSS: &str = include_str!("style.css");
const UNTITLED: &str = "(無標題)";
const UNKNOWN_FORUM: &str = "未知版塊";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteSummary {
    pub forum_pages: usize,
    pub thread_pages: usize,
    pub attachments_copied: usize,
}

pub fn forum_page_name(fid: i64) -> String {
    format!("forum_{fid}.html")
}

pub fn thread_page_name(tid: i64) -> String {
    format!("thread_{tid}.html")
}

fn format_dateline(ts: i64, fmt: &str) -> String {
    Local
        .timestamp_opt(ts, 0)
        .single()
        .map(|dt| dt.format(fmt).to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn subject_or_untitled(subject: &str) -> &str {
    if subject.trim().is_empty() {
        UNTITLED
    } else {
        subject
    }
}

fn page_head(title: &str, site: &SiteConfig) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="{lang}">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <link rel="stylesheet" href="style.css">
</head>
<body>
    <div class="container">
"#,
        lang = encode_double_quoted_attribute(&site.lang),
        title = encode_text(title),
    )
}

const PAGE_TAIL: &str = "    </div>\n</body>\n</html>\n";

/// Render `index.html`.
pub fn index_page(archive: &ForumArchive, site: &SiteConfig) -> String {
    let mut html = page_head(&site.title, site);
    html.push_str(&format!(
        "        <h1>{}</h1>\n",
        encode_text(&site.title)
    ));
    html.push_str(&format!(
        "        <div class=\"stats\">\n            📊 統計資料: {} 個討論版塊 | {} 篇文章 | {} 個附件\n        </div>\n\n",
        archive.forums.len(),
        archive.post_count(),
        archive.attachments.len()
    ));
    html.push_str("        <h2>討論版塊</h2>\n        <ul class=\"forum-list\">\n");

    for forum in archive.forums.values().filter(|f| f.is_listed()) {
        html.push_str(&format!(
            r#"            <li class="forum-item">
                <a href="{href}">{name}</a>
                <div class="thread-meta">{threads} 個主題 | {posts} 篇文章</div>
            </li>
"#,
            href = forum_page_name(forum.fid),
            name = encode_text(&forum.name),
            threads = archive.threads_touching(forum.fid),
            posts = forum.post_count,
        ));
    }
    html.push_str("        </ul>\n\n");

    html.push_str("        <div class=\"footer\" style=\"margin-top: 40px; text-align: center; color: #666; font-size: 0.9em;\">\n");
    if let Some(date) = &site.backup_date {
        html.push_str(&format!(
            "            <p>🕐 備份時間: {}</p>\n",
            encode_text(date)
        ));
    }
    html.push_str("            <p>靜態網站版本</p>\n        </div>\n");
    html.push_str(PAGE_TAIL);
    html
}

/// Render `forum_{fid}.html`.
pub fn forum_page(archive: &ForumArchive, forum: &Forum, site: &SiteConfig) -> String {
    let threads = archive.threads_started_in(forum.fid);

    let mut html = page_head(&format!("{} - {}", forum.name, site.title), site);
    html.push_str(
        "        <div class=\"navigation\">\n            <a href=\"index.html\">🏠 首頁</a>\n        </div>\n\n",
    );
    html.push_str(&format!(
        "        <h1>📁 {}</h1>\n        <p>共 {} 個主題，{} 篇文章</p>\n\n",
        encode_text(&forum.name),
        threads.len(),
        forum.post_count
    ));
    html.push_str("        <ul class=\"thread-list\">\n");

    for thread in threads {
        let Some(first) = thread.first_post() else {
            continue;
        };
        html.push_str(&format!(
            r#"            <li class="thread-item">
                <div class="thread-title">
                    <a href="{href}">{title}</a>
                </div>
                <div class="thread-meta">
                    👤 {author} | 🕐 {date} | 💬 {replies} 個回覆
                </div>
            </li>
"#,
            href = thread_page_name(thread.tid),
            title = encode_text(subject_or_untitled(&first.subject)),
            author = encode_text(&first.author),
            date = format_dateline(first.dateline, "%Y-%m-%d %H:%M"),
            replies = thread.replies(),
        ));
    }

    html.push_str("        </ul>\n");
    html.push_str(PAGE_TAIL);
    html
}

/// Render `thread_{tid}.html`.
pub fn thread_page(archive: &ForumArchive, thread: &Thread, site: &SiteConfig) -> Option<String> {
    let first = thread.first_post()?;
    let subject = subject_or_untitled(&first.subject);
    let forum_name = archive
        .forums
        .get(&first.fid)
        .map(|f| f.name.as_str())
        .unwrap_or(UNKNOWN_FORUM);

    let mut html = page_head(&format!("{subject} - {}", site.title), site);
    html.push_str(&format!(
        r#"        <div class="navigation">
            <a href="index.html">🏠 首頁</a>
            <a href="{href}">📁 {forum}</a>
        </div>

        <h1>{subject}</h1>

"#,
        href = forum_page_name(first.fid),
        forum = encode_text(forum_name),
        subject = encode_text(subject),
    ));

    for (i, post) in thread.posts.iter().enumerate() {
        let class = if i == 0 { "post first-post" } else { "post" };
        html.push_str(&format!(
            r#"        <div class="{class}">
            <div class="post-header">
                <span class="post-author">👤 {author}</span>
                <span class="post-date">🕐 {date}</span>
                <div style="clear: both;"></div>
            </div>

            <div class="post-content">
                {body}
            </div>
        </div>

"#,
            author = encode_text(&post.author),
            date = format_dateline(post.dateline, "%Y-%m-%d %H:%M:%S"),
            body = bbcode::to_html(&post.message, &archive.attachments),
        ));
    }

    html.push_str(PAGE_TAIL);
    Some(html)
}

fn write_err(path: &Path) -> impl FnOnce(std::io::Error) -> ArchiveError + use<> {
    let path = path.to_path_buf();
    move |source| ArchiveError::Write { path, source }
}

fn write_file(path: PathBuf, content: &str) -> Result<(), ArchiveError> {
    std::fs::write(&path, content).map_err(write_err(&path))
}

/// Replace `dst` with a copy of the `src` tree; returns files copied.
fn copy_tree(src: &Path, dst: &Path) -> Result<usize, ArchiveError> {
    if dst.exists() {
        std::fs::remove_dir_all(dst).map_err(write_err(dst))?;
    }

    let mut copied = 0;
    for entry in WalkDir::new(src) {
        let entry = entry?;
        let rel = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(write_err(&target))?;
        } else if entry.file_type().is_file() {
            std::fs::copy(entry.path(), &target).map_err(write_err(&target))?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Write the whole site into `out_dir`.
#[tracing::instrument(skip_all, fields(out = %out_dir.display()))]
pub fn generate(
    archive: &ForumArchive,
    out_dir: &Path,
    site: &SiteConfig,
    attachments_dir: Option<&Path>,
) -> Result<SiteSummary, ArchiveError> {
    std::fs::create_dir_all(out_dir).map_err(write_err(out_dir))?;

    let mut summary = SiteSummary::default();

    if let Some(src) = attachments_dir.filter(|p| p.is_dir()) {
        summary.attachments_copied = copy_tree(src, &out_dir.join("attachments"))?;
        tracing::debug!(files = summary.attachments_copied, "copied attachments");
    }

    write_file(out_dir.join("style.css"), STYLE_CSS)?;
    write_file(out_dir.join("index.html"), &index_page(archive, site))?;

    for forum in archive.forums.values().filter(|f| f.is_listed()) {
        write_file(
            out_dir.join(forum_page_name(forum.fid)),
            &forum_page(archive, forum, site),
        )?;
        summary.forum_pages += 1;
    }

    for thread in archive.threads.values() {
        if let Some(page) = thread_page(archive, thread, site) {
            write_file(out_dir.join(thread_page_name(thread.tid)), &page)?;
            summary.thread_pages += 1;
        }
    }

    tracing::info!(
        forum_pages = summary.forum_pages,
        thread_pages = summary.thread_pages,
        attachments = summary.attachments_copied,
        "site_generated"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::{parse_forum_page, parse_thread_page};
    use tempfile::TempDir;

    const DUMP: &str = "\
INSERT INTO `cdb_forums` VALUES (1,0,'group','Sonic World'),(2,1,'forum','Sega <Games>'),(3,2,'sub','Hidden');
INSERT INTO `cdb_posts` VALUES (10,2,5,1,'tails',3,'Chaos Emeralds',1200000000,'[b]Seven[/b] emeralds\\nfound'),(11,2,5,0,'amy',4,'',1200000100,'[attach]7[/attach]');
INSERT INTO `cdb_posts` VALUES (30,2,8,1,'knux',5,'',1300000000,'untitled thread');
INSERT INTO `cdb_attachments` VALUES (7,5,11,0,0,0,'ring.png','image/png',1,0,'0801/ring.png',0,1);
";

    fn site() -> SiteConfig {
        SiteConfig {
            title: "SonicHub 討論區備份".into(),
            lang: "zh-TW".into(),
            backup_date: Some("2018年2月15日".into()),
        }
    }

    #[test]
    fn test_index_page_lists_visible_forums() {
        let archive = ForumArchive::from_dump(DUMP);
        let html = index_page(&archive, &site());
        assert!(html.contains("<html lang=\"zh-TW\">"));
        assert!(html.contains("3 個討論版塊 | 3 篇文章 | 1 個附件"));
        assert!(html.contains("<a href=\"forum_1.html\">Sonic World</a>"));
        assert!(html.contains("<a href=\"forum_2.html\">Sega &lt;Games&gt;</a>"));
        assert!(html.contains("2 個主題 | 3 篇文章"));
        assert!(!html.contains("forum_3.html"));
        assert!(html.contains("備份時間: 2018年2月15日"));
    }

    #[test]
    fn test_forum_page_newest_first() {
        let archive = ForumArchive::from_dump(DUMP);
        let html = forum_page(&archive, &archive.forums[&2], &site());
        let newer = html.find("thread_8.html").unwrap();
        let older = html.find("thread_5.html").unwrap();
        assert!(newer < older);
        assert!(html.contains(UNTITLED));
        assert!(html.contains("💬 1 個回覆"));
    }

    #[test]
    fn test_thread_page_renders_posts() {
        let archive = ForumArchive::from_dump(DUMP);
        let html = thread_page(&archive, &archive.threads[&5], &site()).unwrap();
        assert!(html.contains("<title>Chaos Emeralds - SonicHub 討論區備份</title>"));
        assert!(html.contains("<div class=\"post first-post\">"));
        assert!(html.contains("<strong>Seven</strong> emeralds<br>found"));
        assert!(html.contains("attachments/0801/ring.png"));
        assert!(html.contains("📁 Sega &lt;Games&gt;"));
    }

    #[test]
    fn test_pages_round_trip_through_indexer() {
        let archive = ForumArchive::from_dump(DUMP);
        let html = thread_page(&archive, &archive.threads[&5], &site()).unwrap();
        let entry = parse_thread_page("thread_5.html", &html);
        assert_eq!(entry.title, "Chaos Emeralds");
        assert_eq!(entry.posts.len(), 2);
        assert_eq!(entry.posts[0].author, "tails");
        assert_eq!(entry.posts[0].content, "Seven emeralds found");

        let html = forum_page(&archive, &archive.forums[&2], &site());
        let forum = parse_forum_page("forum_2.html", &html);
        assert_eq!(forum.title, "Sega <Games>");
        assert_eq!(forum.threads.len(), 2);
        assert_eq!(forum.threads[1].title, "Chaos Emeralds");
    }

    #[test]
    fn test_generate_writes_site() {
        let tmp = TempDir::new().unwrap();
        let attachments = tmp.path().join("attachments_src");
        std::fs::create_dir_all(attachments.join("0801")).unwrap();
        std::fs::write(attachments.join("0801/ring.png"), b"png").unwrap();

        let out = tmp.path().join("website");
        let archive = ForumArchive::from_dump(DUMP);
        let summary = generate(&archive, &out, &site(), Some(&attachments)).unwrap();

        assert_eq!(
            summary,
            SiteSummary {
                forum_pages: 2,
                thread_pages: 2,
                attachments_copied: 1,
            }
        );
        for name in ["style.css", "index.html", "forum_1.html", "forum_2.html", "thread_5.html", "thread_8.html"] {
            assert!(out.join(name).is_file(), "{name} missing");
        }
        assert!(out.join("attachments/0801/ring.png").is_file());
    }
}
