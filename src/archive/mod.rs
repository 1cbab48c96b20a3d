//! Forum database dump to static archive site.
//!
//! [`ForumArchive::from_dump`] reads forums, posts and attachments out of a
//! Discuz-style MySQL dump (`cdb_forums`, `cdb_posts`, `cdb_attachments`)
//! and groups posts into threads. [`site::generate`] then writes the HTML
//! pages that [`crate::indexer`] later indexes.

pub mod bbcode;
pub mod site;
pub mod sql_dump;

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use thiserror::Error;

use sql_dump::{Row, insert_rows};

const FORUMS_TABLE: &str = "cdb_forums";
const POSTS_TABLE: &str = "cdb_posts";
const ATTACHMENTS_TABLE: &str = "cdb_attachments";

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Failed to read dump {path}: {source}")]
    ReadDump {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to copy attachments: {0}")]
    CopyAttachments(#[from] walkdir::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Forum {
    pub fid: i64,
    /// Parent forum id, 0 for top level.
    pub fup: i64,
    /// `group`, `forum` or `sub`.
    pub kind: String,
    pub name: String,
    pub post_count: usize,
}

impl Forum {
    /// Groups and forums get their own page; sub-forums do not.
    pub fn is_listed(&self) -> bool {
        matches!(self.kind.as_str(), "forum" | "group")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub pid: i64,
    pub fid: i64,
    pub tid: i64,
    pub first: bool,
    pub author: String,
    pub author_id: i64,
    pub subject: String,
    /// Unix seconds.
    pub dateline: i64,
    /// BBCode source.
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub aid: i64,
    pub tid: i64,
    pub pid: i64,
    pub filename: String,
    /// Path relative to the attachments directory.
    pub path: String,
    pub is_image: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thread {
    pub tid: i64,
    /// Ordered by pid.
    pub posts: Vec<Post>,
}

impl Thread {
    pub fn first_post(&self) -> Option<&Post> {
        self.posts.first()
    }

    pub fn replies(&self) -> usize {
        self.posts.len().saturating_sub(1)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ForumArchive {
    pub forums: BTreeMap<i64, Forum>,
    pub threads: BTreeMap<i64, Thread>,
    pub attachments: HashMap<i64, Attachment>,
}

impl ForumArchive {
    /// Read and parse a dump file. Invalid UTF-8 is replaced, not rejected.
    pub fn load(path: &Path) -> Result<Self, ArchiveError> {
        let bytes = std::fs::read(path).map_err(|source| ArchiveError::ReadDump {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_dump(&String::from_utf8_lossy(&bytes)))
    }

    pub fn from_dump(dump: &str) -> Self {
        let mut archive = Self::default();

        for row in insert_rows(dump, FORUMS_TABLE) {
            if let Some(forum) = forum_from_row(&row) {
                archive.forums.insert(forum.fid, forum);
            }
        }

        let mut post_total = 0;
        for row in insert_rows(dump, POSTS_TABLE) {
            let Some(post) = post_from_row(&row) else {
                tracing::warn!(columns = row.len(), "skipping malformed post row");
                continue;
            };
            if let Some(forum) = archive.forums.get_mut(&post.fid) {
                forum.post_count += 1;
            }
            archive
                .threads
                .entry(post.tid)
                .or_insert_with(|| Thread {
                    tid: post.tid,
                    posts: Vec::new(),
                })
                .posts
                .push(post);
            post_total += 1;
        }
        for thread in archive.threads.values_mut() {
            thread.posts.sort_by_key(|p| p.pid);
        }

        for row in insert_rows(dump, ATTACHMENTS_TABLE) {
            let Some(att) = attachment_from_row(&row) else {
                tracing::warn!(columns = row.len(), "skipping malformed attachment row");
                continue;
            };
            archive.attachments.insert(att.aid, att);
        }

        tracing::info!(
            forums = archive.forums.len(),
            threads = archive.threads.len(),
            posts = post_total,
            attachments = archive.attachments.len(),
            "sql_parsed"
        );
        archive
    }

    pub fn post_count(&self) -> usize {
        self.threads.values().map(|t| t.posts.len()).sum()
    }

    /// Threads containing at least one post filed under `fid`.
    pub fn threads_touching(&self, fid: i64) -> usize {
        self.threads
            .values()
            .filter(|t| t.posts.iter().any(|p| p.fid == fid))
            .count()
    }

    /// Threads started in `fid`, newest first.
    pub fn threads_started_in(&self, fid: i64) -> Vec<&Thread> {
        let mut threads: Vec<&Thread> = self
            .threads
            .values()
            .filter(|t| t.first_post().is_some_and(|p| p.fid == fid))
            .collect();
        threads.sort_by_key(|t| std::cmp::Reverse(t.first_post().map_or(0, |p| p.dateline)));
        threads
    }
}

fn single_line(s: &str) -> String {
    s.replace(['\r', '\n'], "")
}

fn unix_newlines(s: &str) -> String {
    s.replace("\r\n", "\n")
}

fn forum_from_row(row: &Row) -> Option<Forum> {
    if row.len() < 4 {
        return None;
    }
    Some(Forum {
        fid: row[0].as_i64().unwrap_or(0),
        fup: row[1].as_i64().unwrap_or(0),
        kind: row[2].as_str().to_string(),
        name: single_line(row[3].as_str()),
        post_count: 0,
    })
}

fn post_from_row(row: &Row) -> Option<Post> {
    if row.len() < 9 {
        return None;
    }
    Some(Post {
        pid: row[0].as_i64()?,
        fid: row[1].as_i64()?,
        tid: row[2].as_i64()?,
        first: row[3].as_i64()? != 0,
        author: row[4].as_str().to_string(),
        author_id: row[5].as_i64()?,
        subject: unix_newlines(row[6].as_str()),
        dateline: row[7].as_i64()?,
        message: unix_newlines(row[8].as_str()),
    })
}

fn attachment_from_row(row: &Row) -> Option<Attachment> {
    if row.len() < 11 {
        return None;
    }
    Some(Attachment {
        aid: row[0].as_i64()?,
        tid: row[1].as_i64()?,
        pid: row[2].as_i64()?,
        filename: row[6].as_str().to_string(),
        path: row[10].as_str().to_string(),
        is_image: row.get(12).and_then(|v| v.as_i64()).unwrap_or(0) != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUMP: &str = "\
INSERT INTO `cdb_forums` VALUES (1,0,'group','Sonic World\\r\\n'),(2,1,'forum','Sega Games'),(3,2,'sub','Hidden');
INSERT INTO `cdb_posts` VALUES (12,2,5,0,'amy',4,'',1200000100,'reply'),(10,2,5,1,'tails',3,'Hello',1200000000,'first\\r\\npost');
INSERT INTO `cdb_posts` VALUES (20,3,6,1,'knux',5,'Hidden thread',1300000000,'x'),(oops,2,5,0,'bad',1,'',0,'');
INSERT INTO `cdb_posts` VALUES (21,2,6,0,'shadow',6,'',1300000100,'cross-post');
INSERT INTO `cdb_attachments` VALUES (7,5,10,1200000000,0,0,'ring.png','image/png',100,0,'0801/ring.png',3,1);
";

    #[test]
    fn test_parses_forums_posts_and_attachments() {
        let archive = ForumArchive::from_dump(DUMP);
        assert_eq!(archive.forums.len(), 3);
        assert_eq!(archive.forums[&1].name, "Sonic World");
        assert!(archive.forums[&2].is_listed());
        assert!(!archive.forums[&3].is_listed());

        assert_eq!(archive.post_count(), 4, "malformed row is skipped");
        assert_eq!(archive.forums[&2].post_count, 3);

        let thread = &archive.threads[&5];
        let pids: Vec<_> = thread.posts.iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![10, 12]);
        assert_eq!(thread.first_post().unwrap().message, "first\npost");
        assert!(thread.first_post().unwrap().first);
        assert_eq!(thread.replies(), 1);

        let att = &archive.attachments[&7];
        assert_eq!(att.filename, "ring.png");
        assert_eq!(att.path, "0801/ring.png");
        assert!(att.is_image);
    }

    #[test]
    fn test_thread_membership() {
        let archive = ForumArchive::from_dump(DUMP);
        // thread 6 starts in forum 3 but has a post in forum 2
        assert_eq!(archive.threads_touching(2), 2);
        let started: Vec<_> = archive.threads_started_in(2).iter().map(|t| t.tid).collect();
        assert_eq!(started, vec![5]);
        let started: Vec<_> = archive.threads_started_in(3).iter().map(|t| t.tid).collect();
        assert_eq!(started, vec![6]);
    }

    #[test]
    fn test_load_missing_dump() {
        let err = ForumArchive::load(Path::new("/definitely/not/here.sql")).unwrap_err();
        assert!(matches!(err, ArchiveError::ReadDump { .. }));
    }
}
