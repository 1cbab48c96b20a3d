use assert_cmd::Command;
use predicates::str::contains;
use serde_json::Value;

use forum_search::model::SearchIndex;

mod util;
use util::{TempFixtureDir, fixture};

fn cmd(tmp: &TempFixtureDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("forum-search"));
    cmd.env("XDG_CONFIG_HOME", tmp.path().join("config"));
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn convert_index_and_search() {
    let tmp = TempFixtureDir::new();
    let site = tmp.path().join("website");

    cmd(&tmp)
        .args(["convert", "--index", "--sql"])
        .arg(fixture("sonichub.sql"))
        .arg("--attachments")
        .arg(fixture("attachments"))
        .arg("--out")
        .arg(&site)
        .assert()
        .success()
        .stdout(contains("Wrote 3 forum pages and 3 thread pages"))
        .stdout(contains("Indexed 3 threads and 3 forums"));

    for name in [
        "index.html",
        "style.css",
        "forum_1.html",
        "forum_2.html",
        "forum_3.html",
        "thread_10.html",
        "thread_20.html",
        "thread_30.html",
        "search_index.json",
        "attachments/month_0801/ring.png",
    ] {
        assert!(site.join(name).is_file(), "{name} missing");
    }

    let raw = std::fs::read_to_string(site.join("search_index.json")).unwrap();
    let index: SearchIndex = serde_json::from_str(&raw).unwrap();
    let shadow = &index.threads["thread_30.html"];
    assert_eq!(shadow.title, "Chaos Control");
    assert_eq!(shadow.posts[0].author, "shadow");
    assert_eq!(shadow.posts[0].content, "It's old; very old.");
    assert_eq!(index.forums["forum_3.html"].threads[0].link, "thread_20.html");

    let assert = cmd(&tmp)
        .args(["search", "emerald", "--format", "json", "--index"])
        .arg(site.join("search_index.json"))
        .assert()
        .success();
    let json: Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(json["hits"][0]["file"], "thread_20.html");
    assert_eq!(json["hits"][0]["author"], "knuckles");
}

#[test]
fn reindex_existing_site_to_custom_output() {
    let tmp = TempFixtureDir::new();
    let site = tmp.path().join("website");

    cmd(&tmp)
        .args(["convert", "--sql"])
        .arg(fixture("sonichub.sql"))
        .arg("--out")
        .arg(&site)
        .assert()
        .success();
    assert!(!site.join("search_index.json").exists());

    let out = tmp.path().join("idx.json");
    cmd(&tmp)
        .args(["index", "--site"])
        .arg(&site)
        .arg("--output")
        .arg(&out)
        .assert()
        .success()
        .stdout(contains("Indexed 3 threads"));

    cmd(&tmp)
        .args(["search", "dreamcast", "--index"])
        .arg(&out)
        .assert()
        .success()
        .stdout(contains("<a href=\"thread_10.html\">"))
        .stdout(contains("<mark>Dreamcast</mark>"));
}

#[test]
fn convert_missing_dump_fails() {
    let tmp = TempFixtureDir::new();
    cmd(&tmp)
        .args(["convert", "--sql"])
        .arg(tmp.path().join("missing.sql"))
        .arg("--out")
        .arg(tmp.path().join("website"))
        .assert()
        .failure()
        .code(1)
        .stderr(contains("missing.sql"));
}

#[test]
fn index_without_site_fails() {
    let tmp = TempFixtureDir::new();
    cmd(&tmp)
        .args(["index", "--site"])
        .arg(tmp.path().join("nowhere"))
        .assert()
        .failure()
        .stderr(contains("nowhere"));
}
