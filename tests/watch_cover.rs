// tests/watch_cover.rs

use std::path::{Path, PathBuf};

use devwatch::watch::{CoverChange, WatchCover};

fn p(path: &str) -> PathBuf {
    PathBuf::from(path)
}

fn change(unwatch: &[&str], watch: &[&str]) -> CoverChange {
    CoverChange {
        unwatch: unwatch.iter().map(|s| p(s)).collect(),
        watch: watch.iter().map(|s| p(s)).collect(),
    }
}

fn registered(cover: &WatchCover) -> Vec<&Path> {
    cover.registered().iter().map(PathBuf::as_path).collect()
}

#[test]
fn inner_directory_under_a_watched_one_needs_no_watch() {
    let mut cover = WatchCover::new();

    assert_eq!(cover.add(Path::new("/c/outer")), change(&[], &["/c/outer"]));
    assert!(cover.add(Path::new("/c/outer/inner")).is_empty());

    assert!(cover.contains(Path::new("/c/outer/inner")));
    assert_eq!(registered(&cover), vec![Path::new("/c/outer")]);
}

#[test]
fn outer_directory_replaces_registered_inner_ones() {
    let mut cover = WatchCover::new();
    cover.add(Path::new("/c/outer/a"));
    cover.add(Path::new("/c/outer/b"));
    cover.add(Path::new("/c/other"));

    assert_eq!(
        cover.add(Path::new("/c/outer")),
        change(&["/c/outer/a", "/c/outer/b"], &["/c/outer"])
    );
    assert_eq!(
        registered(&cover),
        vec![Path::new("/c/other"), Path::new("/c/outer")]
    );
}

#[test]
fn removing_a_covered_directory_keeps_the_outer_watch() {
    let mut cover = WatchCover::new();
    cover.add(Path::new("/c/outer"));
    cover.add(Path::new("/c/outer/inner"));

    assert!(cover.remove(Path::new("/c/outer/inner")).is_empty());
    assert_eq!(registered(&cover), vec![Path::new("/c/outer")]);
    assert!(!cover.contains(Path::new("/c/outer/inner")));
}

#[test]
fn removing_the_outer_directory_registers_the_top_uncovered_ones() {
    let mut cover = WatchCover::new();
    for dir in ["/c/outer", "/c/outer/a", "/c/outer/a/deep", "/c/outer/b"] {
        cover.add(Path::new(dir));
    }

    assert_eq!(
        cover.remove(Path::new("/c/outer")),
        change(&["/c/outer"], &["/c/outer/a", "/c/outer/b"])
    );
    assert_eq!(
        registered(&cover),
        vec![Path::new("/c/outer/a"), Path::new("/c/outer/b")]
    );
}

#[test]
fn siblings_with_a_shared_prefix_do_not_cover_each_other() {
    let mut cover = WatchCover::new();
    cover.add(Path::new("/c/card"));

    assert_eq!(cover.add(Path::new("/c/card-list")), change(&[], &["/c/card-list"]));
    assert!(cover.add(Path::new("/c/card")).is_empty());
    assert!(cover.remove(Path::new("/c/missing")).is_empty());
}
