// src/watch/cover.rs

//! Overlap-free registration of recursive directory watches.
//!
//! Nested components ask for nested directories. Handing both to the OS
//! watcher as independent recursive watches delivers every event under the
//! inner directory twice, and unwatching the inner one strips the watches
//! the outer one relies on. `WatchCover` keeps the requested set apart from
//! the registered set: only directories with no requested ancestor are
//! registered, and removing one re-registers the requests it was covering.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Watcher calls needed to apply one cover update. `unwatch` runs first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverChange {
    pub unwatch: Vec<PathBuf>,
    pub watch: Vec<PathBuf>,
}

impl CoverChange {
    pub fn is_empty(&self) -> bool {
        self.unwatch.is_empty() && self.watch.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct WatchCover {
    requested: BTreeSet<PathBuf>,
    registered: BTreeSet<PathBuf>,
}

impl WatchCover {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directories callers asked to watch.
    pub fn requested(&self) -> &BTreeSet<PathBuf> {
        &self.requested
    }

    /// Directories actually registered with the OS watcher.
    pub fn registered(&self) -> &BTreeSet<PathBuf> {
        &self.registered
    }

    pub fn contains(&self, dir: &Path) -> bool {
        self.requested.contains(dir)
    }

    fn covered_by_registered(&self, dir: &Path) -> bool {
        self.registered
            .iter()
            .any(|r| r.as_path() != dir && dir.starts_with(r))
    }

    /// Request `dir`. A directory under a registered one needs no watcher
    /// call; one above registered directories replaces them.
    pub fn add(&mut self, dir: &Path) -> CoverChange {
        if !self.requested.insert(dir.to_path_buf()) || self.covered_by_registered(dir) {
            return CoverChange::default();
        }

        let nested: Vec<PathBuf> = self
            .registered
            .iter()
            .filter(|r| r.starts_with(dir))
            .cloned()
            .collect();
        for path in &nested {
            self.registered.remove(path);
        }
        self.registered.insert(dir.to_path_buf());

        CoverChange {
            unwatch: nested,
            watch: vec![dir.to_path_buf()],
        }
    }

    /// Drop the request for `dir`. Requests it was covering become
    /// registered themselves.
    pub fn remove(&mut self, dir: &Path) -> CoverChange {
        if !self.requested.remove(dir) || !self.registered.remove(dir) {
            return CoverChange::default();
        }

        let orphans: Vec<&PathBuf> = self
            .requested
            .iter()
            .filter(|r| r.starts_with(dir))
            .collect();
        let uncovered: Vec<PathBuf> = orphans
            .iter()
            .filter(|o| !orphans.iter().any(|a| a != *o && o.starts_with(a)))
            .map(|o| (*o).clone())
            .collect();
        self.registered.extend(uncovered.iter().cloned());

        CoverChange {
            unwatch: vec![dir.to_path_buf()],
            watch: uncovered,
        }
    }

    pub fn clear(&mut self) {
        self.requested.clear();
        self.registered.clear();
    }
}
