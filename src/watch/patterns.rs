// src/watch/patterns.rs

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobMatcher};

use crate::fs::FileSystem;
use crate::watch::path_utils::{normalize, relative_str};

/// A compiled entity glob, e.g. `stores/**/*.js` or
/// `components/**/component.json`.
///
/// The pattern is relative to the project root. The static prefix before the
/// first wildcard segment (`stores`, `components`) is the directory a raw
/// source has to watch in order to see every path the glob can match.
#[derive(Clone)]
pub struct EntityGlob {
    pattern: String,
    base: PathBuf,
    matcher: GlobMatcher,
}

impl fmt::Debug for EntityGlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityGlob")
            .field("pattern", &self.pattern)
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

impl EntityGlob {
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = pattern.replace('\\', "/");
        let glob = Glob::new(&pattern)
            .with_context(|| format!("invalid glob pattern: {pattern}"))?;
        Ok(Self {
            base: static_base(&pattern),
            matcher: glob.compile_matcher(),
            pattern,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Static directory prefix of the pattern, relative to the project root.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Returns true if the glob matches a path relative to the project root,
    /// e.g. `"stores/user/Profile.js"`.
    pub fn matches(&self, rel_path: &str) -> bool {
        self.matcher.is_match(rel_path)
    }

    /// Returns true if `path` lies under `root` and matches the glob.
    pub fn matches_under(&self, root: &Path, path: &Path) -> bool {
        relative_str(root, path).is_some_and(|rel| self.matches(&rel))
    }
}

/// Everything before the first segment containing a glob metacharacter.
fn static_base(pattern: &str) -> PathBuf {
    let mut base = PathBuf::new();
    for segment in pattern.split('/') {
        if segment.is_empty() || segment.contains(['*', '?', '[', ']', '{', '}']) {
            break;
        }
        base.push(segment);
    }

    // A glob without wildcards names a single file; watch its parent.
    if base.as_os_str().len() == pattern.trim_end_matches('/').len() {
        base.pop();
    }
    normalize(&base)
}

/// Collect all files under `root` that match `glob`, starting the walk at the
/// glob's static base so unrelated trees are never read.
pub fn collect_matching_files(
    fs: &dyn FileSystem,
    root: &Path,
    glob: &EntityGlob,
) -> Result<Vec<PathBuf>> {
    let files = collect_files(fs, &root.join(glob.base()))?;
    Ok(files
        .into_iter()
        .filter(|path| glob.matches_under(root, path))
        .collect())
}

/// Every file beneath `dir`, sorted. A missing directory yields nothing.
pub fn collect_files(fs: &dyn FileSystem, dir: &Path) -> Result<Vec<PathBuf>> {
    if !fs.is_dir(dir) {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    let mut stack = vec![dir.to_path_buf()];

    while let Some(dir) = stack.pop() {
        for path in fs.read_dir(&dir)? {
            if fs.is_dir(&path) {
                stack.push(path);
            } else if fs.is_file(&path) {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}
