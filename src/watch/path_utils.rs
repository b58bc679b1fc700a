// src/watch/path_utils.rs

//! Utility functions for path handling in the watcher.
//!
//! Every comparison between an event path and a registered path goes through
//! [`normalize`] or [`to_slash`], so that `./index.js`, `index.js` and
//! `sub\..\index.js` compare equal regardless of platform separator.

use std::path::{Component, Path, PathBuf};

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// This is intentionally robust:
/// - First we try a direct `strip_prefix(root)`.
/// - If that fails (e.g. due to symlinks or different absolute prefixes),
///   we canonicalize both paths and try again.
/// - Only if both attempts fail do we give up.
///
/// Returns `None` if the path cannot be reasonably related to `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    let root = normalize(root);
    let path = normalize(path);

    if let Ok(rel) = path.strip_prefix(&root) {
        return Some(to_slash(rel));
    }

    // macOS reports /private/var/... for /var/..., so retry on canonical forms.
    if let (Ok(root_canon), Ok(path_canon)) = (root.canonicalize(), path.canonicalize()) {
        if let Ok(rel) = path_canon.strip_prefix(&root_canon) {
            return Some(to_slash(rel));
        }
    }

    None
}

/// Lexically normalize a path: drop `.` segments, fold `..` into the
/// preceding segment and unify separators. Does not touch the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let unified;
    let path = if cfg!(windows) {
        path
    } else {
        // A backslash is a legal filename byte on unix, but manifests written
        // on Windows use it as a separator.
        unified = PathBuf::from(path.to_string_lossy().replace('\\', "/"));
        unified.as_path()
    };

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = match out.components().next_back() {
                    Some(Component::Normal(_)) => out.pop(),
                    Some(Component::RootDir) | Some(Component::Prefix(_)) => true,
                    _ => false,
                };
                if !popped {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Render a path with forward slashes, after normalization.
pub fn to_slash(path: &Path) -> String {
    normalize(path).to_string_lossy().replace('\\', "/")
}

/// Compare two paths after normalization.
pub fn same_path(a: &Path, b: &Path) -> bool {
    normalize(a) == normalize(b)
}
