// src/watch/resolver.rs

//! Map a changed path to the component that owns it.

use std::path::Path;

use crate::registry::{ComponentDescriptor, DirectoryIndex};
use crate::watch::path_utils::{normalize, same_path};

/// Outcome of resolving a changed path against the directory index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution<'a> {
    /// The path lives somewhere beneath this component's directory.
    Owned(&'a ComponentDescriptor),
    /// The path is the component's own manifest. Manifest edits are structural
    /// and belong to the manifest flow, not to content change handling.
    Manifest(&'a ComponentDescriptor),
    /// No registered component encloses the path.
    Unowned,
}

impl<'a> Resolution<'a> {
    pub fn owner(&self) -> Option<&'a ComponentDescriptor> {
        match *self {
            Resolution::Owned(d) => Some(d),
            _ => None,
        }
    }
}

/// Walk the ancestors of `changed` and return the nearest enclosing
/// directory present in `index`.
///
/// The index only stores component roots while changed files may sit in
/// arbitrarily deep subdirectories, so a direct lookup is not enough. Since a
/// directory has at most one owner, the first hit is the only candidate.
pub fn resolve<'a>(changed: &Path, index: &'a DirectoryIndex) -> Resolution<'a> {
    let changed = normalize(changed);

    for dir in changed.ancestors().skip(1) {
        if let Some(descriptor) = index.get(dir) {
            if same_path(&descriptor.path, &changed) {
                return Resolution::Manifest(descriptor);
            }
            return Resolution::Owned(descriptor);
        }
    }

    Resolution::Unowned
}
