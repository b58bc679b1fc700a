// src/watch/classifier.rs

//! Decide which declared role a changed file plays inside its component.

use std::path::Path;

use crate::registry::ComponentDescriptor;
use crate::watch::path_utils::{relative_str, to_slash};

/// Role of a changed file within a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRole {
    Logic,
    Template,
    ErrorTemplate,
    Asset,
}

impl FileRole {
    /// Template and error template changes both mean "re-render".
    pub fn is_template(self) -> bool {
        matches!(self, FileRole::Template | FileRole::ErrorTemplate)
    }
}

/// Classify `changed` against the roles `component` declares.
///
/// Both sides are reduced to slash-separated paths relative to `base` (the
/// project root) before comparing. Roles are tested in the fixed order
/// logic, template, error template; the first match wins.
pub fn classify(base: &Path, component: &ComponentDescriptor, changed: &Path) -> FileRole {
    let changed = key(base, changed);
    let dir = component.dir();
    let props = &component.properties;

    let declared = [
        (FileRole::Logic, Some(props.logic.as_str())),
        (FileRole::Template, Some(props.template.as_str())),
        (FileRole::ErrorTemplate, props.error_template.as_deref()),
    ];

    declared
        .into_iter()
        .filter_map(|(role, rel)| rel.map(|rel| (role, rel)))
        .find(|(_, rel)| key(base, &dir.join(rel)) == changed)
        .map_or(FileRole::Asset, |(role, _)| role)
}

fn key(base: &Path, path: &Path) -> String {
    relative_str(base, path).unwrap_or_else(|| to_slash(path))
}
