// src/registry/manifest.rs

//! Component manifest parsing.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::errors::{DevwatchError, Result};
use crate::fs::FileSystem;
use crate::registry::descriptor::{ComponentDescriptor, ComponentProperties};

static COMPONENT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]+$").expect("component name pattern is valid")
});

/// Parse manifest JSON into properties. Does not validate the name.
pub fn parse_properties(path: &Path, contents: &str) -> Result<ComponentProperties> {
    serde_json::from_str(contents).map_err(|e| DevwatchError::manifest(path, e.to_string()))
}

/// Read and parse the manifest at `path` into a fresh descriptor.
///
/// The component name is `properties.name`, falling back to the name of the
/// directory holding the manifest.
pub fn read_component_descriptor(fs: &dyn FileSystem, path: &Path) -> Result<ComponentDescriptor> {
    let contents = fs
        .read_to_string(path)
        .map_err(|e| DevwatchError::manifest(path, format!("{e:#}")))?;
    let properties = parse_properties(path, &contents)?;

    let name = match properties.name.as_deref() {
        Some(name) => name.trim().to_string(),
        None => path
            .parent()
            .and_then(|dir| dir.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };

    if !COMPONENT_NAME.is_match(&name) {
        return Err(DevwatchError::manifest(
            path,
            format!("invalid component name {name:?} (expected letters, digits, '-' or '_')"),
        ));
    }
    if properties.template.trim().is_empty() {
        return Err(DevwatchError::manifest(path, "`template` must not be empty"));
    }

    Ok(ComponentDescriptor {
        name,
        path: path.to_path_buf(),
        properties,
    })
}
