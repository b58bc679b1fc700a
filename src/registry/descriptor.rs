// src/registry/descriptor.rs

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single-file tracked entity.
///
/// Uniqueness key: `path`. Replaced, never mutated, when its file changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreDescriptor {
    pub name: String,
    pub path: PathBuf,
}

/// A directory-rooted tracked entity, identified by its manifest file.
///
/// `path` is the absolute path of the manifest; the component owns the
/// directory the manifest lives in.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentDescriptor {
    pub name: String,
    pub path: PathBuf,
    pub properties: ComponentProperties,
}

impl ComponentDescriptor {
    /// Directory owned by this component.
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new("/"))
    }
}

/// Parsed manifest contents.
///
/// ```json
/// {
///   "name": "another",
///   "logic": "./index.js",
///   "template": "test1.html",
///   "errorTemplate": "error.html",
///   "additional": "some"
/// }
/// ```
///
/// Role paths are relative to the manifest's directory. Unknown fields are
/// preserved in `additional`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default = "default_logic")]
    pub logic: String,

    pub template: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_template: Option<String>,

    #[serde(flatten)]
    pub additional: Map<String, Value>,
}

pub(crate) fn default_logic() -> String {
    "./index.js".to_string()
}
