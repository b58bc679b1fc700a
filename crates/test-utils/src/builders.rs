#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use devwatch::fs::mock::MockFileSystem;
use devwatch::registry::{EntityFinder, FsEntityFinder};
use devwatch::watch::EntityGlob;
use serde_json::{json, Map, Value};

pub const ROOT: &str = "/proj";
pub const STORES_GLOB: &str = "stores/**/*.js";
pub const COMPONENTS_GLOB: &str = "components/**/component.json";

/// Absolute path under the mock project root.
pub fn project_path(rel: &str) -> PathBuf {
    Path::new(ROOT).join(rel)
}

/// Builder for component manifest JSON.
#[derive(Debug, Clone)]
pub struct ManifestBuilder {
    fields: Map<String, Value>,
}

impl ManifestBuilder {
    pub fn new(template: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("template".to_string(), json!(template));
        Self { fields }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.fields.insert("name".to_string(), json!(name));
        self
    }

    pub fn logic(mut self, logic: &str) -> Self {
        self.fields.insert("logic".to_string(), json!(logic));
        self
    }

    pub fn error_template(mut self, error_template: &str) -> Self {
        self.fields
            .insert("errorTemplate".to_string(), json!(error_template));
        self
    }

    pub fn extra(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }

    pub fn to_json(&self) -> String {
        Value::Object(self.fields.clone()).to_string()
    }
}

/// Builder for an in-memory project tree rooted at [`ROOT`].
#[derive(Debug, Clone)]
pub struct ProjectBuilder {
    fs: MockFileSystem,
}

impl ProjectBuilder {
    pub fn new() -> Self {
        let fs = MockFileSystem::new();
        fs.add_dir(ROOT);
        Self { fs }
    }

    /// Add `stores/<name>.js`.
    pub fn store(self, name: &str) -> Self {
        self.fs
            .add_file(project_path(&format!("stores/{name}.js")), "export default {}");
        self
    }

    /// Add `components/<dir>/component.json` with the given manifest.
    pub fn component(self, dir: &str, manifest: ManifestBuilder) -> Self {
        self.fs.add_file(
            project_path(&format!("components/{dir}/component.json")),
            manifest.to_json(),
        );
        self
    }

    /// Add an arbitrary file, relative to the project root.
    pub fn file(self, rel: &str, contents: &str) -> Self {
        self.fs.add_file(project_path(rel), contents);
        self
    }

    pub fn fs(&self) -> MockFileSystem {
        self.fs.clone()
    }

    /// Build a finder over the tree and run the initial discovery.
    ///
    /// The returned file system shares its tree with the finder, so tests
    /// can edit files after the snapshot was taken.
    pub fn build(self) -> (MockFileSystem, FsEntityFinder) {
        let mut finder = finder_for(&self.fs);
        finder.find().expect("initial discovery failed");
        (self.fs, finder)
    }
}

impl Default for ProjectBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Finder over `fs` using the default globs, without running discovery.
pub fn finder_for(fs: &MockFileSystem) -> FsEntityFinder {
    FsEntityFinder::new(
        Arc::new(fs.clone()),
        ROOT,
        EntityGlob::new(STORES_GLOB).expect("stores glob"),
        EntityGlob::new(COMPONENTS_GLOB).expect("components glob"),
    )
}
