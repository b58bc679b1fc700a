// src/registry/finder.rs

//! Entity finders.
//!
//! The watch engine never touches the registry directly; it goes through the
//! [`EntityFinder`] trait so tests can substitute their own registry and the
//! production finder can scan a real project tree.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::errors::{DevwatchError, Result};
use crate::fs::FileSystem;
use crate::registry::manifest::read_component_descriptor;
use crate::registry::store::store_descriptor;
use crate::registry::{ComponentDescriptor, DirectoryIndex, EntityRegistry, StoreDescriptor};
use crate::watch::patterns::{collect_matching_files, EntityGlob};
use crate::watch::path_utils::normalize;

/// Registry operations the watch engine relies on.
pub trait EntityFinder: Send + fmt::Debug {
    /// Populate the initial registry snapshot. Called once before watching.
    fn find(&mut self) -> Result<()>;

    /// Project root all globs are relative to.
    fn root(&self) -> &Path;

    fn stores_glob(&self) -> &EntityGlob;

    fn components_glob(&self) -> &EntityGlob;

    fn found_stores(&self) -> &BTreeMap<PathBuf, StoreDescriptor>;

    fn found_components_by_dirs(&self) -> &DirectoryIndex;

    fn dirs_of_found_components(&self) -> Vec<PathBuf> {
        self.found_components_by_dirs().keys().cloned().collect()
    }

    /// Register (or replace) the store at `path` and return its descriptor.
    fn add_store_by_filename(&mut self, path: &Path) -> Result<StoreDescriptor>;

    /// Deregister the store at `path`, returning the descriptor it had.
    fn delete_store_by_filename(&mut self, path: &Path) -> Option<StoreDescriptor>;

    /// Read and parse the manifest at `path`. Does not register anything.
    fn create_component_descriptor(&self, path: &Path) -> Result<ComponentDescriptor>;

    fn add_component_to_registry(&mut self, descriptor: ComponentDescriptor) -> Result<()>;

    /// Returns the removed descriptor, or `None` if it was not registered.
    fn remove_component_from_registry(
        &mut self,
        descriptor: &ComponentDescriptor,
    ) -> Option<ComponentDescriptor>;
}

/// Finder backed by a [`FileSystem`].
pub struct FsEntityFinder {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    stores_glob: EntityGlob,
    components_glob: EntityGlob,
    registry: EntityRegistry,
}

impl fmt::Debug for FsEntityFinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FsEntityFinder")
            .field("root", &self.root)
            .field("stores_glob", &self.stores_glob)
            .field("components_glob", &self.components_glob)
            .field("stores", &self.registry.stores().len())
            .field("components", &self.registry.components().len())
            .finish()
    }
}

impl FsEntityFinder {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        root: impl AsRef<Path>,
        stores_glob: EntityGlob,
        components_glob: EntityGlob,
    ) -> Self {
        Self {
            fs,
            root: normalize(root.as_ref()),
            stores_glob,
            components_glob,
            registry: EntityRegistry::new(),
        }
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    fn find_stores(&mut self) -> Result<()> {
        let files = collect_matching_files(self.fs.as_ref(), &self.root, &self.stores_glob)?;
        for path in files {
            let descriptor = store_descriptor(&self.root, &self.stores_glob, &path);
            debug!(store = %descriptor.name, ?path, "found store");
            self.registry.put_store(descriptor);
        }
        Ok(())
    }

    fn find_components(&mut self) -> Result<()> {
        let files = collect_matching_files(self.fs.as_ref(), &self.root, &self.components_glob)?;
        for path in files {
            let descriptor = match read_component_descriptor(self.fs.as_ref(), &path) {
                Ok(d) => d,
                Err(err) => {
                    warn!(?path, error = %err, "skipping component with unreadable manifest");
                    continue;
                }
            };
            debug!(component = %descriptor.name, ?path, "found component");
            if let Err(err) = self.registry.insert_component(descriptor) {
                error!(error = %err, "skipping component");
            }
        }
        Ok(())
    }
}

impl EntityFinder for FsEntityFinder {
    fn find(&mut self) -> Result<()> {
        self.registry.clear();
        self.find_stores()?;
        self.find_components()?;
        info!(
            stores = self.registry.stores().len(),
            components = self.registry.components().len(),
            root = ?self.root,
            "entity discovery finished"
        );
        Ok(())
    }

    fn root(&self) -> &Path {
        &self.root
    }

    fn stores_glob(&self) -> &EntityGlob {
        &self.stores_glob
    }

    fn components_glob(&self) -> &EntityGlob {
        &self.components_glob
    }

    fn found_stores(&self) -> &BTreeMap<PathBuf, StoreDescriptor> {
        self.registry.stores()
    }

    fn found_components_by_dirs(&self) -> &DirectoryIndex {
        self.registry.components()
    }

    fn add_store_by_filename(&mut self, path: &Path) -> Result<StoreDescriptor> {
        let path = normalize(path);
        if !self.stores_glob.matches_under(&self.root, &path) {
            return Err(DevwatchError::ConfigError(format!(
                "{:?} does not match the stores glob {}",
                path,
                self.stores_glob.pattern()
            )));
        }
        let descriptor = store_descriptor(&self.root, &self.stores_glob, &path);
        self.registry.put_store(descriptor.clone());
        Ok(descriptor)
    }

    fn delete_store_by_filename(&mut self, path: &Path) -> Option<StoreDescriptor> {
        self.registry.remove_store(&normalize(path))
    }

    fn create_component_descriptor(&self, path: &Path) -> Result<ComponentDescriptor> {
        read_component_descriptor(self.fs.as_ref(), &normalize(path))
    }

    fn add_component_to_registry(&mut self, descriptor: ComponentDescriptor) -> Result<()> {
        self.registry.insert_component(descriptor)
    }

    fn remove_component_from_registry(
        &mut self,
        descriptor: &ComponentDescriptor,
    ) -> Option<ComponentDescriptor> {
        self.registry.remove_component(descriptor)
    }
}
