// src/registry/mod.rs

//! Entity registry and finders.
//!
//! The registry holds the currently known stores and components, plus the
//! directory index used to resolve which component owns a changed file:
//! - [`descriptor`] defines `StoreDescriptor` / `ComponentDescriptor`.
//! - [`manifest`] parses component manifests.
//! - [`store`] derives store names from file paths.
//! - [`finder`] scans the project and exposes the registry operations the
//!   watch engine drives.

pub mod descriptor;
pub mod finder;
pub mod manifest;
pub mod store;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::errors::{DevwatchError, Result};

pub use descriptor::{ComponentDescriptor, ComponentProperties, StoreDescriptor};
pub use finder::{EntityFinder, FsEntityFinder};

/// Directory → owning component.
pub type DirectoryIndex = BTreeMap<PathBuf, ComponentDescriptor>;

/// Currently known entities.
///
/// Stores are keyed by file path, components by the directory their
/// manifest lives in. At most one component owns a directory.
#[derive(Debug, Default, Clone)]
pub struct EntityRegistry {
    stores: BTreeMap<PathBuf, StoreDescriptor>,
    components: DirectoryIndex,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.stores.clear();
        self.components.clear();
    }

    pub fn stores(&self) -> &BTreeMap<PathBuf, StoreDescriptor> {
        &self.stores
    }

    pub fn components(&self) -> &DirectoryIndex {
        &self.components
    }

    /// Insert or replace the store at `descriptor.path`.
    pub fn put_store(&mut self, descriptor: StoreDescriptor) -> Option<StoreDescriptor> {
        self.stores.insert(descriptor.path.clone(), descriptor)
    }

    pub fn remove_store(&mut self, path: &Path) -> Option<StoreDescriptor> {
        self.stores.remove(path)
    }

    /// Register a component under its directory.
    ///
    /// Fails if a different manifest already owns the directory. Registering
    /// the same manifest path again replaces the old descriptor.
    pub fn insert_component(&mut self, descriptor: ComponentDescriptor) -> Result<()> {
        let dir = descriptor.dir().to_path_buf();
        if let Some(existing) = self.components.get(&dir) {
            if existing.path != descriptor.path {
                return Err(DevwatchError::RegistryInvariant {
                    dir,
                    existing: existing.path.clone(),
                    incoming: descriptor.path,
                });
            }
        }
        self.components.insert(dir, descriptor);
        Ok(())
    }

    /// Remove a component, but only if the directory is still owned by the
    /// same manifest.
    pub fn remove_component(&mut self, descriptor: &ComponentDescriptor) -> Option<ComponentDescriptor> {
        let dir = descriptor.dir();
        match self.components.get(dir) {
            Some(existing) if existing.path == descriptor.path => self.components.remove(dir),
            _ => None,
        }
    }
}

/// Component whose manifest is exactly `manifest_path`.
pub fn component_by_manifest<'a>(
    index: &'a DirectoryIndex,
    manifest_path: &Path,
) -> Option<&'a ComponentDescriptor> {
    let dir = manifest_path.parent()?;
    index
        .get(dir)
        .filter(|descriptor| descriptor.path == manifest_path)
}
