// src/config/model.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [project]
/// root = "."
///
/// [stores]
/// glob = "stores/**/*.js"
///
/// [components]
/// glob = "components/**/component.json"
///
/// [watch]
/// event_capacity = 256
/// debounce_ms = 50
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub project: ProjectSection,

    #[serde(default)]
    pub stores: StoresSection,

    #[serde(default)]
    pub components: ComponentsSection,

    #[serde(default)]
    pub watch: WatchSection,
}

/// `[project]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectSection {
    /// Project root. Relative roots are resolved against the directory
    /// holding the config file.
    #[serde(default = "default_root")]
    pub root: PathBuf,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

impl Default for ProjectSection {
    fn default() -> Self {
        Self { root: default_root() }
    }
}

/// `[stores]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct StoresSection {
    /// Glob matching store files, relative to the project root.
    #[serde(default = "default_stores_glob")]
    pub glob: String,
}

fn default_stores_glob() -> String {
    "stores/**/*.js".to_string()
}

impl Default for StoresSection {
    fn default() -> Self {
        Self {
            glob: default_stores_glob(),
        }
    }
}

/// `[components]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ComponentsSection {
    /// Glob matching component manifests, relative to the project root.
    #[serde(default = "default_components_glob")]
    pub glob: String,
}

fn default_components_glob() -> String {
    "components/**/component.json".to_string()
}

impl Default for ComponentsSection {
    fn default() -> Self {
        Self {
            glob: default_components_glob(),
        }
    }
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchSection {
    /// How many semantic events a slow subscriber may lag behind before it
    /// starts missing events.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Quiet period, in milliseconds, a path needs before its raw events are
    /// folded into one and reconciled.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_event_capacity() -> usize {
    256
}

fn default_debounce_ms() -> u64 {
    50
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            event_capacity: default_event_capacity(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

/// Validated configuration.
///
/// Only constructed through `TryFrom<RawConfigFile>`, so the globs are known
/// to compile and the capacity is non-zero.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    root: PathBuf,
    stores_glob: String,
    components_glob: String,
    event_capacity: usize,
    debounce: Duration,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            root: raw.project.root,
            stores_glob: raw.stores.glob,
            components_glob: raw.components.glob,
            event_capacity: raw.watch.event_capacity,
            debounce: Duration::from_millis(raw.watch.debounce_ms),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn stores_glob(&self) -> &str {
        &self.stores_glob
    }

    pub fn components_glob(&self) -> &str {
        &self.components_glob
    }

    pub fn event_capacity(&self) -> usize {
        self.event_capacity
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Resolve a relative root against `base` (the config file's directory).
    pub fn with_root_base(mut self, base: &Path) -> Self {
        if self.root.is_relative() {
            self.root = base.join(&self.root);
        }
        self.root = self.root.canonicalize().unwrap_or_else(|_| self.root.clone());
        self
    }
}
