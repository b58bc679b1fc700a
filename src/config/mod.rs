// src/config/mod.rs

//! Configuration loading and validation for devwatch.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate globs and limits (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config, default_config_path, load_and_validate, load_from_path};
pub use model::{
    ComponentsSection, ConfigFile, ProjectSection, RawConfigFile, StoresSection, WatchSection,
};
pub use validate::validate_raw_config;
