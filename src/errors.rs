// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::SourceKind;

#[derive(Error, Debug)]
pub enum DevwatchError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Invalid glob pattern: {0}")]
    GlobError(#[from] globset::Error),

    /// A component manifest could not be read or is malformed.
    #[error("Manifest error in {path:?}: {reason}")]
    ManifestParse { path: PathBuf, reason: String },

    /// The underlying watch primitive failed for one raw source.
    #[error("{source_kind} watcher failed: {message}")]
    RawSource {
        source_kind: SourceKind,
        message: String,
    },

    /// Two components claim the same directory. This is a programming error.
    #[error(
        "Registry invariant violated: directory {dir:?} already owned by {existing:?}, refusing {incoming:?}"
    )]
    RegistryInvariant {
        dir: PathBuf,
        existing: PathBuf,
        incoming: PathBuf,
    },

    #[error("Watch is closed")]
    Closed,

    /// `watch()` was called on a session that has already been started.
    #[error("Watch already started (state: {0})")]
    AlreadyStarted(String),

    #[error("Filesystem notification error: {0}")]
    Notify(#[from] notify::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DevwatchError {
    pub fn manifest(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        DevwatchError::ManifestParse {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn raw_source(source_kind: SourceKind, message: impl Into<String>) -> Self {
        DevwatchError::RawSource {
            source_kind,
            message: message.into(),
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DevwatchError>;
