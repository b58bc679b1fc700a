// src/engine/events.rs

//! Semantic events published by the watch engine.

use std::fmt;
use std::path::PathBuf;

use crate::errors::DevwatchError;
use crate::registry::{ComponentDescriptor, StoreDescriptor};

/// Category of a non-fatal notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// A raw watch source failed to start or reported an error.
    RawSource,
    /// A component manifest could not be parsed; the component is treated as
    /// absent until the next successful change.
    ManifestParse,
    /// Two components claimed the same directory.
    RegistryInvariant,
}

/// Non-fatal error passed through to subscribers as `WatchEvent::Error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchNotice {
    pub kind: NoticeKind,
    pub message: String,
}

impl WatchNotice {
    pub fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<&DevwatchError> for WatchNotice {
    fn from(err: &DevwatchError) -> Self {
        let kind = match err {
            DevwatchError::ManifestParse { .. } => NoticeKind::ManifestParse,
            DevwatchError::RegistryInvariant { .. } => NoticeKind::RegistryInvariant,
            _ => NoticeKind::RawSource,
        };
        WatchNotice::new(kind, err.to_string())
    }
}

impl fmt::Display for WatchNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// Domain-level event produced from one raw filesystem notification.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    AddStore(StoreDescriptor),
    ChangeStore(StoreDescriptor),
    UnlinkStore(StoreDescriptor),
    ReloadStore(StoreDescriptor),
    AddComponent(ComponentDescriptor),
    ChangeComponent {
        filename: PathBuf,
        component: ComponentDescriptor,
    },
    ChangeLogic(ComponentDescriptor),
    ChangeTemplates(ComponentDescriptor),
    UnlinkComponent(ComponentDescriptor),
    Error(WatchNotice),
}

impl WatchEvent {
    /// Stable event name, e.g. `"changeLogic"`.
    pub fn name(&self) -> &'static str {
        match self {
            WatchEvent::AddStore(_) => "addStore",
            WatchEvent::ChangeStore(_) => "changeStore",
            WatchEvent::UnlinkStore(_) => "unlinkStore",
            WatchEvent::ReloadStore(_) => "reloadStore",
            WatchEvent::AddComponent(_) => "addComponent",
            WatchEvent::ChangeComponent { .. } => "changeComponent",
            WatchEvent::ChangeLogic(_) => "changeLogic",
            WatchEvent::ChangeTemplates(_) => "changeTemplates",
            WatchEvent::UnlinkComponent(_) => "unlinkComponent",
            WatchEvent::Error(_) => "error",
        }
    }
}
