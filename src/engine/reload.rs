// src/engine/reload.rs

//! Pluggable reload/unload backend.
//!
//! The engine only asks for entities to be reloaded or unloaded; it never
//! waits for that work. `ChannelReloadBackend` forwards requests over an
//! unbounded channel to whoever actually recompiles entities. Tests provide
//! their own backend that records the requests.

use tokio::sync::mpsc;

use crate::errors::{DevwatchError, Result};
use crate::registry::{ComponentDescriptor, StoreDescriptor};

/// A single reload/unload request.
#[derive(Debug, Clone, PartialEq)]
pub enum ReloadRequest {
    /// Reload a store. Also sent for a removed store, with the stale
    /// descriptor, so the backend can drop it.
    ReloadStore(StoreDescriptor),
    ReloadComponent(ComponentDescriptor),
    UnloadComponent(ComponentDescriptor),
}

/// Trait abstracting how reload requests are carried out.
///
/// Implementations must not block: the watch loop calls `dispatch` inline
/// and moves on to the next raw event immediately.
pub trait ReloadBackend: Send {
    fn dispatch(&mut self, request: ReloadRequest) -> Result<()>;
}

/// Backend that forwards every request over an mpsc channel.
#[derive(Debug, Clone)]
pub struct ChannelReloadBackend {
    tx: mpsc::UnboundedSender<ReloadRequest>,
}

impl ChannelReloadBackend {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ReloadRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ReloadBackend for ChannelReloadBackend {
    fn dispatch(&mut self, request: ReloadRequest) -> Result<()> {
        self.tx
            .send(request)
            .map_err(|e| DevwatchError::Other(anyhow::anyhow!("reload consumer is gone: {e}")))
    }
}
