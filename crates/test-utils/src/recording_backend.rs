use std::sync::{Arc, Mutex};

use devwatch::engine::{ReloadBackend, ReloadRequest};
use devwatch::errors::Result;

/// A reload backend that:
/// - records every request it receives, in order
/// - never fails.
#[derive(Debug, Clone, Default)]
pub struct RecordingBackend {
    requests: Arc<Mutex<Vec<ReloadRequest>>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the requests seen so far.
    pub fn requests(&self) -> Vec<ReloadRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl ReloadBackend for RecordingBackend {
    fn dispatch(&mut self, request: ReloadRequest) -> Result<()> {
        self.requests.lock().unwrap().push(request);
        Ok(())
    }
}
