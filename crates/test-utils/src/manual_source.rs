//! Hand-driven raw sources.
//!
//! `ManualSources` stands in for the `notify`-backed factory. Tests decide
//! when each source reports readiness, push raw events themselves and
//! inspect which component directories the engine asked to watch.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use devwatch::errors::{DevwatchError, Result};
use devwatch::types::{RawEvent, RawEventKind, SourceKind};
use devwatch::watch::{RawInput, RawWatchSource, SourceFactory, WatchTarget};
use devwatch::watch::source::RawSender;

#[derive(Debug, Default)]
struct State {
    senders: BTreeMap<SourceKind, RawSender>,
    watched: BTreeMap<SourceKind, BTreeSet<PathBuf>>,
    fail_on_start: BTreeSet<SourceKind>,
    hold_ready: BTreeSet<SourceKind>,
    started: Vec<SourceKind>,
    closes: BTreeMap<SourceKind, usize>,
}

/// Shared handle on every source the factory has started.
#[derive(Debug, Clone, Default)]
pub struct ManualSources {
    state: Arc<Mutex<State>>,
}

impl ManualSources {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Factory to hand to the orchestrator.
    pub fn factory(&self) -> Box<dyn SourceFactory> {
        Box::new(ManualSourceFactory {
            sources: self.clone(),
        })
    }

    /// Make `kind` fail to start.
    pub fn fail_on_start(&self, kind: SourceKind) -> &Self {
        self.lock().fail_on_start.insert(kind);
        self
    }

    /// Do not report readiness for `kind` until [`ready`](Self::ready) is
    /// called.
    pub fn hold_ready(&self, kind: SourceKind) -> &Self {
        self.lock().hold_ready.insert(kind);
        self
    }

    pub fn ready(&self, kind: SourceKind) -> bool {
        self.send_input(kind, RawInput::Ready(kind))
    }

    /// Push a raw event as if `kind` had observed it.
    pub fn send(&self, kind: SourceKind, event: RawEventKind, path: impl AsRef<Path>) -> bool {
        let raw = RawEvent::new(kind, event, path.as_ref().to_path_buf());
        self.send_input(kind, RawInput::Event(raw))
    }

    pub fn send_error(&self, kind: SourceKind, message: &str) -> bool {
        self.send_input(
            kind,
            RawInput::Error {
                source: kind,
                message: message.to_string(),
            },
        )
    }

    fn send_input(&self, kind: SourceKind, input: RawInput) -> bool {
        match self.lock().senders.get(&kind) {
            Some(tx) => tx.send(input).is_ok(),
            None => false,
        }
    }

    pub fn started(&self) -> Vec<SourceKind> {
        self.lock().started.clone()
    }

    pub fn watched(&self, kind: SourceKind) -> Vec<PathBuf> {
        self.lock()
            .watched
            .get(&kind)
            .map(|dirs| dirs.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn close_count(&self, kind: SourceKind) -> usize {
        self.lock().closes.get(&kind).copied().unwrap_or(0)
    }

    pub fn is_open(&self, kind: SourceKind) -> bool {
        self.lock().senders.contains_key(&kind)
    }
}

#[derive(Debug)]
struct ManualSourceFactory {
    sources: ManualSources,
}

impl SourceFactory for ManualSourceFactory {
    fn start(
        &self,
        kind: SourceKind,
        target: WatchTarget,
        tx: RawSender,
    ) -> Result<Box<dyn RawWatchSource>> {
        let mut state = self.sources.lock();
        if state.fail_on_start.contains(&kind) {
            return Err(DevwatchError::raw_source(kind, "refusing to start"));
        }

        let dirs: BTreeSet<PathBuf> = match target {
            WatchTarget::Glob { root, glob } => [root.join(glob.base())].into(),
            WatchTarget::Dirs(dirs) => dirs.into_iter().collect(),
        };
        state.watched.insert(kind, dirs);
        state.started.push(kind);
        if !state.hold_ready.contains(&kind) {
            let _ = tx.send(RawInput::Ready(kind));
        }
        state.senders.insert(kind, tx);

        Ok(Box::new(ManualSource {
            kind,
            sources: self.sources.clone(),
        }))
    }
}

#[derive(Debug)]
struct ManualSource {
    kind: SourceKind,
    sources: ManualSources,
}

impl RawWatchSource for ManualSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn add_path(&mut self, dir: &Path) -> Result<()> {
        self.sources
            .lock()
            .watched
            .entry(self.kind)
            .or_default()
            .insert(dir.to_path_buf());
        Ok(())
    }

    fn remove_path(&mut self, dir: &Path) -> Result<()> {
        if let Some(dirs) = self.sources.lock().watched.get_mut(&self.kind) {
            dirs.remove(dir);
        }
        Ok(())
    }

    fn watched(&self) -> Vec<PathBuf> {
        self.sources.watched(self.kind)
    }

    fn close(&mut self) {
        let mut state = self.sources.lock();
        // Dropping the sender mirrors a closed notify watcher.
        if state.senders.remove(&self.kind).is_some() {
            *state.closes.entry(self.kind).or_default() += 1;
        }
        state.watched.remove(&self.kind);
    }
}
