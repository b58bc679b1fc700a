// src/engine/orchestrator.rs

//! Watch orchestrator: starts the three raw sources, waits for all of them
//! to report readiness, then hands control to the [`WatchRuntime`] loop.

use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::core::ReconcileCore;
use crate::engine::debounce::DEFAULT_DEBOUNCE;
use crate::engine::events::{WatchEvent, WatchNotice};
use crate::engine::reload::ReloadBackend;
use crate::engine::runtime::{lock_sources, SharedSources, SourceSet, WatchRuntime};
use crate::errors::{DevwatchError, Result};
use crate::registry::EntityFinder;
use crate::types::SourceKind;
use crate::watch::source::{RawInput, SourceFactory, WatchTarget};

/// Lifecycle of a [`WatchOrchestrator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Created,
    Starting,
    Ready,
    Closed,
}

/// Returned by [`WatchOrchestrator::watch`] once every source has settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyHandles {
    /// Sources that reported readiness.
    pub ready: Vec<SourceKind>,
    /// Sources that failed to start and are not delivering events.
    pub degraded: Vec<SourceKind>,
    /// Component directories watched at startup.
    pub watched_dirs: Vec<PathBuf>,
}

/// Cloneable handle that tears a watch session down from any task.
#[derive(Debug, Clone)]
pub struct CloseHandle {
    closed: Arc<AtomicBool>,
    sources: SharedSources,
    state: Arc<Mutex<WatchState>>,
    shutdown: Arc<Notify>,
}

impl CloseHandle {
    /// Close every raw source. Idempotent; only the first call tears down.
    pub fn close(&self) {
        let already = self.closed.swap(true, Ordering::SeqCst);
        *lock_state(&self.state) = WatchState::Closed;
        if already {
            return;
        }
        let closed = lock_sources(&self.sources).close_all();
        // Stores a permit, so a loop that is not waiting yet still sees it.
        self.shutdown.notify_one();
        info!(sources = closed, "watch closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

fn lock_state(state: &Mutex<WatchState>) -> MutexGuard<'_, WatchState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Owns the raw watch sources and the active watch set for one watch session.
pub struct WatchOrchestrator<F, R>
where
    F: EntityFinder + 'static,
    R: ReloadBackend + 'static,
{
    parts: Option<(F, R)>,
    factory: Box<dyn SourceFactory>,
    events: broadcast::Sender<WatchEvent>,
    debounce: Duration,
    handle: CloseHandle,
    loop_handle: Option<JoinHandle<ReconcileCore<F>>>,
}

impl<F, R> fmt::Debug for WatchOrchestrator<F, R>
where
    F: EntityFinder + 'static,
    R: ReloadBackend + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchOrchestrator")
            .field("state", &self.state())
            .field("sources", &self.handle.sources)
            .finish_non_exhaustive()
    }
}

impl<F, R> WatchOrchestrator<F, R>
where
    F: EntityFinder + 'static,
    R: ReloadBackend + 'static,
{
    /// `finder` must already hold the initial snapshot (see
    /// [`EntityFinder::find`]).
    pub fn new(
        finder: F,
        reloader: R,
        factory: Box<dyn SourceFactory>,
        event_capacity: usize,
    ) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            parts: Some((finder, reloader)),
            factory,
            events,
            debounce: DEFAULT_DEBOUNCE,
            handle: CloseHandle {
                closed: Arc::new(AtomicBool::new(false)),
                sources: Arc::new(Mutex::new(SourceSet::default())),
                state: Arc::new(Mutex::new(WatchState::Created)),
                shutdown: Arc::new(Notify::new()),
            },
            loop_handle: None,
        }
    }

    /// Quiet period a path needs before its raw events are reconciled.
    pub fn with_debounce(mut self, window: Duration) -> Self {
        self.debounce = window;
        self
    }

    pub fn state(&self) -> WatchState {
        *lock_state(&self.handle.state)
    }

    /// Move from `from` to `to`; no-op if another transition got there first.
    fn transition(&self, from: WatchState, to: WatchState) -> bool {
        let mut state = lock_state(&self.handle.state);
        if *state != from {
            return false;
        }
        *state = to;
        true
    }

    pub fn close_handle(&self) -> CloseHandle {
        self.handle.clone()
    }

    fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    /// Subscribe to semantic events. Subscribe before [`watch`](Self::watch)
    /// to see everything.
    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.events.subscribe()
    }

    /// Directories the component-directory source is currently watching.
    pub fn watched_component_dirs(&self) -> Vec<PathBuf> {
        lock_sources(&self.handle.sources).watched(SourceKind::ComponentDirs)
    }

    /// Start all three raw sources and wait until each has reported
    /// readiness (or failed to start). Only the first call does anything.
    pub async fn watch(&mut self) -> Result<ReadyHandles> {
        if !self.transition(WatchState::Created, WatchState::Starting) {
            return Err(DevwatchError::AlreadyStarted(format!("{:?}", self.state())));
        }
        let Some((finder, reloader)) = self.parts.take() else {
            return Err(DevwatchError::Closed);
        };

        let (input_tx, mut input_rx) = mpsc::unbounded_channel::<RawInput>();
        let watched_dirs = finder.dirs_of_found_components();
        let mut pending: BTreeSet<SourceKind> = BTreeSet::new();
        let mut degraded = Vec::new();

        for kind in SourceKind::ALL {
            let target = match kind {
                SourceKind::Stores => WatchTarget::Glob {
                    root: finder.root().to_path_buf(),
                    glob: finder.stores_glob().clone(),
                },
                SourceKind::Manifests => WatchTarget::Glob {
                    root: finder.root().to_path_buf(),
                    glob: finder.components_glob().clone(),
                },
                SourceKind::ComponentDirs => WatchTarget::Dirs(watched_dirs.clone()),
            };

            match self.factory.start(kind, target, input_tx.clone()) {
                Ok(source) => {
                    lock_sources(&self.handle.sources).insert(source);
                    pending.insert(kind);
                }
                Err(err) => {
                    warn!(source = %kind, error = %err, "raw source failed to start; continuing degraded");
                    let _ = self.events.send(WatchEvent::Error(WatchNotice::from(&err)));
                    degraded.push(kind);
                }
            }
        }
        // Only the sources hold senders from here on.
        drop(input_tx);

        if self.is_closed() {
            // Closed while sources were starting; release the late ones too.
            lock_sources(&self.handle.sources).close_all();
            return Err(DevwatchError::Closed);
        }

        let mut backlog = VecDeque::new();
        let mut ready = Vec::new();
        while !pending.is_empty() {
            if self.is_closed() {
                return Err(DevwatchError::Closed);
            }
            let input = tokio::select! {
                biased;
                _ = self.handle.shutdown.notified() => return Err(DevwatchError::Closed),
                input = input_rx.recv() => input,
            };
            match input {
                Some(RawInput::Ready(kind)) => {
                    if pending.remove(&kind) {
                        debug!(source = %kind, "source ready");
                        ready.push(kind);
                    }
                }
                Some(other) => backlog.push_back(other),
                None => {
                    // Every source went away before reporting readiness.
                    if self.is_closed() {
                        return Err(DevwatchError::Closed);
                    }
                    degraded.extend(pending.iter().copied());
                    pending.clear();
                }
            }
        }

        if self.is_closed() {
            return Err(DevwatchError::Closed);
        }

        let core = ReconcileCore::new(finder);
        let runtime = WatchRuntime::new(
            core,
            input_rx,
            self.events.clone(),
            reloader,
            Arc::clone(&self.handle.sources),
            Arc::clone(&self.handle.closed),
            Arc::clone(&self.handle.shutdown),
        )
        .with_backlog(backlog)
        .with_debounce(self.debounce);
        self.loop_handle = Some(tokio::spawn(runtime.run()));

        if !self.transition(WatchState::Starting, WatchState::Ready) {
            return Err(DevwatchError::Closed);
        }
        info!(?ready, ?degraded, dirs = watched_dirs.len(), "watch ready");

        Ok(ReadyHandles {
            ready,
            degraded,
            watched_dirs,
        })
    }

    /// Tear down every raw source. Idempotent and callable from any state.
    pub fn close_watch(&self) {
        self.handle.close();
    }

    /// Wait for the watch loop to finish after [`close_watch`](Self::close_watch)
    /// and return the final core.
    pub async fn join(&mut self) -> Option<ReconcileCore<F>> {
        let handle = self.loop_handle.take()?;
        match handle.await {
            Ok(core) => Some(core),
            Err(err) => {
                warn!(error = %err, "watch loop task failed");
                None
            }
        }
    }
}

impl<F, R> Drop for WatchOrchestrator<F, R>
where
    F: EntityFinder + 'static,
    R: ReloadBackend + 'static,
{
    fn drop(&mut self) {
        self.close_watch();
    }
}
