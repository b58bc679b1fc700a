// src/engine/runtime.rs

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, Notify};
use tracing::{debug, info, trace, warn};

use crate::engine::debounce::{RawDebouncer, DEFAULT_DEBOUNCE};
use crate::engine::events::{NoticeKind, WatchEvent, WatchNotice};
use crate::engine::reload::ReloadBackend;
use crate::registry::EntityFinder;
use crate::types::{RawEvent, SourceKind};
use crate::watch::source::{RawInput, RawReceiver, RawWatchSource};

use super::core::{CoreCommand, ReconcileCore};

/// The running raw sources, shared between the orchestrator (which closes
/// them) and the watch loop (which adds and removes component directories).
#[derive(Default)]
pub struct SourceSet {
    sources: BTreeMap<SourceKind, Box<dyn RawWatchSource>>,
}

impl fmt::Debug for SourceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceSet")
            .field("sources", &self.sources.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SourceSet {
    pub fn insert(&mut self, source: Box<dyn RawWatchSource>) {
        self.sources.insert(source.kind(), source);
    }

    pub fn get_mut(&mut self, kind: SourceKind) -> Option<&mut (dyn RawWatchSource + 'static)> {
        self.sources.get_mut(&kind).map(|s| s.as_mut())
    }

    pub fn watched(&self, kind: SourceKind) -> Vec<std::path::PathBuf> {
        self.sources.get(&kind).map(|s| s.watched()).unwrap_or_default()
    }

    /// Close and drop every source. Returns how many were closed.
    pub fn close_all(&mut self) -> usize {
        let count = self.sources.len();
        for (_, mut source) in std::mem::take(&mut self.sources) {
            source.close();
        }
        count
    }
}

pub type SharedSources = Arc<Mutex<SourceSet>>;

pub(crate) fn lock_sources(sources: &SharedSources) -> MutexGuard<'_, SourceSet> {
    sources.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Drives the reconciliation core in response to raw inputs and carries out
/// the commands it returns.
///
/// This is the single serialization point: raw events from all three sources
/// arrive on one channel and are handled strictly one at a time, so every
/// resolve-then-mutate sequence in the core is atomic. Events are debounced
/// per path before they reach the core.
pub struct WatchRuntime<F: EntityFinder, R: ReloadBackend> {
    core: ReconcileCore<F>,
    input_rx: RawReceiver,
    backlog: VecDeque<RawInput>,
    debouncer: RawDebouncer,
    events: broadcast::Sender<WatchEvent>,
    reloader: R,
    sources: SharedSources,
    closed: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
}

impl<F: EntityFinder, R: ReloadBackend> fmt::Debug for WatchRuntime<F, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchRuntime")
            .field("core", &self.core)
            .field("backlog", &self.backlog.len())
            .field("debouncer", &self.debouncer)
            .finish_non_exhaustive()
    }
}

impl<F: EntityFinder, R: ReloadBackend> WatchRuntime<F, R> {
    pub fn new(
        core: ReconcileCore<F>,
        input_rx: RawReceiver,
        events: broadcast::Sender<WatchEvent>,
        reloader: R,
        sources: SharedSources,
        closed: Arc<AtomicBool>,
        shutdown: Arc<Notify>,
    ) -> Self {
        Self {
            core,
            input_rx,
            backlog: VecDeque::new(),
            debouncer: RawDebouncer::new(DEFAULT_DEBOUNCE),
            events,
            reloader,
            sources,
            closed,
            shutdown,
        }
    }

    /// Inputs received before readiness, to be handled first.
    pub fn with_backlog(mut self, backlog: VecDeque<RawInput>) -> Self {
        self.backlog = backlog;
        self
    }

    /// Quiet period a path needs before its events reach the core.
    pub fn with_debounce(mut self, window: Duration) -> Self {
        self.debouncer = RawDebouncer::new(window);
        self
    }

    /// Main event loop.
    ///
    /// Runs until every raw source has been dropped or the watch is closed.
    /// Returns the core so callers can inspect the final registry.
    pub async fn run(mut self) -> ReconcileCore<F> {
        info!(debounce = ?self.debouncer.window(), "watch loop started");

        while let Some(input) = self.backlog.pop_front() {
            self.accept(input);
        }

        loop {
            if self.closed.load(Ordering::SeqCst) {
                debug!("watch closed; dropping remaining input");
                self.core.close();
                break;
            }

            let deadline = self.debouncer.next_deadline();
            let keep_running = tokio::select! {
                biased;
                _ = self.shutdown.notified() => {
                    self.core.close();
                    false
                }
                input = self.input_rx.recv() => match input {
                    Some(input) => {
                        self.accept(input);
                        true
                    }
                    None => {
                        info!("all raw sources closed; exiting");
                        let rest = self.debouncer.drain();
                        self.step_all(rest);
                        false
                    }
                },
                _ = tokio::time::sleep_until(
                    tokio::time::Instant::from_std(deadline.unwrap_or_else(Instant::now))
                ), if deadline.is_some() => {
                    let ready = self.debouncer.take_ready(Instant::now());
                    self.step_all(ready)
                }
            };

            if !keep_running {
                break;
            }
        }

        info!("watch loop exiting");
        self.core
    }

    /// Take one input off the channel. Events wait in the debouncer.
    fn accept(&mut self, input: RawInput) {
        match input {
            RawInput::Ready(kind) => {
                debug!(source = %kind, "late ready signal ignored");
            }
            RawInput::Error { source, message } => {
                warn!(source = %source, %message, "raw source error");
                self.publish(WatchEvent::Error(WatchNotice::new(
                    NoticeKind::RawSource,
                    format!("{source}: {message}"),
                )));
            }
            RawInput::Event(event) => {
                trace!(?event, "raw event debounced");
                self.debouncer.record(event, Instant::now());
            }
        }
    }

    /// Feed settled events to the core one at a time.
    fn step_all(&mut self, events: Vec<RawEvent>) -> bool {
        for event in events {
            if self.closed.load(Ordering::SeqCst) {
                self.core.close();
                return false;
            }
            debug!(?event, "watch loop handling raw event");
            let step = self.core.step(event);
            for command in step.commands {
                self.execute_command(command);
            }
            if !step.keep_running {
                return false;
            }
        }
        true
    }

    /// Execute a single command from the core.
    fn execute_command(&mut self, command: CoreCommand) {
        match command {
            CoreCommand::Emit(event) => self.publish(event),
            CoreCommand::Reload(request) => {
                if let Err(err) = self.reloader.dispatch(request) {
                    warn!(error = %err, "reload request not delivered");
                }
            }
            CoreCommand::WatchDir(dir) => {
                let mut sources = lock_sources(&self.sources);
                let Some(source) = sources.get_mut(SourceKind::ComponentDirs) else {
                    return;
                };
                if let Err(err) = source.add_path(&dir) {
                    drop(sources);
                    warn!(?dir, error = %err, "failed to watch component directory");
                    self.publish(WatchEvent::Error(WatchNotice::new(
                        NoticeKind::RawSource,
                        format!("{}: {err}", SourceKind::ComponentDirs),
                    )));
                }
            }
            CoreCommand::UnwatchDir(dir) => {
                let mut sources = lock_sources(&self.sources);
                if let Some(source) = sources.get_mut(SourceKind::ComponentDirs) {
                    if let Err(err) = source.remove_path(&dir) {
                        warn!(?dir, error = %err, "failed to unwatch component directory");
                    }
                }
            }
        }
    }

    fn publish(&self, event: WatchEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
