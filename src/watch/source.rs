// src/watch/source.rs

//! Raw watch sources.
//!
//! A raw source turns OS notifications for one glob or one set of
//! directories into `add` / `change` / `unlink` [`RawEvent`]s. Every source
//! sends a single `Ready` once its initial watches are registered, and then
//! streams events until it is closed or dropped.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::sequence::dedup_raw;
use crate::errors::{DevwatchError, Result};
use crate::fs::RealFileSystem;
use crate::types::{RawEvent, RawEventKind, SourceKind};
use crate::watch::cover::{CoverChange, WatchCover};
use crate::watch::path_utils::normalize;
use crate::watch::patterns::{collect_files, collect_matching_files, EntityGlob};

/// Delay before a directory that just appeared is scanned a second time.
///
/// notify registers the watch on a new directory only after the callback for
/// its creation has run, so files written in between reach nobody. The second
/// scan catches them; it lands well inside the debounce window, where the
/// duplicate `add`s fold away.
const RESCAN_DELAY: Duration = Duration::from_millis(10);

/// Message from a raw source into the watch loop.
#[derive(Debug, Clone, PartialEq)]
pub enum RawInput {
    Ready(SourceKind),
    Event(RawEvent),
    Error { source: SourceKind, message: String },
}

pub type RawSender = mpsc::UnboundedSender<RawInput>;
pub type RawReceiver = mpsc::UnboundedReceiver<RawInput>;

/// What a raw source watches.
#[derive(Debug, Clone)]
pub enum WatchTarget {
    /// Every file under `root` matching `glob`.
    Glob { root: PathBuf, glob: EntityGlob },
    /// Every file beneath any of these directories.
    Dirs(Vec<PathBuf>),
}

/// Handle on a running raw source.
pub trait RawWatchSource: Send {
    fn kind(&self) -> SourceKind;

    /// Start watching `dir` recursively.
    fn add_path(&mut self, dir: &Path) -> Result<()>;

    /// Stop watching `dir`. Tolerates directories that no longer exist.
    fn remove_path(&mut self, dir: &Path) -> Result<()>;

    /// Currently watched directories.
    fn watched(&self) -> Vec<PathBuf>;

    /// Release the underlying watcher. Safe to call more than once.
    fn close(&mut self);
}

/// Starts raw sources. Production uses [`NotifySourceFactory`].
pub trait SourceFactory: Send + Sync {
    fn start(
        &self,
        kind: SourceKind,
        target: WatchTarget,
        tx: RawSender,
    ) -> Result<Box<dyn RawWatchSource>>;
}

/// Factory for `notify`-backed sources.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotifySourceFactory;

impl SourceFactory for NotifySourceFactory {
    fn start(
        &self,
        kind: SourceKind,
        target: WatchTarget,
        tx: RawSender,
    ) -> Result<Box<dyn RawWatchSource>> {
        Ok(Box::new(NotifySource::start(kind, target, tx)?))
    }
}

/// Watcher state shared between the source handle and background
/// re-anchoring.
struct WatcherState {
    watcher: Option<RecommendedWatcher>,
    cover: WatchCover,
    /// Non-recursive watch on the nearest existing ancestor of a glob base
    /// that does not exist yet.
    anchor: Option<PathBuf>,
}

type SharedWatcher = Arc<Mutex<WatcherState>>;

fn lock_state(state: &Mutex<WatcherState>) -> MutexGuard<'_, WatcherState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Where a glob source looks and what it lets through.
#[derive(Debug, Clone)]
struct GlobScope {
    root: PathBuf,
    glob: EntityGlob,
    base: PathBuf,
}

impl GlobScope {
    fn new(root: PathBuf, glob: EntityGlob) -> Self {
        let base = normalize(&root.join(glob.base()));
        Self { root, glob, base }
    }

    /// Matching files pass. Unlinks anywhere under the base pass too: a
    /// removed directory may have held matching files.
    fn admits(&self, raw: &RawEvent) -> bool {
        self.glob.matches_under(&self.root, &raw.path)
            || (raw.kind == RawEventKind::Unlink && raw.path.starts_with(&self.base))
    }

    fn nearest_existing_dir(&self) -> Option<PathBuf> {
        self.base
            .ancestors()
            .filter(|dir| dir.starts_with(&self.root))
            .find(|dir| dir.is_dir())
            .map(Path::to_path_buf)
    }

    /// True if the notification creates the base or a directory on the way
    /// to it.
    fn creates_toward_base(&self, event: &Event) -> bool {
        matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(_))
        ) && event.paths.iter().any(|p| self.base.starts_with(p))
    }
}

/// Everything the notify callback needs. Runs on notify's own thread.
struct Callback {
    kind: SourceKind,
    tx: RawSender,
    scope: Option<GlobScope>,
    state: Weak<Mutex<WatcherState>>,
    anchored: Arc<AtomicBool>,
}

impl Callback {
    fn handle(&self, res: notify::Result<Event>) {
        let event = match res {
            Ok(event) => event,
            Err(err) => {
                let _ = self.tx.send(RawInput::Error {
                    source: self.kind,
                    message: err.to_string(),
                });
                return;
            }
        };

        if let Some(scope) = &self.scope {
            if self.anchored.load(Ordering::SeqCst) && scope.creates_toward_base(&event) {
                self.spawn_settle(scope.clone());
            }
        }

        let appeared = appeared_dirs(&event);
        if !appeared.is_empty() {
            self.spawn_rescan(appeared);
        }

        for raw in translate(self.kind, &event) {
            if !self.send(raw) {
                return;
            }
        }
    }

    /// Forward one raw event if the glob lets it through. False once the
    /// watch loop is gone.
    fn send(&self, raw: RawEvent) -> bool {
        if let Some(scope) = &self.scope {
            if !scope.admits(&raw) {
                return true;
            }
        }
        self.tx.send(RawInput::Event(raw)).is_ok()
    }

    fn spawn_rescan(&self, dirs: Vec<PathBuf>) {
        let rescan = Callback {
            kind: self.kind,
            tx: self.tx.clone(),
            scope: self.scope.clone(),
            state: Weak::clone(&self.state),
            anchored: Arc::clone(&self.anchored),
        };
        std::thread::spawn(move || {
            std::thread::sleep(RESCAN_DELAY);
            for dir in dirs {
                let files = collect_files(&RealFileSystem, &dir).unwrap_or_default();
                for file in files {
                    if !rescan.send(RawEvent::new(rescan.kind, RawEventKind::Add, file)) {
                        return;
                    }
                }
            }
        });
    }

    // Watcher calls block on notify's event thread, so they cannot run here.
    fn spawn_settle(&self, scope: GlobScope) {
        let Some(state) = self.state.upgrade() else {
            return;
        };
        let kind = self.kind;
        let tx = self.tx.clone();
        let anchored = Arc::clone(&self.anchored);
        std::thread::spawn(move || settle_anchor(&state, &scope, kind, &tx, &anchored));
    }
}

/// Directories a notification reports as newly present.
fn appeared_dirs(event: &Event) -> Vec<PathBuf> {
    let candidates: Vec<&PathBuf> = match &event.kind {
        EventKind::Create(_) => event.paths.iter().collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Vec::new(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => event.paths.last().into_iter().collect(),
        EventKind::Modify(ModifyKind::Name(_)) => event.paths.iter().collect(),
        _ => Vec::new(),
    };
    candidates.into_iter().filter(|p| p.is_dir()).cloned().collect()
}

/// Move the anchor toward a missing glob base, and switch to a recursive
/// watch of the base once it exists.
fn settle_anchor(
    state: &Mutex<WatcherState>,
    scope: &GlobScope,
    kind: SourceKind,
    tx: &RawSender,
    anchored: &AtomicBool,
) {
    let mut guard = lock_state(state);
    let state = &mut *guard;
    let Some(watcher) = state.watcher.as_mut() else {
        return;
    };

    while let Some(anchor) = state.anchor.clone() {
        if scope.base.is_dir() {
            if let Err(err) = watcher.watch(&scope.base, RecursiveMode::Recursive) {
                warn!(source = %kind, base = ?scope.base, error = %err, "failed to watch glob base");
                let _ = tx.send(RawInput::Error {
                    source: kind,
                    message: format!("{:?}: {err}", scope.base),
                });
                return;
            }
            if let Err(err) = watcher.unwatch(&anchor) {
                debug!(source = %kind, ?anchor, error = %err, "anchor already gone");
            }
            state.anchor = None;
            state.cover.add(&scope.base);
            anchored.store(false, Ordering::SeqCst);
            info!(source = %kind, base = ?scope.base, "glob base appeared; watching it");

            // Files that landed before the recursive watch was in place.
            match collect_matching_files(&RealFileSystem, &scope.root, &scope.glob) {
                Ok(files) => {
                    for file in files {
                        let _ = tx.send(RawInput::Event(RawEvent::new(kind, RawEventKind::Add, file)));
                    }
                }
                Err(err) => warn!(source = %kind, error = %err, "failed to scan new glob base"),
            }
            return;
        }

        let Some(next) = scope.nearest_existing_dir() else {
            return;
        };
        if next == anchor {
            return;
        }
        if let Err(err) = watcher.watch(&next, RecursiveMode::NonRecursive) {
            warn!(source = %kind, dir = ?next, error = %err, "failed to move glob anchor");
            return;
        }
        if let Err(err) = watcher.unwatch(&anchor) {
            debug!(source = %kind, ?anchor, error = %err, "anchor already gone");
        }
        debug!(source = %kind, from = ?anchor, to = ?next, "glob anchor moved");
        state.anchor = Some(next);
    }
}

/// Apply a cover update. Failed unwatches are ignored: a deleted directory
/// has already been dropped by the OS.
fn apply_cover(watcher: &mut RecommendedWatcher, kind: SourceKind, change: &CoverChange) -> Result<()> {
    for dir in &change.unwatch {
        if let Err(err) = watcher.unwatch(dir) {
            debug!(source = %kind, ?dir, error = %err, "unwatch failed; directory likely gone");
        }
    }
    for dir in &change.watch {
        watcher.watch(dir, RecursiveMode::Recursive)?;
    }
    Ok(())
}

/// Raw source backed by a `notify::RecommendedWatcher`.
///
/// Dropping or closing it drops the watcher, and with it the callback's
/// sender, which lets the watch loop observe end-of-stream.
pub struct NotifySource {
    kind: SourceKind,
    state: SharedWatcher,
}

impl fmt::Debug for NotifySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock_state(&self.state);
        f.debug_struct("NotifySource")
            .field("kind", &self.kind)
            .field("open", &state.watcher.is_some())
            .field("watched", state.cover.requested())
            .field("anchor", &state.anchor)
            .finish()
    }
}

impl NotifySource {
    pub fn start(kind: SourceKind, target: WatchTarget, tx: RawSender) -> Result<Self> {
        let scope = match &target {
            WatchTarget::Glob { root, glob } => Some(GlobScope::new(root.clone(), glob.clone())),
            WatchTarget::Dirs(_) => None,
        };

        let state = Arc::new(Mutex::new(WatcherState {
            watcher: None,
            cover: WatchCover::new(),
            anchor: None,
        }));
        let anchored = Arc::new(AtomicBool::new(false));

        let callback = Callback {
            kind,
            tx: tx.clone(),
            scope: scope.clone(),
            state: Arc::downgrade(&state),
            anchored: Arc::clone(&anchored),
        };
        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| callback.handle(res),
            Config::default(),
        )
        .map_err(|e| DevwatchError::raw_source(kind, e.to_string()))?;
        lock_state(&state).watcher = Some(watcher);

        let mut source = Self { kind, state };

        match (target, scope) {
            (WatchTarget::Glob { .. }, Some(scope)) => {
                if scope.base.is_dir() {
                    source
                        .add_path(&scope.base)
                        .map_err(|e| DevwatchError::raw_source(kind, format!("{:?}: {e}", scope.base)))?;
                } else {
                    source.anchor_missing_base(&scope, &tx, &anchored)?;
                }
            }
            (WatchTarget::Dirs(dirs), _) => {
                for dir in dirs {
                    if let Err(err) = source.add_path(&dir) {
                        warn!(source = %kind, ?dir, error = %err, "failed to watch directory");
                        let _ = tx.send(RawInput::Error {
                            source: kind,
                            message: err.to_string(),
                        });
                    }
                }
            }
            (WatchTarget::Glob { .. }, None) => {}
        }

        info!(source = %kind, watched = source.watched().len(), "raw source ready");
        let _ = tx.send(RawInput::Ready(kind));
        Ok(source)
    }

    /// Watch the nearest existing ancestor of a missing glob base so the
    /// base is picked up once it is created.
    fn anchor_missing_base(
        &mut self,
        scope: &GlobScope,
        tx: &RawSender,
        anchored: &AtomicBool,
    ) -> Result<()> {
        let kind = self.kind;
        let anchor = scope.nearest_existing_dir().ok_or_else(|| {
            DevwatchError::raw_source(kind, format!("project root {:?} does not exist", scope.root))
        })?;

        {
            let mut state = lock_state(&self.state);
            let Some(watcher) = state.watcher.as_mut() else {
                return Ok(());
            };
            watcher
                .watch(&anchor, RecursiveMode::NonRecursive)
                .map_err(|e| DevwatchError::raw_source(kind, format!("{anchor:?}: {e}")))?;
            state.anchor = Some(anchor.clone());
        }
        anchored.store(true, Ordering::SeqCst);
        info!(source = %kind, base = ?scope.base, ?anchor, "glob base missing; waiting for it");

        // The base may have appeared before the anchor watch was in place.
        settle_anchor(&self.state, scope, kind, tx, anchored);
        Ok(())
    }

    /// Directory currently watched in place of a missing glob base.
    pub fn anchor(&self) -> Option<PathBuf> {
        lock_state(&self.state).anchor.clone()
    }
}

impl RawWatchSource for NotifySource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn add_path(&mut self, dir: &Path) -> Result<()> {
        let mut guard = lock_state(&self.state);
        let state = &mut *guard;
        let Some(watcher) = state.watcher.as_mut() else {
            return Ok(());
        };
        if state.cover.contains(dir) {
            return Ok(());
        }

        let change = state.cover.add(dir);
        if let Err(err) = apply_cover(watcher, self.kind, &change) {
            let undo = state.cover.remove(dir);
            if let Err(undo_err) = apply_cover(watcher, self.kind, &undo) {
                warn!(source = %self.kind, ?dir, error = %undo_err, "failed to restore nested watches");
            }
            return Err(err);
        }
        if change.is_empty() {
            debug!(source = %self.kind, ?dir, "already covered by a watched ancestor");
        } else {
            debug!(source = %self.kind, ?dir, "watching");
        }
        Ok(())
    }

    fn remove_path(&mut self, dir: &Path) -> Result<()> {
        let mut guard = lock_state(&self.state);
        let state = &mut *guard;
        let change = state.cover.remove(dir);
        let Some(watcher) = state.watcher.as_mut() else {
            return Ok(());
        };
        apply_cover(watcher, self.kind, &change)
    }

    fn watched(&self) -> Vec<PathBuf> {
        lock_state(&self.state).cover.requested().iter().cloned().collect()
    }

    fn close(&mut self) {
        let watcher = {
            let mut state = lock_state(&self.state);
            state.cover.clear();
            state.anchor = None;
            state.watcher.take()
        };
        if watcher.is_some() {
            debug!(source = %self.kind, "raw source closed");
        }
    }
}

/// Translate one notify event into raw events.
///
/// - create → `add`
/// - data / unspecified modify → `change`
/// - remove → `unlink`
/// - rename: the old name is an `unlink`, the new name an `add`
///
/// A directory that appears (created, or moved in) yields an `add` for every
/// file already inside it. A removed directory is an `unlink` of the
/// directory itself for the glob sources; component-directory sources only
/// care about files. Metadata and access notifications are dropped.
pub fn translate(source: SourceKind, event: &Event) -> Vec<RawEvent> {
    let mk = |kind: RawEventKind, path: &PathBuf| RawEvent::new(source, kind, path.clone());
    let added = |path: &PathBuf| -> Vec<RawEvent> {
        if path.is_dir() {
            collect_files(&RealFileSystem, path)
                .unwrap_or_default()
                .iter()
                .map(|file| mk(RawEventKind::Add, file))
                .collect()
        } else {
            vec![mk(RawEventKind::Add, path)]
        }
    };

    let raw: Vec<RawEvent> = match &event.kind {
        EventKind::Create(CreateKind::Folder) => event
            .paths
            .iter()
            .filter(|p| p.is_dir())
            .flat_map(&added)
            .collect(),
        EventKind::Create(_) => event.paths.iter().flat_map(&added).collect(),
        EventKind::Remove(RemoveKind::Folder) if source == SourceKind::ComponentDirs => Vec::new(),
        EventKind::Remove(_) => event.paths.iter().map(|p| mk(RawEventKind::Unlink, p)).collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            event.paths.iter().map(|p| mk(RawEventKind::Unlink, p)).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            event.paths.iter().flat_map(&added).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match event.paths.as_slice() {
            [from, to] => {
                let mut out = vec![mk(RawEventKind::Unlink, from)];
                out.extend(added(to));
                out
            }
            _ => Vec::new(),
        },
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .flat_map(|p| {
                if p.exists() {
                    added(p)
                } else {
                    vec![mk(RawEventKind::Unlink, p)]
                }
            })
            .collect(),
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(_) => event
            .paths
            .iter()
            .filter(|p| !p.is_dir())
            .map(|p| mk(RawEventKind::Change, p))
            .collect(),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    };

    dedup_raw(raw)
}
