// src/engine/debounce.rs

//! Per-path coalescing of raw events.
//!
//! A single save usually reaches the watcher as several notifications
//! (create, then one or more modifies), and a directory that appears is
//! reported both by a scan and by the events for its files. Events for the
//! same source and path are folded until the path has been quiet for the
//! window, so the core sees one raw event per logical change.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::types::{RawEvent, RawEventKind, SourceKind};
use crate::watch::path_utils::normalize;

/// Default quiet period before a path's events are released.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(50);

/// Fold the pending kind for a path with the next one observed.
///
/// `None` means the changes cancelled out: the path appeared and vanished
/// again inside one window.
pub fn fold(pending: Option<RawEventKind>, next: RawEventKind) -> Option<RawEventKind> {
    use RawEventKind::*;
    match (pending, next) {
        (None, next) => match next {
            Unlink => None,
            other => Some(other),
        },
        (Some(Add), Add | Change) => Some(Add),
        (Some(Add), Unlink) => None,
        (Some(Change), Add | Change) => Some(Change),
        (Some(Change), Unlink) => Some(Unlink),
        (Some(Unlink), Add | Change) => Some(Change),
        (Some(Unlink), Unlink) => Some(Unlink),
    }
}

#[derive(Debug, Clone)]
struct Pending {
    kind: Option<RawEventKind>,
    /// Arrival order of the first event in this burst.
    seq: u64,
    last: Instant,
}

/// Debounces raw events by `(source, path)`.
#[derive(Debug)]
pub struct RawDebouncer {
    window: Duration,
    pending: HashMap<(SourceKind, PathBuf), Pending>,
    next_seq: u64,
}

impl RawDebouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
            next_seq: 0,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record an event observed at `now`. Resets the path's quiet period.
    pub fn record(&mut self, event: RawEvent, now: Instant) {
        let key = (event.source, normalize(&event.path));
        match self.pending.get_mut(&key) {
            Some(pending) => {
                pending.kind = fold(pending.kind, event.kind);
                pending.last = now;
            }
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.pending.insert(
                    key,
                    Pending {
                        kind: Some(event.kind),
                        seq,
                        last: now,
                    },
                );
            }
        }
    }

    /// Earliest instant at which some path becomes ready.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.last + self.window).min()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Take every path that has been quiet for the window, in arrival order.
    pub fn take_ready(&mut self, now: Instant) -> Vec<RawEvent> {
        let window = self.window;
        self.take_where(|p| now.saturating_duration_since(p.last) >= window)
    }

    /// Take everything regardless of the window, in arrival order.
    pub fn drain(&mut self) -> Vec<RawEvent> {
        self.take_where(|_| true)
    }

    fn take_where(&mut self, ready: impl Fn(&Pending) -> bool) -> Vec<RawEvent> {
        let keys: Vec<(SourceKind, PathBuf)> = self
            .pending
            .iter()
            .filter(|(_, p)| ready(p))
            .map(|(k, _)| k.clone())
            .collect();

        let mut taken: Vec<(u64, RawEvent)> = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(pending) = self.pending.remove(&key) else {
                continue;
            };
            if let Some(kind) = pending.kind {
                let (source, path) = key;
                taken.push((pending.seq, RawEvent::new(source, kind, path)));
            }
        }
        taken.sort_by_key(|(seq, _)| *seq);
        taken.into_iter().map(|(_, event)| event).collect()
    }
}
