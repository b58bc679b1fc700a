// src/engine/sequence.rs

//! Ordering and de-duplication helpers shared by the core and the sources.

use std::collections::HashSet;

use crate::engine::core::CoreCommand;
use crate::types::RawEvent;

/// Cancel `UnwatchDir(d)` followed by `WatchDir(d)` within one step.
///
/// A manifest change retires and re-registers the same directory; the raw
/// directory source only needs to see the net effect. Every other command
/// keeps its relative order.
pub fn coalesce_watch_commands(commands: Vec<CoreCommand>) -> Vec<CoreCommand> {
    let mut out: Vec<Option<CoreCommand>> = Vec::with_capacity(commands.len());

    for command in commands {
        if let CoreCommand::WatchDir(dir) = &command {
            let pending = out.iter().rposition(|c| {
                matches!(c, Some(CoreCommand::UnwatchDir(d)) if d == dir)
            });
            if let Some(idx) = pending {
                out[idx] = None;
                continue;
            }
        }
        out.push(Some(command));
    }

    out.into_iter().flatten().collect()
}

/// Drop exact duplicates from one batch of raw events, keeping first
/// occurrences in order.
pub fn dedup_raw(events: Vec<RawEvent>) -> Vec<RawEvent> {
    let mut seen = HashSet::with_capacity(events.len());
    events
        .into_iter()
        .filter(|event| seen.insert(event.clone()))
        .collect()
}
