#![allow(dead_code)]

pub use devwatch_test_utils::builders;
pub use devwatch_test_utils::manual_source;
pub use devwatch_test_utils::recording_backend;
pub use devwatch_test_utils::{init_tracing, with_timeout};

use devwatch::engine::{CoreCommand, WatchEvent};

/// Event names of every `Emit` command, in order.
pub fn emitted_names(commands: &[CoreCommand]) -> Vec<&'static str> {
    emitted(commands).into_iter().map(|e| e.name()).collect()
}

/// Every emitted event, in order.
pub fn emitted(commands: &[CoreCommand]) -> Vec<&WatchEvent> {
    commands
        .iter()
        .filter_map(|c| match c {
            CoreCommand::Emit(event) => Some(event),
            _ => None,
        })
        .collect()
}
