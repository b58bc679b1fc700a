// src/engine/mod.rs

//! Reconciliation engine.
//!
//! This module turns raw filesystem notifications into semantic lifecycle
//! events for stores and components:
//! - [`core`] holds the pure state machine (registry mutation, watch-set
//!   bookkeeping, event ordering).
//! - [`runtime`] is the async loop that feeds raw events into the core and
//!   executes the commands it returns.
//! - [`debounce`] folds bursts of raw events per path before the core sees
//!   them.
//! - [`orchestrator`] starts the raw sources, waits for readiness and owns
//!   shutdown.
//! - [`events`], [`reload`] and [`sequence`] are the shared vocabulary.

pub mod core;
pub mod debounce;
pub mod events;
pub mod orchestrator;
pub mod reload;
pub mod runtime;
pub mod sequence;

pub use core::{ComponentTransition, CoreCommand, CoreStep, ReconcileCore};
pub use debounce::{RawDebouncer, DEFAULT_DEBOUNCE};
pub use events::{NoticeKind, WatchEvent, WatchNotice};
pub use orchestrator::{CloseHandle, ReadyHandles, WatchOrchestrator, WatchState};
pub use reload::{ChannelReloadBackend, ReloadBackend, ReloadRequest};
pub use runtime::WatchRuntime;
