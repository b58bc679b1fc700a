// src/logging.rs

//! Logging setup for `devwatch` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log level:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `DEVWATCH_LOG` environment variable (e.g. "info", "debug")
//! 3. default to `info`
//!
//! Logs are sent to STDERR so that stdout stays free for `--dry-run` output.

use anyhow::Result;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::fmt;

use crate::cli::LogLevel;
use crate::engine::WatchEvent;

/// Initialise global logging subscriber.
///
/// Safe to call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let level = match cli_level {
        Some(lvl) => level_from_log_level(lvl),
        None => std::env::var("DEVWATCH_LOG")
            .ok()
            .and_then(|s| parse_level_str(&s))
            .unwrap_or(tracing::Level::INFO),
    };

    fmt()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

fn level_from_log_level(lvl: LogLevel) -> tracing::Level {
    match lvl {
        LogLevel::Error => tracing::Level::ERROR,
        LogLevel::Warn => tracing::Level::WARN,
        LogLevel::Info => tracing::Level::INFO,
        LogLevel::Debug => tracing::Level::DEBUG,
        LogLevel::Trace => tracing::Level::TRACE,
    }
}

pub fn parse_level_str(s: &str) -> Option<tracing::Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(tracing::Level::ERROR),
        "warn" | "warning" => Some(tracing::Level::WARN),
        "info" => Some(tracing::Level::INFO),
        "debug" => Some(tracing::Level::DEBUG),
        "trace" => Some(tracing::Level::TRACE),
        _ => None,
    }
}

/// Attach a passive subscriber that logs one line per semantic event.
///
/// The engine itself never logs at this granularity; it only publishes.
pub fn spawn_event_logger(mut rx: broadcast::Receiver<WatchEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => log_event(&event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "event logger fell behind");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn log_event(event: &WatchEvent) {
    let name = event.name();
    match event {
        WatchEvent::AddStore(s)
        | WatchEvent::ChangeStore(s)
        | WatchEvent::UnlinkStore(s)
        | WatchEvent::ReloadStore(s) => {
            info!(event = name, store = %s.name, path = ?s.path, "store event");
        }
        WatchEvent::ChangeComponent { filename, component } => {
            info!(event = name, component = %component.name, file = ?filename, "component file changed");
        }
        WatchEvent::AddComponent(c)
        | WatchEvent::ChangeLogic(c)
        | WatchEvent::ChangeTemplates(c)
        | WatchEvent::UnlinkComponent(c) => {
            info!(event = name, component = %c.name, path = ?c.path, "component event");
        }
        WatchEvent::Error(notice) => {
            warn!(event = name, kind = ?notice.kind, "{}", notice.message);
        }
    }
}
