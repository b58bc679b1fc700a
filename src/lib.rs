// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod logging;
pub mod registry;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{default_config, default_config_path, load_and_validate, ConfigFile};
use crate::engine::{ChannelReloadBackend, ReloadRequest, WatchOrchestrator};
use crate::fs::RealFileSystem;
use crate::registry::{EntityFinder, FsEntityFinder};
use crate::watch::{EntityGlob, NotifySourceFactory};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - entity discovery (initial registry snapshot)
/// - the watch orchestrator and its raw sources
/// - the event logger and the reload request consumer
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_config(&args.config)?;
    let mut finder = build_finder(&cfg)?;
    finder.find()?;

    if args.dry_run {
        print_dry_run(&cfg, &finder);
        return Ok(());
    }

    // The actual recompilation lives outside this crate; here we only log
    // what would be reloaded.
    let (reloader, mut reload_rx) = ChannelReloadBackend::new();
    tokio::spawn(async move {
        while let Some(request) = reload_rx.recv().await {
            match request {
                ReloadRequest::ReloadStore(s) => info!(store = %s.name, "reload requested"),
                ReloadRequest::ReloadComponent(c) => info!(component = %c.name, "reload requested"),
                ReloadRequest::UnloadComponent(c) => info!(component = %c.name, "unload requested"),
            }
        }
    });

    let mut orchestrator = WatchOrchestrator::new(
        finder,
        reloader,
        Box::new(NotifySourceFactory),
        cfg.event_capacity(),
    )
    .with_debounce(cfg.debounce());
    let logger = logging::spawn_event_logger(orchestrator.subscribe());

    // Ctrl-C → close the watch from another task.
    {
        let closer = orchestrator.close_handle();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            closer.close();
        });
    }

    let ready = orchestrator.watch().await?;
    info!(
        root = ?cfg.root(),
        ready = ?ready.ready,
        degraded = ?ready.degraded,
        "watching; press Ctrl+C to stop"
    );

    orchestrator.join().await;
    orchestrator.close_watch();
    drop(orchestrator);
    let _ = logger.await;
    Ok(())
}

/// Load the config file, falling back to defaults rooted at the working
/// directory when the default config file is absent.
fn load_config(config: &str) -> Result<ConfigFile> {
    let path = PathBuf::from(config);
    if !path.exists() && path == default_config_path() {
        let cwd = std::env::current_dir()?;
        debug!(?cwd, "no config file; using defaults");
        return Ok(default_config(&cwd)?);
    }
    Ok(load_and_validate(&path)?)
}

/// Build the filesystem-backed finder described by `cfg`.
pub fn build_finder(cfg: &ConfigFile) -> Result<FsEntityFinder> {
    Ok(FsEntityFinder::new(
        Arc::new(RealFileSystem),
        cfg.root(),
        EntityGlob::new(cfg.stores_glob())?,
        EntityGlob::new(cfg.components_glob())?,
    ))
}

/// Simple dry-run output: print discovered stores and components.
fn print_dry_run(cfg: &ConfigFile, finder: &FsEntityFinder) {
    println!("devwatch dry-run");
    println!("  root = {}", cfg.root().display());
    println!("  stores.glob = {}", cfg.stores_glob());
    println!("  components.glob = {}", cfg.components_glob());
    println!();

    println!("stores ({}):", finder.found_stores().len());
    for store in finder.found_stores().values() {
        println!("  - {}  {}", store.name, display_rel(cfg.root(), &store.path));
    }
    println!();

    println!("components ({}):", finder.found_components_by_dirs().len());
    for component in finder.found_components_by_dirs().values() {
        println!("  - {}  {}", component.name, display_rel(cfg.root(), &component.path));
        match serde_json::to_string(&component.properties) {
            Ok(json) => println!("      {json}"),
            Err(e) => println!("      <unprintable properties: {e}>"),
        }
    }

    debug!("dry-run complete (no watching)");
}

fn display_rel(root: &Path, path: &Path) -> String {
    watch::path_utils::relative_str(root, path).unwrap_or_else(|| path.display().to_string())
}
