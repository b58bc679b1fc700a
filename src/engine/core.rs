// src/engine/core.rs

//! Pure reconciliation state machine.
//!
//! `ReconcileCore` consumes one [`RawEvent`] at a time and produces:
//! - registry mutations (through the [`EntityFinder`])
//! - an updated active watch set
//! - a list of [`CoreCommand`]s describing what the IO shell should do
//!   (publish semantic events, request reloads, add/remove watched dirs)
//!
//! It has no channels and no Tokio types, so whole edit sequences can be
//! replayed and order-checked in plain unit tests.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, error, trace, warn};

use crate::engine::events::{WatchEvent, WatchNotice};
use crate::engine::reload::ReloadRequest;
use crate::engine::sequence::coalesce_watch_commands;
use crate::registry::{component_by_manifest, ComponentDescriptor, EntityFinder};
use crate::types::{RawEvent, RawEventKind, SourceKind};
use crate::watch::classifier::{classify, FileRole};
use crate::watch::path_utils::normalize;
use crate::watch::resolver::{resolve, Resolution};

/// Command produced by the core, to be executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreCommand {
    /// Publish a semantic event to subscribers.
    Emit(WatchEvent),
    /// Hand a request to the reload backend (fire-and-forget).
    Reload(ReloadRequest),
    /// Start watching a component directory.
    WatchDir(PathBuf),
    /// Stop watching a component directory.
    UnwatchDir(PathBuf),
}

/// Decision returned by the core after handling a single raw event.
#[derive(Debug, Clone, Default)]
pub struct CoreStep {
    /// Commands the IO shell should execute, in order.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer loop should keep running.
    pub keep_running: bool,
}

/// Structural change applied to the component registry.
///
/// A manifest edit is never an in-place update: it is a `Retire` of the old
/// descriptor followed by a `Register` of the re-parsed one.
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentTransition {
    Retire(ComponentDescriptor),
    Register(ComponentDescriptor),
}

/// Reconciliation core.
///
/// Owns the entity finder (and through it the registry) and the active
/// watch set. The watch set always equals the key set of the directory index.
#[derive(Debug)]
pub struct ReconcileCore<F: EntityFinder> {
    finder: F,
    watch_set: BTreeSet<PathBuf>,
    closed: bool,
}

impl<F: EntityFinder> ReconcileCore<F> {
    /// Build a core from a finder whose initial snapshot is already loaded.
    pub fn new(finder: F) -> Self {
        let watch_set = finder.dirs_of_found_components().into_iter().collect();
        Self {
            finder,
            watch_set,
            closed: false,
        }
    }

    pub fn finder(&self) -> &F {
        &self.finder
    }

    pub fn active_watch_set(&self) -> &BTreeSet<PathBuf> {
        &self.watch_set
    }

    /// True iff the watch set and the directory index agree exactly.
    pub fn watch_set_matches_index(&self) -> bool {
        self.watch_set
            .iter()
            .eq(self.finder.found_components_by_dirs().keys())
    }

    /// Stop reacting to events. Later steps are no-ops.
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Handle a single raw event, updating state and returning the commands
    /// for the IO shell.
    pub fn step(&mut self, event: RawEvent) -> CoreStep {
        if self.closed {
            return CoreStep {
                commands: Vec::new(),
                keep_running: false,
            };
        }

        trace!(?event, "core received raw event");
        let path = normalize(&event.path);

        let commands = match event.source {
            SourceKind::Stores => self.handle_store(event.kind, &path),
            SourceKind::Manifests => self.handle_manifest(event.kind, &path),
            SourceKind::ComponentDirs => self.handle_component_file(&path),
        };

        CoreStep {
            commands: coalesce_watch_commands(commands),
            keep_running: true,
        }
    }

    fn handle_store(&mut self, kind: RawEventKind, path: &Path) -> Vec<CoreCommand> {
        let mut commands = Vec::new();

        match kind {
            RawEventKind::Add | RawEventKind::Change => {
                let store = match self.finder.add_store_by_filename(path) {
                    Ok(store) => store,
                    Err(err) => {
                        warn!(?path, error = %err, "ignoring store event");
                        return commands;
                    }
                };
                if kind == RawEventKind::Add {
                    commands.push(CoreCommand::Emit(WatchEvent::AddStore(store.clone())));
                    commands.push(CoreCommand::Reload(ReloadRequest::ReloadStore(store)));
                } else {
                    commands.push(CoreCommand::Emit(WatchEvent::ChangeStore(store.clone())));
                    commands.push(CoreCommand::Reload(ReloadRequest::ReloadStore(store.clone())));
                    commands.push(CoreCommand::Emit(WatchEvent::ReloadStore(store)));
                }
            }
            RawEventKind::Unlink => {
                if let Some(store) = self.finder.delete_store_by_filename(path) {
                    commands.push(CoreCommand::Emit(WatchEvent::UnlinkStore(store.clone())));
                    commands.push(CoreCommand::Reload(ReloadRequest::ReloadStore(store)));
                    return commands;
                }

                // A removed or moved-away directory takes its stores with it.
                let nested: Vec<PathBuf> = self
                    .finder
                    .found_stores()
                    .keys()
                    .filter(|p| p.starts_with(path) && p.as_path() != path)
                    .cloned()
                    .collect();
                if nested.is_empty() {
                    debug!(?path, "unlink for unknown store; ignoring");
                }
                for store_path in nested {
                    if let Some(store) = self.finder.delete_store_by_filename(&store_path) {
                        commands.push(CoreCommand::Emit(WatchEvent::UnlinkStore(store.clone())));
                        commands.push(CoreCommand::Reload(ReloadRequest::ReloadStore(store)));
                    }
                }
            }
        }

        commands
    }

    fn handle_manifest(&mut self, kind: RawEventKind, path: &Path) -> Vec<CoreCommand> {
        let mut commands = Vec::new();
        let existing = self.registered_manifest(path);

        let mut transitions = Vec::new();
        match kind {
            RawEventKind::Add | RawEventKind::Change => {
                if let Some(old) = existing {
                    transitions.push(ComponentTransition::Retire(old));
                }
                match self.finder.create_component_descriptor(path) {
                    Ok(new) => transitions.push(ComponentTransition::Register(new)),
                    Err(err) => {
                        warn!(?path, error = %err, "manifest rejected; component treated as absent");
                        commands.push(CoreCommand::Emit(WatchEvent::Error(WatchNotice::from(&err))));
                    }
                }
            }
            RawEventKind::Unlink => match existing {
                Some(old) => transitions.push(ComponentTransition::Retire(old)),
                None => {
                    // A removed or moved-away directory retires every
                    // component beneath it.
                    let nested = self.components_under(path);
                    if nested.is_empty() {
                        debug!(?path, "unlink for unknown manifest; ignoring");
                    }
                    transitions.extend(nested.into_iter().map(ComponentTransition::Retire));
                }
            },
        }

        // Retirement output goes before any parse error notice.
        let mut ordered = Vec::new();
        for transition in transitions {
            self.apply_transition(transition, &mut ordered);
        }
        ordered.append(&mut commands);
        ordered
    }

    fn registered_manifest(&self, path: &Path) -> Option<ComponentDescriptor> {
        component_by_manifest(self.finder.found_components_by_dirs(), path).cloned()
    }

    /// Registered components whose manifest lies beneath `dir`.
    fn components_under(&self, dir: &Path) -> Vec<ComponentDescriptor> {
        self.finder
            .found_components_by_dirs()
            .values()
            .filter(|c| c.path.starts_with(dir) && c.path != dir)
            .cloned()
            .collect()
    }

    /// Apply one registry transition, keeping the watch set in lockstep.
    pub fn apply_transition(
        &mut self,
        transition: ComponentTransition,
        commands: &mut Vec<CoreCommand>,
    ) {
        match transition {
            ComponentTransition::Retire(old) => {
                let Some(removed) = self.finder.remove_component_from_registry(&old) else {
                    return;
                };
                let dir = removed.dir().to_path_buf();
                self.watch_set.remove(&dir);
                commands.push(CoreCommand::UnwatchDir(dir));
                commands.push(CoreCommand::Emit(WatchEvent::UnlinkComponent(removed.clone())));
                commands.push(CoreCommand::Reload(ReloadRequest::UnloadComponent(removed)));
            }
            ComponentTransition::Register(new) => {
                let dir = new.dir().to_path_buf();
                if let Err(err) = self.finder.add_component_to_registry(new.clone()) {
                    error!(error = %err, "component registration refused");
                    commands.push(CoreCommand::Emit(WatchEvent::Error(WatchNotice::from(&err))));
                    return;
                }
                self.watch_set.insert(dir.clone());
                commands.push(CoreCommand::WatchDir(dir));
                commands.push(CoreCommand::Emit(WatchEvent::AddComponent(new.clone())));
                commands.push(CoreCommand::Reload(ReloadRequest::ReloadComponent(new)));
            }
        }
    }

    fn handle_component_file(&self, path: &Path) -> Vec<CoreCommand> {
        if self
            .finder
            .components_glob()
            .matches_under(self.finder.root(), path)
        {
            trace!(?path, "manifest-shaped path left to the manifest watcher");
            return Vec::new();
        }

        let index = self.finder.found_components_by_dirs();
        let component = match resolve(path, index) {
            Resolution::Owned(component) => component.clone(),
            Resolution::Manifest(component) => {
                trace!(component = %component.name, "manifest event left to the manifest watcher");
                return Vec::new();
            }
            Resolution::Unowned => {
                trace!(?path, "no component owns path");
                return Vec::new();
            }
        };

        let role = classify(self.finder.root(), &component, path);
        debug!(component = %component.name, ?path, ?role, "component file changed");

        let mut commands = vec![CoreCommand::Emit(WatchEvent::ChangeComponent {
            filename: path.to_path_buf(),
            component: component.clone(),
        })];
        match role {
            FileRole::Logic => {
                commands.push(CoreCommand::Emit(WatchEvent::ChangeLogic(component.clone())));
            }
            r if r.is_template() => {
                commands.push(CoreCommand::Emit(WatchEvent::ChangeTemplates(component.clone())));
            }
            _ => {}
        }
        commands.push(CoreCommand::Reload(ReloadRequest::ReloadComponent(component)));
        commands
    }
}
