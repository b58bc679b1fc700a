// tests/notify_watch.rs

mod common;
use crate::common::builders::{ManifestBuilder, COMPONENTS_GLOB, STORES_GLOB};
use crate::common::init_tracing;
use crate::common::recording_backend::RecordingBackend;

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use tokio::sync::broadcast;
use tokio::time::{sleep, timeout, Duration};

use devwatch::engine::{WatchEvent, WatchOrchestrator};
use devwatch::fs::RealFileSystem;
use devwatch::registry::{EntityFinder, FsEntityFinder};
use devwatch::watch::{EntityGlob, NotifySourceFactory};

type TestResult = Result<(), Box<dyn Error>>;

type Orchestrator = WatchOrchestrator<FsEntityFinder, RecordingBackend>;

const DEBOUNCE: Duration = Duration::from_millis(100);
const QUIET: Duration = Duration::from_millis(800);

/// A temp project watched by real `notify` sources.
struct Project {
    _tmp: TempDir,
    root: PathBuf,
    orch: Orchestrator,
    rx: broadcast::Receiver<WatchEvent>,
}

impl Project {
    async fn start(setup: impl FnOnce(&Path) -> std::io::Result<()>) -> Result<Self, Box<dyn Error>> {
        init_tracing();
        let tmp = TempDir::new()?;
        let root = tmp.path().canonicalize()?;
        setup(&root)?;

        let mut finder = FsEntityFinder::new(
            Arc::new(RealFileSystem),
            &root,
            EntityGlob::new(STORES_GLOB)?,
            EntityGlob::new(COMPONENTS_GLOB)?,
        );
        finder.find()?;

        let mut orch = WatchOrchestrator::new(
            finder,
            RecordingBackend::new(),
            Box::new(NotifySourceFactory),
            256,
        )
        .with_debounce(DEBOUNCE);
        let rx = orch.subscribe();
        let ready = orch.watch().await?;
        assert!(ready.degraded.is_empty(), "degraded: {:?}", ready.degraded);

        // Let the OS watchers settle before touching the tree.
        sleep(Duration::from_millis(200)).await;
        Ok(Self {
            _tmp: tmp,
            root,
            orch,
            rx,
        })
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    /// Every event until the stream has been quiet for a while, labelled
    /// `name:entity`.
    async fn settle(&mut self) -> Vec<String> {
        let mut labels = Vec::new();
        loop {
            match timeout(QUIET, self.rx.recv()).await {
                Ok(Ok(event)) => labels.push(label(&event)),
                Ok(Err(broadcast::error::RecvError::Lagged(n))) => {
                    labels.push(format!("lagged:{n}"));
                }
                Ok(Err(broadcast::error::RecvError::Closed)) | Err(_) => return labels,
            }
        }
    }
}

fn label(event: &WatchEvent) -> String {
    let entity = match event {
        WatchEvent::AddStore(s)
        | WatchEvent::ChangeStore(s)
        | WatchEvent::UnlinkStore(s)
        | WatchEvent::ReloadStore(s) => s.name.clone(),
        WatchEvent::AddComponent(c)
        | WatchEvent::ChangeLogic(c)
        | WatchEvent::ChangeTemplates(c)
        | WatchEvent::UnlinkComponent(c)
        | WatchEvent::ChangeComponent { component: c, .. } => c.name.clone(),
        WatchEvent::Error(notice) => notice.message.clone(),
    };
    format!("{}:{entity}", event.name())
}

fn write(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)
}

fn manifest(template: &str) -> String {
    ManifestBuilder::new(template).to_json()
}

fn button_project(root: &Path) -> std::io::Result<()> {
    write(&root.join("stores/Cart.js"), "export default {}")?;
    write(&root.join("components/button/component.json"), &manifest("button.html"))
}

#[tokio::test]
async fn manifest_edit_fires_one_unlink_add_pair() -> TestResult {
    let mut project = Project::start(button_project).await?;

    write(&project.path("components/button/component.json"), &manifest("fancy.html"))?;

    assert_eq!(
        project.settle().await,
        vec!["unlinkComponent:button", "addComponent:button"]
    );
    project.orch.close_watch();
    Ok(())
}

#[tokio::test]
async fn component_created_in_one_go_is_added_once() -> TestResult {
    let mut project = Project::start(button_project).await?;
    let card = project.path("components/card");

    write(&card.join("component.json"), &manifest("card.html"))?;

    assert_eq!(project.settle().await, vec!["addComponent:card"]);
    assert!(project.orch.watched_component_dirs().contains(&card));

    write(&card.join("index.js"), "export const x = 1;")?;

    assert_eq!(
        project.settle().await,
        vec!["changeComponent:card", "changeLogic:card"]
    );
    project.orch.close_watch();
    Ok(())
}

#[tokio::test]
async fn new_store_is_added_once() -> TestResult {
    let mut project = Project::start(button_project).await?;

    write(&project.path("stores/user/Profile.js"), "export default {}")?;

    assert_eq!(project.settle().await, vec!["addStore:user/Profile"]);
    project.orch.close_watch();
    Ok(())
}

#[tokio::test]
async fn directories_moved_in_and_out_register_and_retire() -> TestResult {
    let mut project = Project::start(|root| {
        button_project(root)?;
        write(&root.join("staging/another/component.json"), &manifest("another.html"))
    })
    .await?;

    fs::rename(
        project.path("staging/another"),
        project.path("components/another"),
    )?;
    assert_eq!(project.settle().await, vec!["addComponent:another"]);
    assert!(project
        .orch
        .watched_component_dirs()
        .contains(&project.path("components/another")));

    fs::rename(project.path("components/button"), project.path("button_gone"))?;
    assert_eq!(project.settle().await, vec!["unlinkComponent:button"]);
    assert_eq!(
        project.orch.watched_component_dirs(),
        vec![project.path("components/another")]
    );

    project.orch.close_watch();
    Ok(())
}

#[tokio::test]
async fn nested_components_fire_once_and_survive_inner_removal() -> TestResult {
    let mut project = Project::start(|root| {
        write(&root.join("components/outer/component.json"), &manifest("outer.html"))?;
        write(
            &root.join("components/outer/inner/component.json"),
            &manifest("inner.html"),
        )
    })
    .await?;

    write(&project.path("components/outer/inner/index.js"), "export {}")?;
    assert_eq!(
        project.settle().await,
        vec!["changeComponent:inner", "changeLogic:inner"]
    );

    fs::remove_file(project.path("components/outer/inner/component.json"))?;
    assert_eq!(project.settle().await, vec!["unlinkComponent:inner"]);

    write(&project.path("components/outer/inner/asset.txt"), "hello")?;
    assert_eq!(project.settle().await, vec!["changeComponent:outer"]);

    project.orch.close_watch();
    Ok(())
}

#[tokio::test]
async fn components_directory_created_after_start_is_picked_up() -> TestResult {
    let mut project =
        Project::start(|root| write(&root.join("stores/Cart.js"), "export default {}")).await?;
    assert!(project.orch.watched_component_dirs().is_empty());

    write(&project.path("components/card/component.json"), &manifest("card.html"))?;

    assert_eq!(project.settle().await, vec!["addComponent:card"]);
    project.orch.close_watch();
    assert!(project.orch.join().await.is_some());
    Ok(())
}
