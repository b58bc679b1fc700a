// tests/orchestrator.rs

mod common;
use crate::common::builders::{project_path, ManifestBuilder, ProjectBuilder};
use crate::common::manual_source::ManualSources;
use crate::common::recording_backend::RecordingBackend;
use crate::common::{init_tracing, with_timeout};

use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::broadcast;
use tokio::time::{sleep, timeout, Duration};

use devwatch::engine::{NoticeKind, ReloadRequest, WatchEvent, WatchOrchestrator, WatchState};
use devwatch::errors::DevwatchError;
use devwatch::fs::mock::MockFileSystem;
use devwatch::registry::FsEntityFinder;
use devwatch::types::{RawEventKind, SourceKind};

type TestResult = Result<(), Box<dyn Error>>;

type Orchestrator = WatchOrchestrator<FsEntityFinder, RecordingBackend>;

fn setup(sources: &ManualSources) -> (MockFileSystem, Orchestrator, RecordingBackend) {
    let (fs, finder) = ProjectBuilder::new()
        .store("Cart")
        .component("button", ManifestBuilder::new("button.html"))
        .build();
    let backend = RecordingBackend::new();
    let orchestrator = WatchOrchestrator::new(finder, backend.clone(), sources.factory(), 64);
    (fs, orchestrator, backend)
}

async fn next_event(rx: &mut broadcast::Receiver<WatchEvent>) -> WatchEvent {
    with_timeout(rx.recv()).await.expect("event channel closed")
}

/// Asserts nothing else arrives within a few debounce windows.
async fn assert_quiet(rx: &mut broadcast::Receiver<WatchEvent>) {
    if let Ok(event) = timeout(Duration::from_millis(200), rx.recv()).await {
        panic!("unexpected event {event:?}");
    }
}

async fn next_names(rx: &mut broadcast::Receiver<WatchEvent>, n: usize) -> Vec<&'static str> {
    let mut names = Vec::with_capacity(n);
    for _ in 0..n {
        names.push(next_event(rx).await.name());
    }
    names
}

#[tokio::test]
async fn watch_waits_for_every_source_to_be_ready() -> TestResult {
    init_tracing();
    let sources = ManualSources::new();
    sources.hold_ready(SourceKind::Manifests);
    let (_fs, mut orch, _backend) = setup(&sources);
    assert_eq!(orch.state(), WatchState::Created);

    let released = AtomicBool::new(false);
    let (result, released_first) = tokio::join!(
        async {
            let result = orch.watch().await;
            (result, released.load(Ordering::SeqCst))
        },
        async {
            sleep(Duration::from_millis(50)).await;
            released.store(true, Ordering::SeqCst);
            assert!(sources.ready(SourceKind::Manifests));
        }
    )
    .0;

    let ready = result?;
    assert!(released_first, "watch() returned before the held source was ready");
    assert_eq!(ready.ready.len(), 3);
    assert!(ready.degraded.is_empty());
    assert_eq!(ready.watched_dirs, vec![project_path("components/button")]);
    assert_eq!(orch.state(), WatchState::Ready);
    assert_eq!(
        sources.watched(SourceKind::ComponentDirs),
        vec![project_path("components/button")]
    );
    assert_eq!(sources.watched(SourceKind::Stores), vec![project_path("stores")]);

    orch.close_watch();
    Ok(())
}

#[tokio::test]
async fn events_flow_and_watch_set_follows_manifests() -> TestResult {
    init_tracing();
    let sources = ManualSources::new();
    let (fs, mut orch, backend) = setup(&sources);
    let mut rx = orch.subscribe();
    orch.watch().await?;

    // Component content change.
    sources.send(
        SourceKind::ComponentDirs,
        RawEventKind::Change,
        project_path("components/button/index.js"),
    );
    assert_eq!(next_names(&mut rx, 2).await, vec!["changeComponent", "changeLogic"]);

    // New component: its directory joins the watch set.
    let card = project_path("components/card/component.json");
    fs.add_file(&card, ManifestBuilder::new("card.html").to_json());
    sources.send(SourceKind::Manifests, RawEventKind::Add, &card);
    assert_eq!(next_names(&mut rx, 1).await, vec!["addComponent"]);
    assert_eq!(
        orch.watched_component_dirs(),
        vec![project_path("components/button"), project_path("components/card")]
    );

    // Removing the manifest drops the directory again.
    fs.remove(&card);
    sources.send(SourceKind::Manifests, RawEventKind::Unlink, &card);
    assert_eq!(next_names(&mut rx, 1).await, vec!["unlinkComponent"]);
    assert_eq!(
        sources.watched(SourceKind::ComponentDirs),
        vec![project_path("components/button")]
    );

    // Store edit.
    sources.send(SourceKind::Stores, RawEventKind::Change, project_path("stores/Cart.js"));
    assert_eq!(next_names(&mut rx, 2).await, vec!["changeStore", "reloadStore"]);

    let requests = backend.requests();
    assert_eq!(requests.len(), 4);
    assert!(matches!(&requests[0], ReloadRequest::ReloadComponent(c) if c.name == "button"));
    assert!(matches!(&requests[1], ReloadRequest::ReloadComponent(c) if c.name == "card"));
    assert!(matches!(&requests[2], ReloadRequest::UnloadComponent(c) if c.name == "card"));
    assert!(matches!(&requests[3], ReloadRequest::ReloadStore(s) if s.name == "Cart"));

    orch.close_watch();
    let core = with_timeout(orch.join()).await.ok_or("watch loop failed")?;
    assert!(core.watch_set_matches_index());
    assert!(core.is_closed());
    Ok(())
}

#[tokio::test]
async fn manifest_edit_keeps_directory_watched() -> TestResult {
    init_tracing();
    let sources = ManualSources::new();
    let (fs, mut orch, _backend) = setup(&sources);
    let mut rx = orch.subscribe();
    orch.watch().await?;

    let manifest = project_path("components/button/component.json");
    fs.add_file(&manifest, ManifestBuilder::new("other.html").to_json());
    sources.send(SourceKind::Manifests, RawEventKind::Change, &manifest);

    assert_eq!(next_names(&mut rx, 2).await, vec!["unlinkComponent", "addComponent"]);
    assert_eq!(
        sources.watched(SourceKind::ComponentDirs),
        vec![project_path("components/button")]
    );

    orch.close_watch();
    Ok(())
}

#[tokio::test]
async fn failed_source_degrades_instead_of_aborting() -> TestResult {
    init_tracing();
    let sources = ManualSources::new();
    sources.fail_on_start(SourceKind::Stores);
    let (_fs, mut orch, _backend) = setup(&sources);
    let mut rx = orch.subscribe();

    let ready = orch.watch().await?;

    assert_eq!(ready.degraded, vec![SourceKind::Stores]);
    assert_eq!(ready.ready, vec![SourceKind::Manifests, SourceKind::ComponentDirs]);
    match next_event(&mut rx).await {
        WatchEvent::Error(notice) => {
            assert_eq!(notice.kind, NoticeKind::RawSource);
            assert!(notice.message.contains("stores"));
        }
        other => return Err(format!("expected error event, got {other:?}").into()),
    }

    // The other sources keep working.
    sources.send(
        SourceKind::ComponentDirs,
        RawEventKind::Change,
        project_path("components/button/button.html"),
    );
    assert_eq!(next_names(&mut rx, 2).await, vec!["changeComponent", "changeTemplates"]);

    orch.close_watch();
    Ok(())
}

#[tokio::test]
async fn raw_source_errors_are_published() -> TestResult {
    init_tracing();
    let sources = ManualSources::new();
    let (_fs, mut orch, _backend) = setup(&sources);
    let mut rx = orch.subscribe();
    orch.watch().await?;

    sources.send_error(SourceKind::ComponentDirs, "inotify limit reached");

    match next_event(&mut rx).await {
        WatchEvent::Error(notice) => {
            assert_eq!(notice.kind, NoticeKind::RawSource);
            assert!(notice.message.contains("inotify limit reached"));
        }
        other => return Err(format!("expected error event, got {other:?}").into()),
    }

    orch.close_watch();
    Ok(())
}

#[tokio::test]
async fn events_before_readiness_are_replayed() -> TestResult {
    init_tracing();
    let sources = ManualSources::new();
    sources.hold_ready(SourceKind::ComponentDirs);
    let (fs, mut orch, _backend) = setup(&sources);
    let mut rx = orch.subscribe();

    let store = project_path("stores/Early.js");
    fs.add_file(&store, "export default {}");

    let (result, ()) = tokio::join!(orch.watch(), async {
        sleep(Duration::from_millis(20)).await;
        assert!(sources.send(SourceKind::Stores, RawEventKind::Add, &store));
        assert!(sources.ready(SourceKind::ComponentDirs));
    });
    result?;

    match next_event(&mut rx).await {
        WatchEvent::AddStore(s) => assert_eq!(s.name, "Early"),
        other => return Err(format!("expected addStore, got {other:?}").into()),
    }

    orch.close_watch();
    Ok(())
}

#[tokio::test]
async fn close_is_idempotent_and_releases_every_source() -> TestResult {
    init_tracing();
    let sources = ManualSources::new();
    let (_fs, mut orch, _backend) = setup(&sources);
    orch.watch().await?;
    let handle = orch.close_handle();

    handle.close();
    orch.close_watch();
    handle.close();

    assert!(handle.is_closed());
    assert_eq!(orch.state(), WatchState::Closed);
    for kind in SourceKind::ALL {
        assert_eq!(sources.close_count(kind), 1, "{kind}");
        assert!(!sources.is_open(kind));
    }
    assert!(orch.watched_component_dirs().is_empty());

    // Nothing can be delivered any more, and the loop has ended.
    assert!(!sources.send(
        SourceKind::ComponentDirs,
        RawEventKind::Change,
        project_path("components/button/index.js"),
    ));
    assert!(with_timeout(orch.join()).await.is_some());
    Ok(())
}

#[tokio::test]
async fn close_during_startup_aborts_watch() {
    init_tracing();
    let sources = ManualSources::new();
    sources.hold_ready(SourceKind::ComponentDirs);
    let (_fs, mut orch, _backend) = setup(&sources);
    let handle = orch.close_handle();

    let (result, ()) = tokio::join!(with_timeout(orch.watch()), async {
        sleep(Duration::from_millis(20)).await;
        handle.close();
    });

    assert!(matches!(result, Err(DevwatchError::Closed)));
    assert_eq!(orch.state(), WatchState::Closed);
    for kind in SourceKind::ALL {
        assert_eq!(sources.close_count(kind), 1, "{kind}");
    }
}

#[tokio::test]
async fn watch_can_only_start_once() -> TestResult {
    init_tracing();
    let sources = ManualSources::new();
    let (_fs, mut orch, _backend) = setup(&sources);
    orch.watch().await?;

    assert!(matches!(orch.watch().await, Err(DevwatchError::AlreadyStarted(_))));
    assert_eq!(sources.started().len(), 3);

    orch.close_watch();
    Ok(())
}

#[tokio::test]
async fn dropping_the_orchestrator_closes_sources() -> TestResult {
    init_tracing();
    let sources = ManualSources::new();
    let (_fs, mut orch, _backend) = setup(&sources);
    orch.watch().await?;

    drop(orch);

    for kind in SourceKind::ALL {
        assert_eq!(sources.close_count(kind), 1, "{kind}");
    }
    Ok(())
}

#[tokio::test]
async fn create_then_modify_burst_adds_the_store_once() -> TestResult {
    init_tracing();
    let sources = ManualSources::new();
    let (fs, orch, backend) = setup(&sources);
    let mut orch = orch.with_debounce(Duration::from_millis(20));
    let mut rx = orch.subscribe();
    orch.watch().await?;

    let store = project_path("stores/Orders.js");
    fs.add_file(&store, "export default {}");
    sources.send(SourceKind::Stores, RawEventKind::Add, &store);
    sources.send(SourceKind::Stores, RawEventKind::Change, &store);
    sources.send(SourceKind::Stores, RawEventKind::Change, &store);

    assert_eq!(next_names(&mut rx, 1).await, vec!["addStore"]);
    assert_quiet(&mut rx).await;
    assert!(matches!(
        backend.requests().as_slice(),
        [ReloadRequest::ReloadStore(s)] if s.name == "Orders"
    ));

    orch.close_watch();
    Ok(())
}

#[tokio::test]
async fn repeated_manifest_writes_fire_one_unlink_add_pair() -> TestResult {
    init_tracing();
    let sources = ManualSources::new();
    let (fs, orch, _backend) = setup(&sources);
    let mut orch = orch.with_debounce(Duration::from_millis(20));
    let mut rx = orch.subscribe();
    orch.watch().await?;

    let manifest = project_path("components/button/component.json");
    fs.add_file(&manifest, ManifestBuilder::new("other.html").to_json());
    sources.send(SourceKind::Manifests, RawEventKind::Change, &manifest);
    sources.send(SourceKind::Manifests, RawEventKind::Change, &manifest);

    assert_eq!(next_names(&mut rx, 2).await, vec!["unlinkComponent", "addComponent"]);
    assert_quiet(&mut rx).await;

    orch.close_watch();
    Ok(())
}

#[tokio::test]
async fn files_that_come_and_go_in_one_window_are_silent() -> TestResult {
    init_tracing();
    let sources = ManualSources::new();
    let (_fs, orch, backend) = setup(&sources);
    let mut orch = orch.with_debounce(Duration::from_millis(20));
    let mut rx = orch.subscribe();
    orch.watch().await?;

    let scratch = project_path("stores/Scratch.js");
    sources.send(SourceKind::Stores, RawEventKind::Add, &scratch);
    sources.send(SourceKind::Stores, RawEventKind::Unlink, &scratch);

    assert_quiet(&mut rx).await;
    assert!(backend.requests().is_empty());

    orch.close_watch();
    Ok(())
}
