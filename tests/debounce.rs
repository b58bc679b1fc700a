// tests/debounce.rs

use std::path::PathBuf;
use std::time::{Duration, Instant};

use devwatch::engine::debounce::fold;
use devwatch::engine::RawDebouncer;
use devwatch::types::{RawEvent, RawEventKind, SourceKind};

use RawEventKind::{Add, Change, Unlink};

const WINDOW: Duration = Duration::from_millis(50);

fn ev(source: SourceKind, kind: RawEventKind, path: &str) -> RawEvent {
    RawEvent::new(source, kind, PathBuf::from(path))
}

fn manifest(kind: RawEventKind) -> RawEvent {
    ev(SourceKind::Manifests, kind, "/p/components/card/component.json")
}

#[test]
fn fold_table() {
    assert_eq!(fold(Some(Add), Change), Some(Add));
    assert_eq!(fold(Some(Add), Add), Some(Add));
    assert_eq!(fold(Some(Add), Unlink), None);
    assert_eq!(fold(Some(Change), Change), Some(Change));
    assert_eq!(fold(Some(Change), Unlink), Some(Unlink));
    assert_eq!(fold(Some(Unlink), Add), Some(Change));
    assert_eq!(fold(Some(Unlink), Unlink), Some(Unlink));
    assert_eq!(fold(None, Add), Some(Add));
    assert_eq!(fold(None, Unlink), None);
}

#[test]
fn create_then_modify_is_released_as_one_add() {
    let t0 = Instant::now();
    let mut debouncer = RawDebouncer::new(WINDOW);

    debouncer.record(manifest(Add), t0);
    debouncer.record(manifest(Change), t0 + Duration::from_millis(1));
    debouncer.record(manifest(Change), t0 + Duration::from_millis(2));

    assert!(debouncer.take_ready(t0 + Duration::from_millis(30)).is_empty());
    assert_eq!(
        debouncer.take_ready(t0 + Duration::from_millis(60)),
        vec![manifest(Add)]
    );
    assert!(!debouncer.has_pending());
}

#[test]
fn each_event_restarts_the_quiet_period() {
    let t0 = Instant::now();
    let mut debouncer = RawDebouncer::new(WINDOW);

    debouncer.record(manifest(Change), t0);
    debouncer.record(manifest(Change), t0 + Duration::from_millis(40));

    assert_eq!(debouncer.next_deadline(), Some(t0 + Duration::from_millis(90)));
    assert!(debouncer.take_ready(t0 + Duration::from_millis(60)).is_empty());
    assert_eq!(
        debouncer.take_ready(t0 + Duration::from_millis(90)),
        vec![manifest(Change)]
    );
}

#[test]
fn short_lived_files_vanish_and_replaced_files_change() {
    let t0 = Instant::now();
    let mut debouncer = RawDebouncer::new(WINDOW);
    let tmp = ev(SourceKind::Stores, Add, "/p/stores/.Cart.js.swp");

    debouncer.record(tmp.clone(), t0);
    debouncer.record(RawEvent { kind: Unlink, ..tmp }, t0);
    debouncer.record(manifest(Unlink), t0);
    debouncer.record(manifest(Add), t0);

    assert_eq!(debouncer.drain(), vec![manifest(Change)]);
}

#[test]
fn sources_and_paths_are_kept_apart_in_arrival_order() {
    let t0 = Instant::now();
    let mut debouncer = RawDebouncer::new(WINDOW);
    let store = ev(SourceKind::Stores, Add, "/p/stores/Cart.js");
    let logic = ev(SourceKind::ComponentDirs, Change, "/p/components/card/index.js");
    let same_path_other_source =
        ev(SourceKind::ComponentDirs, Change, "/p/components/card/component.json");

    debouncer.record(store.clone(), t0);
    debouncer.record(manifest(Change), t0);
    debouncer.record(same_path_other_source.clone(), t0);
    debouncer.record(logic.clone(), t0);
    debouncer.record(store.clone(), t0 + Duration::from_millis(5));

    assert_eq!(
        debouncer.take_ready(t0 + WINDOW + Duration::from_millis(5)),
        vec![store, manifest(Change), same_path_other_source, logic]
    );
}

#[test]
fn unnormalized_paths_share_a_slot() {
    let t0 = Instant::now();
    let mut debouncer = RawDebouncer::new(WINDOW);

    debouncer.record(ev(SourceKind::Stores, Add, "/p/stores/./Cart.js"), t0);
    debouncer.record(ev(SourceKind::Stores, Change, "/p/stores/x/../Cart.js"), t0);

    assert_eq!(
        debouncer.drain(),
        vec![ev(SourceKind::Stores, Add, "/p/stores/Cart.js")]
    );
}
