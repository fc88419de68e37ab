// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! BagManager tests: idempotent loading, topic set algebra, selection,
//! and the one-notification-per-mutation contract.

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use bagsift::{BagEvent, BagManager};
use common::*;

fn event_log(manager: &mut BagManager) -> Rc<RefCell<Vec<BagEvent>>> {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = events.clone();
    manager.subscribe(move |event| sink.borrow_mut().push(event.clone()));
    events
}

#[test]
fn test_load_registers_and_notifies_once() {
    let (path, _guard) = temp_path("mgr_load.bag");
    write_bag(
        &path,
        &[("/a", "t/A"), ("/b", "t/B")],
        &[("/a", 1, b"x".to_vec()), ("/b", 2, b"y".to_vec())],
    );

    let mut manager = BagManager::new();
    let events = event_log(&mut manager);

    let bag = manager.load(&path).unwrap();
    assert_eq!(bag.index.record_count, 2);
    assert!(bag.selected);

    assert_eq!(manager.len(), 1);
    assert_eq!(*events.borrow(), vec![BagEvent::Loaded(path.clone())]);
}

#[test]
fn test_duplicate_load_is_idempotent() {
    let (path, _guard) = temp_path("mgr_dup.bag");
    write_bag(&path, &[("/a", "t/A")], &[("/a", 1, b"x".to_vec())]);

    let mut manager = BagManager::new();
    let events = event_log(&mut manager);

    manager.load(&path).unwrap();
    let again = manager.load(&path).unwrap();

    assert_eq!(again.index.record_count, 1);
    assert_eq!(manager.len(), 1);
    // The second load neither reopened nor notified.
    assert_eq!(events.borrow().len(), 1);
}

#[test]
fn test_load_failure_propagates_synchronously() {
    let mut manager = BagManager::new();
    let events = event_log(&mut manager);

    let err = manager.load("/nonexistent/mgr.bag").unwrap_err();
    assert_eq!(err.kind(), "open");
    assert!(manager.is_empty());
    assert!(events.borrow().is_empty());
}

#[test]
fn test_unload_and_unknown_unload() {
    let (path, _guard) = temp_path("mgr_unload.bag");
    write_bag(&path, &[("/a", "t/A")], &[("/a", 1, b"x".to_vec())]);

    let mut manager = BagManager::new();
    let events = event_log(&mut manager);

    manager.load(&path).unwrap();
    manager.unload(&path);
    assert!(manager.is_empty());

    // Unloading an unknown path is a no-op with no notification.
    manager.unload(&path);
    assert_eq!(
        *events.borrow(),
        vec![
            BagEvent::Loaded(path.clone()),
            BagEvent::Unloaded(path.clone())
        ]
    );
}

#[test]
fn test_common_topics_cardinalities() {
    let (a, guard) = temp_path("mgr_common_a.bag");
    let b = guard.join("mgr_common_b.bag");
    let c = guard.join("mgr_common_c.bag");
    write_bag(
        &a,
        &[("/shared", "t/S"), ("/only_a", "t/A")],
        &[("/shared", 1, b"x".to_vec()), ("/only_a", 2, b"y".to_vec())],
    );
    write_bag(
        &b,
        &[("/shared", "t/S"), ("/only_b", "t/B")],
        &[("/shared", 3, b"x".to_vec()), ("/only_b", 4, b"y".to_vec())],
    );
    write_bag(&c, &[("/disjoint", "t/C")], &[("/disjoint", 5, b"z".to_vec())]);

    let mut manager = BagManager::new();

    // Zero loaded bags: empty set, not an error and not "all".
    assert!(manager.common_topics().is_empty());

    // One bag: its own channel set.
    manager.load(&a).unwrap();
    assert_eq!(
        manager.common_topics().into_iter().collect::<Vec<_>>(),
        vec!["/only_a".to_string(), "/shared".to_string()]
    );

    // Two overlapping bags: the intersection.
    manager.load(&b).unwrap();
    assert_eq!(
        manager.common_topics().into_iter().collect::<Vec<_>>(),
        vec!["/shared".to_string()]
    );

    // Adding a disjoint bag empties the intersection.
    manager.load(&c).unwrap();
    assert!(manager.common_topics().is_empty());
}

#[test]
fn test_common_topics_honors_selection() {
    let (a, guard) = temp_path("mgr_sel_a.bag");
    let b = guard.join("mgr_sel_b.bag");
    write_bag(
        &a,
        &[("/shared", "t/S"), ("/only_a", "t/A")],
        &[("/shared", 1, b"x".to_vec()), ("/only_a", 2, b"y".to_vec())],
    );
    write_bag(&b, &[("/shared", "t/S")], &[("/shared", 3, b"x".to_vec())]);

    let mut manager = BagManager::new();
    manager.load(&a).unwrap();
    manager.load(&b).unwrap();
    assert_eq!(manager.common_topics().len(), 1);

    // Deselecting narrows the intersection to the remaining bag.
    assert!(manager.set_selected(&b, false));
    assert_eq!(manager.common_topics().len(), 2);

    // With zero selected bags the intersection is empty.
    assert!(manager.set_selected(&a, false));
    assert!(manager.common_topics().is_empty());

    // union_topics still sees every loaded bag.
    assert_eq!(manager.union_topics().len(), 2);
}

#[test]
fn test_selection_events_fire_only_on_change() {
    let (path, _guard) = temp_path("mgr_sel_events.bag");
    write_bag(&path, &[("/a", "t/A")], &[("/a", 1, b"x".to_vec())]);

    let mut manager = BagManager::new();
    manager.load(&path).unwrap();
    let events = event_log(&mut manager);

    // Bags load selected; re-selecting changes nothing.
    assert!(!manager.set_selected(&path, true));
    assert!(events.borrow().is_empty());

    assert!(manager.set_selected(&path, false));
    assert_eq!(
        *events.borrow(),
        vec![BagEvent::SelectionChanged(path.clone(), false)]
    );
}

#[test]
fn test_union_topics_counts_containing_bags() {
    let (a, guard) = temp_path("mgr_union_a.bag");
    let b = guard.join("mgr_union_b.bag");
    write_bag(
        &a,
        &[("/shared", "t/S"), ("/only_a", "t/A")],
        &[("/shared", 1, b"x".to_vec()), ("/only_a", 2, b"y".to_vec())],
    );
    write_bag(&b, &[("/shared", "t/S")], &[("/shared", 3, b"x".to_vec())]);

    let mut manager = BagManager::new();
    manager.load(&a).unwrap();
    manager.load(&b).unwrap();

    let union = manager.union_topics();
    assert_eq!(union.get("/shared"), Some(&2));
    assert_eq!(union.get("/only_a"), Some(&1));
    assert_eq!(union.len(), 2);
}

#[test]
fn test_clear_notifies_once() {
    let (a, guard) = temp_path("mgr_clear_a.bag");
    let b = guard.join("mgr_clear_b.bag");
    write_bag(&a, &[("/a", "t/A")], &[("/a", 1, b"x".to_vec())]);
    write_bag(&b, &[("/b", "t/B")], &[("/b", 2, b"y".to_vec())]);

    let mut manager = BagManager::new();
    manager.load(&a).unwrap();
    manager.load(&b).unwrap();
    let events = event_log(&mut manager);

    manager.clear();
    assert!(manager.is_empty());
    assert_eq!(*events.borrow(), vec![BagEvent::Cleared]);

    // Clearing an empty manager mutates nothing.
    manager.clear();
    assert_eq!(events.borrow().len(), 1);
}

#[test]
fn test_snapshot_is_immutable_copy() {
    let (path, _guard) = temp_path("mgr_snapshot.bag");
    write_bag(&path, &[("/a", "t/A")], &[("/a", 1, b"x".to_vec())]);

    let mut manager = BagManager::new();
    manager.load(&path).unwrap();

    let snapshot = manager.snapshot(&path).unwrap();
    manager.unload(&path);

    // The snapshot outlives the loaded entry it was taken from.
    assert_eq!(snapshot.record_count, 1);
    assert!(snapshot.has_channel("/a"));
    assert!(manager.snapshot(&path).is_none());
}
