// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn snapshot(name: &str, state: &str) -> ServiceSnapshot {
    ServiceSnapshot {
        service_name: name.to_string(),
        state: state.to_string(),
        procedure_id: Some(1),
        saved_at: Utc::now(),
    }
}

#[test]
fn save_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshots.json");

    let store = SnapshotStore::open(&path).unwrap();
    store.save(snapshot("Mix", "EXECUTE")).unwrap();
    store.save(snapshot("Heat", "IDLE")).unwrap();

    // Fresh open reads what was written
    let reopened = SnapshotStore::open(&path).unwrap();
    let all = reopened.all();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].service_name, "Heat");
    assert_eq!(all[1].service_name, "Mix");
    assert_eq!(reopened.get("Mix").unwrap().state, "EXECUTE");
}

#[test]
fn save_upserts_by_name() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::open(dir.path().join("s.json")).unwrap();

    store.save(snapshot("Mix", "STARTING")).unwrap();
    store.save(snapshot("Mix", "EXECUTE")).unwrap();

    let all = store.all();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].state, "EXECUTE");
}

#[test]
fn delete_removes_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("s.json");
    let store = SnapshotStore::open(&path).unwrap();

    store.save(snapshot("Mix", "EXECUTE")).unwrap();
    store.delete("Mix").unwrap();
    assert!(store.get("Mix").is_none());

    // Deleting a missing snapshot is a no-op
    store.delete("Ghost").unwrap();

    let reopened = SnapshotStore::open(&path).unwrap();
    assert!(reopened.all().is_empty());
}

#[test]
fn open_missing_file_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::open(dir.path().join("nope.json")).unwrap();
    assert!(store.all().is_empty());
}

#[test]
fn timestamps_survive_utc() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("s.json");
    let store = SnapshotStore::open(&path).unwrap();

    let snap = snapshot("Mix", "HELD");
    let saved_at = snap.saved_at;
    store.save(snap).unwrap();

    let reopened = SnapshotStore::open(&path).unwrap();
    assert_eq!(reopened.get("Mix").unwrap().saved_at, saved_at);
}
