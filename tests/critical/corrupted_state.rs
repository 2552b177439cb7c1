//! Phase 1 (P0): damaged task snapshots.

use tempfile::TempDir;
use vodgrab_core::tasks::TaskStore;

use crate::support::critical_utils::{snapshot_entry, write_snapshot};

#[test]
fn p0_non_object_snapshot_is_discarded() {
    let temp = TempDir::new().expect("temp dir");
    let path = write_snapshot(temp.path(), &serde_json::json!(["not", "an", "object"]));

    let records = TaskStore::new(&path).load().expect("load");

    assert!(records.is_empty());
    assert!(!path.exists(), "unusable snapshot should be removed");
}

#[test]
fn p0_empty_snapshot_is_discarded() {
    let temp = TempDir::new().expect("temp dir");
    let path = temp.path().join("tasks.json");
    std::fs::write(&path, "").expect("write");

    assert!(TaskStore::new(&path).load().expect("load").is_empty());
    assert!(!path.exists());
}

#[test]
fn p0_entries_missing_fields_are_skipped_individually() {
    let temp = TempDir::new().expect("temp dir");
    let good = snapshot_entry(temp.path(), "Episode 01", "downloading", 30.0);
    let mut broken = snapshot_entry(temp.path(), "Episode 02", "pending", 0.0);
    broken
        .as_object_mut()
        .expect("object")
        .remove("episode_url");
    let path = write_snapshot(
        temp.path(),
        &serde_json::json!({ "Show_0": good, "Show_1": broken }),
    );

    let records = TaskStore::new(&path).load().expect("load");

    assert_eq!(records.len(), 1);
    assert!(records.contains_key("Show_0"));
}

#[test]
fn p0_missing_created_at_defaults_to_now() {
    let temp = TempDir::new().expect("temp dir");
    let mut entry = snapshot_entry(temp.path(), "Episode 01", "pending", 0.0);
    entry.as_object_mut().expect("object").remove("created_at");
    let path = write_snapshot(temp.path(), &serde_json::json!({ "Show_0": entry }));

    let before = chrono::Local::now().naive_local() - chrono::Duration::seconds(5);
    let records = TaskStore::new(&path).load().expect("load");

    assert!(records["Show_0"].created_at >= before);
}

#[test]
fn p0_entry_with_existing_artifact_is_dropped() {
    let temp = TempDir::new().expect("temp dir");
    let entry = snapshot_entry(temp.path(), "Episode 01", "downloading", 90.0);
    let artifact = temp.path().join("Show").join("Episode 01.mp4");
    std::fs::create_dir_all(artifact.parent().expect("parent")).expect("mkdir");
    std::fs::write(&artifact, b"finished").expect("write artifact");
    let path = write_snapshot(temp.path(), &serde_json::json!({ "Show_0": entry }));

    assert!(TaskStore::new(&path).load().expect("load").is_empty());
}
