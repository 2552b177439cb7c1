//! Shared utilities for critical tests (hand-built task snapshots).

use std::path::{Path, PathBuf};

use serde_json::Value;

/// One snapshot entry for show `Show` saved under `dir`.
pub fn snapshot_entry(dir: &Path, episode: &str, status: &str, progress: f64) -> Value {
    serde_json::json!({
        "video_title": "Show",
        "video_url": "https://vod.example/jpvod/1.html",
        "episode_title": episode,
        "episode_url": format!("https://vod.example/jpplay/{episode}.html"),
        "save_dir": dir,
        "save_path": dir.join("Show").join(format!("{episode}.mp4")),
        "status": status,
        "progress": progress,
        "created_at": "2026-03-01T10:20:30.000000"
    })
}

/// Writes `value` as `tasks.json` under `dir` and returns its path.
pub fn write_snapshot(dir: &Path, value: &Value) -> PathBuf {
    let path = dir.join("tasks.json");
    std::fs::write(&path, serde_json::to_string_pretty(value).expect("serialize"))
        .expect("write snapshot");
    path
}
