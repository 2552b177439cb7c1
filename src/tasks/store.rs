//! Durable JSON snapshot of unfinished tasks.
//!
//! The snapshot is a single JSON object keyed by task id. Only tasks that are
//! not `completed` are written; a completed task is evidenced by its artifact.
//! Writes go to a sibling temporary file that is then renamed over the
//! snapshot, so a crash mid-write never leaves a truncated document.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use super::item::artifact_exists;

/// Default snapshot file name, relative to the working directory.
pub const DEFAULT_STATE_FILE: &str = "download_tasks.json";

const REQUIRED_FIELDS: &[&str] = &[
    "video_title",
    "video_url",
    "episode_title",
    "episode_url",
    "save_dir",
    "save_path",
    "status",
    "progress",
];

/// Snapshot read or write failure. Never fatal to in-memory task state.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Filesystem failure on the snapshot or its temporary file.
    #[error("IO error on task snapshot {path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// The snapshot could not be serialized.
    #[error("failed to serialize task snapshot: {source}")]
    Serialize {
        /// The underlying serde error.
        #[source]
        source: serde_json::Error,
    },
}

impl PersistenceError {
    fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// One persisted task entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Asset title.
    pub video_title: String,
    /// Asset detail page URL.
    pub video_url: String,
    /// Episode title.
    pub episode_title: String,
    /// Episode play page URL; identifies the episode on restore.
    pub episode_url: String,
    /// Base output directory.
    pub save_dir: PathBuf,
    /// Artifact path.
    pub save_path: PathBuf,
    /// Status label, restored verbatim.
    pub status: String,
    /// Last recorded progress, `0.0..=100.0`.
    pub progress: f64,
    /// Creation time (ISO-8601, local time).
    #[serde(with = "iso_local")]
    pub created_at: NaiveDateTime,
}

/// Reads and writes the task snapshot file.
#[derive(Debug, Clone)]
pub struct TaskStore {
    path: PathBuf,
}

impl TaskStore {
    /// Creates a store backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Snapshot file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }

    /// Writes every non-`completed` record, or removes the file when none
    /// remain.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] if serialization or any file operation
    /// fails. The previous snapshot is left intact in that case.
    #[instrument(skip_all, fields(path = %self.path.display()))]
    pub fn save(
        &self,
        records: impl IntoIterator<Item = (String, TaskRecord)>,
    ) -> Result<(), PersistenceError> {
        let records: BTreeMap<String, TaskRecord> = records
            .into_iter()
            .filter(|(_, record)| record.status != "completed")
            .collect();

        if records.is_empty() {
            match std::fs::remove_file(&self.path) {
                Ok(()) => debug!("no unfinished tasks, removed snapshot"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(PersistenceError::io(&self.path, e)),
            }
            return Ok(());
        }

        let body = serde_json::to_string_pretty(&records)
            .map_err(|source| PersistenceError::Serialize { source })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| PersistenceError::io(parent, e))?;
        }
        let temp = self.temp_path();
        std::fs::write(&temp, body).map_err(|e| PersistenceError::io(&temp, e))?;
        std::fs::rename(&temp, &self.path).map_err(|e| PersistenceError::io(&self.path, e))?;

        debug!(tasks = records.len(), "saved task snapshot");
        Ok(())
    }

    /// Loads the records worth resuming.
    ///
    /// A missing file yields nothing. An empty or unparseable file is deleted.
    /// Entries missing a required field are skipped with a warning
    /// (`created_at` alone defaults to now). Entries whose artifact already
    /// exists with non-zero size are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Io`] only when the file exists but cannot
    /// be read.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn load(&self) -> Result<BTreeMap<String, TaskRecord>, PersistenceError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(PersistenceError::io(&self.path, e)),
        };

        if raw.trim().is_empty() {
            info!("task snapshot is empty, removing it");
            self.discard();
            return Ok(BTreeMap::new());
        }

        let entries = match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(entries)) => entries,
            Ok(_) => {
                warn!("task snapshot is not a JSON object, removing it");
                self.discard();
                return Ok(BTreeMap::new());
            }
            Err(e) => {
                warn!(error = %e, "task snapshot is corrupt, removing it");
                self.discard();
                return Ok(BTreeMap::new());
            }
        };

        let mut records = BTreeMap::new();
        for (id, value) in entries {
            let Value::Object(mut fields) = value else {
                warn!(task = %id, "skipping malformed task entry");
                continue;
            };
            if let Some(missing) = REQUIRED_FIELDS.iter().find(|f| !fields.contains_key(**f)) {
                warn!(task = %id, field = missing, "skipping task entry with missing field");
                continue;
            }
            fields
                .entry("created_at")
                .or_insert_with(|| Value::String(iso_local::now()));

            let record = match serde_json::from_value::<TaskRecord>(Value::Object(fields)) {
                Ok(record) => record,
                Err(e) => {
                    warn!(task = %id, error = %e, "skipping invalid task entry");
                    continue;
                }
            };
            if artifact_exists(&record.save_path) {
                debug!(task = %id, "artifact already exists, dropping task entry");
                continue;
            }
            records.insert(id, record);
        }

        debug!(tasks = records.len(), "loaded task snapshot");
        Ok(records)
    }

    fn discard(&self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(error = %e, "failed to remove task snapshot");
        }
    }
}

/// Local timestamps as `YYYY-MM-DDTHH:MM:SS.ffffff`; RFC 3339 input with an
/// offset is accepted and converted to local time.
mod iso_local {
    use chrono::{DateTime, Local, NaiveDateTime};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

    pub(super) fn now() -> String {
        Local::now().naive_local().format(FORMAT).to_string()
    }

    pub(super) fn serialize<S: Serializer>(
        value: &NaiveDateTime,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.format(FORMAT).to_string())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
    }

    pub(super) fn parse(raw: &str) -> Option<NaiveDateTime> {
        raw.parse::<NaiveDateTime>().ok().or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.with_timezone(&Local).naive_local())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn record(dir: &Path, episode: &str, status: &str) -> TaskRecord {
        TaskRecord {
            video_title: "Show".to_string(),
            video_url: "https://vod.example/jpvod/1.html".to_string(),
            episode_title: episode.to_string(),
            episode_url: format!("https://vod.example/jpplay/{episode}.html"),
            save_dir: dir.to_path_buf(),
            save_path: dir.join("Show").join(format!("{episode}.mp4")),
            status: status.to_string(),
            progress: 12.5,
            created_at: "2024-05-01T12:00:00.000000".parse().unwrap(),
        }
    }

    #[test]
    fn test_save_skips_completed_and_load_round_trips() {
        let temp = TempDir::new().unwrap();
        let store = TaskStore::new(temp.path().join("tasks.json"));
        let pending = record(temp.path(), "ep1", "waiting-retry(1/3)");
        let done = record(temp.path(), "ep2", "completed");

        store
            .save([
                ("Show_0".to_string(), pending.clone()),
                ("Show_1".to_string(), done),
            ])
            .unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded["Show_0"], pending);
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn test_save_with_nothing_left_removes_file() {
        let temp = TempDir::new().unwrap();
        let store = TaskStore::new(temp.path().join("tasks.json"));
        store
            .save([("Show_0".to_string(), record(temp.path(), "ep1", "failed"))])
            .unwrap();
        assert!(store.path().exists());

        store
            .save([("Show_0".to_string(), record(temp.path(), "ep1", "completed"))])
            .unwrap();
        assert!(!store.path().exists());
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let temp = TempDir::new().unwrap();
        let store = TaskStore::new(temp.path().join("absent.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_empty_and_corrupt_files_are_deleted() {
        let temp = TempDir::new().unwrap();
        for body in ["", "   \n", "{not json", "[1, 2]"] {
            let path = temp.path().join("tasks.json");
            std::fs::write(&path, body).unwrap();
            let store = TaskStore::new(&path);
            assert!(store.load().unwrap().is_empty(), "body {body:?}");
            assert!(!path.exists(), "file should be removed for {body:?}");
        }
    }

    #[test]
    fn test_entries_missing_fields_are_skipped() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tasks.json");
        let mut good = serde_json::to_value(record(temp.path(), "ep1", "pending")).unwrap();
        good.as_object_mut().unwrap().remove("created_at");
        let doc = serde_json::json!({
            "Show_0": good,
            "Show_1": { "video_title": "Show", "status": "pending" },
            "Show_2": "nonsense",
        });
        std::fs::write(&path, doc.to_string()).unwrap();

        let loaded = TaskStore::new(&path).load().unwrap();
        assert_eq!(loaded.keys().collect::<Vec<_>>(), vec!["Show_0"]);
    }

    #[test]
    fn test_entries_with_existing_artifact_are_dropped() {
        let temp = TempDir::new().unwrap();
        let store = TaskStore::new(temp.path().join("tasks.json"));
        let finished = record(temp.path(), "ep1", "downloading");
        std::fs::create_dir_all(finished.save_path.parent().unwrap()).unwrap();
        std::fs::write(&finished.save_path, b"movie").unwrap();
        let unfinished = record(temp.path(), "ep2", "downloading");

        store
            .save([
                ("Show_0".to_string(), finished),
                ("Show_1".to_string(), unfinished),
            ])
            .unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.keys().collect::<Vec<_>>(), vec!["Show_1"]);
    }

    #[test]
    fn test_timestamp_formats() {
        assert!(iso_local::parse("2024-05-01T12:00:00.123456").is_some());
        assert!(iso_local::parse("2024-05-01T12:00:00").is_some());
        assert!(iso_local::parse("2024-05-01T12:00:00+08:00").is_some());
        assert!(iso_local::parse("yesterday").is_none());
    }
}
