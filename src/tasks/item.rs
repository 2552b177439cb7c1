//! Task identity, status, and display types.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::catalog::{Asset, GroupEntry};

/// Characters removed from titles before they become path components.
const FORBIDDEN_PATH_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Composite task identity: asset title plus episode position.
///
/// Rendered as `"{asset title}_{index}"`, which is also the key used in the
/// task snapshot file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskKey {
    asset_title: String,
    group_index: usize,
}

impl TaskKey {
    /// Creates a key from an asset title and a zero-based episode index.
    pub fn new(asset_title: impl Into<String>, group_index: usize) -> Self {
        Self {
            asset_title: asset_title.into(),
            group_index,
        }
    }

    /// Asset title part of the key.
    #[must_use]
    pub fn asset_title(&self) -> &str {
        &self.asset_title
    }

    /// Zero-based episode index part of the key.
    #[must_use]
    pub fn group_index(&self) -> usize {
        self.group_index
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.asset_title, self.group_index)
    }
}

impl std::str::FromStr for TaskKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (title, index) = s
            .rsplit_once('_')
            .ok_or_else(|| format!("invalid task id: {s}"))?;
        let index = index
            .parse()
            .map_err(|_| format!("invalid task id: {s}"))?;
        Ok(Self::new(title, index))
    }
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Created, no attempt started yet.
    Pending,
    /// An attempt is running.
    Downloading,
    /// An attempt failed and the next one is scheduled.
    WaitingRetry {
        /// Attempts that have failed so far.
        failed: u32,
        /// Maximum number of attempts.
        max: u32,
    },
    /// The artifact exists.
    Completed,
    /// Every attempt failed.
    Failed,
}

impl TaskStatus {
    /// Returns the label shown in status tables and stored in snapshots.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Pending => "pending".to_string(),
            Self::Downloading => "downloading".to_string(),
            Self::WaitingRetry { failed, max } => format!("waiting-retry({failed}/{max})"),
            Self::Completed => "completed".to_string(),
            Self::Failed => "failed".to_string(),
        }
    }

    /// True for `completed` and `failed`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "downloading" => Ok(Self::Downloading),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => {
                let counts = s
                    .strip_prefix("waiting-retry(")
                    .and_then(|rest| rest.strip_suffix(')'))
                    .and_then(|inner| inner.split_once('/'))
                    .ok_or_else(|| format!("invalid task status: {s}"))?;
                let failed = counts
                    .0
                    .parse()
                    .map_err(|_| format!("invalid task status: {s}"))?;
                let max = counts
                    .1
                    .parse()
                    .map_err(|_| format!("invalid task status: {s}"))?;
                Ok(Self::WaitingRetry { failed, max })
            }
        }
    }
}

/// Registry-owned state of one download.
#[derive(Debug, Clone)]
pub(crate) struct Task {
    pub(crate) key: TaskKey,
    pub(crate) asset: Asset,
    pub(crate) group: GroupEntry,
    pub(crate) save_dir: PathBuf,
    pub(crate) save_path: PathBuf,
    pub(crate) status: TaskStatus,
    pub(crate) progress: f64,
    pub(crate) throughput: String,
    pub(crate) created_at: NaiveDateTime,
    pub(crate) last_error: Option<String>,
    /// Restored with a terminal label and a worker spawned, no attempt yet.
    pub(crate) relaunched: bool,
}

impl Task {
    /// Terminal and not waiting on a relaunched worker.
    pub(crate) fn is_finished(&self) -> bool {
        self.status.is_terminal() && !self.relaunched
    }

    pub(crate) fn view(&self) -> TaskView {
        let progress = match self.status {
            TaskStatus::Completed => 100.0,
            TaskStatus::Pending | TaskStatus::Failed => 0.0,
            TaskStatus::Downloading | TaskStatus::WaitingRetry { .. } => self.progress,
        };
        TaskView {
            key: self.key.clone(),
            asset_title: self.asset.title.clone(),
            group_title: self.group.title.clone(),
            save_path: self.save_path.clone(),
            status: self.status,
            progress,
            throughput: self.throughput.clone(),
            created_at: self.created_at,
            last_error: self.last_error.clone(),
        }
    }
}

/// Read-only copy of a task for display.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskView {
    /// Task identity.
    pub key: TaskKey,
    /// Asset title.
    pub asset_title: String,
    /// Episode title.
    pub group_title: String,
    /// Artifact path.
    pub save_path: PathBuf,
    /// Current status.
    pub status: TaskStatus,
    /// Display progress: 100 when completed, 0 when pending or failed.
    pub progress: f64,
    /// Formatted current throughput.
    pub throughput: String,
    /// Creation time.
    pub created_at: NaiveDateTime,
    /// Message of the most recent failure.
    pub last_error: Option<String>,
}

/// Removes `<>:"/\|?*` from a title.
#[must_use]
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| !FORBIDDEN_PATH_CHARS.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Returns `save_dir/<sanitized asset title>/<sanitized episode title>.mp4`.
#[must_use]
pub fn artifact_path(save_dir: &Path, asset_title: &str, group_title: &str) -> PathBuf {
    save_dir
        .join(sanitize_title(asset_title))
        .join(format!("{}.mp4", sanitize_title(group_title)))
}

/// True if `path` is an existing file with non-zero size.
pub(crate) fn artifact_exists(path: &Path) -> bool {
    std::fs::metadata(path).is_ok_and(|meta| meta.is_file() && meta.len() > 0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_task_key_round_trips_through_display() {
        let key = TaskKey::new("My_Show", 4);
        assert_eq!(key.to_string(), "My_Show_4");
        let parsed: TaskKey = "My_Show_4".parse().unwrap();
        assert_eq!(parsed, key);
        assert!("no-index".parse::<TaskKey>().is_err());
        assert!("Show_x".parse::<TaskKey>().is_err());
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(TaskStatus::Pending.label(), "pending");
        assert_eq!(
            TaskStatus::WaitingRetry { failed: 1, max: 3 }.label(),
            "waiting-retry(1/3)"
        );
        assert_eq!(
            "waiting-retry(2/3)".parse::<TaskStatus>().unwrap(),
            TaskStatus::WaitingRetry { failed: 2, max: 3 }
        );
        assert_eq!("failed".parse::<TaskStatus>().unwrap(), TaskStatus::Failed);
        assert!("retrying".parse::<TaskStatus>().is_err());
        assert!("waiting-retry(a/3)".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Downloading.is_terminal());
        assert!(!TaskStatus::WaitingRetry { failed: 1, max: 3 }.is_terminal());
    }

    #[test]
    fn test_sanitize_title_strips_forbidden_characters() {
        assert_eq!(sanitize_title(r#"A<B>C:D"E/F\G|H?I*J"#), "ABCDEFGHIJ");
        assert_eq!(sanitize_title(" 第01集 "), "第01集");
    }

    #[test]
    fn test_artifact_path_layout() {
        let path = artifact_path(Path::new("/data"), "Who? Me", "Ep 1/2");
        assert_eq!(path, PathBuf::from("/data/Who Me/Ep 12.mp4"));
    }

    #[test]
    fn test_view_progress_rules() {
        let mut task = Task {
            key: TaskKey::new("Show", 0),
            asset: Asset::new("Show", "https://x/1.html"),
            group: GroupEntry::new("Ep 1", "https://x/play/1.html"),
            save_dir: PathBuf::from("/data"),
            save_path: PathBuf::from("/data/Show/Ep 1.mp4"),
            status: TaskStatus::Downloading,
            progress: 42.5,
            throughput: "1.00 MB/s".to_string(),
            created_at: chrono::Local::now().naive_local(),
            last_error: None,
            relaunched: false,
        };
        assert!((task.view().progress - 42.5).abs() < f64::EPSILON);
        task.status = TaskStatus::Failed;
        assert!(task.view().progress.abs() < f64::EPSILON);
        task.status = TaskStatus::Completed;
        assert!((task.view().progress - 100.0).abs() < f64::EPSILON);
    }
}
