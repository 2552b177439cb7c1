//! Task tables and the live per-task progress view.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use vodgrab_core::download::{format_rate, parse_rate};
use vodgrab_core::tasks::{DownloadManager, TaskKey, TaskRecord, TaskStatus, TaskView};

const REFRESH_INTERVAL: Duration = Duration::from_millis(250);
const BAR_LENGTH: u64 = 1000;

/// One printable row of a task table.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StatusRow {
    pub id: String,
    pub episode: String,
    pub status: String,
    /// Parsed status; `None` for a stored label that no longer parses.
    pub state: Option<TaskStatus>,
    pub progress: f64,
    pub throughput: String,
    pub created: String,
}

impl From<&TaskView> for StatusRow {
    fn from(view: &TaskView) -> Self {
        Self {
            id: view.key.to_string(),
            episode: view.group_title.clone(),
            status: view.status.label(),
            state: Some(view.status),
            progress: view.progress,
            throughput: if view.status == TaskStatus::Downloading {
                view.throughput.clone()
            } else {
                "-".to_string()
            },
            created: view.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

impl StatusRow {
    /// Row for a persisted snapshot entry, with the same progress rules as live tasks.
    pub(crate) fn from_record(id: &str, record: &TaskRecord) -> Self {
        let state = record.status.parse::<TaskStatus>().ok();
        let progress = match state {
            Some(TaskStatus::Completed) => 100.0,
            Some(TaskStatus::Downloading | TaskStatus::WaitingRetry { .. }) => {
                record.progress.clamp(0.0, 100.0)
            }
            Some(TaskStatus::Pending | TaskStatus::Failed) | None => 0.0,
        };
        Self {
            id: id.to_string(),
            episode: record.episode_title.clone(),
            status: record.status.clone(),
            state,
            progress,
            throughput: "-".to_string(),
            created: record.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// Renders rows as a fixed-width table followed by a summary line.
pub(crate) fn render_table(rows: &[StatusRow]) -> String {
    let id_width = rows
        .iter()
        .map(|row| row.id.chars().count())
        .max()
        .unwrap_or(0)
        .max("TASK".len());
    let status_width = rows
        .iter()
        .map(|row| row.status.len())
        .max()
        .unwrap_or(0)
        .max("STATUS".len());

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<id_width$}  {:<status_width$}  {:>8}  {:>12}  {:<19}  EPISODE",
        "TASK", "STATUS", "PROGRESS", "SPEED", "CREATED"
    );
    for row in rows {
        let _ = writeln!(
            out,
            "{:<id_width$}  {:<status_width$}  {:>7.1}%  {:>12}  {:<19}  {}",
            row.id, row.status, row.progress, row.throughput, row.created, row.episode
        );
    }

    let is_downloading = |row: &&StatusRow| row.state == Some(TaskStatus::Downloading);
    let downloading = rows.iter().filter(is_downloading).count();
    let total_rate: f64 = rows
        .iter()
        .filter(is_downloading)
        .filter_map(|row| parse_rate(&row.throughput))
        .sum();
    let _ = writeln!(
        out,
        "{} task(s), {} downloading, total speed {}",
        rows.len(),
        downloading,
        format_rate(total_rate)
    );
    out
}

/// Spawns the live progress view when requested.
/// Returns (handle, stop) so the caller can signal stop and await the handle.
/// When `enabled` is false, returns (None, stop) with stop already true.
pub(crate) fn spawn_live_view(
    enabled: bool,
    manager: DownloadManager,
) -> (Option<tokio::task::JoinHandle<()>>, Arc<AtomicBool>) {
    if !enabled {
        return (None, Arc::new(AtomicBool::new(true)));
    }
    let stop = Arc::new(AtomicBool::new(false));
    let handle = spawn_live_view_inner(manager, Arc::clone(&stop));
    (Some(handle), stop)
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix:32!} [{bar:30}] {percent:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

fn spawn_live_view_inner(
    manager: DownloadManager,
    stop: Arc<AtomicBool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let multi = MultiProgress::new();
        let mut bars: HashMap<TaskKey, ProgressBar> = HashMap::new();
        let mut changes = manager.subscribe();

        while !stop.load(Ordering::SeqCst) {
            for view in manager.status() {
                let bar = bars.entry(view.key.clone()).or_insert_with(|| {
                    let bar = multi.add(ProgressBar::new(BAR_LENGTH));
                    bar.set_style(bar_style());
                    bar.set_prefix(format!("{} {}", view.asset_title, view.group_title));
                    bar
                });
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let position = (view.progress * 10.0).round() as u64;
                bar.set_position(position.min(BAR_LENGTH));
                let message = match view.status {
                    TaskStatus::Downloading => format!("{} {}", view.status, view.throughput),
                    TaskStatus::Failed => match &view.last_error {
                        Some(error) => format!("failed: {error}"),
                        None => "failed".to_string(),
                    },
                    _ => view.status.label(),
                };
                bar.set_message(message);
            }
            // Wake on the next change or after one refresh interval.
            let _ = tokio::time::timeout(REFRESH_INTERVAL, changes.changed()).await;
        }

        for bar in bars.values() {
            bar.finish();
        }
        let _ = multi.clear();
    })
}
