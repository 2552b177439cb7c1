//! Bounded-concurrency segment pool with crash-safe resume.
//!
//! The [`SegmentDownloader`] fetches exactly the segments that are not yet
//! recorded in the task's [`ProgressLog`], using a semaphore-based concurrency
//! limit. Every worker writes its segment to an indexed temporary file and
//! only then appends the index to the log (write-then-record), so an
//! interruption mid-write never marks a segment as done.
//!
//! # Failure isolation
//!
//! A failed, short, or empty segment deletes its partial file and is reported
//! for that index only. Siblings keep running; the task learns about the gap
//! when the pool drains and the on-disk check finds a missing index.
//!
//! # Cancellation
//!
//! The cancellation token is checked before each segment starts and before
//! each chunk is written. Cancelled workers return without recording
//! progress; already-recorded segments stay valid for the next resume.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::client::{HttpClient, StreamOutcome};
use super::constants::MAX_SEGMENT_WORKERS;
use super::error::{DownloadError, SegmentFetchError};
use super::progress::ProgressLog;
use super::throughput::ThroughputMonitor;
use crate::manifest::Segment;

/// Observer invoked after every completed segment.
///
/// Purely informational: nothing the callback does affects correctness.
pub type ProgressCallback = Arc<dyn Fn(SegmentSnapshot) + Send + Sync>;

/// Point-in-time view of a running segment pool.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentSnapshot {
    /// Segments present on disk (resumed plus fetched in this run).
    pub completed: usize,
    /// Segments in the playlist.
    pub total: usize,
    /// Formatted current throughput.
    pub throughput: String,
}

impl SegmentSnapshot {
    /// Completion percentage in `0.0..=100.0`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64 * 100.0
        }
    }
}

/// Outcome of one pool run.
#[derive(Debug, Default)]
pub struct SegmentReport {
    total: usize,
    resumed: usize,
    fetched: usize,
    failures: Vec<SegmentFetchError>,
    missing: Vec<usize>,
    cancelled: bool,
}

impl SegmentReport {
    /// Number of segments in the playlist.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Segments that were already recorded before this run.
    #[must_use]
    pub fn resumed(&self) -> usize {
        self.resumed
    }

    /// Segments fetched and recorded during this run.
    #[must_use]
    pub fn fetched(&self) -> usize {
        self.fetched
    }

    /// Per-segment failures of this run.
    #[must_use]
    pub fn failures(&self) -> &[SegmentFetchError] {
        &self.failures
    }

    /// Indices without a non-empty file on disk after the pool drained.
    #[must_use]
    pub fn missing(&self) -> &[usize] {
        &self.missing
    }

    /// Whether the run was cut short by cancellation.
    #[must_use]
    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }

    /// True iff every index `0..total` has a non-empty file on disk.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.total > 0 && !self.cancelled && self.missing.is_empty()
    }
}

enum SegmentResult {
    Done(usize),
    Failed(SegmentFetchError),
    Cancelled,
}

/// Concurrent fetcher for the segments of one playlist.
#[derive(Debug, Clone)]
pub struct SegmentDownloader {
    client: HttpClient,
    max_workers: usize,
}

impl SegmentDownloader {
    /// Creates a downloader; effective parallelism is
    /// `min(max_workers, 32)`, never below one.
    #[must_use]
    pub fn new(client: HttpClient, max_workers: usize) -> Self {
        Self {
            client,
            max_workers,
        }
    }

    /// Number of segment fetches that may run at the same time.
    #[must_use]
    pub fn effective_workers(&self) -> usize {
        self.max_workers.clamp(1, MAX_SEGMENT_WORKERS)
    }

    /// Loads the progress log and downloads every segment it does not list.
    #[instrument(skip_all, fields(dir = %log.dir().display(), total = segments.len()))]
    pub async fn download(
        &self,
        segments: &[Segment],
        log: &ProgressLog,
        cancel: &CancellationToken,
        on_progress: Option<ProgressCallback>,
    ) -> SegmentReport {
        let completed = log.load().await;
        if !completed.is_empty() {
            info!(resumed = completed.len(), "resuming from progress log");
        }
        self.download_missing(segments, &completed, log, cancel, on_progress)
            .await
    }

    /// Downloads exactly the segments whose index is not in `completed`.
    ///
    /// Never returns an error: per-segment failures are collected in the
    /// report and the final completeness check is done against the files on
    /// disk.
    pub async fn download_missing(
        &self,
        segments: &[Segment],
        completed: &BTreeSet<usize>,
        log: &ProgressLog,
        cancel: &CancellationToken,
        on_progress: Option<ProgressCallback>,
    ) -> SegmentReport {
        let total = segments.len();
        let completed: Arc<BTreeSet<usize>> = Arc::new(
            completed
                .iter()
                .copied()
                .filter(|index| *index < total)
                .collect(),
        );
        let pending: Vec<Segment> = segments
            .iter()
            .filter(|segment| !completed.contains(&segment.index))
            .cloned()
            .collect();

        let mut report = SegmentReport {
            total,
            resumed: completed.len(),
            ..SegmentReport::default()
        };

        debug!(
            total,
            resumed = report.resumed,
            pending = pending.len(),
            workers = self.effective_workers(),
            "starting segment pool"
        );

        let monitor = Arc::new(ThroughputMonitor::new());
        let done = Arc::new(AtomicUsize::new(report.resumed));
        if let Some(callback) = on_progress.as_ref().filter(|_| report.resumed > 0) {
            callback(SegmentSnapshot {
                completed: report.resumed,
                total,
                throughput: monitor.format(),
            });
        }
        let semaphore = Arc::new(Semaphore::new(self.effective_workers()));
        let log = Arc::new(log.clone());
        let mut workers = JoinSet::new();

        for segment in pending {
            // Acquire a permit (blocks at the concurrency limit) unless stopped
            let permit = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let client = self.client.clone();
            let log = Arc::clone(&log);
            let cancel = cancel.clone();
            let worker_monitor = Arc::clone(&monitor);
            let completed = Arc::clone(&completed);

            workers.spawn(async move {
                // Permit is dropped when this block exits (RAII)
                let _permit = permit;
                fetch_segment(&client, &segment, &log, &completed, &cancel, &worker_monitor).await
            });

            // Reap finished workers as we go so progress is reported promptly
            while let Some(joined) = workers.try_join_next() {
                handle_result(joined, &mut report, &done, &monitor, total, on_progress.as_ref());
            }
        }

        while let Some(joined) = workers.join_next().await {
            handle_result(joined, &mut report, &done, &monitor, total, on_progress.as_ref());
        }

        report.cancelled = cancel.is_cancelled();
        for index in 0..total {
            if !log.segment_is_present(index).await {
                report.missing.push(index);
            }
        }

        info!(
            total,
            resumed = report.resumed,
            fetched = report.fetched,
            failed = report.failures.len(),
            missing = report.missing.len(),
            cancelled = report.cancelled,
            "segment pool drained"
        );
        report
    }
}

fn handle_result(
    joined: Result<SegmentResult, tokio::task::JoinError>,
    report: &mut SegmentReport,
    done: &AtomicUsize,
    monitor: &ThroughputMonitor,
    total: usize,
    on_progress: Option<&ProgressCallback>,
) {
    match joined {
        Ok(SegmentResult::Done(index)) => {
            report.fetched += 1;
            let completed = done.fetch_add(1, Ordering::SeqCst) + 1;
            debug!(index, completed, total, "segment recorded");
            if let Some(callback) = on_progress {
                callback(SegmentSnapshot {
                    completed,
                    total,
                    throughput: monitor.format(),
                });
            }
        }
        Ok(SegmentResult::Failed(error)) => {
            warn!(index = error.index, error = %error.source, "segment failed");
            report.failures.push(error);
        }
        Ok(SegmentResult::Cancelled) => {}
        // Ignore JoinError - worker panics are logged but don't fail the pool
        Err(e) => warn!(error = %e, "segment worker panicked"),
    }
}

async fn fetch_segment(
    client: &HttpClient,
    segment: &Segment,
    log: &ProgressLog,
    completed: &BTreeSet<usize>,
    cancel: &CancellationToken,
    monitor: &ThroughputMonitor,
) -> SegmentResult {
    let index = segment.index;
    if cancel.is_cancelled() {
        return SegmentResult::Cancelled;
    }
    if completed.contains(&index) && log.segment_is_present(index).await {
        return SegmentResult::Done(index);
    }

    let path = log.segment_path(index);
    let url = segment.url.as_str();
    let outcome = client
        .stream_to_file(url, &path, cancel, |bytes| monitor.add_bytes(bytes))
        .await;

    match outcome {
        Ok(StreamOutcome::Completed { bytes }) if bytes > 0 => match log.record(index).await {
            Ok(()) => SegmentResult::Done(index),
            Err(e) => SegmentResult::Failed(SegmentFetchError::new(
                index,
                DownloadError::io(log.log_path(), e),
            )),
        },
        Ok(StreamOutcome::Completed { .. }) => {
            remove_partial(&path).await;
            SegmentResult::Failed(SegmentFetchError::new(index, DownloadError::empty_body(url)))
        }
        Ok(StreamOutcome::Cancelled) => {
            remove_partial(&path).await;
            SegmentResult::Cancelled
        }
        Err(e) => {
            remove_partial(&path).await;
            SegmentResult::Failed(SegmentFetchError::new(index, e))
        }
    }
}

async fn remove_partial(path: &std::path::Path) {
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        debug!(path = %path.display(), "removing partial segment");
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!(path = %path.display(), error = %e, "failed to remove partial segment");
        }
    }
}
