//! One download attempt: resolve, fetch segments, assemble.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use super::item::TaskKey;
use crate::download::{
    AssemblyError, HttpClient, ProgressCallback, ProgressLog, SegmentDownloader, SegmentSnapshot,
    assemble_segments,
};
use crate::manifest::{ManifestResolver, ResolutionError};

/// Everything an attempt needs to know about its task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Task identity, for logging.
    pub key: TaskKey,
    /// Play page of the episode.
    pub play_url: String,
    /// Final artifact path.
    pub save_path: PathBuf,
}

/// Progress reported by a running attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    /// Completion percentage, `0.0..=100.0`.
    pub percent: f64,
    /// Formatted current throughput.
    pub throughput: String,
}

impl From<SegmentSnapshot> for ProgressUpdate {
    fn from(snapshot: SegmentSnapshot) -> Self {
        Self {
            percent: snapshot.percent(),
            throughput: snapshot.throughput,
        }
    }
}

/// Receiver of progress updates for one task.
pub type ProgressSink = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

/// How an attempt ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The artifact was written.
    Completed {
        /// Artifact size in bytes.
        bytes: u64,
    },
    /// The cancellation token fired; recorded progress stays on disk.
    Cancelled,
}

/// Task-level failure of one attempt. Each consumes one retry attempt.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The play page or playlist was not as expected.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// The segment pool drained with gaps.
    #[error("{missing} of {total} segments missing after download")]
    Incomplete {
        /// Segments without a file on disk.
        missing: usize,
        /// Segments in the playlist.
        total: usize,
    },

    /// The artifact could not be assembled.
    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    /// The temporary directory could not be prepared.
    #[error("IO error preparing {path}: {source}")]
    Io {
        /// Directory involved.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Performs one download attempt for a task.
///
/// This trait uses `async_trait` so the registry can hold an
/// `Arc<dyn EpisodeFetcher>`.
#[async_trait]
pub trait EpisodeFetcher: Send + Sync {
    /// Runs one attempt. Progress updates are informational only.
    async fn fetch(
        &self,
        request: FetchRequest,
        cancel: CancellationToken,
        progress: ProgressSink,
    ) -> Result<FetchOutcome, TaskError>;
}

/// Production fetcher: manifest resolver, segment pool, assembler.
#[derive(Debug, Clone)]
pub struct SegmentPipeline {
    resolver: ManifestResolver,
    downloader: SegmentDownloader,
}

impl SegmentPipeline {
    /// Creates a pipeline sharing `client` between resolver and segment pool.
    #[must_use]
    pub fn new(client: HttpClient, max_workers: usize) -> Self {
        Self {
            resolver: ManifestResolver::new(client.clone()),
            downloader: SegmentDownloader::new(client, max_workers),
        }
    }

    /// Replaces the manifest resolver.
    #[must_use]
    pub fn with_resolver(mut self, resolver: ManifestResolver) -> Self {
        self.resolver = resolver;
        self
    }
}

#[async_trait]
impl EpisodeFetcher for SegmentPipeline {
    #[instrument(skip_all, fields(task = %request.key))]
    async fn fetch(
        &self,
        request: FetchRequest,
        cancel: CancellationToken,
        progress: ProgressSink,
    ) -> Result<FetchOutcome, TaskError> {
        let manifest = self.resolver.resolve(&request.play_url).await?;
        if cancel.is_cancelled() {
            return Ok(FetchOutcome::Cancelled);
        }

        let log = ProgressLog::open(&request.save_path)
            .await
            .map_err(|source| TaskError::Io {
                path: request.save_path.clone(),
                source,
            })?;

        let callback: ProgressCallback =
            Arc::new(move |snapshot: SegmentSnapshot| progress(snapshot.into()));
        let report = self
            .downloader
            .download(&manifest.segments, &log, &cancel, Some(callback))
            .await;

        if report.was_cancelled() {
            info!(fetched = report.fetched(), "attempt cancelled");
            return Ok(FetchOutcome::Cancelled);
        }
        if !report.is_complete() {
            warn!(
                missing = report.missing().len(),
                total = report.total(),
                "segment pool drained with gaps"
            );
            return Err(TaskError::Incomplete {
                missing: report.missing().len(),
                total: report.total(),
            });
        }

        let bytes = assemble_segments(report.total(), log.dir(), &request.save_path).await?;
        Ok(FetchOutcome::Completed { bytes })
    }
}
