//! Segment download machinery: HTTP streaming, resume bookkeeping, assembly.
//!
//! This module turns an ordered segment list into one playable file on disk.
//!
//! # Features
//!
//! - Streaming segment fetches (memory-efficient, cancellable between chunks)
//! - Bounded concurrency, capped at [`MAX_SEGMENT_WORKERS`] open sockets/files
//! - Crash-safe resume via an append-only progress log per output file
//! - Rolling throughput estimate for status display
//! - In-order assembly with empty-output detection
//!
//! # On-disk layout
//!
//! ```text
//! <save_path>.downloading/
//!     00000.ts
//!     00001.ts
//!     progress.log      # one completed index per line
//! <save_path>           # written by the assembler once every segment exists
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use tokio_util::sync::CancellationToken;
//! use vodgrab_core::download::{HttpClient, ProgressLog, SegmentDownloader, assemble_segments};
//! use vodgrab_core::manifest::ManifestResolver;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new();
//! let manifest = ManifestResolver::new(client.clone())
//!     .resolve("https://example.com/play/1-1-1.html")
//!     .await?;
//! let output = Path::new("downloads/Show/Episode 1.mp4");
//! let log = ProgressLog::open(output).await?;
//! let report = SegmentDownloader::new(client, 48)
//!     .download(&manifest.segments, &log, &CancellationToken::new(), None)
//!     .await;
//! if report.is_complete() {
//!     assemble_segments(report.total(), log.dir(), output).await?;
//! }
//! # Ok(())
//! # }
//! ```

mod assembler;
mod client;
mod constants;
mod error;
mod progress;
mod segments;
mod throughput;

pub use assembler::{AssemblyError, assemble_segments};
pub use client::{HttpClient, StreamOutcome};
pub use constants::{
    CONNECT_TIMEOUT_SECS, DEFAULT_MAX_WORKERS, MAX_SEGMENT_WORKERS, METADATA_TIMEOUT_SECS,
    READ_TIMEOUT_SECS,
};
pub use error::{DownloadError, SegmentFetchError};
pub use progress::{ProgressLog, segment_path, temp_dir_for};
pub use segments::{ProgressCallback, SegmentDownloader, SegmentReport, SegmentSnapshot};
pub use throughput::{ThroughputMonitor, format_rate, parse_rate};

// Note: we do NOT define module-local Result aliases.
// Use `Result<T, DownloadError>` explicitly in function signatures.
