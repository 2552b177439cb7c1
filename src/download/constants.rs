//! Constants for the download module (timeouts, worker limits, file names).

use std::time::Duration;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout for segment bodies (5 minutes).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Explicit timeout for lightweight metadata fetches (pages and playlists).
pub const METADATA_TIMEOUT_SECS: u64 = 10;

/// Default configured segment parallelism.
pub const DEFAULT_MAX_WORKERS: usize = 48;

/// Hard cap on concurrent segment fetches, bounding open sockets and files
/// regardless of the configured parallelism.
pub const MAX_SEGMENT_WORKERS: usize = 32;

/// Suffix appended to the output path to form the temporary directory.
pub(crate) const TEMP_DIR_SUFFIX: &str = ".downloading";

/// File name of the append-only completed-index log.
pub(crate) const PROGRESS_LOG_NAME: &str = "progress.log";

/// Minimum interval between throughput recomputations.
pub(crate) const THROUGHPUT_WINDOW: Duration = Duration::from_millis(500);
