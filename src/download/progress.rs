//! Append-only record of which segments are safely on disk.
//!
//! Each output file gets a sibling temporary directory
//! (`<output>.downloading/`) holding the indexed segment files and a
//! `progress.log` with one completed index per line. An index is appended only
//! after its segment file has been fully written and flushed, so the log never
//! claims more than what is on disk. On load the log is intersected with the
//! segment files actually present, which discards entries left behind by a
//! crash between truncation and rewrite.

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use super::constants::{PROGRESS_LOG_NAME, TEMP_DIR_SUFFIX};

/// Returns `<output>.downloading` for an output path.
#[must_use]
pub fn temp_dir_for(output_path: &Path) -> PathBuf {
    let mut name = OsString::from(output_path.as_os_str());
    name.push(TEMP_DIR_SUFFIX);
    PathBuf::from(name)
}

/// Returns the zero-padded segment file path (`00042.ts`) inside `dir`.
#[must_use]
pub fn segment_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("{index:05}.ts"))
}

/// Progress log for a single output file.
///
/// Appends are serialized through an internal lock that clones share, so a
/// clone can be handed to every segment worker of a task.
#[derive(Debug, Clone)]
pub struct ProgressLog {
    dir: PathBuf,
    log_path: PathBuf,
    append_lock: Arc<Mutex<()>>,
}

impl ProgressLog {
    /// Opens (and creates if absent) the temporary directory for `output_path`.
    ///
    /// # Errors
    ///
    /// Returns the IO error if the directory cannot be created.
    #[instrument(fields(output = %output_path.display()))]
    pub async fn open(output_path: &Path) -> io::Result<Self> {
        let dir = temp_dir_for(output_path);
        tokio::fs::create_dir_all(&dir).await?;
        let log_path = dir.join(PROGRESS_LOG_NAME);
        Ok(Self {
            dir,
            log_path,
            append_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Temporary directory holding segment files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the `progress.log` file.
    #[must_use]
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Path of the segment file for `index`.
    #[must_use]
    pub fn segment_path(&self, index: usize) -> PathBuf {
        segment_path(&self.dir, index)
    }

    /// Loads the completed indices whose segment file exists and is non-empty.
    ///
    /// A missing log yields an empty set. Unparseable lines (for example a
    /// torn final line) and entries without a backing file are dropped.
    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    pub async fn load(&self) -> BTreeSet<usize> {
        let raw = match tokio::fs::read_to_string(&self.log_path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return BTreeSet::new(),
            Err(e) => {
                warn!(error = %e, "failed to read progress log, starting from scratch");
                return BTreeSet::new();
            }
        };

        let mut completed = BTreeSet::new();
        let mut dropped = 0usize;
        for line in raw.lines() {
            let Ok(index) = line.trim().parse::<usize>() else {
                if !line.trim().is_empty() {
                    dropped += 1;
                }
                continue;
            };
            if self.segment_is_present(index).await {
                completed.insert(index);
            } else {
                dropped += 1;
            }
        }

        debug!(completed = completed.len(), dropped, "loaded progress log");
        completed
    }

    /// Appends `index` as one line. Never rewrites earlier lines.
    ///
    /// # Errors
    ///
    /// Returns the IO error if the log cannot be opened or written.
    pub async fn record(&self, index: usize) -> io::Result<()> {
        let _guard = self.append_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .await?;
        file.write_all(format!("{index}\n").as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Returns true if the segment file for `index` exists with non-zero size.
    pub async fn segment_is_present(&self, index: usize) -> bool {
        tokio::fs::metadata(self.segment_path(index))
            .await
            .is_ok_and(|meta| meta.is_file() && meta.len() > 0)
    }
}
