//! Concatenates downloaded segment files into the final artifact.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{info, instrument, warn};

use super::progress::segment_path;

/// Errors from the assembly step.
///
/// On every error the temporary directory is left untouched so the next run
/// can resume from it.
#[derive(Debug, Error)]
pub enum AssemblyError {
    /// Reading a segment or writing the output failed.
    #[error("IO error assembling {path}: {source}")]
    Io {
        /// File involved in the failure.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// A segment file expected in the temporary directory is absent.
    #[error("segment {index} missing at {path}")]
    MissingSegment {
        /// Zero-based segment index.
        index: usize,
        /// Where the file was expected.
        path: PathBuf,
    },

    /// The concatenated output has zero length and was removed.
    #[error("assembled output {path} is empty")]
    EmptyOutput {
        /// The removed output path.
        path: PathBuf,
    },
}

impl AssemblyError {
    fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Writes segments `0..count` from `temp_dir` into `output`, in index order.
///
/// Parent directories of `output` are created as needed. On success the
/// temporary directory is removed and the output size in bytes is returned.
///
/// # Errors
///
/// Returns [`AssemblyError::MissingSegment`] if any segment file is absent,
/// [`AssemblyError::EmptyOutput`] if the result has zero length (the output is
/// deleted), and [`AssemblyError::Io`] for read or write failures.
#[instrument(fields(temp_dir = %temp_dir.display(), output = %output.display()))]
pub async fn assemble_segments(
    count: usize,
    temp_dir: &Path,
    output: &Path,
) -> Result<u64, AssemblyError> {
    // Check the whole set first so a gap never produces a truncated artifact
    for index in 0..count {
        let path = segment_path(temp_dir, index);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(AssemblyError::MissingSegment { index, path });
        }
    }

    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| AssemblyError::io(parent, e))?;
    }

    let file = File::create(output)
        .await
        .map_err(|e| AssemblyError::io(output, e))?;
    let mut writer = BufWriter::new(file);
    let mut written: u64 = 0;

    for index in 0..count {
        let path = segment_path(temp_dir, index);
        let mut segment = match File::open(&path).await {
            Ok(segment) => segment,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(AssemblyError::MissingSegment { index, path });
            }
            Err(e) => return Err(AssemblyError::io(&path, e)),
        };
        written += tokio::io::copy(&mut segment, &mut writer)
            .await
            .map_err(|e| AssemblyError::io(&path, e))?;
    }

    writer
        .flush()
        .await
        .map_err(|e| AssemblyError::io(output, e))?;
    drop(writer);

    if written == 0 {
        warn!("assembled output is empty, removing it");
        if let Err(e) = tokio::fs::remove_file(output).await {
            warn!(error = %e, "failed to remove empty output");
        }
        return Err(AssemblyError::EmptyOutput {
            path: output.to_path_buf(),
        });
    }

    if let Err(e) = tokio::fs::remove_dir_all(temp_dir).await {
        warn!(error = %e, "failed to remove temporary directory");
    }

    info!(segments = count, bytes = written, "assembled output");
    Ok(written)
}
