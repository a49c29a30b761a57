//! # Interview Archive
//!
//! End-of-interview housekeeping. The candidate's raw recordings are converted
//! to mp3, every artifact directory is pushed to object storage, and the local
//! scratch directories are emptied.
//!
//! ## Best Effort:
//! Every step works file by file. One recording that fails to convert or one
//! object that fails to upload is reported in the `BatchReport` and does not
//! stop its siblings. Nothing here is retried.

pub mod transcode;
pub mod upload;

pub use transcode::{convert_recordings, FfmpegTranscoder, Transcoder};
pub use upload::upload_directory;

use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One file that did not make it through a batch step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedFile {
    pub path: String,
    pub error: String,
}

/// Per-file outcome of a batch step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<FailedFile>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// Source paths of the files that failed, for callers that must keep them.
    pub fn failed_paths(&self) -> Vec<PathBuf> {
        self.failed.iter().map(|failure| PathBuf::from(&failure.path)).collect()
    }

    fn record_failure(&mut self, path: &Path, error: impl ToString) {
        self.failed.push(FailedFile {
            path: path.display().to_string(),
            error: error.to_string(),
        });
    }
}

/// Remove everything inside `dir` except the paths in `keep`, keeping the
/// directory itself.
///
/// A missing directory has nothing to clear. Returns the number of entries removed.
pub async fn clear_directory(dir: &Path, keep: &[PathBuf]) -> io::Result<usize> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(dir = %dir.display(), "Directory does not exist, nothing to clear");
            return Ok(0);
        }
        Err(err) => return Err(err),
    };

    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        if keep.contains(&entry.path()) {
            debug!(path = %entry.path().display(), "Keeping file");
            continue;
        }
        if entry.file_type().await?.is_dir() {
            tokio::fs::remove_dir_all(entry.path()).await?;
        } else {
            tokio::fs::remove_file(entry.path()).await?;
        }
        removed += 1;
    }

    debug!(dir = %dir.display(), removed, "Cleared directory");
    Ok(removed)
}

/// Regular files directly inside `dir`, sorted. Missing directory → empty.
pub(crate) async fn list_files(dir: &Path) -> io::Result<Vec<std::path::PathBuf>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}
