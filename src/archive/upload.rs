//! Bulk upload of an artifact directory on a fixed-size worker pool.

use super::{list_files, BatchReport};
use crate::storage::ObjectStore;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Upload every file directly inside `dir` to `bucket` as `<dir name>/<file name>`.
///
/// At most `workers` uploads run at once. The call returns once every upload
/// has either finished or failed; there is no ordering between files. Files
/// that uploaded are deleted locally, failed ones are left for a later run.
pub async fn upload_directory(
    store: Arc<dyn ObjectStore>,
    dir: &Path,
    bucket: &str,
    workers: usize,
) -> io::Result<BatchReport> {
    let files = list_files(dir).await?;
    let mut report = BatchReport::default();
    if files.is_empty() {
        return Ok(report);
    }

    let prefix = dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let pool = Arc::new(Semaphore::new(workers.max(1)));
    let mut tasks = JoinSet::new();

    for path in files {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let key = if prefix.is_empty() { file_name } else { format!("{}/{}", prefix, file_name) };
        let store = Arc::clone(&store);
        let pool = Arc::clone(&pool);
        let bucket = bucket.to_string();

        tasks.spawn(async move {
            // The pool is never closed, so acquiring only waits for a free slot
            let _permit = pool.acquire_owned().await.ok();
            let result = store.put(&path, &bucket, &key).await;
            (path, key, result)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((path, key, Ok(()))) => {
                if let Err(err) = tokio::fs::remove_file(&path).await {
                    warn!(path = %path.display(), error = %err, "Uploaded file could not be removed");
                }
                report.succeeded.push(key);
            }
            Ok((path, key, Err(err))) => {
                warn!(key = %key, error = %err, "Upload failed");
                report.record_failure(&path, err);
            }
            Err(err) => {
                warn!(error = %err, "Upload worker did not finish");
                report.record_failure(&PathBuf::from(dir), err);
            }
        }
    }

    info!(
        dir = %dir.display(),
        uploaded = report.succeeded.len(),
        failed = report.failed.len(),
        "Directory upload finished"
    );
    Ok(report)
}
