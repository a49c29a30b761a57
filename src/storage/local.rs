//! Directory-backed object store: `<root>/<bucket>/<key>`.

use super::{validate_key, ObjectStore, StorageError};
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};

pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(bucket)?;
        validate_key(key)?;
        let mut path = self.root.join(bucket);
        for segment in key.split('/') {
            path.push(segment);
        }
        Ok(path)
    }
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, local_path: &Path, bucket: &str, key: &str) -> Result<(), StorageError> {
        let target = self.object_path(bucket, key)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error(parent))?;
        }
        tokio::fs::copy(local_path, &target)
            .await
            .map_err(io_error(local_path))?;
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        let target = self.object_path(bucket, key)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io { path: target, source }),
        }
    }

    async fn list(&self, bucket: &str) -> Result<Vec<String>, StorageError> {
        validate_key(bucket)?;
        let bucket_root = self.root.join(bucket);
        let mut keys = Vec::new();
        let mut pending = vec![(bucket_root.clone(), String::new())];

        while let Some((dir, prefix)) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                // A bucket nothing was ever put into
                Err(err) if err.kind() == io::ErrorKind::NotFound && dir == bucket_root => break,
                Err(source) => return Err(StorageError::Io { path: dir, source }),
            };

            while let Some(entry) = entries.next_entry().await.map_err(io_error(&dir))? {
                let name = entry.file_name().to_string_lossy().into_owned();
                let key = if prefix.is_empty() { name } else { format!("{}/{}", prefix, name) };
                let file_type = entry.file_type().await.map_err(io_error(&dir))?;
                if file_type.is_dir() {
                    pending.push((entry.path(), key));
                } else {
                    keys.push(key);
                }
            }
        }

        keys.sort();
        Ok(keys)
    }

    fn backend(&self) -> &'static str {
        "local"
    }
}
