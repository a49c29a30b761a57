//! # Object Storage
//!
//! Completed interview artifacts are archived to a bucket. Keys follow the
//! local layout: `transcripts/transcript_<ts>.txt`, `response/response_<ts>.mp3`,
//! `audio/<recording>_<ts>.mp3`, so the timestamp still correlates them.
//!
//! ## Backends:
//! - **local**: a directory per bucket, handy for development and tests
//! - **http**: a bearer-token object gateway (PUT / DELETE / list)
//!
//! ## Catalog:
//! `catalog` turns a flat key listing back into one record per exchange.

pub mod catalog;
pub mod http;
pub mod local;

pub use catalog::build_catalog;
pub use http::HttpObjectStore;
pub use local::LocalObjectStore;

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid object key '{0}'")]
    InvalidKey(String),

    #[error("invalid storage endpoint '{0}'")]
    InvalidEndpoint(String),

    #[error("storage request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("storage returned HTTP {status} for '{key}'")]
    Status { status: u16, key: String },
}

/// Minimal bucket interface the service needs.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload the file at `local_path` as `bucket/key`, replacing any existing object.
    async fn put(&self, local_path: &Path, bucket: &str, key: &str) -> Result<(), StorageError>;

    /// Remove `bucket/key`. Removing a key that does not exist succeeds.
    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StorageError>;

    /// Every key in `bucket`.
    async fn list(&self, bucket: &str) -> Result<Vec<String>, StorageError>;

    /// Short backend name for logs and health output.
    fn backend(&self) -> &'static str;
}

/// Reject keys that could escape the bucket or are not `/`-separated relative paths.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if bad {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Content type recorded with an uploaded object, by file extension.
pub fn content_type_for(key: &str) -> &'static str {
    match key.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()) {
        Some(ext) if ext == "mp3" => "audio/mpeg",
        Some(ext) if ext == "webm" => "audio/webm",
        Some(ext) if ext == "txt" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}
