//! Reading the single `file` field the frontend posts to the upload endpoints.

use crate::error::{AppError, AppResult};
use actix_multipart::{Field, Multipart};
use futures_util::stream::StreamExt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Form field that carries the uploaded file.
pub const FILE_FIELD: &str = "file";

/// A file received from a multipart form.
#[derive(Debug)]
pub struct UploadedFile {
    /// Client-supplied name reduced to its final path component
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    /// Write the file as `<dir>/<file_name>`, creating `dir` if needed.
    pub async fn save_to(&self, dir: &Path) -> AppResult<PathBuf> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(&self.file_name);
        tokio::fs::write(&path, &self.bytes).await?;
        debug!(path = %path.display(), size_bytes = self.bytes.len(), "Saved uploaded file");
        Ok(path)
    }
}

/// Drain `payload` and return the `file` field.
///
/// Other fields are skipped. Files larger than `max_bytes` are rejected while
/// streaming, before the whole body is buffered.
pub async fn read_file_field(mut payload: Multipart, max_bytes: usize) -> AppResult<UploadedFile> {
    let mut uploaded: Option<UploadedFile> = None;

    while let Some(item) = payload.next().await {
        let mut field: Field = item.map_err(|e| AppError::BadRequest(format!("Multipart error: {}", e)))?;

        let Some(content_disposition) = field.content_disposition() else {
            continue;
        };
        if content_disposition.get_name() != Some(FILE_FIELD) {
            continue;
        }

        let raw_name = content_disposition
            .get_filename()
            .ok_or_else(|| AppError::ValidationError("Uploaded file has no name".to_string()))?;
        let file_name = sanitize_file_name(raw_name)
            .ok_or_else(|| AppError::ValidationError(format!("Unusable file name '{}'", raw_name)))?;

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| AppError::BadRequest(format!("Chunk error: {}", e)))?;
            if bytes.len() + chunk.len() > max_bytes {
                return Err(AppError::ValidationError(format!(
                    "File too large (max: {} bytes)",
                    max_bytes
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        uploaded = Some(UploadedFile { file_name, bytes });
    }

    uploaded.ok_or_else(|| AppError::BadRequest(format!("No '{}' field in the form", FILE_FIELD)))
}

/// Final path component of a client-supplied name, for either separator style.
fn sanitize_file_name(raw: &str) -> Option<String> {
    let name = raw.rsplit(['/', '\\']).next()?.trim();
    match name {
        "" | "." | ".." => None,
        name => Some(name.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("Transcript_17.txt").as_deref(), Some("Transcript_17.txt"));
        assert_eq!(sanitize_file_name("../../etc/Transcript_17.txt").as_deref(), Some("Transcript_17.txt"));
        assert_eq!(sanitize_file_name("C:\\Users\\me\\rec_1.webm").as_deref(), Some("rec_1.webm"));
        assert_eq!(sanitize_file_name("uploads/"), None);
        assert_eq!(sanitize_file_name(".."), None);
    }

    #[tokio::test]
    async fn test_save_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = UploadedFile {
            file_name: "Transcript_5.txt".to_string(),
            bytes: b"hello".to_vec(),
        };
        let path = file.save_to(&dir.path().join("transcripts")).await.unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"hello");
    }
}
