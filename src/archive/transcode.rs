//! Recording conversion. The browser uploads WebM; the archive keeps mp3.
//!
//! The transcoder itself is opaque: input file in, output file out, success or
//! failure. `FfmpegTranscoder` shells out to `ffmpeg`.

use super::{list_files, BatchReport};
use crate::config::TranscoderConfig;
use async_trait::async_trait;
use std::io;
use std::path::Path;
use thiserror::Error;
use tokio::process::Command;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },
}

#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn transcode(&self, input: &Path, output: &Path) -> Result<(), TranscodeError>;
}

pub struct FfmpegTranscoder {
    program: String,
    bitrate: String,
    sample_rate: u32,
}

impl FfmpegTranscoder {
    pub fn new(config: &TranscoderConfig) -> Self {
        Self {
            program: config.ffmpeg_path.clone(),
            bitrate: config.bitrate.clone(),
            sample_rate: config.sample_rate,
        }
    }

    fn command(&self, input: &Path, output: &Path) -> Command {
        let sample_rate = self.sample_rate.to_string();
        let mut command = Command::new(&self.program);
        command
            .arg("-i")
            .arg(input)
            .args(["-vn", "-ab", self.bitrate.as_str(), "-ar", sample_rate.as_str(), "-y"])
            .arg(output)
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, input: &Path, output: &Path) -> Result<(), TranscodeError> {
        let result = self
            .command(input, output)
            .output()
            .await
            .map_err(|source| TranscodeError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            // ffmpeg prints its banner first; the reason is at the end
            let lines: Vec<&str> = stderr.lines().collect();
            let tail = lines[lines.len().saturating_sub(3)..].join(" | ");
            return Err(TranscodeError::Failed {
                program: self.program.clone(),
                status: result.status.to_string(),
                stderr: tail,
            });
        }
        Ok(())
    }
}

fn is_webm(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("webm"))
        .unwrap_or(false)
}

/// Convert every WebM recording in `uploads_dir` to `<audio_dir>/<stem>.mp3`.
///
/// Non-WebM files are ignored. A failed conversion is recorded and the next
/// file is tried.
pub async fn convert_recordings(
    transcoder: &dyn Transcoder,
    uploads_dir: &Path,
    audio_dir: &Path,
) -> io::Result<BatchReport> {
    let recordings: Vec<_> = list_files(uploads_dir)
        .await?
        .into_iter()
        .filter(|path| is_webm(path))
        .collect();

    let mut report = BatchReport::default();
    if recordings.is_empty() {
        return Ok(report);
    }
    tokio::fs::create_dir_all(audio_dir).await?;

    for input in recordings {
        let Some(stem) = input.file_stem() else {
            continue;
        };
        let output = audio_dir.join(format!("{}.mp3", stem.to_string_lossy()));

        match transcoder.transcode(&input, &output).await {
            Ok(()) => {
                info!(input = %input.display(), output = %output.display(), "Converted recording");
                report.succeeded.push(output.display().to_string());
            }
            Err(err) => {
                warn!(input = %input.display(), error = %err, "Recording conversion failed");
                report.record_failure(&input, err);
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Copies input to output, except for names containing "corrupt".
    struct CopyTranscoder {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Transcoder for CopyTranscoder {
        async fn transcode(&self, input: &Path, output: &Path) -> Result<(), TranscodeError> {
            let name = input.file_name().unwrap().to_string_lossy().into_owned();
            self.seen.lock().unwrap().push(name.clone());
            if name.contains("corrupt") {
                return Err(TranscodeError::Failed {
                    program: "fake".to_string(),
                    status: "exit status: 1".to_string(),
                    stderr: "Invalid data found when processing input".to_string(),
                });
            }
            tokio::fs::copy(input, output).await.unwrap();
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_converts_webm_and_keeps_going_after_failure() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = dir.path().join("uploads");
        let audio = dir.path().join("audio");
        std::fs::create_dir_all(&uploads).unwrap();
        std::fs::write(uploads.join("recording_1.WebM"), b"one").unwrap();
        std::fs::write(uploads.join("corrupt_2.webm"), b"two").unwrap();
        std::fs::write(uploads.join("recording_3.webm"), b"three").unwrap();
        std::fs::write(uploads.join("notes.txt"), b"skip").unwrap();

        let transcoder = CopyTranscoder { seen: Mutex::new(Vec::new()) };
        let report = convert_recordings(&transcoder, &uploads, &audio).await.unwrap();

        assert_eq!(report.succeeded.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].path.ends_with("corrupt_2.webm"));
        assert_eq!(std::fs::read(audio.join("recording_1.mp3")).unwrap(), b"one");
        assert_eq!(std::fs::read(audio.join("recording_3.mp3")).unwrap(), b"three");
        assert_eq!(transcoder.seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_missing_uploads_directory_converts_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let transcoder = CopyTranscoder { seen: Mutex::new(Vec::new()) };
        let report = convert_recordings(&transcoder, &dir.path().join("uploads"), &dir.path().join("audio"))
            .await
            .unwrap();
        assert_eq!(report.total(), 0);
        assert!(!dir.path().join("audio").exists());
    }

    #[test]
    fn test_ffmpeg_arguments() {
        let transcoder = FfmpegTranscoder::new(&TranscoderConfig::default());
        let command = transcoder.command(Path::new("uploads/a.WebM"), Path::new("audio/a.mp3"));
        let args: Vec<String> = command
            .as_std()
            .get_args()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            ["-i", "uploads/a.WebM", "-vn", "-ab", "192k", "-ar", "44100", "-y", "audio/a.mp3"]
        );
    }
}
