//! # Turn Processor
//!
//! Runs one interview turn: candidate transcript in, spoken interviewer reply out.
//!
//! ## Turn Pipeline:
//! 1. **Name**: derive `response_<ts>.mp3` from the transcript file name
//! 2. **Read**: load the transcript text (missing or empty is a caller error)
//! 3. **Generate**: send the flattened session + new utterance to the text generator
//! 4. **Record**: append the candidate and interviewer turns to the session
//! 5. **Synthesize**: voice the reply and collect the audio chunks
//! 6. **Persist**: write the audio next to its siblings under the response directory
//!
//! Steps 1 and 2 run before any remote call. The session only changes once a
//! reply exists, so a generation failure leaves it exactly as it was.
//!
//! ## Concurrency:
//! `process_turn` takes `&mut Session`; callers must not run two turns against
//! the same interview at once.

use crate::interview::naming::{self, NamingError};
use crate::interview::session::Session;
use crate::providers::{ProviderError, SpeechSynthesizer, TextGenerator};
use futures::StreamExt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why a turn did not produce a complete audio reply.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("transcript path '{}' has no file name", .0.display())]
    NoFileName(PathBuf),

    #[error(transparent)]
    Naming(#[from] NamingError),

    #[error("transcript {} does not exist", path.display())]
    TranscriptMissing { path: PathBuf },

    #[error("transcript {} could not be read: {source}", path.display())]
    TranscriptUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("transcript {} is empty", path.display())]
    EmptyTranscript { path: PathBuf },

    #[error("text generation failed: {0}")]
    Generation(#[source] ProviderError),

    #[error("speech synthesis failed: {source}")]
    Synthesis {
        reply_text: String,
        #[source]
        source: ProviderError,
    },

    #[error("speech synthesis returned no audio")]
    EmptyAudio { reply_text: String },

    #[error("failed to write reply audio to {}: {source}", path.display())]
    Persist {
        reply_text: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl TurnError {
    /// The interviewer's reply, when it was generated before the turn failed.
    ///
    /// `Some` means "text produced, audio failed"; `None` means nothing was produced.
    pub fn reply_text(&self) -> Option<&str> {
        match self {
            TurnError::Synthesis { reply_text, .. }
            | TurnError::EmptyAudio { reply_text }
            | TurnError::Persist { reply_text, .. } => Some(reply_text),
            _ => None,
        }
    }

    /// Whether the caller sent something unusable (as opposed to a downstream failure).
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            TurnError::NoFileName(_)
                | TurnError::Naming(_)
                | TurnError::TranscriptMissing { .. }
                | TurnError::EmptyTranscript { .. }
        )
    }
}

/// Everything a successful turn produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub reply_text: String,
    pub audio_bytes: Vec<u8>,
    pub response_path: PathBuf,
}

/// Drives one turn through the generator and synthesizer.
#[derive(Clone)]
pub struct TurnProcessor {
    generator: Arc<dyn TextGenerator>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    response_dir: PathBuf,
}

impl TurnProcessor {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        response_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            generator,
            synthesizer,
            response_dir: response_dir.into(),
        }
    }

    pub fn model(&self) -> &str {
        self.generator.model()
    }

    pub fn voice(&self) -> &str {
        self.synthesizer.voice()
    }

    /// Run one turn for the transcript stored at `transcript_path`.
    pub async fn process_turn(
        &self,
        session: &mut Session,
        transcript_path: &Path,
    ) -> Result<TurnOutcome, TurnError> {
        let started = Instant::now();

        let file_name = transcript_path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| TurnError::NoFileName(transcript_path.to_path_buf()))?;
        let response_path = self
            .response_dir
            .join(naming::response_name_for(file_name)?.to_string());

        let candidate_text = read_transcript(transcript_path).await?;

        let prompt = session.render_prompt(&candidate_text);
        let reply_text = self
            .generator
            .complete(&prompt)
            .await
            .map_err(TurnError::Generation)?;
        debug!(
            model = %self.generator.model(),
            elapsed_ms = %started.elapsed().as_millis(),
            "Interviewer reply generated"
        );

        session.record_exchange(candidate_text, reply_text.clone());

        let collected = self.collect_audio(&reply_text).await;
        let audio_bytes = match collected {
            Ok(bytes) if bytes.is_empty() => return Err(TurnError::EmptyAudio { reply_text }),
            Ok(bytes) => bytes,
            Err(source) => return Err(TurnError::Synthesis { reply_text, source }),
        };
        debug!(
            voice = %self.synthesizer.voice(),
            audio_bytes = audio_bytes.len(),
            elapsed_ms = %started.elapsed().as_millis(),
            "Reply audio synthesized"
        );

        if let Err(source) = write_artifact(&response_path, &audio_bytes).await {
            return Err(TurnError::Persist {
                reply_text,
                path: response_path,
                source,
            });
        }

        info!(
            path = %response_path.display(),
            turns = session.len(),
            elapsed_ms = %started.elapsed().as_millis(),
            "Turn completed"
        );

        Ok(TurnOutcome {
            reply_text,
            audio_bytes,
            response_path,
        })
    }

    async fn collect_audio(&self, text: &str) -> Result<Vec<u8>, ProviderError> {
        let mut stream = self.synthesizer.synthesize(text).await?;
        let mut audio = Vec::new();
        while let Some(chunk) = stream.next().await {
            audio.extend_from_slice(&chunk?);
        }
        Ok(audio)
    }
}

async fn read_transcript(path: &Path) -> Result<String, TurnError> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "Transcript not found");
            return Err(TurnError::TranscriptMissing {
                path: path.to_path_buf(),
            });
        }
        Err(source) => {
            return Err(TurnError::TranscriptUnreadable {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    if text.trim().is_empty() {
        return Err(TurnError::EmptyTranscript {
            path: path.to_path_buf(),
        });
    }
    Ok(text)
}

/// Write to a sibling `.partial` file and rename it over `path`, so a failed
/// write never leaves a truncated artifact under the final name.
async fn write_artifact(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut partial = path.as_os_str().to_owned();
    partial.push(".partial");
    let partial = PathBuf::from(partial);

    let written = match tokio::fs::write(&partial, bytes).await {
        Ok(()) => tokio::fs::rename(&partial, path).await,
        Err(err) => Err(err),
    };
    if written.is_err() {
        if let Err(err) = tokio::fs::remove_file(&partial).await {
            debug!(path = %partial.display(), error = %err, "Partial artifact not removed");
        }
    }
    written
}
