//! # Configuration Management
//!
//! This module handles loading and managing application configuration from multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Provider credentials from their conventional variables (OPENAI_API_KEY, ...)
//! - Default values (built into the code)
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Credential and deployment variables (OPENAI_API_KEY, HOST, PORT, ...)
//! 2. Environment variables (APP_SERVER__PORT, APP_LLM__MODEL, etc.)
//! 3. Configuration file (config.toml)
//! 4. Default values (defined in the Default impls)
//!
//! ## Environment Variable Naming:
//! Sections and fields are separated by a double underscore because field names
//! contain single underscores: `APP_INTERVIEW__MAX_HISTORY_EXCHANGES=10`.

use crate::interview::session::DEFAULT_PERSONA;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main application configuration that contains all settings.
///
/// ## Sections:
/// - `server`: where the HTTP listener binds
/// - `interview`: persona and prompt layout for the interviewer
/// - `llm` / `tts`: remote provider endpoints, models and credentials
/// - `storage`: archive bucket and backend
/// - `paths`: local scratch directories for one interview's artifacts
/// - `transcoder`: recording conversion settings
/// - `performance`: upload pool size and request limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub interview: InterviewConfig,
    pub llm: LlmConfig,
    pub tts: TtsConfig,
    pub storage: StorageConfig,
    pub paths: PathsConfig,
    pub transcoder: TranscoderConfig,
    pub performance: PerformanceConfig,
}

/// Server-specific configuration settings.
///
/// ## Common values:
/// - `host = "127.0.0.1"`: Only accept connections from localhost (development)
/// - `host = "0.0.0.0"`: Accept connections from any IP address (production)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// How the interviewer is primed and how the conversation is flattened into a prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewConfig {
    /// System persona placed at the top of every prompt
    pub persona: String,
    /// Label in front of candidate turns ("Candidate")
    pub candidate_label: String,
    /// Label in front of interviewer turns ("Katy")
    pub interviewer_label: String,
    /// Most recent exchanges sent with each prompt; 0 sends the whole interview
    pub max_history_exchanges: usize,
}

impl Default for InterviewConfig {
    fn default() -> Self {
        Self {
            persona: DEFAULT_PERSONA.to_string(),
            candidate_label: "Candidate".to_string(),
            interviewer_label: "Katy".to_string(),
            max_history_exchanges: 20,
        }
    }
}

/// Text-generation provider (OpenAI chat completions).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-3.5-turbo".to_string(),
            timeout_seconds: 60,
        }
    }
}

/// Speech-synthesis provider (ElevenLabs streaming TTS).
///
/// ## Fixed voice:
/// Every reply uses the same voice so the interviewer sounds like one person
/// across the whole interview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    pub base_url: String,
    pub api_key: String,
    pub voice_id: String,
    pub model_id: String,
    /// 0 (best quality) to 4 (lowest latency)
    pub optimize_streaming_latency: u8,
    pub output_format: String,
    pub timeout_seconds: u64,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.elevenlabs.io/v1".to_string(),
            api_key: String::new(),
            voice_id: "XfNU2rGpBa01ckF309OY".to_string(),
            model_id: "eleven_turbo_v2".to_string(),
            optimize_streaming_latency: 0,
            output_format: "mp3_22050_32".to_string(),
            timeout_seconds: 60,
        }
    }
}

/// Which object store implementation archives the artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Directory per bucket under `local_root`
    Local,
    /// Bearer-token object gateway at `endpoint`
    Http,
}

/// Archive bucket settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub bucket: String,
    /// Gateway URL (http backend)
    pub endpoint: String,
    pub api_key: String,
    /// Bucket root directory (local backend)
    pub local_root: PathBuf,
    /// Prefix of the public object URLs returned by `/get_files`
    pub public_base_url: String,
    pub timeout_seconds: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            bucket: "interviews".to_string(),
            endpoint: "http://127.0.0.1:9000".to_string(),
            api_key: String::new(),
            local_root: PathBuf::from("archive"),
            public_base_url: "http://127.0.0.1:8080/archive".to_string(),
            timeout_seconds: 120,
        }
    }
}

/// Local directories for one interview's artifacts.
///
/// The directory names double as object-key prefixes when archiving.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub transcripts: PathBuf,
    pub responses: PathBuf,
    pub uploads: PathBuf,
    pub audio: PathBuf,
    pub pre_recorded: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            transcripts: PathBuf::from("transcripts"),
            responses: PathBuf::from("response"),
            uploads: PathBuf::from("uploads"),
            audio: PathBuf::from("audio"),
            pre_recorded: PathBuf::from("pre_recorded_audio"),
        }
    }
}

impl PathsConfig {
    pub fn greeting_clip(&self) -> PathBuf {
        self.pre_recorded.join("begin_interview.mp3")
    }

    pub fn farewell_clip(&self) -> PathBuf {
        self.pre_recorded.join("end_interview.mp3")
    }
}

/// Recording conversion (ffmpeg) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscoderConfig {
    pub ffmpeg_path: String,
    pub bitrate: String,
    pub sample_rate: u32,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            bitrate: "192k".to_string(),
            sample_rate: 44100,
        }
    }
}

/// Performance tuning configuration.
///
/// ## Fields:
/// - `upload_workers`: Concurrent object uploads when archiving a directory
/// - `max_upload_bytes`: Largest multipart file accepted by the upload endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    pub upload_workers: usize,
    pub max_upload_bytes: usize,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            upload_workers: 4,
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

/// Provides default configuration values.
///
/// Default values ensure the application can start even if no configuration file exists.
/// Credentials are empty by default and must come from the environment.
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            interview: InterviewConfig::default(),
            llm: LlmConfig::default(),
            tts: TtsConfig::default(),
            storage: StorageConfig::default(),
            paths: PathsConfig::default(),
            transcoder: TranscoderConfig::default(),
            performance: PerformanceConfig::default(),
        }
    }
}

/// Plain environment variables mapped onto config keys, applied last.
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("HOST", "server.host"),
    ("PORT", "server.port"),
    ("OPENAI_API_KEY", "llm.api_key"),
    ("ELEVENLABS_API_KEY", "tts.api_key"),
    ("STORAGE_API_KEY", "storage.api_key"),
    ("STORAGE_ENDPOINT", "storage.endpoint"),
];

impl AppConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Configuration Loading Process:
    /// 1. Start with built-in defaults
    /// 2. Override with values from config.toml (if it exists)
    /// 3. Override with environment variables prefixed with APP_
    /// 4. Apply the plain deployment / credential variables in `ENV_OVERRIDES`
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );

        for (variable, key) in ENV_OVERRIDES {
            if let Ok(value) = env::var(variable) {
                settings = settings.set_override(*key, value)?;
            }
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// Missing provider credentials are not a validation failure; see
    /// `missing_credentials`, which the server reports at startup.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.performance.upload_workers == 0 {
            return Err(anyhow::anyhow!("Upload workers must be greater than 0"));
        }

        if self.performance.max_upload_bytes == 0 {
            return Err(anyhow::anyhow!("Max upload size must be greater than 0"));
        }

        if self.interview.persona.trim().is_empty() {
            return Err(anyhow::anyhow!("Interview persona cannot be empty"));
        }

        if self.interview.candidate_label.trim().is_empty() || self.interview.interviewer_label.trim().is_empty() {
            return Err(anyhow::anyhow!("Interview speaker labels cannot be empty"));
        }

        if self.llm.model.trim().is_empty() {
            return Err(anyhow::anyhow!("LLM model cannot be empty"));
        }

        if self.tts.voice_id.trim().is_empty() || self.tts.model_id.trim().is_empty() {
            return Err(anyhow::anyhow!("TTS voice and model must be set"));
        }

        if self.tts.optimize_streaming_latency > 4 {
            return Err(anyhow::anyhow!("TTS optimize_streaming_latency must be between 0 and 4"));
        }

        if self.storage.bucket.trim().is_empty() {
            return Err(anyhow::anyhow!("Storage bucket cannot be empty"));
        }

        Ok(())
    }

    /// Names of credentials the configured providers need but do not have.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.llm.api_key.is_empty() {
            missing.push("OPENAI_API_KEY");
        }
        if self.tts.api_key.is_empty() {
            missing.push("ELEVENLABS_API_KEY");
        }
        if self.storage.backend == StorageBackend::Http && self.storage.api_key.is_empty() {
            missing.push("STORAGE_API_KEY");
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test that the default configuration is valid and has expected values.
    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.llm.model, "gpt-3.5-turbo");
        assert_eq!(config.tts.output_format, "mp3_22050_32");
        assert!(config.validate().is_ok());
    }

    /// Test that validation catches invalid configurations.
    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.performance.upload_workers = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.tts.optimize_streaming_latency = 5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_credentials() {
        let mut config = AppConfig::default();
        assert_eq!(config.missing_credentials(), vec!["OPENAI_API_KEY", "ELEVENLABS_API_KEY"]);

        config.llm.api_key = "sk-test".to_string();
        config.tts.api_key = "xi-test".to_string();
        config.storage.backend = StorageBackend::Http;
        assert_eq!(config.missing_credentials(), vec!["STORAGE_API_KEY"]);
    }

    #[test]
    fn test_clip_locations() {
        let paths = PathsConfig::default();
        assert_eq!(paths.greeting_clip(), PathBuf::from("pre_recorded_audio/begin_interview.mp3"));
        assert_eq!(paths.farewell_clip(), PathBuf::from("pre_recorded_audio/end_interview.mp3"));
    }
}
