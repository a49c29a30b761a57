//! # Application State Management
//!
//! This module manages shared state that needs to be accessed by multiple HTTP request handlers
//! simultaneously: the one interview session, the collaborators that run turns and archive
//! artifacts, and request metrics.
//!
//! ## Key Rust Concepts:
//!
//! ### Arc (Atomically Reference Counted)
//! - **Purpose**: Lets every worker thread share the same session, store and metrics
//! - **Cloning**: `AppState` is cloned per worker; the clones point at the same data
//!
//! ### tokio::sync::Mutex for the Session
//! - **Purpose**: A turn awaits the text generator and the synthesizer while it holds the
//!   session, so the lock must be held across `.await` points
//! - **Effect**: Two `/interview` requests never interleave; the second waits for the first
//!
//! ### RwLock for Metrics
//! - **Purpose**: Many readers (health/metrics endpoints) or one writer (middleware)
//! - **Never held across await**: Metric updates are a few integer additions
//!
//! ### Trait Objects (`Arc<dyn ObjectStore>`)
//! - **Purpose**: The handlers don't care whether objects go to a local directory or a
//!   remote gateway, and tests swap in fakes

use crate::archive::{FfmpegTranscoder, Transcoder};
use crate::config::{AppConfig, StorageBackend};
use crate::interview::{Session, TurnProcessor};
use crate::providers::{ElevenLabsSynthesizer, OpenAiGenerator};
use crate::storage::{HttpObjectStore, LocalObjectStore, ObjectStore};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;
use tokio::sync::Mutex;

/// The main application state that's shared across all HTTP request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration, fixed at startup
    pub config: Arc<AppConfig>,

    /// Performance metrics (constantly being updated by requests)
    pub metrics: Arc<RwLock<AppMetrics>>,

    /// When the server started (never changes, so no Arc<RwLock> needed)
    pub start_time: Instant,

    /// The single interview in progress
    pub session: Arc<Mutex<Session>>,

    /// Transcript → reply → audio pipeline
    pub processor: TurnProcessor,

    /// Archive bucket
    pub store: Arc<dyn ObjectStore>,

    /// Recording converter used when an interview ends
    pub transcoder: Arc<dyn Transcoder>,
}

/// Performance metrics collected across all HTTP requests.
///
/// ## Why these metrics matter:
/// - **request_count / error_count**: Overall load and reliability
/// - **turns_completed / turns_failed**: How often the providers let a turn through
/// - **active_turns**: Turns currently running or waiting for the session
/// - **endpoint_metrics**: Per-endpoint statistics
#[derive(Debug, Default, Clone)]
pub struct AppMetrics {
    pub request_count: u64,
    pub error_count: u64,
    pub turns_completed: u64,
    pub turns_failed: u64,
    pub active_turns: u32,
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Detailed performance metrics for a specific API endpoint.
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

impl AppState {
    /// Create a new AppState around already-built collaborators.
    ///
    /// The session starts fresh from the interview section of `config`.
    pub fn new(
        config: AppConfig,
        processor: TurnProcessor,
        store: Arc<dyn ObjectStore>,
        transcoder: Arc<dyn Transcoder>,
    ) -> Self {
        let session = Session::from_config(&config.interview);
        Self {
            config: Arc::new(config),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
            session: Arc::new(Mutex::new(session)),
            processor,
            store,
            transcoder,
        }
    }

    /// Build the production collaborators described by `config`.
    ///
    /// ## What this wires up:
    /// - OpenAI chat completions as the text generator
    /// - ElevenLabs streaming TTS as the synthesizer
    /// - The configured object store backend
    /// - ffmpeg for recording conversion
    pub fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let generator = Arc::new(OpenAiGenerator::new(&config.llm)?);
        let synthesizer = Arc::new(ElevenLabsSynthesizer::new(&config.tts)?);
        let processor = TurnProcessor::new(generator, synthesizer, config.paths.responses.clone());

        let store: Arc<dyn ObjectStore> = match config.storage.backend {
            StorageBackend::Local => Arc::new(LocalObjectStore::new(config.storage.local_root.clone())),
            StorageBackend::Http => Arc::new(HttpObjectStore::new(&config.storage)?),
        };
        let transcoder = Arc::new(FfmpegTranscoder::new(&config.transcoder));

        Ok(Self::new(config, processor, store, transcoder))
    }

    /// Get the current configuration.
    pub fn get_config(&self) -> &AppConfig {
        &self.config
    }

    // A panic while holding the metrics lock leaves plain counters behind,
    // which are still fine to read and update.
    fn metrics_read(&self) -> RwLockReadGuard<'_, AppMetrics> {
        self.metrics.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn metrics_write(&self) -> RwLockWriteGuard<'_, AppMetrics> {
        self.metrics.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Increment the total request counter (called by middleware for every request).
    pub fn increment_request_count(&self) {
        self.metrics_write().request_count += 1;
    }

    /// Increment the total error counter (any 4xx/5xx response).
    pub fn increment_error_count(&self) {
        self.metrics_write().error_count += 1;
    }

    /// Record detailed metrics for a specific endpoint.
    ///
    /// ## Parameters:
    /// - **endpoint**: The API endpoint (e.g., "POST /interview")
    /// - **duration_ms**: How long the request took to process (in milliseconds)
    /// - **is_error**: Whether this request resulted in an error
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.metrics_write();
        let endpoint_metric = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();

        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;

        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    /// A turn request arrived and is about to wait for the session.
    pub fn begin_turn(&self) {
        self.metrics_write().active_turns += 1;
    }

    /// A turn finished, successfully or not.
    ///
    /// ## Safety check:
    /// Includes a check to prevent underflow of `active_turns`.
    pub fn finish_turn(&self, succeeded: bool) {
        let mut metrics = self.metrics_write();
        if metrics.active_turns > 0 {
            metrics.active_turns -= 1;
        }
        if succeeded {
            metrics.turns_completed += 1;
        } else {
            metrics.turns_failed += 1;
        }
    }

    /// Get a snapshot of current metrics (used for the /metrics endpoint).
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        self.metrics_read().clone()
    }

    /// Get server uptime in seconds.
    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl EndpointMetric {
    /// Average response time for this endpoint.
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    /// Error rate for this endpoint (0.0 to 1.0).
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}
