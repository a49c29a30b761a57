//! # Interview REST API Handlers
//!
//! The endpoints the interview frontend talks to.
//!
//! ## Available Endpoints:
//! - `GET /` - Liveness probe, `{"Hello":"World"}`
//! - `POST /upload` - Store a transcript without running a turn
//! - `POST /interview` - Store a transcript and answer it with spoken audio
//! - `POST /upload-audio` - Store a raw WebM recording of the candidate
//! - `POST /begin` - Start over and play the greeting
//! - `POST /end` - Wrap up, archive everything in the background, play the farewell
//! - `GET /get_files` - Archived artifacts grouped per exchange
//! - `DELETE /delete_interview` - Remove every archived object
//!
//! ## Serialization:
//! All session access goes through `AppState::session`. A turn keeps the lock
//! until its audio is on disk, so concurrent `/interview` calls queue up.

use super::multipart::read_file_field;
use crate::archive::{clear_directory, convert_recordings, upload_directory};
use crate::error::{AppError, AppResult};
use crate::interview::naming::response_name_for;
use crate::state::AppState;
use crate::storage::{build_catalog, ObjectStore};
use actix_multipart::Multipart;
use actix_web::http::header;
use actix_web::{web, HttpResponse};
use serde_json::json;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const AUDIO_MPEG: &str = "audio/mpeg";

/// Register the interview endpoints on an app or scope.
pub fn configure_interview_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(root))
        .route("/upload", web::post().to(upload_transcript))
        .route("/interview", web::post().to(interview))
        .route("/upload-audio", web::post().to(upload_audio))
        .route("/begin", web::post().to(begin_interview))
        .route("/end", web::post().to(end_interview))
        .route("/get_files", web::get().to(get_files))
        .route("/delete_interview", web::delete().to(delete_interview));
}

pub async fn root() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "Hello": "World" }))
}

/// ## Endpoint: `POST /upload`
///
/// Saves the `file` field under the transcripts directory.
pub async fn upload_transcript(state: web::Data<AppState>, payload: Multipart) -> AppResult<HttpResponse> {
    let config = state.get_config();
    let file = read_file_field(payload, config.performance.max_upload_bytes).await?;
    let path = file.save_to(&config.paths.transcripts).await?;
    info!(path = %path.display(), "Transcript saved");

    Ok(HttpResponse::Ok().json(json!({
        "info": "File saved",
        "filename": file.file_name
    })))
}

/// ## Endpoint: `POST /interview`
///
/// ## Request:
/// Multipart form with the candidate's transcript in `file`, named
/// `<prefix>_<timestamp>.txt`.
///
/// ## Response:
/// The interviewer's reply as `audio/mpeg`, also kept as `response_<timestamp>.mp3`.
/// If the reply was generated but could not be voiced, a 502 JSON error
/// carries the text in `error.reply_text`.
pub async fn interview(state: web::Data<AppState>, payload: Multipart) -> AppResult<HttpResponse> {
    let config = state.get_config();
    let file = read_file_field(payload, config.performance.max_upload_bytes).await?;
    // A name that cannot be correlated never reaches the transcripts directory
    response_name_for(&file.file_name).map_err(|err| AppError::ValidationError(err.to_string()))?;
    let transcript_path = file.save_to(&config.paths.transcripts).await?;

    state.begin_turn();
    let result = {
        let mut session = state.session.lock().await;
        state.processor.process_turn(&mut session, &transcript_path).await
    };
    state.finish_turn(result.is_ok());

    let outcome = result.map_err(|err| {
        warn!(transcript = %transcript_path.display(), error = %err, "Turn failed");
        AppError::from(err)
    })?;

    let file_name = outcome
        .response_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    debug!(response = %file_name, reply = %outcome.reply_text, "Sending interviewer reply");
    Ok(audio_response(&file_name, outcome.audio_bytes))
}

/// ## Endpoint: `POST /upload-audio`
///
/// Saves the candidate's raw recording; it is converted when the interview ends.
pub async fn upload_audio(state: web::Data<AppState>, payload: Multipart) -> AppResult<HttpResponse> {
    let config = state.get_config();
    let file = read_file_field(payload, config.performance.max_upload_bytes).await?;
    let path = file.save_to(&config.paths.uploads).await?;
    info!(path = %path.display(), size_bytes = file.bytes.len(), "Recording saved");

    Ok(HttpResponse::Ok().json(json!({
        "message": "File uploaded successfully",
        "filePath": path.display().to_string()
    })))
}

/// ## Endpoint: `POST /begin`
pub async fn begin_interview(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    state.session.lock().await.reset();
    info!("Interview started, session reset");
    serve_clip(&state.get_config().paths.greeting_clip()).await
}

/// ## Endpoint: `POST /end`
///
/// ## Steps:
/// 1. Reset the session
/// 2. Convert the WebM recordings in uploads to mp3 in the audio directory
/// 3. Schedule archiving of the audio, response and transcripts directories
/// 4. Empty the uploads directory, keeping recordings that failed to convert
/// 5. Return the farewell clip
///
/// Conversion and clearing failures are logged, not returned; the farewell
/// still plays. Archiving finishes after the response is sent.
pub async fn end_interview(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let config = state.get_config();
    state.session.lock().await.reset();

    // Recordings that failed to convert stay in uploads for a later attempt
    let unconverted = match convert_recordings(state.transcoder.as_ref(), &config.paths.uploads, &config.paths.audio).await {
        Ok(report) if !report.is_clean() => {
            warn!(converted = report.succeeded.len(), failed = report.failed.len(), "Some recordings were not converted");
            Some(report.failed_paths())
        }
        Ok(report) => {
            info!(converted = report.succeeded.len(), "Recordings converted");
            Some(Vec::new())
        }
        Err(err) => {
            error!(error = %err, "Could not read the uploads directory");
            None
        }
    };

    let dirs = vec![
        config.paths.audio.clone(),
        config.paths.responses.clone(),
        config.paths.transcripts.clone(),
    ];
    tokio::spawn(archive_directories(
        Arc::clone(&state.store),
        dirs,
        config.storage.bucket.clone(),
        config.performance.upload_workers,
    ));

    if let Some(keep) = unconverted {
        if let Err(err) = clear_directory(&config.paths.uploads, &keep).await {
            error!(error = %err, "Could not clear the uploads directory");
        }
    }

    serve_clip(&config.paths.farewell_clip()).await
}

/// ## Endpoint: `GET /get_files`
///
/// ## Response:
/// ```json
/// [
///   {
///     "timestamp": 1718000000000,
///     "transcript": "https://.../transcripts%2FTranscript_1718000000000.txt",
///     "response": "https://.../response%2Fresponse_1718000000000.mp3",
///     "audio": "https://.../audio%2Frecording_1718000000000.mp3"
///   }
/// ]
/// ```
pub async fn get_files(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let config = state.get_config();
    let keys = state.store.list(&config.storage.bucket).await?;
    let catalog = build_catalog(&keys, &config.storage.public_base_url);
    Ok(HttpResponse::Ok().json(catalog))
}

/// ## Endpoint: `DELETE /delete_interview`
///
/// Deletes every key in the bucket. Keys that fail are reported and the rest
/// are still attempted.
pub async fn delete_interview(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let bucket = &state.get_config().storage.bucket;
    let keys = state.store.list(bucket).await?;

    let mut deleted = 0usize;
    let mut failed = Vec::new();
    for key in &keys {
        match state.store.delete(bucket, key).await {
            Ok(()) => deleted += 1,
            Err(err) => {
                warn!(key = %key, error = %err, "Failed to delete object");
                failed.push(json!({ "key": key, "error": err.to_string() }));
            }
        }
    }
    info!(deleted, failed = failed.len(), "Archive deleted");

    let message = if failed.is_empty() {
        "All files deleted successfully"
    } else {
        "Some files could not be deleted"
    };
    Ok(HttpResponse::Ok().json(json!({
        "message": message,
        "deleted": deleted,
        "failed": failed
    })))
}

async fn archive_directories(store: Arc<dyn ObjectStore>, dirs: Vec<PathBuf>, bucket: String, workers: usize) {
    for dir in dirs {
        match upload_directory(Arc::clone(&store), &dir, &bucket, workers).await {
            Ok(report) if !report.is_clean() => {
                for failure in &report.failed {
                    warn!(path = %failure.path, error = %failure.error, "File left for a later upload");
                }
            }
            Ok(report) => debug!(dir = %dir.display(), files = report.total(), "Directory archived"),
            Err(err) => error!(dir = %dir.display(), error = %err, "Directory could not be archived"),
        }
    }
}

async fn serve_clip(path: &Path) -> AppResult<HttpResponse> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            error!(path = %path.display(), "Pre-recorded clip is missing");
            return Err(AppError::Internal(format!("Audio clip {} is missing", path.display())));
        }
        Err(err) => return Err(err.into()),
    };

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(audio_response(&file_name, bytes))
}

fn audio_response(file_name: &str, bytes: Vec<u8>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type(AUDIO_MPEG)
        .insert_header((header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", file_name)))
        .body(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::transcode::TranscodeError;
    use crate::archive::Transcoder;
    use crate::config::AppConfig;
    use crate::interview::TurnProcessor;
    use crate::providers::{AudioStream, ProviderError, SpeechSynthesizer, TextGenerator};
    use crate::storage::LocalObjectStore;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures::stream::{self, StreamExt};
    use std::time::Duration;

    const REPLY: &str = "Thanks. What drew you to this role?";
    const AUDIO: &[u8] = b"ID3-reply-audio";

    struct CannedGenerator {
        fail: bool,
    }

    #[async_trait]
    impl TextGenerator for CannedGenerator {
        async fn complete(&self, _prompt: &str) -> Result<String, ProviderError> {
            if self.fail {
                return Err(ProviderError::Status {
                    provider: "openai",
                    status: 429,
                    body: "rate limited".to_string(),
                });
            }
            Ok(REPLY.to_string())
        }

        fn model(&self) -> &str {
            "canned"
        }
    }

    struct CannedSynthesizer;

    #[async_trait]
    impl SpeechSynthesizer for CannedSynthesizer {
        async fn synthesize(&self, _text: &str) -> Result<AudioStream, ProviderError> {
            let chunks: Vec<Result<Bytes, ProviderError>> = vec![Ok(Bytes::from_static(AUDIO))];
            Ok(stream::iter(chunks).boxed())
        }

        fn voice(&self) -> &str {
            "canned"
        }
    }

    /// Copies input to output; names containing "corrupt" fail.
    struct CopyTranscoder;

    #[async_trait]
    impl Transcoder for CopyTranscoder {
        async fn transcode(&self, input: &Path, output: &Path) -> Result<(), TranscodeError> {
            if input.to_string_lossy().contains("corrupt") {
                return Err(TranscodeError::Failed {
                    program: "copy".to_string(),
                    status: "exit status: 1".to_string(),
                    stderr: "Invalid data found when processing input".to_string(),
                });
            }
            tokio::fs::copy(input, output).await.unwrap();
            Ok(())
        }
    }

    fn test_state(root: &Path, generator_fails: bool) -> AppState {
        let mut config = AppConfig::default();
        config.paths.transcripts = root.join("transcripts");
        config.paths.responses = root.join("response");
        config.paths.uploads = root.join("uploads");
        config.paths.audio = root.join("audio");
        config.paths.pre_recorded = root.join("pre_recorded_audio");
        config.storage.public_base_url = "https://files.test".to_string();

        std::fs::create_dir_all(&config.paths.pre_recorded).unwrap();
        std::fs::write(config.paths.greeting_clip(), b"hello-clip").unwrap();
        std::fs::write(config.paths.farewell_clip(), b"goodbye-clip").unwrap();

        let processor = TurnProcessor::new(
            Arc::new(CannedGenerator { fail: generator_fails }),
            Arc::new(CannedSynthesizer),
            config.paths.responses.clone(),
        );
        let store = Arc::new(LocalObjectStore::new(root.join("buckets")));
        AppState::new(config, processor, store, Arc::new(CopyTranscoder))
    }

    fn multipart_request(uri: &str, file_name: &str, content: &str) -> test::TestRequest {
        let boundary = "----interview-test-boundary";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\nContent-Type: application/octet-stream\r\n\r\n{content}\r\n--{b}--\r\n",
            b = boundary,
            name = file_name,
            content = content
        );
        test::TestRequest::post()
            .uri(uri)
            .insert_header((header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", boundary)))
            .set_payload(body)
    }

    #[actix_web::test]
    async fn test_root() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state(dir.path(), false)))
                .configure(configure_interview_routes),
        )
        .await;

        let body: serde_json::Value = test::call_and_read_body_json(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(body, json!({ "Hello": "World" }));
    }

    #[actix_web::test]
    async fn test_interview_turn_returns_audio() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), false);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .configure(configure_interview_routes),
        )
        .await;

        let req = multipart_request("/interview", "Transcript_1718000000000.txt", "I have five years of Rust.").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get(header::CONTENT_TYPE).unwrap(), AUDIO_MPEG);

        let body = test::read_body(resp).await;
        assert_eq!(body.as_ref(), AUDIO);
        assert_eq!(
            std::fs::read(dir.path().join("response/response_1718000000000.mp3")).unwrap(),
            AUDIO
        );
        assert!(dir.path().join("transcripts/Transcript_1718000000000.txt").exists());

        let session = state.session.lock().await;
        assert_eq!(session.len(), 3);
        assert_eq!(state.get_metrics_snapshot().turns_completed, 1);
    }

    #[actix_web::test]
    async fn test_interview_rejects_unparseable_name() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), false);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .configure(configure_interview_routes),
        )
        .await;

        let resp = test::call_service(&app, multipart_request("/interview", "notes.txt", "hi").to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["type"], "validation_error");
        assert!(!dir.path().join("transcripts/notes.txt").exists());
        assert_eq!(state.session.lock().await.len(), 1);

        // Nothing from the rejected upload reaches the bucket either
        let resp = test::call_service(&app, test::TestRequest::post().uri("/end").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        tokio::time::sleep(Duration::from_millis(100)).await;
        let keys = state.store.list(&state.get_config().storage.bucket).await.unwrap();
        assert!(keys.is_empty(), "unexpected keys {:?}", keys);
    }

    #[actix_web::test]
    async fn test_generation_failure_is_bad_gateway() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), true);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .configure(configure_interview_routes),
        )
        .await;

        let req = multipart_request("/interview", "Transcript_42.txt", "Hello").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["type"], "upstream_error");
        assert_eq!(state.session.lock().await.len(), 1);
        assert_eq!(state.get_metrics_snapshot().turns_failed, 1);
    }

    #[actix_web::test]
    async fn test_upload_strips_directories_from_name() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state(dir.path(), false)))
                .configure(configure_interview_routes),
        )
        .await;

        let req = multipart_request("/upload", "../../Transcript_7.txt", "text").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["filename"], "Transcript_7.txt");
        assert!(dir.path().join("transcripts/Transcript_7.txt").exists());
    }

    #[actix_web::test]
    async fn test_begin_resets_session_and_plays_greeting() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), false);
        state.session.lock().await.record_exchange("hi", "hello");
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .configure(configure_interview_routes),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::post().uri("/begin").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(test::read_body(resp).await.as_ref(), b"hello-clip");
        assert_eq!(state.session.lock().await.len(), 1);
    }

    #[actix_web::test]
    async fn test_end_archives_and_clears_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), false);
        std::fs::create_dir_all(dir.path().join("uploads")).unwrap();
        std::fs::write(dir.path().join("uploads/recording_99.webm"), b"webm").unwrap();
        std::fs::create_dir_all(dir.path().join("transcripts")).unwrap();
        std::fs::write(dir.path().join("transcripts/Transcript_99.txt"), b"bye").unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .configure(configure_interview_routes),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::post().uri("/end").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(test::read_body(resp).await.as_ref(), b"goodbye-clip");
        assert_eq!(std::fs::read_dir(dir.path().join("uploads")).unwrap().count(), 0);

        // Archiving runs after the response; wait for it to land
        let bucket = state.get_config().storage.bucket.clone();
        let mut keys = Vec::new();
        for _ in 0..100 {
            keys = state.store.list(&bucket).await.unwrap();
            if keys.len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        keys.sort();
        assert_eq!(keys, vec!["audio/recording_99.mp3".to_string(), "transcripts/Transcript_99.txt".to_string()]);
    }

    #[actix_web::test]
    async fn test_end_keeps_recordings_that_failed_to_convert() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), false);
        std::fs::create_dir_all(dir.path().join("uploads")).unwrap();
        std::fs::write(dir.path().join("uploads/recording_1.webm"), b"good").unwrap();
        std::fs::write(dir.path().join("uploads/corrupt_2.webm"), b"bad").unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .configure(configure_interview_routes),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::post().uri("/end").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(dir.path().join("audio/recording_1.mp3").exists());
        assert!(!dir.path().join("uploads/recording_1.webm").exists());
        assert_eq!(std::fs::read(dir.path().join("uploads/corrupt_2.webm")).unwrap(), b"bad");
    }

    #[actix_web::test]
    async fn test_get_files_and_delete_interview() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), false);
        let bucket = state.get_config().storage.bucket.clone();
        let scratch = dir.path().join("scratch.txt");
        std::fs::write(&scratch, b"x").unwrap();
        for key in ["transcripts/Transcript_5.txt", "response/response_5.mp3", "audio/recording_3.mp3"] {
            state.store.put(&scratch, &bucket, key).await.unwrap();
        }

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .configure(configure_interview_routes),
        )
        .await;

        let catalog: serde_json::Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri("/get_files").to_request()).await;
        assert_eq!(catalog.as_array().unwrap().len(), 2);
        assert_eq!(catalog[0]["timestamp"], 3);
        assert_eq!(catalog[1]["response"], "https://files.test/response%2Fresponse_5.mp3");

        let deleted: serde_json::Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::delete().uri("/delete_interview").to_request(),
        )
        .await;
        assert_eq!(deleted["deleted"], 3);
        assert!(state.store.list(&bucket).await.unwrap().is_empty());
    }
}
