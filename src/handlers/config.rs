use crate::{config::AppConfig, error::AppError, state::AppState};
use actix_web::{web, HttpResponse};
use serde_json::json;

/// Shown in place of a credential that is set.
const REDACTED: &str = "********";

/// ## Endpoint: `GET /api/v1/config`
///
/// The effective configuration with every credential masked. The persona is
/// included so the running interviewer can be checked without shell access.
pub async fn get_config(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let config = redacted(state.get_config())?;

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "config": config
    })))
}

fn redacted(config: &AppConfig) -> Result<serde_json::Value, AppError> {
    let mut value = serde_json::to_value(config).map_err(|e| AppError::Internal(e.to_string()))?;

    for section in ["llm", "tts", "storage"] {
        if let Some(key) = value.get_mut(section).and_then(|s| s.get_mut("api_key")) {
            let is_set = key.as_str().map(|k| !k.is_empty()).unwrap_or(false);
            *key = if is_set { json!(REDACTED) } else { json!("") };
        }
    }

    Ok(value)
}
