//! HTTP object gateway client.
//!
//! Talks to a small bearer-authenticated gateway in front of the bucket:
//! - `PUT    {endpoint}/{bucket}/{key}` uploads the request body
//! - `DELETE {endpoint}/{bucket}/{key}` removes an object (404 counts as done)
//! - `GET    {endpoint}/{bucket}` answers `{"keys": ["..."]}`

use super::{content_type_for, validate_key, ObjectStore, StorageError};
use crate::config::StorageConfig;
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    keys: Vec<String>,
}

pub struct HttpObjectStore {
    client: Client,
    endpoint: Url,
    api_key: String,
}

impl HttpObjectStore {
    pub fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|_| StorageError::InvalidEndpoint(config.endpoint.clone()))?;
        if endpoint.cannot_be_a_base() {
            return Err(StorageError::InvalidEndpoint(config.endpoint.clone()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key.clone(),
        })
    }

    /// `{endpoint}/{bucket}/{key segments...}` with each segment percent-encoded.
    fn object_url(&self, bucket: &str, key: Option<&str>) -> Result<Url, StorageError> {
        validate_key(bucket)?;
        if let Some(key) = key {
            validate_key(key)?;
        }

        let mut url = self.endpoint.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| StorageError::InvalidEndpoint(self.endpoint.to_string()))?;
            segments.pop_if_empty().push(bucket);
            if let Some(key) = key {
                segments.extend(key.split('/'));
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put(&self, local_path: &Path, bucket: &str, key: &str) -> Result<(), StorageError> {
        let url = self.object_url(bucket, Some(key))?;
        let body = tokio::fs::read(local_path)
            .await
            .map_err(|source| StorageError::Io {
                path: local_path.to_path_buf(),
                source,
            })?;
        let size = body.len();

        let response = self
            .client
            .put(url)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::CONTENT_TYPE, content_type_for(key))
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StorageError::Status {
                status: response.status().as_u16(),
                key: key.to_string(),
            });
        }
        debug!(bucket = %bucket, key = %key, bytes = size, "Object uploaded");
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        let url = self.object_url(bucket, Some(key))?;
        let response = self.client.delete(url).bearer_auth(&self.api_key).send().await?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Err(StorageError::Status {
            status: status.as_u16(),
            key: key.to_string(),
        })
    }

    async fn list(&self, bucket: &str) -> Result<Vec<String>, StorageError> {
        let url = self.object_url(bucket, None)?;
        let response = self.client.get(url).bearer_auth(&self.api_key).send().await?;

        if !response.status().is_success() {
            return Err(StorageError::Status {
                status: response.status().as_u16(),
                key: String::new(),
            });
        }

        let listing: ListResponse = response.json().await?;
        Ok(listing.keys)
    }

    fn backend(&self) -> &'static str {
        "http"
    }
}
