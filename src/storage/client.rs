//! S3-compatible object store client
//!
//! Plain `reqwest` requests signed with [`SigV4Signer`]. Only the calls the
//! upload pipeline needs are implemented.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, CONTENT_LENGTH, CONTENT_TYPE, ETAG, LAST_MODIFIED};
use reqwest::{Method, Response, StatusCode, Url};

use crate::config::StorageConfig;
use crate::error::{ConfigError, StorageError};

use super::signer::{SigV4Signer, SignedRequest};
use super::types::{ObjectMetadata, PutResult, StorageObject};

/// Bound on a single request unless the caller sets one
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Object Store Trait
// ============================================================================

/// Trait for object storage backends
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store an object under `key`
    async fn put_object(
        &self,
        key: &str,
        body: &[u8],
        content_type: &str,
    ) -> Result<PutResult, StorageError>;

    /// Get object metadata (HEAD request)
    async fn head_object(&self, key: &str) -> Result<ObjectMetadata, StorageError>;

    /// Get an object's data
    async fn get_object(&self, key: &str) -> Result<StorageObject, StorageError>;
}

// ============================================================================
// HTTP Object Store
// ============================================================================

/// Object store reached over HTTP with SigV4 authorization
#[derive(Debug, Clone)]
pub struct HttpObjectStore {
    client: reqwest::Client,
    signer: SigV4Signer,
    bucket: Option<String>,
    timeout: Duration,
}

impl HttpObjectStore {
    pub fn new(config: &StorageConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            client: reqwest::Client::new(),
            signer: SigV4Signer::new(config)?,
            bucket: config
                .bucket
                .as_deref()
                .map(|b| b.trim_matches('/').to_string())
                .filter(|b| !b.is_empty()),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn bucket(&self) -> Option<&str> {
        self.bucket.as_deref()
    }

    /// Path-style object path: endpoint path, bucket, then key
    pub fn object_path(&self, key: &str) -> String {
        let base = self.signer.endpoint().path().trim_matches('/');
        [base, self.bucket.as_deref().unwrap_or(""), key.trim_start_matches('/')]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("/")
    }

    fn request_url(&self, signed: &SignedRequest) -> Url {
        let mut url = self.signer.endpoint().clone();
        url.set_path(&signed.path);
        url.set_query(None);
        url
    }

    async fn send(
        &self,
        method: Method,
        key: &str,
        headers: &[(&str, &str)],
        body: &[u8],
    ) -> Result<Response, StorageError> {
        let signed = self
            .signer
            .sign(method.as_str(), &self.object_path(key), headers, body)?;
        let url = self.request_url(&signed);

        tracing::debug!(method = %method, url = %url, "Sending signed request");

        let mut request = self.client.request(method, url).timeout(self.timeout);
        for (name, value) in signed.wire_headers() {
            request = request.header(name, value);
        }
        if !body.is_empty() {
            request = request.body(body.to_vec());
        }

        request
            .send()
            .await
            .map_err(|e| StorageError::from_transport(e, self.timeout))
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put_object(
        &self,
        key: &str,
        body: &[u8],
        content_type: &str,
    ) -> Result<PutResult, StorageError> {
        let response = self
            .send(Method::PUT, key, &[("content-type", content_type)], body)
            .await?;
        let status = response.status();

        if !status.is_success() {
            return Err(error_from_response(key, response).await);
        }

        tracing::info!(key = %key, status = status.as_u16(), bytes = body.len(), "Object stored");

        Ok(PutResult {
            key: key.to_string(),
            status: status.as_u16(),
            etag: header_string(response.headers(), ETAG.as_str()),
        })
    }

    async fn head_object(&self, key: &str) -> Result<ObjectMetadata, StorageError> {
        let response = self.send(Method::HEAD, key, &[], b"").await?;

        if !response.status().is_success() {
            return Err(error_from_response(key, response).await);
        }

        Ok(metadata_from_headers(key, response.headers()))
    }

    async fn get_object(&self, key: &str) -> Result<StorageObject, StorageError> {
        let response = self.send(Method::GET, key, &[], b"").await?;

        if !response.status().is_success() {
            return Err(error_from_response(key, response).await);
        }

        let mut metadata = metadata_from_headers(key, response.headers());
        let data = response
            .bytes()
            .await
            .map_err(|e| StorageError::from_transport(e, self.timeout))?
            .to_vec();
        metadata.size = data.len() as u64;

        Ok(StorageObject { metadata, data })
    }
}

async fn error_from_response(key: &str, response: Response) -> StorageError {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return StorageError::ObjectNotFound(key.to_string());
    }

    let body = response.text().await.unwrap_or_default();
    tracing::warn!(key = %key, status = status.as_u16(), "Object store rejected request");

    StorageError::Http {
        status: status.as_u16(),
        body,
    }
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

fn metadata_from_headers(key: &str, headers: &HeaderMap) -> ObjectMetadata {
    ObjectMetadata {
        key: key.to_string(),
        size: header_string(headers, CONTENT_LENGTH.as_str())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0),
        last_modified: header_string(headers, LAST_MODIFIED.as_str())
            .and_then(|v| parse_http_date(&v)),
        content_type: header_string(headers, CONTENT_TYPE.as_str()),
        etag: header_string(headers, ETAG.as_str()),
    }
}

fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
