//! AWS Signature Version 4 request signing
//!
//! Signs path-style requests against an S3-compatible endpoint. The region is
//! fixed to `auto`, which is what R2-style stores expect.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Url;
use sha2::Sha256;

use crate::config::StorageConfig;
use crate::error::{ConfigError, StorageError};
use crate::integrity::sha256_hex;

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";
pub const REGION: &str = "auto";
pub const SERVICE: &str = "s3";

const AMZ_DATE_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// A single-use, fully authorized request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    pub method: String,
    /// URI-escaped canonical path
    pub path: String,
    /// Signed headers, lower-cased and sorted
    pub headers: Vec<(String, String)>,
    pub signed_headers: String,
    pub content_sha256: String,
    pub amz_date: String,
    pub authorization: String,
}

impl SignedRequest {
    /// Headers the client must set explicitly
    ///
    /// `host` is left out because the HTTP client derives the same value from
    /// the request URL.
    pub fn wire_headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .filter(|(name, _)| name != "host")
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .chain(std::iter::once(("authorization", self.authorization.as_str())))
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// SigV4 signer bound to one set of credentials and one endpoint
#[derive(Clone)]
pub struct SigV4Signer {
    access_key: String,
    secret_key: String,
    endpoint: Url,
    host: String,
    region: String,
}

impl std::fmt::Debug for SigV4Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigV4Signer")
            .field("access_key", &self.access_key)
            .field("endpoint", &self.endpoint.as_str())
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

impl SigV4Signer {
    /// Fails when credentials or endpoint are absent or unusable
    pub fn new(config: &StorageConfig) -> Result<Self, ConfigError> {
        if config.access_key.trim().is_empty() {
            return Err(ConfigError::Missing("S3_ACCESS_KEY"));
        }
        if config.secret_key.trim().is_empty() {
            return Err(ConfigError::Missing("S3_SECRET_KEY"));
        }
        if config.endpoint.trim().is_empty() {
            return Err(ConfigError::Missing("S3_ENDPOINT"));
        }

        let endpoint = Url::parse(config.endpoint.trim()).map_err(|e| ConfigError::Invalid {
            name: "S3_ENDPOINT",
            reason: e.to_string(),
        })?;

        let host = match (endpoint.host_str(), endpoint.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(ConfigError::Invalid {
                    name: "S3_ENDPOINT",
                    reason: "endpoint has no host".to_string(),
                })
            }
        };

        Ok(Self {
            access_key: config.access_key.trim().to_string(),
            secret_key: config.secret_key.trim().to_string(),
            endpoint,
            host,
            region: REGION.to_string(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Canonical `host` header value, including any non-default port
    pub fn host(&self) -> &str {
        &self.host
    }

    #[cfg(test)]
    fn with_region(mut self, region: &str) -> Self {
        self.region = region.to_string();
        self
    }

    /// Sign a request at the current time
    pub fn sign(
        &self,
        method: &str,
        object_key: &str,
        headers: &[(&str, &str)],
        body: &[u8],
    ) -> Result<SignedRequest, StorageError> {
        self.sign_at(method, object_key, headers, body, Utc::now())
    }

    /// Sign a request at an explicit time
    pub fn sign_at(
        &self,
        method: &str,
        object_key: &str,
        headers: &[(&str, &str)],
        body: &[u8],
        at: DateTime<Utc>,
    ) -> Result<SignedRequest, StorageError> {
        let method = method.to_ascii_uppercase();
        let path = uri_escape_path(&format!("/{}", object_key.trim_start_matches('/')));

        let amz_date = at.format(AMZ_DATE_FORMAT).to_string();
        let date_stamp = &amz_date[..8];
        let content_sha256 = sha256_hex(body);

        // The signer owns host, date and payload hash; callers cannot override them
        let mut canonical: BTreeMap<String, String> = headers
            .iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value.trim().to_string()))
            .collect();
        canonical.insert("host".to_string(), self.host.clone());
        canonical.insert("x-amz-date".to_string(), amz_date.clone());
        canonical.insert("x-amz-content-sha256".to_string(), content_sha256.clone());

        let canonical_headers: String = canonical
            .iter()
            .map(|(name, value)| format!("{}:{}\n", name, value))
            .collect();
        let signed_headers = canonical.keys().map(String::as_str).collect::<Vec<_>>().join(";");

        let canonical_request = format!(
            "{}\n{}\n\n{}\n{}\n{}",
            method, path, canonical_headers, signed_headers, content_sha256
        );

        let credential_scope = format!("{}/{}/{}/aws4_request", date_stamp, self.region, SERVICE);
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            amz_date,
            credential_scope,
            sha256_hex(&canonical_request)
        );

        let signing_key = derive_signing_key(&self.secret_key, date_stamp, &self.region, SERVICE)?;
        let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes())?);

        let authorization = format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM, self.access_key, credential_scope, signed_headers, signature
        );

        tracing::trace!(%method, %path, %signed_headers, "Request signed");

        Ok(SignedRequest {
            method,
            path,
            headers: canonical.into_iter().collect(),
            signed_headers,
            content_sha256,
            amz_date,
            authorization,
        })
    }
}

/// Percent-encode a path, leaving `/` separators intact
///
/// Every byte outside `A-Z a-z 0-9 - _ . ~` is encoded, segment by segment.
pub fn uri_escape_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Derive the SigV4 signing key for one day, region and service
pub fn derive_signing_key(
    secret_key: &str,
    date_stamp: &str,
    region: &str,
    service: &str,
) -> Result<Vec<u8>, StorageError> {
    let k_date = hmac_sha256(format!("AWS4{}", secret_key).as_bytes(), date_stamp.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}

fn hmac_sha256(key: &[u8], message: &[u8]) -> Result<Vec<u8>, StorageError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| StorageError::Signing(format!("HMAC error: {}", e)))?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().to_vec())
}
