//! Upload pipeline types

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::cleaner::CleanStats;
use crate::integrity::{sha256_hex, IntegrityReport, StoredDocument};
use crate::storage::ObjectMetadata;

/// Content type of every uploaded snapshot
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Payload destined for storage
///
/// The body is serialized and hashed once; there is no way to change it
/// afterwards.
#[derive(Debug, Clone)]
pub struct UploadObject {
    key: String,
    body: Vec<u8>,
    content_hash: String,
}

impl UploadObject {
    pub fn new(
        key: impl Into<String>,
        document: &StoredDocument,
    ) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(document)?;
        let content_hash = sha256_hex(&body);
        Ok(Self {
            key: key.into(),
            body,
            content_hash,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Hex SHA-256 of the body
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    pub fn size(&self) -> usize {
        self.body.len()
    }
}

/// Steps of one pipeline run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Capturing,
    Cleaning,
    Correcting,
    Hashing,
    /// The immutable body is handed to the store, which signs each request
    /// (PUT, HEAD and GET) at send time; no signature is kept in the report
    Signing,
    Uploading,
    Verifying,
    Reporting,
    Done,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::Capturing => "capturing",
            PipelineState::Cleaning => "cleaning",
            PipelineState::Correcting => "correcting",
            PipelineState::Hashing => "hashing",
            PipelineState::Signing => "signing",
            PipelineState::Uploading => "uploading",
            PipelineState::Verifying => "verifying",
            PipelineState::Reporting => "reporting",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Outcome of the PUT
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub success: bool,
    pub status: Option<u16>,
    pub etag: Option<String>,
    pub size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of the HEAD and read-back
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub exists: bool,
    pub metadata: Option<ObjectMetadata>,
    /// Stored size equals uploaded size
    pub size_matches: Option<bool>,
    /// Read-back body hashes to the uploaded content hash
    pub checksum_matches: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VerificationResult {
    pub fn missing(error: impl Into<String>) -> Self {
        Self {
            exists: false,
            metadata: None,
            size_matches: None,
            checksum_matches: None,
            error: Some(error.into()),
        }
    }
}

/// Final report of a run that reached the store
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReport {
    pub run_id: Uuid,
    pub url: String,
    pub title: String,
    pub object_key: String,
    pub content_hash: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// States visited, in order
    pub states: Vec<PipelineState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clean_stats: Option<CleanStats>,
    pub corrected: bool,
    pub upload: UploadResult,
    pub verification: VerificationResult,
    pub integrity: IntegrityReport,
    pub recommendations: Vec<String>,
}

impl UploadReport {
    /// The authoritative pass/fail signal for the stored data
    pub fn is_valid(&self) -> bool {
        self.integrity.valid
    }
}

/// Free-text advice derived from whatever results a run produced
pub fn recommendations(
    upload: &UploadResult,
    verification: Option<&VerificationResult>,
    integrity: Option<&IntegrityReport>,
) -> Vec<String> {
    let mut advice = Vec::new();

    if !upload.success {
        advice.push("Review upload configuration: endpoint, bucket and credentials".to_string());
        match upload.status {
            Some(401) | Some(403) => advice.push(
                "Check that the access key may write to the bucket \
                 and that the system clock is accurate"
                    .to_string(),
            ),
            Some(404) => advice.push("Check that the bucket exists".to_string()),
            None => advice.push("Check network connectivity to the object store".to_string()),
            _ => {}
        }
        return advice;
    }

    if let Some(verification) = verification {
        if !verification.exists {
            advice.push("Verify the file was truly saved in the bucket".to_string());
        }
        if verification.size_matches == Some(false) {
            advice.push(
                "Stored object size differs from the uploaded size; upload the page again"
                    .to_string(),
            );
        }
        if verification.checksum_matches == Some(false) {
            advice.push(
                "Stored object content does not match the uploaded checksum; \
                 upload the page again"
                    .to_string(),
            );
        }
    }

    if let Some(integrity) = integrity {
        if !integrity.valid && integrity.stats.is_some() {
            advice.push(
                "Review the integrity issues before relying on the stored copy".to_string(),
            );
        }
    }

    advice
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uploaded() -> UploadResult {
        UploadResult {
            success: true,
            status: Some(200),
            etag: None,
            size: 10,
            error: None,
        }
    }

    fn verified() -> VerificationResult {
        VerificationResult {
            exists: true,
            metadata: None,
            size_matches: Some(true),
            checksum_matches: Some(true),
            error: None,
        }
    }

    #[test]
    fn test_upload_object_hash_matches_body() {
        let document: StoredDocument = serde_json::from_str(r#"{"content":"text"}"#).unwrap();
        let object = UploadObject::new("k.json", &document).unwrap();

        assert_eq!(object.key(), "k.json");
        assert_eq!(object.content_hash(), sha256_hex(object.body()));
        assert_eq!(object.size(), object.body().len());
    }

    #[test]
    fn test_state_names() {
        assert_eq!(PipelineState::Uploading.to_string(), "uploading");
        assert_eq!(serde_json::to_value(PipelineState::Done).unwrap(), "done");
        assert!(PipelineState::Failed.is_terminal());
        assert!(!PipelineState::Reporting.is_terminal());
    }

    #[test]
    fn test_no_recommendations_on_success() {
        let integrity = IntegrityReport {
            valid: true,
            issues: vec![],
            stats: None,
        };
        assert!(recommendations(&uploaded(), Some(&verified()), Some(&integrity)).is_empty());
    }

    #[test]
    fn test_upload_failure_recommendations() {
        let failed = UploadResult {
            success: false,
            status: Some(403),
            error: Some("denied".into()),
            ..uploaded()
        };
        let advice = recommendations(&failed, None, None);

        assert_eq!(advice.len(), 2);
        assert!(advice[0].starts_with("Review upload configuration"));
    }

    #[test]
    fn test_verification_failure_recommendation() {
        let advice = recommendations(
            &uploaded(),
            Some(&VerificationResult::missing("not found")),
            Some(&IntegrityReport::unverified("not found")),
        );

        assert_eq!(advice, vec!["Verify the file was truly saved in the bucket".to_string()]);
    }

    #[test]
    fn test_checksum_mismatch_recommendation() {
        let verification = VerificationResult {
            checksum_matches: Some(false),
            ..verified()
        };
        let advice = recommendations(&uploaded(), Some(&verification), None);
        assert!(advice[0].contains("checksum"));
    }
}
