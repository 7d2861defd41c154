//! Upload Orchestrator
//!
//! Drives one page through capture, cleaning, correction, hashing, upload,
//! verification and reporting. Steps run strictly in order and nothing is
//! retried; a failed run carries enough context for the caller to decide.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::cleaner::{extract_clean_text, CleanPolicy, CleanStats, Cleaner};
use crate::config::PipelineConfig;
use crate::correction::{PassthroughCorrector, TextCorrector};
use crate::dom::{capture, validate_page_data, DomNode, PageSnapshot, PageSource};
use crate::error::{
    CaptureError, PipelineError, Result, StorageError, UploadFailure, VerificationError,
};
use crate::integrity::{compare, verify_sha256, IntegrityReport, StoredDocument};
use crate::logging::ActivityLog;
use crate::storage::ObjectStore;

use super::key::object_key;
use super::types::{
    recommendations, PipelineState, UploadObject, UploadReport, UploadResult, VerificationResult,
    JSON_CONTENT_TYPE,
};

/// Per-run behaviour of the orchestrator
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub clean: bool,
    pub correct: bool,
    pub policy: CleanPolicy,
    pub key_prefix: String,
    /// Bound on every network step
    pub timeout: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for PipelineOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            clean: config.clean,
            correct: config.correct,
            policy: config.policy.clone(),
            key_prefix: config.key_prefix.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

/// Bookkeeping for one run
struct Run {
    id: Uuid,
    states: Vec<PipelineState>,
}

impl Run {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            states: vec![PipelineState::Idle],
        }
    }

    fn enter(&mut self, state: PipelineState) {
        tracing::debug!(run_id = %self.id, state = %state, "Pipeline state");
        self.states.push(state);
    }
}

/// Read-back of the stored object
struct Readback {
    verification: VerificationResult,
    document: std::result::Result<StoredDocument, VerificationError>,
}

pub struct UploadOrchestrator {
    store: Arc<dyn ObjectStore>,
    corrector: Arc<dyn TextCorrector>,
    activity: ActivityLog,
    options: PipelineOptions,
}

impl UploadOrchestrator {
    pub fn new(store: Arc<dyn ObjectStore>, options: PipelineOptions) -> Self {
        Self {
            store,
            corrector: Arc::new(PassthroughCorrector),
            activity: ActivityLog::new(),
            options,
        }
    }

    pub fn with_corrector(mut self, corrector: Arc<dyn TextCorrector>) -> Self {
        self.corrector = corrector;
        self
    }

    pub fn with_activity_log(mut self, activity: ActivityLog) -> Self {
        self.activity = activity;
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn activity_log(&self) -> &ActivityLog {
        &self.activity
    }

    /// Run the whole pipeline for one page
    pub async fn run(&self, source: &dyn PageSource) -> Result<UploadReport> {
        let started_at = Utc::now();
        let mut run = Run::new();

        self.activity.info(
            "Pipeline started",
            Some(json!({ "runId": run.id, "url": source.url() })),
        );

        // Capturing
        run.enter(PipelineState::Capturing);
        let snapshot = match self.capture(source).await {
            Ok(snapshot) => snapshot,
            Err(e) => return Err(self.fail(&mut run, PipelineError::Capture(e))),
        };

        // Cleaning
        let mut derived = snapshot.clone();
        let mut clean_text = None;
        let mut clean_stats = None;
        if self.options.clean {
            run.enter(PipelineState::Cleaning);
            let cleaner = Cleaner::new(self.options.policy.clone());
            let forest = cleaner.clean(&snapshot.structure);
            let stats = CleanStats::measure(&snapshot.structure, &forest);

            tracing::info!(
                run_id = %run.id,
                input_nodes = stats.input_nodes,
                retained_nodes = stats.retained_nodes,
                "Structure cleaned"
            );

            clean_text = Some(extract_clean_text(&forest));
            clean_stats = Some(stats);
            derived = derived.with_structure(forest.into_iter().map(DomNode::from).collect());
        }

        // Correcting
        let mut corrected = false;
        if self.options.correct {
            run.enter(PipelineState::Correcting);
            let text = self.correct(&derived.full_text).await;
            corrected = text != derived.full_text;
            derived = derived.with_full_text(text);
        }

        // Hashing
        run.enter(PipelineState::Hashing);
        let mut document = StoredDocument::from(&derived);
        if let Some(text) = clean_text {
            document = document.with_clean_text(text);
        }
        let key = object_key(&self.options.key_prefix, Utc::now(), &snapshot.title);
        let object = match UploadObject::new(key, &document) {
            Ok(object) => object,
            Err(e) => return Err(self.fail(&mut run, PipelineError::Serialization(e))),
        };

        // Hand-off only: the store signs every request it sends
        run.enter(PipelineState::Signing);

        // Uploading
        run.enter(PipelineState::Uploading);
        let upload = match self.upload(&object).await {
            Ok(upload) => upload,
            Err(error) => {
                let result = UploadResult {
                    success: false,
                    status: error.status(),
                    etag: None,
                    size: object.size(),
                    error: Some(error.to_string()),
                };

                run.enter(PipelineState::Reporting);
                let advice = recommendations(&result, None, None);
                self.activity.error(
                    "Upload failed",
                    Some(json!({
                        "runId": run.id,
                        "key": object.key(),
                        "status": result.status,
                        "error": result.error,
                    })),
                );

                let failure = UploadFailure {
                    object_key: object.key().to_string(),
                    source: error,
                    recommendations: advice,
                };
                return Err(self.fail(&mut run, PipelineError::Upload(Box::new(failure))));
            }
        };

        // Verifying
        run.enter(PipelineState::Verifying);
        let readback = self.verify(&object).await;

        // Reporting
        run.enter(PipelineState::Reporting);
        let integrity = match &readback.document {
            Ok(stored) => {
                let mut report = compare(&document, stored);
                if readback.verification.checksum_matches == Some(false) {
                    report.record_issue(
                        "Stored object checksum does not match the uploaded content",
                    );
                }
                report
            }
            Err(reason) => IntegrityReport::unverified(reason.to_string()),
        };
        let advice = recommendations(&upload, Some(&readback.verification), Some(&integrity));

        run.enter(PipelineState::Done);

        if integrity.valid {
            self.activity.info(
                "Upload verified",
                Some(json!({
                    "runId": run.id,
                    "key": object.key(),
                    "hash": object.content_hash(),
                })),
            );
        } else {
            self.activity.warn(
                "Upload completed with integrity issues",
                Some(json!({ "runId": run.id, "key": object.key(), "issues": integrity.issues })),
            );
        }

        Ok(UploadReport {
            run_id: run.id,
            url: snapshot.url,
            title: snapshot.title,
            object_key: object.key().to_string(),
            content_hash: object.content_hash().to_string(),
            started_at,
            finished_at: Utc::now(),
            states: run.states,
            clean_stats,
            corrected,
            upload,
            verification: readback.verification,
            integrity,
            recommendations: advice,
        })
    }

    async fn capture(
        &self,
        source: &dyn PageSource,
    ) -> std::result::Result<PageSnapshot, CaptureError> {
        let snapshot = tokio::time::timeout(self.options.timeout, capture(source))
            .await
            .map_err(|_| CaptureError::Timeout(self.options.timeout.as_secs()))??;

        validate_page_data(&snapshot)?;

        tracing::info!(
            url = %snapshot.url,
            nodes = snapshot.node_count(),
            text_bytes = snapshot.text_size_bytes(),
            classes = snapshot.all_classes.len(),
            "Page captured"
        );
        Ok(snapshot)
    }

    async fn correct(&self, text: &str) -> String {
        match tokio::time::timeout(self.options.timeout, self.corrector.correct(text)).await {
            Ok(corrected) => corrected,
            Err(_) => {
                tracing::warn!(
                    corrector = self.corrector.name(),
                    "Text correction timed out, keeping original text"
                );
                text.to_string()
            }
        }
    }

    async fn upload(
        &self,
        object: &UploadObject,
    ) -> std::result::Result<UploadResult, StorageError> {
        let put = self
            .bounded(self.store.put_object(object.key(), object.body(), JSON_CONTENT_TYPE))
            .await?;

        self.activity.info(
            "Object uploaded",
            Some(json!({ "key": object.key(), "status": put.status, "bytes": object.size() })),
        );

        Ok(UploadResult {
            success: true,
            status: Some(put.status),
            etag: put.etag,
            size: object.size(),
            error: None,
        })
    }

    async fn verify(&self, object: &UploadObject) -> Readback {
        let metadata = match self.bounded(self.store.head_object(object.key())).await {
            Ok(metadata) => metadata,
            Err(e) => {
                self.activity.warn(
                    "Uploaded object could not be found",
                    Some(json!({ "key": object.key(), "error": e.to_string() })),
                );
                return Readback {
                    verification: VerificationResult::missing(e.to_string()),
                    document: Err(VerificationError::Missing(e)),
                };
            }
        };

        let mut verification = VerificationResult {
            exists: true,
            size_matches: Some(metadata.size == object.size() as u64),
            metadata: Some(metadata),
            checksum_matches: None,
            error: None,
        };

        let stored = match self.bounded(self.store.get_object(object.key())).await {
            Ok(stored) => stored,
            Err(e) => {
                verification.error = Some(e.to_string());
                return Readback {
                    verification,
                    document: Err(VerificationError::Unreadable(e)),
                };
            }
        };

        verification.checksum_matches = Some(verify_sha256(&stored.data, object.content_hash()));

        let document = serde_json::from_slice::<StoredDocument>(&stored.data)
            .map_err(VerificationError::from);

        Readback {
            verification,
            document,
        }
    }

    async fn bounded<T, F>(&self, operation: F) -> std::result::Result<T, StorageError>
    where
        F: Future<Output = std::result::Result<T, StorageError>>,
    {
        tokio::time::timeout(self.options.timeout, operation)
            .await
            .unwrap_or(Err(StorageError::Timeout(self.options.timeout.as_secs())))
    }

    fn fail(&self, run: &mut Run, error: PipelineError) -> PipelineError {
        run.enter(PipelineState::Failed);
        self.activity.error(
            "Pipeline failed",
            Some(json!({
                "runId": run.id,
                "kind": error.kind(),
                "error": error.to_string(),
                "states": run.states,
            })),
        );
        error
    }
}
