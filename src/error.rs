//! Error types for the Page Archiver pipeline

use std::time::Duration;

use thiserror::Error;

/// Pipeline-wide result type
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Pipeline error type
///
/// Only failures that abort a run live here. Verification failures and
/// integrity mismatches are recorded in the [`UploadReport`] instead.
///
/// [`UploadReport`]: crate::upload::UploadReport
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Upload of {} failed: {}", .0.object_key, .0.source)]
    Upload(Box<UploadFailure>),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    /// Short machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Configuration(_) => "configuration_error",
            PipelineError::Capture(_) => "capture_error",
            PipelineError::Upload(_) => "upload_error",
            PipelineError::Serialization(_) => "serialization_error",
        }
    }
}

/// Context carried by a failed PUT
#[derive(Debug)]
pub struct UploadFailure {
    pub object_key: String,
    pub source: StorageError,
    pub recommendations: Vec<String>,
}

/// Missing or malformed configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Page capture and validation errors
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("page could not be loaded: {0}")]
    Unavailable(String),

    #[error("page could not be parsed: {0}")]
    Parse(String),

    #[error("page load timed out after {0} seconds")]
    Timeout(u64),

    #[error("snapshot failed validation: {}", .0.join("; "))]
    Invalid(Vec<String>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Object store errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("object store returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("request signing failed: {0}")]
    Signing(String),
}

/// Why the stored copy could not be audited
#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("Stored object could not be verified: {0}")]
    Missing(StorageError),

    #[error("Stored object could not be read back: {0}")]
    Unreadable(StorageError),

    #[error("Stored object is not a valid snapshot document: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Text correction errors; the corrector logs these and keeps the input
#[derive(Error, Debug)]
pub enum CorrectionError {
    #[error("corrector request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("corrector returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("corrector response contained no text")]
    Empty,
}

impl StorageError {
    /// HTTP status of the failed response, if the store answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            StorageError::Http { status, .. } => Some(*status),
            StorageError::ObjectNotFound(_) => Some(404),
            _ => None,
        }
    }
}

impl StorageError {
    /// Classify a failed request that ran under `timeout`
    pub fn from_transport(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            StorageError::Timeout(timeout.as_secs())
        } else {
            StorageError::Transport(err.to_string())
        }
    }
}
