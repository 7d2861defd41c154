//! Page Archiver Library
//!
//! Captures a web page's DOM, prunes it, and uploads the snapshot to an
//! S3-compatible object store with SigV4 signing, then reads it back and
//! reports on its integrity.
//!
//! # Modules
//!
//! - `dom`: snapshot model, capture and validation
//! - `cleaner`: policy-driven structural cleaning
//! - `integrity`: checksums and original-versus-stored comparison
//! - `storage`: SigV4 signer and object store clients
//! - `correction`: optional text correction collaborator
//! - `upload`: the end-to-end pipeline
//! - `logging`: tracing setup and the capped activity log

pub mod cleaner;
pub mod config;
pub mod correction;
pub mod dom;
pub mod error;
pub mod integrity;
pub mod logging;
pub mod storage;
pub mod upload;

pub use config::Config;
pub use error::{PipelineError, Result};
pub use upload::{PipelineOptions, UploadOrchestrator, UploadReport};
