//! Upload pipeline
//!
//! Capture, clean, correct, hash, upload, verify and report one page.
//!
//! Verification is post-hoc: an object that fails its integrity checks has
//! already been stored, and the report says so.

mod key;
mod orchestrator;
mod types;

pub use key::{object_key, sanitize_title, MAX_TITLE_LENGTH, UNTITLED};
pub use orchestrator::{PipelineOptions, UploadOrchestrator};
pub use types::*;
