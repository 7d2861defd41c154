//! Storage module for S3-compatible backends
//!
//! Requests are signed with AWS Signature Version 4 and sent path-style, which
//! works for R2, MinIO and AWS S3 alike.

mod client;
mod memory;
mod signer;
mod types;

pub use client::{HttpObjectStore, ObjectStore, DEFAULT_REQUEST_TIMEOUT};
pub use memory::MemoryObjectStore;
pub use signer::{
    derive_signing_key, uri_escape_path, SigV4Signer, SignedRequest, ALGORITHM, REGION, SERVICE,
};
pub use types::*;
