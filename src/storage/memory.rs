//! In-process object store
//!
//! Used for dry runs and tests. Failure modes can be injected to exercise the
//! pipeline's error paths without a network.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use crate::error::StorageError;
use crate::integrity::sha256_hex;

use super::client::ObjectStore;
use super::types::{ObjectMetadata, PutResult, StorageObject};

type ReadFilter = Box<dyn Fn(&[u8]) -> Vec<u8> + Send + Sync>;

/// Object store kept in memory
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<String, StorageObject>>,
    put_failure: Option<(u16, String)>,
    hide_objects: bool,
    read_filter: Option<ReadFilter>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every PUT with the given HTTP status and body
    pub fn with_put_failure(mut self, status: u16, body: impl Into<String>) -> Self {
        self.put_failure = Some((status, body.into()));
        self
    }

    /// Accept writes but answer reads with 404
    pub fn with_hidden_objects(mut self) -> Self {
        self.hide_objects = true;
        self
    }

    /// Pass every read body through `filter` before returning it
    pub fn with_read_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&[u8]) -> Vec<u8> + Send + Sync + 'static,
    {
        self.read_filter = Some(Box::new(filter));
        self
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Raw stored bytes, bypassing injected failures
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.read().get(key).map(|o| o.data.clone())
    }

    fn read(&self, key: &str) -> Result<StorageObject, StorageError> {
        if self.hide_objects {
            return Err(StorageError::ObjectNotFound(key.to_string()));
        }

        let objects = self.objects.read();
        let object = objects
            .get(key)
            .ok_or_else(|| StorageError::ObjectNotFound(key.to_string()))?;

        let data = match &self.read_filter {
            Some(filter) => filter(&object.data),
            None => object.data.clone(),
        };
        let metadata = ObjectMetadata {
            size: data.len() as u64,
            ..object.metadata.clone()
        };

        Ok(StorageObject { metadata, data })
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_object(
        &self,
        key: &str,
        body: &[u8],
        content_type: &str,
    ) -> Result<PutResult, StorageError> {
        if let Some((status, message)) = &self.put_failure {
            return Err(StorageError::Http {
                status: *status,
                body: message.clone(),
            });
        }

        let etag = format!("\"{}\"", &sha256_hex(body)[..32]);
        let metadata = ObjectMetadata {
            key: key.to_string(),
            size: body.len() as u64,
            last_modified: Some(Utc::now()),
            content_type: Some(content_type.to_string()),
            etag: Some(etag.clone()),
        };

        self.objects.write().insert(
            key.to_string(),
            StorageObject {
                metadata,
                data: body.to_vec(),
            },
        );

        Ok(PutResult {
            key: key.to_string(),
            status: 200,
            etag: Some(etag),
        })
    }

    async fn head_object(&self, key: &str) -> Result<ObjectMetadata, StorageError> {
        self.read(key).map(|object| object.metadata)
    }

    async fn get_object(&self, key: &str) -> Result<StorageObject, StorageError> {
        self.read(key)
    }
}
