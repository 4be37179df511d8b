//! In-memory object store for tests and `--mock` runs.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::event::{Notification, ObjectEvent};
use crate::gate_core::{CopyRequest, EncryptionMetadata, MetadataReader, ObjectCopier};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageCall {
    Head { bucket: String, key: String },
    Copy(CopyRequest),
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    objects: Mutex<HashMap<(String, String), EncryptionMetadata>>,
    calls: Mutex<Vec<StorageCall>>,
}

fn guard<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, bucket: &str, key: &str, meta: EncryptionMetadata) {
        guard(&self.objects).insert((bucket.to_string(), key.to_string()), meta);
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<EncryptionMetadata> {
        guard(&self.objects)
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Stores every object the notification names as SSE-KMS under `key_arn`.
    pub fn seed_compliant(&self, notification: &Notification, key_arn: &str) {
        for record in &notification.records {
            if let Ok(ev) = ObjectEvent::from_record(record) {
                self.put(&ev.bucket, &ev.key, EncryptionMetadata::kms(key_arn));
            }
        }
    }

    pub fn calls(&self) -> Vec<StorageCall> {
        guard(&self.calls).clone()
    }

    pub fn copies(&self) -> Vec<CopyRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                StorageCall::Copy(req) => Some(req),
                StorageCall::Head { .. } => None,
            })
            .collect()
    }
}

#[async_trait]
impl MetadataReader for MemoryStorage {
    async fn encryption_metadata(&self, bucket: &str, key: &str) -> Result<EncryptionMetadata> {
        guard(&self.calls).push(StorageCall::Head {
            bucket: bucket.to_string(),
            key: key.to_string(),
        });
        self.get(bucket, key)
            .ok_or_else(|| anyhow!("NoSuchKey: s3://{bucket}/{key}"))
    }
}

#[async_trait]
impl ObjectCopier for MemoryStorage {
    async fn copy_object(&self, request: &CopyRequest) -> Result<()> {
        guard(&self.calls).push(StorageCall::Copy(request.clone()));
        if self
            .get(&request.source_bucket, &request.source_key)
            .is_none()
        {
            return Err(anyhow!(
                "NoSuchKey: s3://{}/{}",
                request.source_bucket,
                request.source_key
            ));
        }
        // 덮어쓰기: 대상 암호화는 요청 값으로 결정
        self.put(
            &request.destination_bucket,
            &request.destination_key,
            EncryptionMetadata {
                sse: Some(request.sse.clone()),
                kms_key_id: Some(request.kms_key_id.clone()),
            },
        );
        Ok(())
    }
}
