//! Validate-then-propagate gate for raw bucket notifications.
//!
//! Each record is handled in order: records from a foreign bucket are skipped,
//! everything else must pass the encryption policy and is then copied to the
//! staging bucket with SSE-KMS re-asserted. The first failure stops the batch;
//! earlier copies stay in place.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::GateConfig;
use crate::event::{Notification, ObjectEvent};
use crate::gate_core::{CopyRequest, MetadataDirective, MetadataReader, ObjectCopier};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    PolicyViolation,
    DependencyFailure,
}

#[derive(Debug, Error)]
pub enum GateError {
    #[error("Insecure object encryption for s3://{bucket}/{key}: sse={sse}, kms_key={kms_key}")]
    PolicyViolation {
        bucket: String,
        key: String,
        sse: String,
        kms_key: String,
    },
    #[error("failed to read encryption metadata for s3://{bucket}/{key}")]
    MetadataFetch {
        bucket: String,
        key: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to copy s3://{bucket}/{key} to s3://{destination}/{key}")]
    Copy {
        bucket: String,
        key: String,
        destination: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("notification is not a record batch")]
    MalformedBatch(#[source] serde_json::Error),
    #[error("record {index} is not an S3 object notification")]
    MalformedRecord {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
}

impl GateError {
    pub fn kind(&self) -> FailureKind {
        match self {
            GateError::PolicyViolation { .. } => FailureKind::PolicyViolation,
            _ => FailureKind::DependencyFailure,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Copied { destination_key: String },
    Skipped { bucket: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub copied: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvocationResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl InvocationResponse {
    pub fn processed() -> Self {
        Self {
            status_code: 200,
            body: "Processed records".to_string(),
        }
    }
}

pub struct EncryptionGate {
    config: GateConfig,
    reader: Arc<dyn MetadataReader>,
    copier: Arc<dyn ObjectCopier>,
}

impl EncryptionGate {
    pub fn new(
        config: GateConfig,
        reader: Arc<dyn MetadataReader>,
        copier: Arc<dyn ObjectCopier>,
    ) -> Self {
        Self {
            config,
            reader,
            copier,
        }
    }

    /// Entry point for one notification delivery.
    pub async fn handle(&self, event: &Value) -> Result<InvocationResponse, GateError> {
        info!("Received event: {}", event);

        let notification = Notification::from_value(event).map_err(GateError::MalformedBatch)?;
        let summary = self.run_batch(&notification).await?;

        info!(
            copied = summary.copied,
            skipped = summary.skipped,
            "batch processed"
        );
        Ok(InvocationResponse::processed())
    }

    pub async fn run_batch(&self, notification: &Notification) -> Result<BatchSummary, GateError> {
        let mut summary = BatchSummary::default();

        for (index, record) in notification.records.iter().enumerate() {
            let outcome = match ObjectEvent::from_record(record) {
                Ok(event) => self.process_event(&event).await,
                Err(source) => Err(GateError::MalformedRecord { index, source }),
            };

            // Skips continue; any failure abandons the rest of the batch.
            match outcome {
                Ok(RecordOutcome::Copied { .. }) => summary.copied += 1,
                Ok(RecordOutcome::Skipped { .. }) => summary.skipped += 1,
                Err(e) => {
                    error!(
                        record = index,
                        remaining = notification.len() - index - 1,
                        kind = ?e.kind(),
                        "aborting batch: {e}"
                    );
                    return Err(e);
                }
            }
        }

        Ok(summary)
    }

    pub async fn process_event(&self, event: &ObjectEvent) -> Result<RecordOutcome, GateError> {
        if event.bucket != self.config.raw_bucket {
            warn!("Ignoring event from unexpected bucket: {}", event.bucket);
            return Ok(RecordOutcome::Skipped {
                bucket: event.bucket.clone(),
            });
        }

        self.validate_encryption(&event.bucket, &event.key).await?;
        self.copy_to_staging(&event.bucket, &event.key).await
    }

    async fn validate_encryption(&self, bucket: &str, key: &str) -> Result<(), GateError> {
        // Always re-read from the store; the notification is only a pointer.
        let meta = self
            .reader
            .encryption_metadata(bucket, key)
            .await
            .map_err(|source| GateError::MetadataFetch {
                bucket: bucket.to_string(),
                key: key.to_string(),
                source,
            })?;
        debug!(?meta, "s3://{bucket}/{key} encryption");

        if self.config.policy.is_satisfied_by(&meta) {
            return Ok(());
        }

        Err(GateError::PolicyViolation {
            bucket: bucket.to_string(),
            key: key.to_string(),
            sse: meta
                .sse
                .map(|m| m.to_string())
                .unwrap_or_else(|| "None".into()),
            kms_key: meta.kms_key_id.unwrap_or_else(|| "None".into()),
        })
    }

    fn staging_copy(&self, bucket: &str, key: &str) -> CopyRequest {
        let policy = &self.config.policy;
        CopyRequest {
            source_bucket: bucket.to_string(),
            source_key: key.to_string(),
            destination_bucket: self.config.staging_bucket.clone(),
            destination_key: key.to_string(),
            sse: policy.required_mode(),
            kms_key_id: policy.key_arn().to_string(),
            metadata_directive: MetadataDirective::Copy,
        }
    }

    async fn copy_to_staging(&self, bucket: &str, key: &str) -> Result<RecordOutcome, GateError> {
        let request = self.staging_copy(bucket, key);

        self.copier
            .copy_object(&request)
            .await
            .map_err(|source| GateError::Copy {
                bucket: bucket.to_string(),
                key: key.to_string(),
                destination: request.destination_bucket.clone(),
                source,
            })?;

        info!(
            "copied s3://{}/{} -> s3://{}/{}",
            bucket, key, request.destination_bucket, request.destination_key
        );
        Ok(RecordOutcome::Copied {
            destination_key: request.destination_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate_core::{
        EncryptionMetadata, MockMetadataReader, MockObjectCopier, SseMode,
    };
    use crate::policy::EncryptionPolicy;
    use anyhow::anyhow;
    use mockall::predicate::eq;

    const KEY_ARN: &str = "arn:aws:kms:us-east-1:111122223333:key/mrk-0a1b2c3d";

    fn config() -> GateConfig {
        GateConfig {
            raw_bucket: "raw".into(),
            staging_bucket: "staging".into(),
            curated_bucket: "curated".into(),
            policy: EncryptionPolicy::new(KEY_ARN),
            region: None,
            endpoint_url: None,
        }
    }

    fn gate(reader: MockMetadataReader, copier: MockObjectCopier) -> EncryptionGate {
        EncryptionGate::new(config(), Arc::new(reader), Arc::new(copier))
    }

    fn event(bucket: &str, key: &str) -> ObjectEvent {
        ObjectEvent {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    #[tokio::test]
    async fn test_foreign_bucket_is_skipped_without_calls() {
        let mut reader = MockMetadataReader::new();
        reader.expect_encryption_metadata().never();
        let mut copier = MockObjectCopier::new();
        copier.expect_copy_object().never();

        let outcome = gate(reader, copier)
            .process_event(&event("someone-else", "a.csv"))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            RecordOutcome::Skipped {
                bucket: "someone-else".into()
            }
        );
    }

    #[tokio::test]
    async fn test_compliant_object_is_copied_with_enforced_encryption() {
        let mut reader = MockMetadataReader::new();
        reader
            .expect_encryption_metadata()
            .withf(|bucket, key| bucket == "raw" && key == "in/a.csv")
            .times(1)
            .returning(|_, _| Ok(EncryptionMetadata::kms(KEY_ARN)));

        let mut copier = MockObjectCopier::new();
        copier
            .expect_copy_object()
            .with(eq(CopyRequest {
                source_bucket: "raw".into(),
                source_key: "in/a.csv".into(),
                destination_bucket: "staging".into(),
                destination_key: "in/a.csv".into(),
                sse: SseMode::AwsKms,
                kms_key_id: KEY_ARN.into(),
                metadata_directive: MetadataDirective::Copy,
            }))
            .times(1)
            .returning(|_| Ok(()));

        let outcome = gate(reader, copier)
            .process_event(&event("raw", "in/a.csv"))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            RecordOutcome::Copied {
                destination_key: "in/a.csv".into()
            }
        );
    }

    #[tokio::test]
    async fn test_copy_forces_configured_arn_over_stored_qualifier() {
        let mut reader = MockMetadataReader::new();
        reader.expect_encryption_metadata().returning(|_, _| {
            Ok(EncryptionMetadata::kms(
                "arn:aws:kms:eu-central-1:444455556666:key/mrk-0a1b2c3d",
            ))
        });

        let mut copier = MockObjectCopier::new();
        copier
            .expect_copy_object()
            .withf(|req| req.kms_key_id == KEY_ARN && req.sse == SseMode::AwsKms)
            .times(1)
            .returning(|_| Ok(()));

        gate(reader, copier)
            .process_event(&event("raw", "x"))
            .await
            .unwrap();
    }

    async fn assert_rejected(meta: EncryptionMetadata, sse: &str, kms_key: &str) {
        let mut reader = MockMetadataReader::new();
        reader
            .expect_encryption_metadata()
            .returning(move |_, _| Ok(meta.clone()));
        let mut copier = MockObjectCopier::new();
        copier.expect_copy_object().never();

        let err = gate(reader, copier)
            .process_event(&event("raw", "in/report.parquet"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), FailureKind::PolicyViolation);
        assert_eq!(
            err.to_string(),
            format!(
                "Insecure object encryption for s3://raw/in/report.parquet: sse={sse}, kms_key={kms_key}"
            )
        );
    }

    #[tokio::test]
    async fn test_unencrypted_object_is_rejected() {
        assert_rejected(EncryptionMetadata::default(), "None", "None").await;
    }

    #[tokio::test]
    async fn test_non_kms_mode_is_rejected() {
        let meta = EncryptionMetadata {
            sse: Some(SseMode::Aes256),
            kms_key_id: None,
        };
        assert_rejected(meta, "AES256", "None").await;
    }

    #[tokio::test]
    async fn test_customer_supplied_key_is_rejected() {
        let meta = EncryptionMetadata {
            sse: Some(SseMode::CustomerKey("AES256".into())),
            kms_key_id: None,
        };
        assert_rejected(meta, "SSE-C(AES256)", "None").await;
    }

    #[tokio::test]
    async fn test_wrong_kms_key_is_rejected() {
        let other = "arn:aws:kms:us-east-1:111122223333:key/mrk-ffffffff";
        assert_rejected(EncryptionMetadata::kms(other), "aws:kms", other).await;
    }

    #[tokio::test]
    async fn test_metadata_failure_is_dependency_failure() {
        let mut reader = MockMetadataReader::new();
        reader
            .expect_encryption_metadata()
            .returning(|_, _| Err(anyhow!("AccessDenied")));
        let mut copier = MockObjectCopier::new();
        copier.expect_copy_object().never();

        let err = gate(reader, copier)
            .process_event(&event("raw", "k"))
            .await
            .unwrap_err();

        assert!(matches!(err, GateError::MetadataFetch { .. }));
        assert_eq!(err.kind(), FailureKind::DependencyFailure);
    }

    #[tokio::test]
    async fn test_copy_failure_propagates() {
        let mut reader = MockMetadataReader::new();
        reader
            .expect_encryption_metadata()
            .returning(|_, _| Ok(EncryptionMetadata::kms(KEY_ARN)));
        let mut copier = MockObjectCopier::new();
        copier
            .expect_copy_object()
            .times(1)
            .returning(|_| Err(anyhow!("SlowDown")));

        let err = gate(reader, copier)
            .process_event(&event("raw", "k"))
            .await
            .unwrap_err();

        assert!(matches!(err, GateError::Copy { ref destination, .. } if destination == "staging"));
        assert_eq!(err.kind(), FailureKind::DependencyFailure);
    }

    #[tokio::test]
    async fn test_malformed_batch_is_rejected() {
        let mut reader = MockMetadataReader::new();
        reader.expect_encryption_metadata().never();
        let mut copier = MockObjectCopier::new();
        copier.expect_copy_object().never();

        let err = gate(reader, copier)
            .handle(&serde_json::json!({ "Records": 7 }))
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::MalformedBatch(_)));
    }

    #[test]
    fn test_invocation_response_shape() {
        let body = serde_json::to_value(InvocationResponse::processed()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "statusCode": 200, "body": "Processed records" })
        );
    }
}
