use std::fmt;

use anyhow::Result;
use async_trait::async_trait;

/// Server-side encryption mode as reported by the object store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseMode {
    /// SSE-KMS: the store delegates key operations to KMS with a chosen key.
    AwsKms,
    /// Dual-layer SSE-KMS.
    AwsKmsDsse,
    /// SSE-S3, service-managed keys.
    Aes256,
    /// SSE-C with the given algorithm; the key never reaches the store.
    CustomerKey(String),
    Other(String),
}

impl SseMode {
    pub fn parse(s: &str) -> Self {
        match s {
            "aws:kms" => SseMode::AwsKms,
            "aws:kms:dsse" => SseMode::AwsKmsDsse,
            "AES256" => SseMode::Aes256,
            other => SseMode::Other(other.to_string()),
        }
    }

    /// Wire value for `x-amz-server-side-encryption`; SSE-C has none.
    pub fn as_str(&self) -> &str {
        match self {
            SseMode::AwsKms => "aws:kms",
            SseMode::AwsKmsDsse => "aws:kms:dsse",
            SseMode::Aes256 => "AES256",
            SseMode::CustomerKey(_) => "",
            SseMode::Other(s) => s,
        }
    }
}

impl fmt::Display for SseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SseMode::CustomerKey(algorithm) => write!(f, "SSE-C({algorithm})"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Encryption state of a stored object, re-read from the store per event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncryptionMetadata {
    pub sse: Option<SseMode>,
    pub kms_key_id: Option<String>,
}

impl EncryptionMetadata {
    pub fn kms(key_id: impl Into<String>) -> Self {
        Self {
            sse: Some(SseMode::AwsKms),
            kms_key_id: Some(key_id.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataDirective {
    /// Keep the source object's user metadata.
    Copy,
}

impl MetadataDirective {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataDirective::Copy => "COPY",
        }
    }
}

/// Server-side copy with the destination encryption spelled out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyRequest {
    pub source_bucket: String,
    pub source_key: String,
    pub destination_bucket: String,
    pub destination_key: String,
    pub sse: SseMode,
    pub kms_key_id: String,
    pub metadata_directive: MetadataDirective,
}

// Capability seams over the object store; S3Storage is the production impl.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataReader: Send + Sync {
    async fn encryption_metadata(&self, bucket: &str, key: &str) -> Result<EncryptionMetadata>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectCopier: Send + Sync {
    async fn copy_object(&self, request: &CopyRequest) -> Result<()>;
}
