use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3 as s3;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::operation::head_object::HeadObjectOutput;
use aws_sdk_s3::types::{MetadataDirective as S3MetadataDirective, ServerSideEncryption};
use tracing::debug;

use crate::config::GateConfig;
use crate::gate_core::{
    CopyRequest, EncryptionMetadata, MetadataDirective, MetadataReader, ObjectCopier, SseMode,
};

/// S3-backed metadata reader and copier.
#[derive(Clone)]
pub struct S3Storage {
    client: s3::Client,
}

impl S3Storage {
    pub async fn new(cfg: &GateConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &cfg.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let conf = loader.load().await;

        let mut builder = s3::config::Builder::from(&conf);
        if let Some(endpoint) = &cfg.endpoint_url {
            debug!("Using custom S3 endpoint: {}", endpoint);
            // 로컬 S3 호환 스토리지는 path-style 필요
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self::from_client(s3::Client::from_conf(builder.build()))
    }

    pub fn from_client(client: s3::Client) -> Self {
        Self { client }
    }
}

/// `x-amz-copy-source` value; the SDK sends it as given, so the key is
/// percent-encoded per segment with `/` kept.
pub fn copy_source(bucket: &str, key: &str) -> String {
    let encoded = key
        .split('/')
        .map(urlencoding::encode)
        .collect::<Vec<_>>()
        .join("/");
    format!("{bucket}/{encoded}")
}

pub fn metadata_from_head(out: &HeadObjectOutput) -> EncryptionMetadata {
    // SSE-C objects report only the customer algorithm header
    let sse = match (out.server_side_encryption(), out.sse_customer_algorithm()) {
        (Some(s), _) => Some(SseMode::parse(s.as_str())),
        (None, Some(alg)) => Some(SseMode::CustomerKey(alg.to_string())),
        (None, None) => None,
    };
    EncryptionMetadata {
        sse,
        kms_key_id: out.ssekms_key_id().map(|s| s.to_string()),
    }
}

fn to_s3_sse(mode: &SseMode) -> ServerSideEncryption {
    ServerSideEncryption::from(mode.as_str())
}

fn to_s3_directive(directive: MetadataDirective) -> S3MetadataDirective {
    match directive {
        MetadataDirective::Copy => S3MetadataDirective::Copy,
    }
}

#[async_trait]
impl MetadataReader for S3Storage {
    async fn encryption_metadata(&self, bucket: &str, key: &str) -> Result<EncryptionMetadata> {
        let out = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("HeadObject failed for s3://{bucket}/{key}"))?;
        Ok(metadata_from_head(&out))
    }
}

#[async_trait]
impl ObjectCopier for S3Storage {
    async fn copy_object(&self, request: &CopyRequest) -> Result<()> {
        let source = copy_source(&request.source_bucket, &request.source_key);
        debug!(
            "CopyObject {} -> s3://{}/{} (sse={}, key={})",
            source,
            request.destination_bucket,
            request.destination_key,
            request.sse,
            request.kms_key_id
        );

        self.client
            .copy_object()
            .bucket(&request.destination_bucket)
            .key(&request.destination_key)
            .copy_source(source)
            .server_side_encryption(to_s3_sse(&request.sse))
            .ssekms_key_id(&request.kms_key_id)
            .metadata_directive(to_s3_directive(request.metadata_directive))
            .send()
            .await
            .with_context(|| {
                format!(
                    "CopyObject failed for s3://{}/{} -> s3://{}/{}",
                    request.source_bucket,
                    request.source_key,
                    request.destination_bucket,
                    request.destination_key
                )
            })?;
        Ok(())
    }
}

impl std::fmt::Debug for S3Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Storage").finish_non_exhaustive()
    }
}
