use thiserror::Error;

use crate::policy::{key_id_tail, EncryptionPolicy};

pub const RAW_BUCKET: &str = "RAW_BUCKET";
pub const STAGING_BUCKET: &str = "STAGING_BUCKET";
pub const CURATED_BUCKET: &str = "CURATED_BUCKET";
pub const KMS_KEY_ARN: &str = "KMS_KEY_ARN";
pub const AWS_REGION: &str = "AWS_REGION";
pub const S3_ENDPOINT_URL: &str = "S3_ENDPOINT_URL";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("required environment variable {var} is not set")]
    Missing { var: &'static str },
    #[error("required environment variable {var} is empty")]
    Empty { var: &'static str },
    #[error("KMS_KEY_ARN has no trailing key id: {value}")]
    NoKeyId { value: String },
}

/// Process-wide settings, built once at startup and never mutated.
#[derive(Debug, Clone)]
pub struct GateConfig {
    pub raw_bucket: String,
    pub staging_bucket: String,
    /// Downstream bucket; validated at startup but not touched by the gate.
    pub curated_bucket: String,
    pub policy: EncryptionPolicy,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
}

impl GateConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |var: &'static str| match lookup(var) {
            None => Err(ConfigError::Missing { var }),
            Some(v) if v.trim().is_empty() => Err(ConfigError::Empty { var }),
            Some(v) => Ok(v),
        };
        let optional = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let raw_bucket = required(RAW_BUCKET)?;
        let staging_bucket = required(STAGING_BUCKET)?;
        let curated_bucket = required(CURATED_BUCKET)?;
        let key_arn = required(KMS_KEY_ARN)?;
        if key_id_tail(&key_arn).is_empty() {
            return Err(ConfigError::NoKeyId { value: key_arn });
        }

        Ok(Self {
            raw_bucket,
            staging_bucket,
            curated_bucket,
            policy: EncryptionPolicy::new(key_arn),
            region: optional(AWS_REGION),
            endpoint_url: optional(S3_ENDPOINT_URL),
        })
    }
}
