//! Encryption policy for objects leaving the raw bucket.
//!
//! An object passes only when it is stored with SSE-KMS and its KMS key id
//! ends with the trailing segment of the configured key ARN. The comparison
//! is a suffix match so a stored key id carrying a different account or
//! region qualifier still passes as long as the terminal key id matches.
//!
//! NOTE: the suffix match also admits a key from an unrelated KMS scope that
//! happens to share the trailing segment. Any tightening needs sign-off from
//! whoever owns the raw bucket's key policy.

use crate::gate_core::{EncryptionMetadata, SseMode};

/// Trailing `/` segment of a key identifier (`arn:...:key/<id>` -> `<id>`).
pub fn key_id_tail(key_id: &str) -> &str {
    key_id.rsplit('/').next().unwrap_or(key_id)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionPolicy {
    key_arn: String,
}

impl EncryptionPolicy {
    pub fn new(key_arn: impl Into<String>) -> Self {
        Self {
            key_arn: key_arn.into(),
        }
    }

    /// Full key identifier forced onto every copy.
    pub fn key_arn(&self) -> &str {
        &self.key_arn
    }

    pub fn key_tail(&self) -> &str {
        key_id_tail(&self.key_arn)
    }

    /// Mode the store must report, and the mode every copy is written with.
    pub fn required_mode(&self) -> SseMode {
        SseMode::AwsKms
    }

    pub fn is_satisfied_by(&self, meta: &EncryptionMetadata) -> bool {
        if meta.sse.as_ref() != Some(&self.required_mode()) {
            return false;
        }
        match meta.kms_key_id.as_deref() {
            Some(stored) if !stored.is_empty() => stored.ends_with(self.key_tail()),
            _ => false,
        }
    }
}
