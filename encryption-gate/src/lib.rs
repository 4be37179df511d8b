//! Fail-closed encryption gate between the raw and staging buckets.
//!
//! Reacts to S3 `ObjectCreated` notifications for the raw bucket, re-reads each
//! object's encryption state, and copies compliant objects to staging with
//! SSE-KMS under the configured key.

pub mod config;
pub mod event;
pub mod gate;
pub mod gate_core;
pub mod mock;
pub mod policy;
pub mod storage;

pub use config::{ConfigError, GateConfig};
pub use event::{Notification, ObjectEvent};
pub use gate::{
    BatchSummary, EncryptionGate, FailureKind, GateError, InvocationResponse, RecordOutcome,
};
pub use gate_core::{
    CopyRequest, EncryptionMetadata, MetadataDirective, MetadataReader, ObjectCopier, SseMode,
};
pub use policy::EncryptionPolicy;
