//! S3 `ObjectCreated` notification input.
//!
//! Records are kept as raw JSON and decoded one at a time by the batch
//! driver, so a malformed record aborts at its own position.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Notification {
    #[serde(rename = "Records", default)]
    pub records: Vec<Value>,
}

impl Notification {
    pub fn from_value(event: &Value) -> serde_json::Result<Self> {
        Notification::deserialize(event)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// One object reference taken from a notification record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEvent {
    pub bucket: String,
    pub key: String,
}

#[derive(Deserialize)]
struct RecordWire {
    s3: S3Entity,
}

#[derive(Deserialize)]
struct S3Entity {
    bucket: BucketRef,
    object: ObjectRef,
}

#[derive(Deserialize)]
struct BucketRef {
    name: String,
}

#[derive(Deserialize)]
struct ObjectRef {
    key: String,
}

impl ObjectEvent {
    pub fn from_record(record: &Value) -> serde_json::Result<Self> {
        let wire = RecordWire::deserialize(record)?;
        Ok(Self {
            bucket: wire.s3.bucket.name,
            key: wire.s3.object.key,
        })
    }
}
