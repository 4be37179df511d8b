mod s3;

pub use s3::{copy_source, metadata_from_head, S3Storage};
