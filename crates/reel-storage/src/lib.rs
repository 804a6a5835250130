//! S3-compatible object storage client.

mod client;
mod error;

pub use client::{ObjectStorage, S3Client, S3Config};
pub use error::{StorageError, StorageResult};
