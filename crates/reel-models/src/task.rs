//! Transcode task message carried by the broker.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A transcoding job published by the API and consumed by the worker.
///
/// The wire encoding is JSON with these exact field names; `output_key` is
/// the storage key prefix the worker writes HLS artifacts under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscodeTask {
    pub video_id: Uuid,
    pub original_key: String,
    pub output_key: String,
    pub retry_count: u32,
}

impl TranscodeTask {
    pub fn new(video_id: Uuid, original_key: impl Into<String>, output_key: impl Into<String>) -> Self {
        Self {
            video_id,
            original_key: original_key.into(),
            output_key: output_key.into(),
            retry_count: 0,
        }
    }
}
