//! Video service contract.

use async_trait::async_trait;
use uuid::Uuid;

use reel_models::Video;

use crate::error::ServiceResult;

/// Input parameters for creating a video.
#[derive(Debug, Clone)]
pub struct CreateVideoInput {
    pub user_id: Uuid,
    pub title: String,
    pub file_name: String,
}

/// Result of creating a video: the persisted entity plus a time-limited
/// URL the client uploads the source file to.
#[derive(Debug, Clone)]
pub struct CreateVideoOutput {
    pub video: Video,
    pub upload_url: String,
}

/// Business operations on videos.
///
/// Implemented by [`crate::LifecycleService`] against the authoritative
/// store, and by [`crate::CachedVideoService`] which decorates it; the
/// composition root wires the cached implementation around the lifecycle
/// one.
#[async_trait]
pub trait VideoService: Send + Sync {
    /// Create video metadata and return a presigned upload URL.
    async fn create_video(&self, input: CreateVideoInput) -> ServiceResult<CreateVideoOutput>;

    /// Start transcoding an uploaded video. Idempotent: invoking it on a
    /// video that is already processing succeeds without effect.
    async fn trigger_process(&self, video_id: Uuid) -> ServiceResult<()>;

    /// Fetch video metadata by id.
    async fn get_video(&self, video_id: Uuid) -> ServiceResult<Video>;
}
