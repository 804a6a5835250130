//! Lifecycle service: create, trigger-process, get against the
//! authoritative store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use reel_db::VideoRepository;
use reel_models::{TranscodeTask, Video, VideoStatus};
use reel_queue::TranscodeQueue;
use reel_storage::ObjectStorage;

use crate::error::ServiceResult;
use crate::service::{CreateVideoInput, CreateVideoOutput, VideoService};
use crate::ServiceError;

/// Configuration for [`LifecycleService`].
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Validity of presigned upload URLs
    pub upload_url_ttl: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            upload_url_ttl: Duration::from_secs(15 * 60),
        }
    }
}

/// Video lifecycle operations over the repository, object storage, and
/// the task queue.
pub struct LifecycleService {
    repo: Arc<dyn VideoRepository>,
    storage: Arc<dyn ObjectStorage>,
    queue: Arc<dyn TranscodeQueue>,
    upload_url_ttl: Duration,
}

impl LifecycleService {
    pub fn new(
        repo: Arc<dyn VideoRepository>,
        storage: Arc<dyn ObjectStorage>,
        queue: Arc<dyn TranscodeQueue>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            repo,
            storage,
            queue,
            upload_url_ttl: config.upload_url_ttl,
        }
    }

    /// Storage key for an uploaded source file.
    fn original_key(video_id: Uuid, file_name: &str) -> String {
        format!("originals/{video_id}/{file_name}")
    }

    /// Storage key prefix for generated HLS artifacts.
    fn hls_output_key(video_id: Uuid) -> String {
        format!("hls/{video_id}/")
    }
}

#[async_trait]
impl VideoService for LifecycleService {
    async fn create_video(&self, input: CreateVideoInput) -> ServiceResult<CreateVideoOutput> {
        let mut video = Video::new(input.user_id, input.title)?;

        let key = Self::original_key(video.id, &input.file_name);

        // The signed URL is produced before insertion; if the insert fails
        // the caller never learns of the URL.
        let upload_url = self
            .storage
            .generate_presigned_upload_url(&key, self.upload_url_ttl)
            .await?;

        video.set_original_url(&key);
        self.repo.create(&video).await?;

        info!(video_id = %video.id, user_id = %video.user_id, "created video");

        Ok(CreateVideoOutput { video, upload_url })
    }

    async fn trigger_process(&self, video_id: Uuid) -> ServiceResult<()> {
        let mut video = self.repo.get_by_id(video_id).await?;

        // Idempotent: a video already in flight is a success.
        if video.status == VideoStatus::Processing {
            return Ok(());
        }

        if video.status.is_terminal() {
            return Err(ServiceError::AlreadyCompleted);
        }

        video.transition_to(VideoStatus::Processing)?;
        self.repo.update(&video).await?;

        let task = TranscodeTask::new(
            video.id,
            video.original_url.clone().unwrap_or_default(),
            Self::hls_output_key(video.id),
        );
        self.queue.publish_transcode_task(&task).await?;

        info!(video_id = %video.id, "queued transcode task");
        Ok(())
    }

    async fn get_video(&self, video_id: Uuid) -> ServiceResult<Video> {
        Ok(self.repo.get_by_id(video_id).await?)
    }
}
