//! Task processing: download, transcode, upload, state update.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use reel_cache::VideoCache;
use reel_db::VideoRepository;
use reel_media::{default_abr_variants, AbrOutput, Transcoder};
use reel_models::{TranscodeTask, VideoStatus};
use reel_storage::ObjectStorage;

use crate::error::WorkerResult;
use crate::workdir::WorkDir;

const MANIFEST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
const SEGMENT_CONTENT_TYPE: &str = "video/mp2t";

/// Processes transcode tasks: at-least-once, idempotent against the
/// video state machine.
pub struct TranscodeProcessor {
    repo: Arc<dyn VideoRepository>,
    storage: Arc<dyn ObjectStorage>,
    transcoder: Arc<dyn Transcoder>,
    cache: Arc<dyn VideoCache>,
    temp_dir: PathBuf,
    max_retries: u32,
}

impl TranscodeProcessor {
    pub fn new(
        repo: Arc<dyn VideoRepository>,
        storage: Arc<dyn ObjectStorage>,
        transcoder: Arc<dyn Transcoder>,
        cache: Arc<dyn VideoCache>,
        temp_dir: PathBuf,
        max_retries: u32,
    ) -> Self {
        Self {
            repo,
            storage,
            transcoder,
            cache,
            temp_dir,
            max_retries,
        }
    }

    /// Handle one task delivery.
    ///
    /// Returns `Ok` on success or permanent resolution (retry budget
    /// exhausted, or the video is no longer processing). Returns an error
    /// only for transient failures the broker layer should retry.
    pub async fn process_task(
        &self,
        cancel: &CancellationToken,
        task: &TranscodeTask,
    ) -> WorkerResult<()> {
        if task.retry_count >= self.max_retries {
            warn!(
                video_id = %task.video_id,
                retry_count = task.retry_count,
                "retry budget exhausted, marking video failed"
            );
            self.mark_video_failed(task.video_id).await;
            return Ok(());
        }

        // All exit paths below remove the working directory.
        let workdir = WorkDir::create(&self.temp_dir, task.video_id).await?;

        let input_path = workdir.path().join(source_filename(&task.original_key));
        self.storage
            .download_to_file(&task.original_key, &input_path)
            .await?;

        let output_dir = workdir.path().join("hls");
        tokio::fs::create_dir_all(&output_dir).await?;

        let variants = default_abr_variants();
        let abr = self
            .transcoder
            .transcode_to_abr(cancel, &input_path, &output_dir, &variants)
            .await?;

        let master_key = self.upload_abr_files(&task.output_key, &abr).await?;

        self.mark_video_ready(task.video_id, &master_key).await?;

        info!(video_id = %task.video_id, master_key = %master_key, "transcode task completed");
        Ok(())
    }

    /// Upload the master manifest, then each variant playlist and its
    /// segments, in order. Returns the master manifest key.
    async fn upload_abr_files(
        &self,
        output_key_prefix: &str,
        abr: &AbrOutput,
    ) -> WorkerResult<String> {
        let master_key = format!("{output_key_prefix}master.m3u8");
        self.storage
            .upload_file(&master_key, &abr.master_manifest_path, MANIFEST_CONTENT_TYPE)
            .await?;

        for variant in &abr.variants {
            let variant_prefix = format!("{output_key_prefix}{}/", variant.variant.name);

            let playlist_key = format!("{variant_prefix}playlist.m3u8");
            self.storage
                .upload_file(&playlist_key, &variant.manifest_path, MANIFEST_CONTENT_TYPE)
                .await?;

            for segment_path in &variant.segment_paths {
                let segment_name = segment_path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let segment_key = format!("{variant_prefix}{segment_name}");
                self.storage
                    .upload_file(&segment_key, segment_path, SEGMENT_CONTENT_TYPE)
                    .await?;
            }
        }

        Ok(master_key)
    }

    /// Flip the video to READY, unless another path already resolved it.
    async fn mark_video_ready(&self, video_id: Uuid, master_key: &str) -> WorkerResult<()> {
        let mut video = self.repo.get_by_id(video_id).await?;

        if video.status != VideoStatus::Processing {
            // Late arrival: resolved elsewhere, nothing to mutate.
            info!(
                video_id = %video_id,
                status = %video.status,
                "video no longer processing, skipping ready transition"
            );
            return Ok(());
        }

        video.set_hls_url(master_key);
        video.transition_to(VideoStatus::Ready)?;
        self.repo.update(&video).await?;

        self.invalidate_cache(video_id).await;
        Ok(())
    }

    /// Terminalize a video whose retry budget is spent. Persistence
    /// failures are logged and swallowed so the message is still acked;
    /// the row then stays PROCESSING for manual inspection.
    async fn mark_video_failed(&self, video_id: Uuid) {
        let mut video = match self.repo.get_by_id(video_id).await {
            Ok(video) => video,
            Err(e) => {
                error!(video_id = %video_id, error = %e, "failed to load video for failure transition");
                return;
            }
        };

        if video.status != VideoStatus::Processing {
            return;
        }

        if let Err(e) = video.transition_to(VideoStatus::Failed) {
            error!(video_id = %video_id, error = %e, "failed to transition video to failed");
            return;
        }
        if let Err(e) = self.repo.update(&video).await {
            error!(video_id = %video_id, error = %e, "failed to persist failed status");
            return;
        }

        self.invalidate_cache(video_id).await;
    }

    async fn invalidate_cache(&self, video_id: Uuid) {
        if let Err(e) = self.cache.delete(video_id).await {
            warn!(video_id = %video_id, error = %e, "failed to invalidate video cache");
        }
    }
}

/// Local filename for the downloaded source: the last path component of
/// the storage key, or a default when the key has none.
fn source_filename(original_key: &str) -> String {
    match original_key.rsplit('/').next() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => "original.mp4".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use reel_cache::CacheResult;
    use reel_db::{DbError, DbResult};
    use reel_media::{
        write_master_playlist, AbrVariant, MediaError, MediaResult, VariantOutput,
    };
    use reel_models::Video;
    use reel_storage::{StorageError, StorageResult};

    use crate::WorkerError;

    #[derive(Default)]
    struct FakeRepo {
        videos: Mutex<HashMap<Uuid, Video>>,
    }

    impl FakeRepo {
        fn insert(&self, video: Video) {
            self.videos.lock().unwrap().insert(video.id, video);
        }

        fn get(&self, id: Uuid) -> Option<Video> {
            self.videos.lock().unwrap().get(&id).cloned()
        }
    }

    #[async_trait]
    impl VideoRepository for FakeRepo {
        async fn create(&self, video: &Video) -> DbResult<()> {
            self.videos.lock().unwrap().insert(video.id, video.clone());
            Ok(())
        }

        async fn get_by_id(&self, id: Uuid) -> DbResult<Video> {
            self.videos
                .lock()
                .unwrap()
                .get(&id)
                .cloned()
                .ok_or(DbError::NotFound)
        }

        async fn get_by_user(&self, _user_id: Uuid) -> DbResult<Vec<Video>> {
            Ok(Vec::new())
        }

        async fn update(&self, video: &Video) -> DbResult<()> {
            let mut videos = self.videos.lock().unwrap();
            if !videos.contains_key(&video.id) {
                return Err(DbError::NotFound);
            }
            videos.insert(video.id, video.clone());
            Ok(())
        }

        async fn update_status(&self, id: Uuid, status: VideoStatus) -> DbResult<()> {
            let mut videos = self.videos.lock().unwrap();
            match videos.get_mut(&id) {
                Some(video) => {
                    video.status = status;
                    Ok(())
                }
                None => Err(DbError::NotFound),
            }
        }
    }

    /// Object store fake backed by a key/bytes map, recording uploads in
    /// order and optionally failing on one key.
    #[derive(Default)]
    struct FakeStorage {
        objects: Mutex<HashMap<String, Vec<u8>>>,
        uploads: Mutex<Vec<(String, String)>>,
        fail_upload_containing: Mutex<Option<String>>,
    }

    impl FakeStorage {
        fn put(&self, key: &str, data: &[u8]) {
            self.objects
                .lock()
                .unwrap()
                .insert(key.to_string(), data.to_vec());
        }

        fn uploads(&self) -> Vec<(String, String)> {
            self.uploads.lock().unwrap().clone()
        }

        fn fail_uploads_containing(&self, fragment: &str) {
            *self.fail_upload_containing.lock().unwrap() = Some(fragment.to_string());
        }
    }

    #[async_trait]
    impl ObjectStorage for FakeStorage {
        async fn generate_presigned_upload_url(
            &self,
            key: &str,
            _expires_in: Duration,
        ) -> StorageResult<String> {
            Ok(format!("http://storage.local/{key}"))
        }

        async fn generate_presigned_download_url(
            &self,
            key: &str,
            _expires_in: Duration,
        ) -> StorageResult<String> {
            Ok(format!("http://storage.local/{key}"))
        }

        async fn upload_file(
            &self,
            key: &str,
            path: &Path,
            content_type: &str,
        ) -> StorageResult<()> {
            if let Some(fragment) = self.fail_upload_containing.lock().unwrap().as_deref() {
                if key.contains(fragment) {
                    return Err(StorageError::upload_failed("injected upload failure"));
                }
            }
            let data = std::fs::read(path)?;
            self.objects.lock().unwrap().insert(key.to_string(), data);
            self.uploads
                .lock()
                .unwrap()
                .push((key.to_string(), content_type.to_string()));
            Ok(())
        }

        async fn download_to_file(&self, key: &str, path: &Path) -> StorageResult<()> {
            let data = self
                .objects
                .lock()
                .unwrap()
                .get(key)
                .cloned()
                .ok_or_else(|| StorageError::not_found(key))?;
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, data)?;
            Ok(())
        }

        async fn delete(&self, key: &str) -> StorageResult<()> {
            self.objects.lock().unwrap().remove(key);
            Ok(())
        }

        async fn exists(&self, key: &str) -> StorageResult<bool> {
            Ok(self.objects.lock().unwrap().contains_key(key))
        }
    }

    /// Transcoder fake that fabricates playlists and segments on disk.
    struct FakeTranscoder {
        segments_per_variant: usize,
    }

    #[async_trait]
    impl Transcoder for FakeTranscoder {
        async fn transcode_to_abr(
            &self,
            _cancel: &CancellationToken,
            source_path: &Path,
            output_dir: &Path,
            variants: &[AbrVariant],
        ) -> MediaResult<AbrOutput> {
            if tokio::fs::metadata(source_path).await.is_err() {
                return Err(MediaError::invalid_input("missing input"));
            }

            let mut outputs = Vec::new();
            for variant in variants {
                let dir = output_dir.join(&variant.name);
                tokio::fs::create_dir_all(&dir).await?;

                let manifest = dir.join("playlist.m3u8");
                tokio::fs::write(&manifest, b"#EXTM3U\n").await?;

                let mut segment_paths = Vec::new();
                for i in 0..self.segments_per_variant {
                    let segment = dir.join(format!("segment_{i:03}.ts"));
                    tokio::fs::write(&segment, b"ts-data").await?;
                    segment_paths.push(segment);
                }

                outputs.push(VariantOutput {
                    variant: variant.clone(),
                    manifest_path: manifest,
                    segment_paths,
                });
            }

            let master = output_dir.join("master.m3u8");
            write_master_playlist(&master, variants).await?;

            Ok(AbrOutput {
                master_manifest_path: master,
                variants: outputs,
            })
        }
    }

    #[derive(Default)]
    struct FakeCache {
        entries: Mutex<HashMap<Uuid, Video>>,
    }

    impl FakeCache {
        fn insert(&self, video: Video) {
            self.entries.lock().unwrap().insert(video.id, video);
        }

        fn contains(&self, id: Uuid) -> bool {
            self.entries.lock().unwrap().contains_key(&id)
        }
    }

    #[async_trait]
    impl VideoCache for FakeCache {
        async fn get(&self, id: Uuid) -> CacheResult<Option<Video>> {
            Ok(self.entries.lock().unwrap().get(&id).cloned())
        }

        async fn set(&self, video: &Video, _ttl: Duration) -> CacheResult<()> {
            self.entries
                .lock()
                .unwrap()
                .insert(video.id, video.clone());
            Ok(())
        }

        async fn delete(&self, id: Uuid) -> CacheResult<()> {
            self.entries.lock().unwrap().remove(&id);
            Ok(())
        }
    }

    struct Harness {
        repo: Arc<FakeRepo>,
        storage: Arc<FakeStorage>,
        cache: Arc<FakeCache>,
        processor: TranscodeProcessor,
        temp_root: tempfile::TempDir,
    }

    fn harness() -> Harness {
        let repo = Arc::new(FakeRepo::default());
        let storage = Arc::new(FakeStorage::default());
        let cache = Arc::new(FakeCache::default());
        let temp_root = tempfile::tempdir().unwrap();

        let processor = TranscodeProcessor::new(
            Arc::clone(&repo) as _,
            Arc::clone(&storage) as _,
            Arc::new(FakeTranscoder {
                segments_per_variant: 2,
            }),
            Arc::clone(&cache) as _,
            temp_root.path().to_path_buf(),
            3,
        );

        Harness {
            repo,
            storage,
            cache,
            processor,
            temp_root,
        }
    }

    fn processing_video() -> Video {
        let mut video = Video::new(Uuid::new_v4(), "Demo").unwrap();
        video.set_original_url(format!("originals/{}/a.mp4", video.id));
        video.transition_to(VideoStatus::Processing).unwrap();
        video
    }

    fn task_for(video: &Video) -> TranscodeTask {
        TranscodeTask::new(
            video.id,
            video.original_url.clone().unwrap(),
            format!("hls/{}/", video.id),
        )
    }

    #[tokio::test]
    async fn test_successful_task_marks_video_ready() {
        let h = harness();
        let video = processing_video();
        let task = task_for(&video);
        h.storage.put(&task.original_key, b"source-bytes");
        h.repo.insert(video.clone());
        h.cache.insert(video.clone());

        let cancel = CancellationToken::new();
        h.processor.process_task(&cancel, &task).await.unwrap();

        let stored = h.repo.get(video.id).unwrap();
        assert_eq!(stored.status, VideoStatus::Ready);
        assert_eq!(
            stored.hls_url.as_deref(),
            Some(format!("hls/{}/master.m3u8", video.id).as_str())
        );
        assert!(!h.cache.contains(video.id));

        // Workdir cleaned up.
        assert!(!h.temp_root.path().join(video.id.to_string()).exists());
    }

    #[tokio::test]
    async fn test_uploads_are_ordered_with_spec_content_types() {
        let h = harness();
        let video = processing_video();
        let task = task_for(&video);
        h.storage.put(&task.original_key, b"source-bytes");
        h.repo.insert(video.clone());

        let cancel = CancellationToken::new();
        h.processor.process_task(&cancel, &task).await.unwrap();

        let uploads = h.storage.uploads();
        let prefix = format!("hls/{}/", video.id);

        // Master first.
        assert_eq!(
            uploads[0],
            (
                format!("{prefix}master.m3u8"),
                "application/vnd.apple.mpegurl".to_string()
            )
        );
        // Then each variant playlist followed by its segments, in ladder order.
        assert_eq!(uploads[1].0, format!("{prefix}1080p/playlist.m3u8"));
        assert_eq!(uploads[1].1, "application/vnd.apple.mpegurl");
        assert_eq!(uploads[2].0, format!("{prefix}1080p/segment_000.ts"));
        assert_eq!(uploads[2].1, "video/mp2t");
        assert_eq!(uploads[3].0, format!("{prefix}1080p/segment_001.ts"));
        assert_eq!(uploads[4].0, format!("{prefix}720p/playlist.m3u8"));
        assert_eq!(uploads[7].0, format!("{prefix}360p/playlist.m3u8"));
        assert_eq!(uploads.len(), 1 + 3 * 3);
    }

    #[tokio::test]
    async fn test_retry_budget_exhausted_marks_video_failed() {
        let h = harness();
        let video = processing_video();
        let mut task = task_for(&video);
        task.retry_count = 3;
        h.repo.insert(video.clone());
        h.cache.insert(video.clone());

        let cancel = CancellationToken::new();
        h.processor.process_task(&cancel, &task).await.unwrap();

        let stored = h.repo.get(video.id).unwrap();
        assert_eq!(stored.status, VideoStatus::Failed);
        assert!(!h.cache.contains(video.id));
        assert!(h.storage.uploads().is_empty());
    }

    #[tokio::test]
    async fn test_terminalize_skips_already_resolved_video() {
        let h = harness();
        let mut video = processing_video();
        video.set_hls_url("hls/x/master.m3u8");
        video.transition_to(VideoStatus::Ready).unwrap();
        let mut task = task_for(&video);
        task.retry_count = 5;
        h.repo.insert(video.clone());

        let cancel = CancellationToken::new();
        h.processor.process_task(&cancel, &task).await.unwrap();

        assert_eq!(h.repo.get(video.id).unwrap().status, VideoStatus::Ready);
    }

    #[tokio::test]
    async fn test_terminalize_missing_video_still_succeeds() {
        let h = harness();
        let video = processing_video();
        let mut task = task_for(&video);
        task.retry_count = 3;
        // Video never persisted: the ack must still happen.

        let cancel = CancellationToken::new();
        h.processor.process_task(&cancel, &task).await.unwrap();
    }

    #[tokio::test]
    async fn test_late_arrival_does_not_mutate_resolved_video() {
        let h = harness();
        let mut video = processing_video();
        video.transition_to(VideoStatus::Failed).unwrap();
        let task = task_for(&video);
        h.storage.put(&task.original_key, b"source-bytes");
        h.repo.insert(video.clone());

        let cancel = CancellationToken::new();
        h.processor.process_task(&cancel, &task).await.unwrap();

        let stored = h.repo.get(video.id).unwrap();
        assert_eq!(stored.status, VideoStatus::Failed);
        assert!(stored.hls_url.is_none());
    }

    #[tokio::test]
    async fn test_download_failure_is_transient_and_cleans_up() {
        let h = harness();
        let video = processing_video();
        let task = task_for(&video);
        // Source object never uploaded.
        h.repo.insert(video.clone());

        let cancel = CancellationToken::new();
        let err = h.processor.process_task(&cancel, &task).await.unwrap_err();
        assert!(matches!(err, WorkerError::Storage(_)));

        assert_eq!(h.repo.get(video.id).unwrap().status, VideoStatus::Processing);
        assert!(!h.temp_root.path().join(video.id.to_string()).exists());
    }

    #[tokio::test]
    async fn test_segment_upload_failure_leaves_row_processing() {
        let h = harness();
        let video = processing_video();
        let task = task_for(&video);
        h.storage.put(&task.original_key, b"source-bytes");
        h.storage.fail_uploads_containing("720p/segment_001.ts");
        h.repo.insert(video.clone());

        let cancel = CancellationToken::new();
        let err = h.processor.process_task(&cancel, &task).await.unwrap_err();
        assert!(matches!(err, WorkerError::Storage(_)));

        let stored = h.repo.get(video.id).unwrap();
        assert_eq!(stored.status, VideoStatus::Processing);
        assert!(stored.hls_url.is_none());
        assert!(!h.temp_root.path().join(video.id.to_string()).exists());
    }

    #[test]
    fn test_source_filename_from_key() {
        assert_eq!(source_filename("originals/abc/movie.mp4"), "movie.mp4");
        assert_eq!(source_filename("originals/abc/"), "original.mp4");
        assert_eq!(source_filename(""), "original.mp4");
        assert_eq!(source_filename("plain.mov"), "plain.mov");
    }
}
