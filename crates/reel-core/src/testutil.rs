//! In-memory fakes for the capability traits, shared by service tests.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use reel_cache::{CacheError, CacheResult, VideoCache};
use reel_db::{DbError, DbResult, VideoRepository};
use reel_models::{TranscodeTask, Video, VideoStatus};
use reel_queue::{QueueError, QueueResult, TranscodeQueue};
use reel_storage::{ObjectStorage, StorageError, StorageResult};

use crate::error::ServiceResult;
use crate::service::{CreateVideoInput, CreateVideoOutput, VideoService};

/// Shared ordered log of side effects, for asserting call sequences.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<String>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

/// Hash-map repository with call counting and an optional read delay.
#[derive(Default)]
pub struct InMemoryVideoRepository {
    videos: Mutex<HashMap<Uuid, Video>>,
    get_calls: AtomicUsize,
    get_delay: Mutex<Option<Duration>>,
}

impl InMemoryVideoRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, video: Video) {
        self.videos.lock().unwrap().insert(video.id, video);
    }

    pub fn set_status(&self, id: Uuid, status: VideoStatus) {
        if let Some(video) = self.videos.lock().unwrap().get_mut(&id) {
            video.status = status;
        }
    }

    pub fn len(&self) -> usize {
        self.videos.lock().unwrap().len()
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// Make reads slow enough that concurrent callers overlap.
    pub fn delay_gets(&self, delay: Duration) {
        *self.get_delay.lock().unwrap() = Some(delay);
    }
}

#[async_trait]
impl VideoRepository for InMemoryVideoRepository {
    async fn create(&self, video: &Video) -> DbResult<()> {
        let mut videos = self.videos.lock().unwrap();
        if videos.contains_key(&video.id) {
            return Err(DbError::Duplicate);
        }
        videos.insert(video.id, video.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> DbResult<Video> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.get_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.videos
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(DbError::NotFound)
    }

    async fn get_by_user(&self, user_id: Uuid) -> DbResult<Vec<Video>> {
        let mut videos: Vec<_> = self
            .videos
            .lock()
            .unwrap()
            .values()
            .filter(|v| v.user_id == user_id)
            .cloned()
            .collect();
        videos.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(videos)
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
                video.updated_at = chrono::Utc::now();
                Ok(())
            }
            None => Err(DbError::NotFound),
        }
    }
}

/// Storage fake that mints deterministic presigned URLs.
#[derive(Default)]
pub struct FakeObjectStorage {
    uploads: Mutex<Vec<String>>,
}

impl FakeObjectStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStorage for FakeObjectStorage {
    async fn generate_presigned_upload_url(
        &self,
        key: &str,
        _expires_in: Duration,
    ) -> StorageResult<String> {
        Ok(format!("http://storage.local/videos/{key}?signature=test"))
    }

    async fn generate_presigned_download_url(
        &self,
        key: &str,
        _expires_in: Duration,
    ) -> StorageResult<String> {
        Ok(format!("http://storage.local/videos/{key}?signature=test"))
    }

    async fn upload_file(&self, key: &str, _path: &Path, _content_type: &str) -> StorageResult<()> {
        self.uploads.lock().unwrap().push(key.to_string());
        Ok(())
    }

    async fn download_to_file(&self, key: &str, _path: &Path) -> StorageResult<()> {
        Err(StorageError::not_found(key))
    }

    async fn delete(&self, _key: &str) -> StorageResult<()> {
        Ok(())
    }

    async fn exists(&self, _key: &str) -> StorageResult<bool> {
        Ok(false)
    }
}

/// Queue fake that records published tasks, optionally failing.
#[derive(Default)]
pub struct RecordingQueue {
    published: Mutex<Vec<TranscodeTask>>,
    fail: bool,
}

impl RecordingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn published(&self) -> Vec<TranscodeTask> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl TranscodeQueue for RecordingQueue {
    async fn publish_transcode_task(&self, task: &TranscodeTask) -> QueueResult<()> {
        if self.fail {
            return Err(QueueError::publish("broker unavailable"));
        }
        self.published.lock().unwrap().push(task.clone());
        Ok(())
    }
}

/// Hash-map cache fake; TTLs are ignored.
#[derive(Default)]
pub struct InMemoryVideoCache {
    entries: Mutex<HashMap<Uuid, Video>>,
    fail_reads: AtomicBool,
    log: Option<EventLog>,
}

impl InMemoryVideoCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log(log: EventLog) -> Self {
        Self {
            log: Some(log),
            ..Self::default()
        }
    }

    pub fn insert(&self, video: Video) {
        self.entries.lock().unwrap().insert(video.id, video);
    }

    pub fn entry(&self, id: Uuid) -> Option<Video> {
        self.entries.lock().unwrap().get(&id).cloned()
    }

    pub fn delete_entry(&self, id: Uuid) {
        self.entries.lock().unwrap().remove(&id);
    }

    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    fn record(&self, event: &str) {
        if let Some(log) = &self.log {
            log.push(event);
        }
    }
}

#[async_trait]
impl VideoCache for InMemoryVideoCache {
    async fn get(&self, id: Uuid) -> CacheResult<Option<Video>> {
        self.record("cache.get");
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(CacheError::Redis("connection refused".into()));
        }
        Ok(self.entries.lock().unwrap().get(&id).cloned())
    }

    async fn set(&self, video: &Video, _ttl: Duration) -> CacheResult<()> {
        self.record("cache.set");
        self.entries
            .lock()
            .unwrap()
            .insert(video.id, video.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> CacheResult<()> {
        self.record("cache.delete");
        self.entries.lock().unwrap().remove(&id);
        Ok(())
    }
}

/// Service fake that only records which operation was invoked.
pub struct RecordingService {
    log: EventLog,
}

impl RecordingService {
    pub fn new(log: EventLog) -> Self {
        Self { log }
    }
}

#[async_trait]
impl VideoService for RecordingService {
    async fn create_video(&self, input: CreateVideoInput) -> ServiceResult<CreateVideoOutput> {
        self.log.push("inner.create_video");
        let video = Video::new(input.user_id, input.title)?;
        Ok(CreateVideoOutput {
            video,
            upload_url: "http://storage.local/upload?signature=test".into(),
        })
    }

    async fn trigger_process(&self, _video_id: Uuid) -> ServiceResult<()> {
        self.log.push("inner.trigger_process");
        Ok(())
    }

    async fn get_video(&self, _video_id: Uuid) -> ServiceResult<Video> {
        self.log.push("inner.get_video");
        Err(DbError::NotFound.into())
    }
}
