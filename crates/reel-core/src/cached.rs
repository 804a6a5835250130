//! Caching decorator over the lifecycle service.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use tracing::warn;
use uuid::Uuid;

use reel_cache::VideoCache;
use reel_models::Video;

use crate::error::ServiceResult;
use crate::service::{CreateVideoInput, CreateVideoOutput, VideoService};
use crate::singleflight::Singleflight;

/// Counter of singleflight outcomes on the read path.
pub const SINGLEFLIGHT_COUNTER: &str = "reel_video_read_singleflight_total";

/// Configuration for [`CachedVideoService`].
#[derive(Debug, Clone)]
pub struct CachedVideoConfig {
    /// TTL for cached video snapshots
    pub cache_ttl: Duration,
    /// Base URL of the caching edge that fronts the object store
    pub cdn_base_url: String,
}

impl Default for CachedVideoConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(300),
            cdn_base_url: "http://localhost:8081".to_string(),
        }
    }
}

/// Decorates a [`VideoService`] with a TTL cache, per-key request
/// coalescing, and CDN URL enrichment on the read path.
pub struct CachedVideoService {
    inner: Arc<dyn VideoService>,
    cache: Arc<dyn VideoCache>,
    flight: Singleflight<ServiceResult<Video>>,
    cache_ttl: Duration,
    cdn_base_url: String,
}

impl CachedVideoService {
    pub fn new(
        inner: Arc<dyn VideoService>,
        cache: Arc<dyn VideoCache>,
        config: CachedVideoConfig,
    ) -> Self {
        Self {
            inner,
            cache,
            flight: Singleflight::new(),
            cache_ttl: config.cache_ttl,
            cdn_base_url: config.cdn_base_url,
        }
    }

    /// Cache-aside fetch: cache errors degrade to the authoritative store
    /// and are never propagated; a fill failure is logged and ignored.
    async fn fetch_with_cache(
        inner: Arc<dyn VideoService>,
        cache: Arc<dyn VideoCache>,
        cache_ttl: Duration,
        video_id: Uuid,
    ) -> ServiceResult<Video> {
        match cache.get(video_id).await {
            Ok(Some(video)) => return Ok(video),
            Ok(None) => {}
            Err(e) => {
                warn!(video_id = %video_id, error = %e, "cache get failed, falling back to store");
            }
        }

        let video = inner.get_video(video_id).await?;

        if let Err(e) = cache.set(&video, cache_ttl).await {
            warn!(video_id = %video_id, error = %e, "failed to cache video");
        }

        Ok(video)
    }

    /// Rewrite the storage key into an edge-served URL on a copy, for
    /// ready videos only. The cached record keeps the opaque key.
    fn enrich_with_cdn_url(&self, mut video: Video) -> Video {
        if video.is_ready() && video.hls_url.as_deref().is_some_and(|url| !url.is_empty()) {
            video.hls_url = Some(self.build_cdn_url(video.id));
        }
        video
    }

    /// `{cdn_base}/hls/{id}/master.m3u8`
    fn build_cdn_url(&self, video_id: Uuid) -> String {
        format!(
            "{}/hls/{}/master.m3u8",
            self.cdn_base_url.trim_end_matches('/'),
            video_id
        )
    }
}

#[async_trait]
impl VideoService for CachedVideoService {
    /// Pure pass-through; creation is never cached.
    async fn create_video(&self, input: CreateVideoInput) -> ServiceResult<CreateVideoOutput> {
        self.inner.create_video(input).await
    }

    /// Invalidate before delegating so a stale PENDING_UPLOAD snapshot
    /// cannot outlive the status flip.
    async fn trigger_process(&self, video_id: Uuid) -> ServiceResult<()> {
        if let Err(e) = self.cache.delete(video_id).await {
            warn!(video_id = %video_id, error = %e, "failed to invalidate cache on trigger process");
        }

        self.inner.trigger_process(video_id).await
    }

    /// The hot path: concurrent reads of one id collapse into a single
    /// backing fetch whose outcome all callers share.
    async fn get_video(&self, video_id: Uuid) -> ServiceResult<Video> {
        let key = video_id.to_string();
        let inner = Arc::clone(&self.inner);
        let cache = Arc::clone(&self.cache);
        let cache_ttl = self.cache_ttl;

        let (result, shared) = self
            .flight
            .run(&key, move || {
                Self::fetch_with_cache(inner, cache, cache_ttl, video_id)
            })
            .await;

        let outcome = if shared { "shared" } else { "initiated" };
        counter!(SINGLEFLIGHT_COUNTER, "outcome" => outcome).increment(1);

        let video = result?;
        Ok(self.enrich_with_cdn_url(video))
    }
}
