//! Redis implementation of the video metadata cache.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use reel_models::{Video, VideoStatus};

use crate::error::{CacheError, CacheResult};

/// Prefix for video cache keys.
const VIDEO_KEY_PREFIX: &str = "video:";

/// Metadata cache contract.
///
/// Production binds to [`RedisVideoCache`]; tests bind to in-memory fakes.
#[async_trait]
pub trait VideoCache: Send + Sync {
    /// Fetch a cached snapshot. `Ok(None)` on a missing key; faults are
    /// reported as errors, distinct from misses.
    async fn get(&self, id: Uuid) -> CacheResult<Option<Video>>;

    /// Store a snapshot with the given TTL. Best effort.
    async fn set(&self, video: &Video, ttl: Duration) -> CacheResult<()>;

    /// Remove a snapshot. Idempotent.
    async fn delete(&self, id: Uuid) -> CacheResult<()>;
}

/// Configuration for the Redis client.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    /// Empty means no authentication
    pub password: String,
    pub db: i64,
    /// TTL applied to cached snapshots
    pub ttl: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            password: String::new(),
            db: 0,
            ttl: Duration::from_secs(300),
        }
    }
}

impl RedisConfig {
    /// Create config from `REDIS_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("REDIS_HOST").unwrap_or(defaults.host),
            port: std::env::var("REDIS_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            password: std::env::var("REDIS_PASSWORD").unwrap_or(defaults.password),
            db: std::env::var("REDIS_DB")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.db),
            ttl: Duration::from_secs(
                std::env::var("REDIS_TTL")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.ttl.as_secs()),
            ),
        }
    }

    /// Redis connection URL.
    pub fn url(&self) -> String {
        if self.password.is_empty() {
            format!("redis://{}:{}/{}", self.host, self.port, self.db)
        } else {
            format!(
                "redis://:{}@{}:{}/{}",
                self.password, self.host, self.port, self.db
            )
        }
    }
}

/// JSON representation of a video for caching.
///
/// An explicit wire struct keeps the cache encoding decoupled from the
/// domain model: identifiers as canonical strings, timestamps in
/// nanosecond-precision RFC 3339, status by enum name.
#[derive(Debug, Serialize, Deserialize)]
struct VideoRecord {
    id: String,
    user_id: String,
    title: String,
    status: String,
    original_url: String,
    hls_url: String,
    created_at: String,
    updated_at: String,
}

impl VideoRecord {
    fn from_video(video: &Video) -> Self {
        Self {
            id: video.id.to_string(),
            user_id: video.user_id.to_string(),
            title: video.title.clone(),
            status: video.status.as_str().to_string(),
            original_url: video.original_url.clone().unwrap_or_default(),
            hls_url: video.hls_url.clone().unwrap_or_default(),
            created_at: video.created_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
            updated_at: video.updated_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
        }
    }

    fn into_video(self) -> CacheResult<Video> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| CacheError::deserialize(format!("parse video ID: {e}")))?;
        let user_id = Uuid::parse_str(&self.user_id)
            .map_err(|e| CacheError::deserialize(format!("parse user ID: {e}")))?;
        let status = VideoStatus::parse(&self.status)
            .ok_or_else(|| CacheError::deserialize(format!("unknown status: {}", self.status)))?;
        let created_at = parse_timestamp(&self.created_at, "created_at")?;
        let updated_at = parse_timestamp(&self.updated_at, "updated_at")?;

        Ok(Video {
            id,
            user_id,
            title: self.title,
            status,
            original_url: none_if_empty(self.original_url),
            hls_url: none_if_empty(self.hls_url),
            created_at,
            updated_at,
        })
    }
}

fn parse_timestamp(s: &str, field: &str) -> CacheResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| CacheError::deserialize(format!("parse {field}: {e}")))
}

fn none_if_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Redis-backed video metadata cache.
#[derive(Clone)]
pub struct RedisVideoCache {
    client: redis::Client,
}

impl RedisVideoCache {
    /// Create a new cache client.
    pub fn new(config: &RedisConfig) -> CacheResult<Self> {
        let client = redis::Client::open(config.url().as_str())?;
        Ok(Self { client })
    }

    /// Create from environment variables.
    pub fn from_env() -> CacheResult<Self> {
        Self::new(&RedisConfig::from_env())
    }

    /// Verify the Redis connection is alive.
    pub async fn ping(&self) -> CacheResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<()>(&mut conn).await?;
        Ok(())
    }

    fn build_key(id: Uuid) -> String {
        format!("{VIDEO_KEY_PREFIX}{id}")
    }
}

#[async_trait]
impl VideoCache for RedisVideoCache {
    async fn get(&self, id: Uuid) -> CacheResult<Option<Video>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let data: Option<String> = conn.get(Self::build_key(id)).await?;
        let Some(data) = data else {
            return Ok(None); // cache miss
        };

        let record: VideoRecord = serde_json::from_str(&data)
            .map_err(|e| CacheError::deserialize(e.to_string()))?;

        record.into_video().map(Some)
    }

    async fn set(&self, video: &Video, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let record = VideoRecord::from_video(video);
        let data =
            serde_json::to_string(&record).map_err(|e| CacheError::Serialize(e.to_string()))?;

        conn.set_ex::<_, _, ()>(Self::build_key(video.id), data, ttl.as_secs())
            .await?;

        debug!(video_id = %video.id, "cached video metadata");
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> CacheResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.del::<_, ()>(Self::build_key(id)).await?;
        Ok(())
    }
}
