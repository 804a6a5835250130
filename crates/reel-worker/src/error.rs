//! Worker error types.

use thiserror::Error;

/// Result type for worker operations.
pub type WorkerResult<T> = Result<T, WorkerError>;

/// Errors that can occur while processing a transcode task.
///
/// Any error returned from task processing is transient from the broker's
/// point of view; the consume loop republishes with a bumped retry count.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("database error: {0}")]
    Db(#[from] reel_db::DbError),

    #[error("storage error: {0}")]
    Storage(#[from] reel_storage::StorageError),

    #[error("media error: {0}")]
    Media(#[from] reel_media::MediaError),

    #[error("cache error: {0}")]
    Cache(#[from] reel_cache::CacheError),

    #[error("queue error: {0}")]
    Queue(#[from] reel_queue::QueueError),

    #[error(transparent)]
    Video(#[from] reel_models::VideoError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
