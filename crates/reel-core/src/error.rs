//! Service error types.

use thiserror::Error;

use reel_cache::CacheError;
use reel_db::DbError;
use reel_models::VideoError;
use reel_queue::QueueError;
use reel_storage::StorageError;

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors surfaced by the video services.
///
/// `Clone` because coalesced readers share a single outcome, error included.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Video(#[from] VideoError),

    #[error("video processing has already completed")]
    AlreadyCompleted,

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl ServiceError {
    /// Whether this error means the requested video does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::Db(DbError::NotFound))
    }
}
