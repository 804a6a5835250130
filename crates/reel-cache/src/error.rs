//! Cache error types.

use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors that can occur during cache operations.
///
/// A miss is not an error; reads return `Ok(None)` for absent keys.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(String),

    #[error("failed to serialize video: {0}")]
    Serialize(String),

    #[error("failed to deserialize video: {0}")]
    Deserialize(String),
}

impl CacheError {
    pub fn deserialize(msg: impl Into<String>) -> Self {
        Self::Deserialize(msg.into())
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        Self::Redis(err.to_string())
    }
}
