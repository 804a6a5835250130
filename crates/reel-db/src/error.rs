//! Database error types.

use thiserror::Error;

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Errors that can occur during database operations.
///
/// Variants carry rendered messages rather than driver errors so the type
/// stays `Clone` (service results are shared between coalesced readers).
#[derive(Debug, Clone, Error)]
pub enum DbError {
    #[error("video not found")]
    NotFound,

    #[error("video already exists")]
    Duplicate,

    #[error("failed to configure database client: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),
}

impl DbError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }
}
