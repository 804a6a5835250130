//! Queue error types.

use thiserror::Error;

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Errors that can occur during queue operations.
///
/// Variants carry rendered messages rather than protocol errors so the type
/// stays `Clone` (service results are shared between coalesced readers).
#[derive(Debug, Clone, Error)]
pub enum QueueError {
    #[error("failed to connect to broker: {0}")]
    Connect(String),

    #[error("failed to publish task: {0}")]
    Publish(String),

    #[error("failed to consume tasks: {0}")]
    Consume(String),

    #[error("failed to serialize task: {0}")]
    Serialize(String),

    #[error("delivery stream closed unexpectedly")]
    ChannelClosed,

    #[error("failed to close broker connection: {0}")]
    Close(String),
}

impl QueueError {
    pub fn connect(msg: impl Into<String>) -> Self {
        Self::Connect(msg.into())
    }

    pub fn publish(msg: impl Into<String>) -> Self {
        Self::Publish(msg.into())
    }

    pub fn consume(msg: impl Into<String>) -> Self {
        Self::Consume(msg.into())
    }
}
