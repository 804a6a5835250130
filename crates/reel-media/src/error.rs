//! Media error types.

use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during transcoding.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("ffmpeg binary not found in PATH")]
    FfmpegNotFound,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid output directory: {0}")]
    InvalidOutputDir(String),

    #[error("no variants supplied")]
    NoVariants,

    #[error("no segments generated for variant {0}")]
    NoSegments(String),

    #[error("transcoding cancelled")]
    Cancelled,

    #[error("ffmpeg exited with status {code:?}")]
    FfmpegFailed { code: Option<i32> },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn invalid_output_dir(msg: impl Into<String>) -> Self {
        Self::InvalidOutputDir(msg.into())
    }
}
