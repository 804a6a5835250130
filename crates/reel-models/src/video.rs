//! Video entity and its status lifecycle.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Maximum accepted title length in bytes.
pub const MAX_TITLE_LENGTH: usize = 255;

/// Processing state of a video.
///
/// Permitted transitions:
/// `PendingUpload -> Processing -> Ready` and `Processing -> Failed`.
/// `Ready` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VideoStatus {
    PendingUpload,
    Processing,
    Ready,
    Failed,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::PendingUpload => "PENDING_UPLOAD",
            VideoStatus::Processing => "PROCESSING",
            VideoStatus::Ready => "READY",
            VideoStatus::Failed => "FAILED",
        }
    }

    /// Parse a status from its canonical name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING_UPLOAD" => Some(VideoStatus::PendingUpload),
            "PROCESSING" => Some(VideoStatus::Processing),
            "READY" => Some(VideoStatus::Ready),
            "FAILED" => Some(VideoStatus::Failed),
            _ => None,
        }
    }

    /// Whether the `(self, next)` pair is in the permitted transition set.
    pub fn can_transition_to(&self, next: VideoStatus) -> bool {
        matches!(
            (self, next),
            (VideoStatus::PendingUpload, VideoStatus::Processing)
                | (VideoStatus::Processing, VideoStatus::Ready)
                | (VideoStatus::Processing, VideoStatus::Failed)
        )
    }

    /// Terminal states have no outgoing transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, VideoStatus::Ready | VideoStatus::Failed)
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Validation and lifecycle errors for the video entity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VideoError {
    #[error("title cannot be empty")]
    EmptyTitle,

    #[error("title exceeds maximum length of {MAX_TITLE_LENGTH} characters")]
    TitleTooLong,

    #[error("user ID cannot be nil")]
    InvalidUserId,

    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: VideoStatus, to: VideoStatus },
}

/// The sole persistent aggregate: one uploaded video and its pipeline state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub status: VideoStatus,
    /// Storage key of the uploaded source object. Set once at creation.
    pub original_url: Option<String>,
    /// Storage key of the HLS master manifest. Set when the video becomes ready.
    pub hls_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Video {
    /// Create a new video in `PendingUpload` with a fresh identifier.
    pub fn new(user_id: Uuid, title: impl Into<String>) -> Result<Self, VideoError> {
        let title = title.into();

        if user_id.is_nil() {
            return Err(VideoError::InvalidUserId);
        }
        if title.trim().is_empty() {
            return Err(VideoError::EmptyTitle);
        }
        if title.len() > MAX_TITLE_LENGTH {
            return Err(VideoError::TitleTooLong);
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            title,
            status: VideoStatus::PendingUpload,
            original_url: None,
            hls_url: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Attempt a status transition, failing if the pair is not permitted.
    pub fn transition_to(&mut self, next: VideoStatus) -> Result<(), VideoError> {
        if !self.status.can_transition_to(next) {
            return Err(VideoError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Record the storage key of the uploaded source.
    pub fn set_original_url(&mut self, key: impl Into<String>) {
        self.original_url = Some(key.into());
        self.updated_at = Utc::now();
    }

    /// Record the storage key of the HLS master manifest.
    pub fn set_hls_url(&mut self, key: impl Into<String>) {
        self.hls_url = Some(key.into());
        self.updated_at = Utc::now();
    }

    pub fn is_ready(&self) -> bool {
        self.status == VideoStatus::Ready
    }

    pub fn is_failed(&self) -> bool {
        self.status == VideoStatus::Failed
    }
}
