//! Video lifecycle handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use reel_core::CreateVideoInput;
use reel_models::Video;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateVideoRequest {
    pub user_id: String,
    pub title: String,
    pub file_name: String,
}

#[derive(Serialize)]
pub struct CreateVideoResponse {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub status: String,
    pub upload_url: String,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct VideoResponse {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hls_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl VideoResponse {
    fn from_video(video: Video) -> Self {
        Self {
            id: video.id.to_string(),
            user_id: video.user_id.to_string(),
            title: video.title,
            status: video.status.as_str().to_string(),
            original_url: video.original_url,
            hls_url: video.hls_url,
            created_at: format_timestamp(&video.created_at),
            updated_at: format_timestamp(&video.updated_at),
        }
    }
}

/// Timestamps go on the wire at second resolution.
fn format_timestamp(ts: &chrono::DateTime<chrono::Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// POST /v1/videos
pub async fn create_video(
    State(state): State<AppState>,
    body: Result<Json<CreateVideoRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CreateVideoResponse>)> {
    let Json(req) = body.map_err(|_| ApiError::invalid_request("Invalid JSON body"))?;

    let user_id = Uuid::parse_str(&req.user_id)
        .map_err(|_| ApiError::invalid_user_id("User ID must be a valid UUID"))?;

    if req.title.is_empty() {
        return Err(ApiError::InvalidTitle("Title is required".into()));
    }
    if req.file_name.is_empty() {
        return Err(ApiError::InvalidFileName("File name is required".into()));
    }

    let output = state
        .service
        .create_video(CreateVideoInput {
            user_id,
            title: req.title,
            file_name: req.file_name,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateVideoResponse {
            id: output.video.id.to_string(),
            user_id: output.video.user_id.to_string(),
            title: output.video.title.clone(),
            status: output.video.status.as_str().to_string(),
            upload_url: output.upload_url,
            created_at: format_timestamp(&output.video.created_at),
        }),
    ))
}

/// POST /v1/videos/{id}/process
pub async fn trigger_process(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let video_id = parse_video_id(&id)?;
    state.service.trigger_process(video_id).await?;
    Ok(StatusCode::ACCEPTED)
}

/// GET /v1/videos/{id}
pub async fn get_video(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<VideoResponse>> {
    let video_id = parse_video_id(&id)?;
    let video = state.service.get_video(video_id).await?;
    Ok(Json(VideoResponse::from_video(video)))
}

fn parse_video_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::invalid_video_id("Video ID must be a valid UUID"))
}
