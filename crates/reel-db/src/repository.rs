//! Video repository over PostgreSQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::Row;
use uuid::Uuid;

use reel_models::{Video, VideoStatus};

use crate::error::{DbError, DbResult};

/// Persistence contract for video entities.
///
/// Production binds to [`PgVideoRepository`]; tests bind to in-memory fakes.
#[async_trait]
pub trait VideoRepository: Send + Sync {
    /// Persist a new video. Fails with [`DbError::Duplicate`] on a
    /// unique-key violation.
    async fn create(&self, video: &Video) -> DbResult<()>;

    /// Fetch a video by id. Fails with [`DbError::NotFound`] when absent.
    async fn get_by_id(&self, id: Uuid) -> DbResult<Video>;

    /// Fetch all videos belonging to a user, newest first.
    async fn get_by_user(&self, user_id: Uuid) -> DbResult<Vec<Video>>;

    /// Persist changes to an existing video. Fails with
    /// [`DbError::NotFound`] if no row matched.
    async fn update(&self, video: &Video) -> DbResult<()>;

    /// Update only the status column. Fails with [`DbError::NotFound`]
    /// if no row matched.
    async fn update_status(&self, id: Uuid, status: VideoStatus) -> DbResult<()>;
}

/// PostgreSQL implementation of [`VideoRepository`].
#[derive(Clone)]
pub struct PgVideoRepository {
    pool: PgPool,
}

impl PgVideoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn scan_video(row: &sqlx::postgres::PgRow) -> DbResult<Video> {
        let status_name: String = row
            .try_get("status")
            .map_err(|e| DbError::database(format!("scan status: {e}")))?;
        let status = VideoStatus::parse(&status_name)
            .ok_or_else(|| DbError::database(format!("unknown status in row: {status_name}")))?;

        let id: Uuid = row
            .try_get("id")
            .map_err(|e| DbError::database(format!("scan id: {e}")))?;
        let user_id: Uuid = row
            .try_get("user_id")
            .map_err(|e| DbError::database(format!("scan user_id: {e}")))?;
        let title: String = row
            .try_get("title")
            .map_err(|e| DbError::database(format!("scan title: {e}")))?;
        let original_url: Option<String> = row
            .try_get("original_url")
            .map_err(|e| DbError::database(format!("scan original_url: {e}")))?;
        let hls_url: Option<String> = row
            .try_get("hls_url")
            .map_err(|e| DbError::database(format!("scan hls_url: {e}")))?;
        let created_at: DateTime<Utc> = row
            .try_get("created_at")
            .map_err(|e| DbError::database(format!("scan created_at: {e}")))?;
        let updated_at: DateTime<Utc> = row
            .try_get("updated_at")
            .map_err(|e| DbError::database(format!("scan updated_at: {e}")))?;

        Ok(Video {
            id,
            user_id,
            title,
            status,
            original_url,
            hls_url,
            created_at,
            updated_at,
        })
    }
}

/// Map empty strings to SQL NULL on the way in.
fn null_if_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().filter(|s| !s.is_empty())
}

/// Whether the error is a PostgreSQL unique-key violation (SQLSTATE 23505).
fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == "23505")
}

#[async_trait]
impl VideoRepository for PgVideoRepository {
    async fn create(&self, video: &Video) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO videos (id, user_id, title, status, original_url, hls_url, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(video.id)
        .bind(video.user_id)
        .bind(&video.title)
        .bind(video.status.as_str())
        .bind(null_if_empty(&video.original_url))
        .bind(null_if_empty(&video.hls_url))
        .bind(video.created_at)
        .bind(video.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(DbError::Duplicate),
            Err(e) => Err(DbError::database(format!("create video: {e}"))),
        }
    }

    async fn get_by_id(&self, id: Uuid) -> DbResult<Video> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, title, status, original_url, hls_url, created_at, updated_at
            FROM videos
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DbError::database(format!("get video by id: {e}")))?;

        match row {
            Some(row) => Self::scan_video(&row),
            None => Err(DbError::NotFound),
        }
    }

    async fn get_by_user(&self, user_id: Uuid) -> DbResult<Vec<Video>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, title, status, original_url, hls_url, created_at, updated_at
            FROM videos
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DbError::database(format!("get videos by user: {e}")))?;

        rows.iter().map(Self::scan_video).collect()
    }

    async fn update(&self, video: &Video) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE videos
            SET title = $2, status = $3, original_url = $4, hls_url = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(video.id)
        .bind(&video.title)
        .bind(video.status.as_str())
        .bind(null_if_empty(&video.original_url))
        .bind(null_if_empty(&video.hls_url))
        .bind(video.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::database(format!("update video: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    async fn update_status(&self, id: Uuid, status: VideoStatus) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE videos
            SET status = $2, updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::database(format!("update video status: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_if_empty() {
        assert_eq!(null_if_empty(&None), None);
        assert_eq!(null_if_empty(&Some(String::new())), None);
        assert_eq!(
            null_if_empty(&Some("hls/x/master.m3u8".to_string())),
            Some("hls/x/master.m3u8")
        );
    }
}
