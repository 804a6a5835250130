//! PostgreSQL persistence for video metadata.

mod client;
mod error;
mod repository;

pub use client::{PgClient, PgConfig};
pub use error::{DbError, DbResult};
pub use repository::{PgVideoRepository, VideoRepository};
