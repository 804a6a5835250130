//! Application state.

use std::sync::Arc;

use async_trait::async_trait;

use reel_cache::RedisVideoCache;
use reel_core::VideoService;
use reel_db::PgClient;
use reel_storage::S3Client;

use crate::config::ApiConfig;

/// Readiness checks against the process dependencies.
///
/// A trait so handler tests can stub the probes out.
#[async_trait]
pub trait DependencyHealth: Send + Sync {
    async fn check_database(&self) -> Result<(), String>;
    async fn check_cache(&self) -> Result<(), String>;
    async fn check_storage(&self) -> Result<(), String>;
}

/// Production readiness probes over the concrete clients.
pub struct InfraHealth {
    pub pg: PgClient,
    pub cache: RedisVideoCache,
    pub storage: S3Client,
}

#[async_trait]
impl DependencyHealth for InfraHealth {
    async fn check_database(&self) -> Result<(), String> {
        self.pg.ping().await.map_err(|e| e.to_string())
    }

    async fn check_cache(&self) -> Result<(), String> {
        self.cache.ping().await.map_err(|e| e.to_string())
    }

    async fn check_storage(&self) -> Result<(), String> {
        self.storage.ping().await.map_err(|e| e.to_string())
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub service: Arc<dyn VideoService>,
    pub health: Arc<dyn DependencyHealth>,
}
