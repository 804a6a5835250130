//! HTTP surface for the reel video pipeline.

mod config;
mod error;
pub mod handlers;
mod metrics;
mod middleware;
mod routes;
mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use metrics::init_metrics;
pub use routes::create_router;
pub use state::{AppState, DependencyHealth, InfraHealth};
