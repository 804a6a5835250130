//! API server binary.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reel_api::{create_router, init_metrics, ApiConfig, AppState, InfraHealth};
use reel_cache::{RedisConfig, RedisVideoCache};
use reel_core::{
    CachedVideoConfig, CachedVideoService, LifecycleConfig, LifecycleService,
};
use reel_db::{PgClient, PgVideoRepository};
use reel_queue::AmqpClient;
use reel_storage::S3Client;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    info!("starting reel-api");

    let config = ApiConfig::from_env();
    info!(port = config.port, "API config loaded");

    let pg = match PgClient::from_env().await {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "failed to connect to PostgreSQL");
            std::process::exit(1);
        }
    };

    let storage = match S3Client::from_env().await {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "failed to connect to object storage");
            std::process::exit(1);
        }
    };

    let queue = match AmqpClient::from_env().await {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "failed to connect to RabbitMQ");
            std::process::exit(1);
        }
    };

    let redis_config = RedisConfig::from_env();
    let cache = match RedisVideoCache::new(&redis_config) {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "failed to create Redis client");
            std::process::exit(1);
        }
    };
    if let Err(e) = cache.ping().await {
        error!(error = %e, "failed to connect to Redis");
        std::process::exit(1);
    }
    info!("connected to Redis");

    // Composition root: the cached read path decorates the lifecycle
    // service.
    let lifecycle = Arc::new(LifecycleService::new(
        Arc::new(PgVideoRepository::new(pg.pool().clone())),
        Arc::new(storage.clone()),
        Arc::new(queue),
        LifecycleConfig::default(),
    ));
    let service = Arc::new(CachedVideoService::new(
        lifecycle,
        Arc::new(cache.clone()),
        CachedVideoConfig {
            cache_ttl: redis_config.ttl,
            cdn_base_url: config.cdn_base_url.clone(),
        },
    ));

    let state = AppState {
        config: config.clone(),
        service,
        health: Arc::new(InfraHealth {
            pg: pg.clone(),
            cache,
            storage,
        }),
    };

    let metrics_handle = init_metrics();
    let app = create_router(state, metrics_handle);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, %addr, "failed to bind");
            std::process::exit(1);
        }
    };

    info!(%addr, "listening");

    let cancel = CancellationToken::new();

    // Signal handler cancels the root scope.
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            let signal = shutdown_signal().await;
            info!(signal, "shutting down server");
            cancel.cancel();
        }
    });

    // Drain watchdog: force exit if connections do not drain in budget.
    tokio::spawn({
        let cancel = cancel.clone();
        let budget = config.shutdown_timeout;
        async move {
            cancel.cancelled().await;
            tokio::time::sleep(budget).await;
            warn!("shutdown timeout exceeded, forcing exit");
            std::process::exit(1);
        }
    });

    let shutdown = {
        let cancel = cancel.clone();
        async move { cancel.cancelled().await }
    };

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
    {
        error!(error = %e, "server error");
        std::process::exit(1);
    }

    pg.close().await;
    info!("server shutdown complete");
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true))
            .with(env_filter)
            .init();
    }
}

/// Resolves when SIGINT or SIGTERM is received.
async fn shutdown_signal() -> &'static str {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(_) => {
                tokio::signal::ctrl_c().await.ok();
                return "SIGINT";
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => "SIGINT",
            _ = sigterm.recv() => "SIGTERM",
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
        "SIGINT"
    }
}
