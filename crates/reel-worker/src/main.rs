//! Transcoding worker binary.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reel_cache::RedisVideoCache;
use reel_db::{PgClient, PgVideoRepository};
use reel_media::{FfmpegConfig, FfmpegTranscoder};
use reel_queue::AmqpClient;
use reel_storage::S3Client;
use reel_worker::{TranscodeProcessor, WorkerConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    info!("starting reel-worker");

    let config = WorkerConfig::from_env();
    info!(?config, "worker config");

    if let Err(e) = tokio::fs::create_dir_all(&config.temp_dir).await {
        error!(error = %e, "failed to create temp directory");
        std::process::exit(1);
    }

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
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!(error = %e, "failed to connect to RabbitMQ");
            std::process::exit(1);
        }
    };

    let cache = match RedisVideoCache::from_env() {
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

    let processor = Arc::new(TranscodeProcessor::new(
        Arc::new(PgVideoRepository::new(pg.pool().clone())),
        Arc::new(storage),
        Arc::new(FfmpegTranscoder::new(FfmpegConfig::default())),
        Arc::new(cache),
        config.temp_dir.clone(),
        config.max_retries,
    ));

    let cancel = CancellationToken::new();

    let mut consumer = {
        let queue = Arc::clone(&queue);
        let cancel = cancel.clone();
        let processor = Arc::clone(&processor);
        tokio::spawn(async move {
            let handler_cancel = cancel.clone();
            queue
                .consume_transcode_tasks(cancel, move |task| {
                    let processor = Arc::clone(&processor);
                    let cancel = handler_cancel.clone();
                    async move {
                        info!(
                            video_id = %task.video_id,
                            retry_count = task.retry_count,
                            "processing task"
                        );
                        processor.process_task(&cancel, &task).await
                    }
                })
                .await
        })
    };

    info!("worker consuming transcode tasks");

    tokio::select! {
        result = &mut consumer => {
            match result {
                Ok(Ok(())) => info!("consume loop stopped"),
                Ok(Err(e)) => {
                    error!(error = %e, "consumer error");
                    std::process::exit(1);
                }
                Err(e) => {
                    error!(error = %e, "consumer task panicked");
                    std::process::exit(1);
                }
            }
        }
        signal = shutdown_signal() => {
            info!(signal, "shutting down worker");

            // Stop consuming; in-flight work observes cancellation at its
            // next suspension point. Drain is bounded by the budget.
            cancel.cancel();
            match tokio::time::timeout(config.shutdown_timeout, &mut consumer).await {
                Ok(Ok(Ok(()))) => info!("consume loop stopped"),
                Ok(Ok(Err(e))) => {
                    error!(error = %e, "consumer error during shutdown");
                    std::process::exit(1);
                }
                Ok(Err(e)) => {
                    error!(error = %e, "consumer task panicked");
                    std::process::exit(1);
                }
                Err(_) => {
                    warn!("shutdown timeout exceeded, some tasks may not have completed");
                    std::process::exit(1);
                }
            }
        }
    }

    if let Err(e) = queue.close().await {
        warn!(error = %e, "failed to close broker connection");
    }
    pg.close().await;

    info!("worker shutdown complete");
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
