//! MoodMirror
//!
//! Emotion detection service: accepts a base64 image on `POST /predict` and
//! returns every detected face with per-emotion confidence scores.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

use moodmirror::api::rest::{create_rest_router, AppState};
use moodmirror::config::Config;
use moodmirror::engine::{ModelPool, OpenVinoEmotionDetector};
use moodmirror::logging;
use moodmirror::service::EmotionService;

#[tokio::main]
async fn main() -> Result<()> {
    let (config, load_error) = match Config::load(Config::default_path()) {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    logging::init(&config.logging)?;

    info!("Starting MoodMirror emotion service v{}", env!("CARGO_PKG_VERSION"));
    if let Some(e) = load_error {
        info!("Using default config ({:#})", e);
    }

    info!("Configuration loaded:");
    info!("  Listen: {}:{}", config.server.host, config.server.port);
    info!("  Log file: {}", config.logging.file.display());
    info!("  Device: {}", config.inference.device);
    info!("  Model idle timeout: {}s", config.inference.model_idle_timeout);
    info!("  Detection threshold: {}", config.detection.confidence_threshold);

    let pool = Arc::new(ModelPool::new(&config.inference, &config.models)?);

    let cleanup_pool = pool.clone();
    tokio::spawn(async move {
        cleanup_pool.start_cleanup_task().await;
    });

    let detector = Arc::new(OpenVinoEmotionDetector::new(pool.clone(), &config.detection));
    let app_state = Arc::new(AppState {
        service: Arc::new(EmotionService::new(detector)),
        start_time: Instant::now(),
    });
    let router = create_rest_router(app_state, config.server.max_body_bytes);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!("REST API listening on http://{}", addr);
    info!("Predict: POST http://localhost:{}/predict", config.server.port);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Shutdown signal received, cleaning up...");
    pool.shutdown();

    info!("Goodbye!");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
