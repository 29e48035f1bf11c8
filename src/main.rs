// Main entry point for the AgriDoc diagnosis server

use agridoc::{
    core::config::{level_directive, Config},
    orchestration::DiagnosisPipeline,
    server::{router, AppState},
    utils::Metrics,
};

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Arc::new(Config::new()?);

    // Initialize logging
    let filter = EnvFilter::new(format!("agridoc={}", level_directive(config.log_level())));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("=== AGRIDOC CROP DIAGNOSIS ===");
    info!(
        "Config: model={} attempts={} base_delay={}ms timeout={}s",
        config.model(),
        config.max_retries(),
        config.retry_base_delay().as_millis(),
        config.api_timeout().as_secs()
    );

    // Initialize metrics
    let metrics = Metrics::new();

    let pipeline = Arc::new(DiagnosisPipeline::from_config(
        config.clone(),
        Some(metrics.clone()),
    )?);
    let app = router(AppState { pipeline, metrics });

    let addr = format!("{}:{}", config.server_host(), config.server_port());
    info!("{}", "=".repeat(70));
    info!("Server starting on http://{}", addr);
    info!("{}", "-".repeat(70));
    info!("Endpoints:");
    info!("  GET  /         - Root endpoint");
    info!("  GET  /health   - Health check");
    info!("  GET  /metrics  - Prometheus metrics");
    info!("  GET  /stats    - Detailed statistics");
    info!("  POST /analyze  - Diagnose one image (multipart/form-data)");
    info!("{}", "=".repeat(70));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
