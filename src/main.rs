//! Transaction Risk Service - Main Entry Point
//!
//! Serves the transaction webhook, runs model-backed risk analysis, and
//! forwards results to the admin webhook.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use txn_risk_service::{
    api::{create_router, AppState},
    config::{AppConfig, LoggingConfig},
    metrics::ServiceMetrics,
    notifier::AdminNotifier,
    providers::build_provider,
    RiskAnalyzer,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration before logging so the configured level applies
    let config = AppConfig::load()?;
    init_logging(&config.logging)?;

    info!("Starting Transaction Risk Service");

    // Fail fast: configuration errors are fatal, never per request
    config.validate()?;
    info!(
        provider = ?config.provider.kind,
        model = %config.provider.model_or_default(),
        policy = ?config.analysis.policy,
        action_mode = ?config.analysis.action_mode,
        "Configuration loaded successfully"
    );

    let provider = build_provider(&config.provider)?;
    let analyzer = Arc::new(RiskAnalyzer::new(provider, &config.analysis));
    let notifier = Arc::new(AdminNotifier::new(&config.notification)?);
    info!(url = %notifier.url(), "Admin notifier initialized");

    let metrics = Arc::new(
        ServiceMetrics::new(config.metrics.record_degraded)
            .context("Failed to register metrics")?,
    );

    let state = AppState {
        analyzer,
        notifier,
        metrics,
        api_key: Arc::from(config.server.api_key.as_str()),
    };
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;
    info!(addr = %config.server.bind_addr, "Listening for transaction webhooks");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Service shutting down...");
    Ok(())
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().or_else(|_| {
        tracing_subscriber::EnvFilter::try_new(format!(
            "txn_risk_service={},tower_http=info",
            logging.level
        ))
    })?;

    if logging.format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
