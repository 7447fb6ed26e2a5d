//! `gatectl serve`: run the webhook server until interrupted.

use crate::config::Settings;
use crate::github::GitHubClient;
use crate::review::Evaluator;
use crate::webhook::{build_router, AppState, WEBHOOK_PATH};
use anyhow::{Context, Result};
use std::sync::Arc;

pub async fn run_serve(settings: Settings) -> Result<()> {
    settings.validate()?;

    let client = GitHubClient::new(settings.client_config()).context("Failed to configure GitHub client")?;
    let evaluator = Evaluator::new(Arc::new(client))
        .with_rules_path(settings.rules_path.clone())
        .with_status_prefix(settings.status_prefix.clone());
    let app = build_router(AppState::new(evaluator, settings.webhook_secret.as_bytes()));

    let listener = tokio::net::TcpListener::bind(settings.bind)
        .await
        .with_context(|| format!("Failed to bind {}", settings.bind))?;
    tracing::info!(
        bind = %settings.bind,
        path = WEBHOOK_PATH,
        api = %settings.api_url,
        rules = %settings.rules_path,
        "gatectl listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Webhook server failed")?;
    tracing::info!("gatectl stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for ctrl-c, running until killed");
        std::future::pending::<()>().await;
    }
}
