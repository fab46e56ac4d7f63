//! macrolens-relay - Inference relay
//!
//! Holds the Anthropic API key server-side (`ANTHROPIC_API_KEY`) and forwards
//! scanner requests to the inference endpoint, so browsers and shared
//! devices never see the key.

use anyhow::{Context, Result};
use clap::Parser;
use macrolens_common::config::TomlConfig;
use macrolens_common::credential::CREDENTIAL_ENV_VAR;
use macrolens_common::inference::AnthropicClient;
use macrolens_common::Credential;
use macrolens_relay::{build_router, AppState};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Command-line arguments for macrolens-relay
#[derive(Parser, Debug)]
#[command(name = "macrolens-relay")]
#[command(about = "Relay that forwards food images to the inference endpoint")]
#[command(version)]
struct Args {
    /// Configuration file (defaults to ~/.config/macrolens/config.toml)
    #[arg(short, long, env = "MACROLENS_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on (overrides bind_address in the config file)
    #[arg(short, long, env = "MACROLENS_RELAY_BIND")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = TomlConfig::load(args.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .init();

    info!(
        "Starting MacroLens relay (macrolens-relay) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let credential = std::env::var(CREDENTIAL_ENV_VAR).ok().and_then(Credential::new);
    match &credential {
        Some(key) => info!(key_len = key.expose().len(), "Server API key loaded"),
        None => warn!(
            "{} is not set; analyze requests will fail until it is configured",
            CREDENTIAL_ENV_VAR
        ),
    }

    let backend = AnthropicClient::from_config(&config)
        .context("Failed to create inference client")?;
    info!(model = %backend.model(), upstream = %config.api_url, "Inference client ready");

    let state = AppState::new(Arc::new(backend), credential);
    let app = build_router(state);

    let bind = args.bind.unwrap_or(config.bind_address);
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!("Listening on http://{}", bind);
    info!("Health check: http://{}/health", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("macrolens-relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
