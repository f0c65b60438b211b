//! Site24x7 OAuth token refresher
//!
//! Keeps the access token in a Site24x7 credential file valid:
//! 1. Loads (or templates) the credential file
//! 2. Bootstraps an access token from the refresh token or generated code
//! 3. Refreshes it shortly before expiry, persisting every new token
//! 4. Serves a local admin API for manual refresh, health and metrics

mod admin;
mod cli;
mod config;
mod error;
mod metrics;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use site24x7_auth::{Authenticator, TokenClient};

use crate::admin::{AdminState, build_admin_router};
use crate::cli::{Cli, Command, GenerateArgs, ServeArgs};
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    match cli.command {
        Some(Command::GenerateRefreshToken(args)) => generate_refresh_token(args).await,
        None => serve(cli.serve).await,
    }
}

fn load_config(cli_path: Option<&str>) -> Result<Config> {
    let config_path = Config::resolve_path(cli_path);
    info!(path = %config_path.display(), "loading configuration");
    Config::load_or_default(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))
}

/// Exchange a generated code and print the values needed to configure a client.
async fn generate_refresh_token(args: GenerateArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let options = config.authenticator_options();
    let client = TokenClient::new(options.token_endpoint, options.request_timeout)?;

    let refresh_token = site24x7_auth::generate_refresh_token(
        &client,
        &args.client_id,
        &args.client_secret,
        &args.code,
    )
    .await
    .context("failed to generate refresh token")?;

    print!(
        "{}",
        provider_settings(&args.client_id, &args.client_secret, &refresh_token)
    );
    Ok(())
}

/// Provider configuration lines, ready to paste.
fn provider_settings(client_id: &str, client_secret: &str, refresh_token: &str) -> String {
    format!(
        "oauth_client_id = {client_id}\n\
         oauth_client_secret = {client_secret}\n\
         oauth_refresh_token = {refresh_token}\n"
    )
}

/// Install the metrics recorder, then build the authenticator.
///
/// Bootstrap emits the first exchange counter and the expiry gauge, so the
/// recorder must exist before construction starts.
async fn start_authenticator(
    config: &Config,
    credential_path: &Path,
    install_recorder: impl FnOnce() -> Result<PrometheusHandle>,
) -> Result<(Arc<Authenticator>, PrometheusHandle)> {
    let prometheus_handle = install_recorder()?;

    let authenticator = Authenticator::with_options(credential_path, config.authenticator_options())
        .await
        .with_context(|| {
            format!(
                "failed to initialize OAuth token from {}",
                credential_path.display()
            )
        })?;
    Ok((Arc::new(authenticator), prometheus_handle))
}

async fn serve(args: ServeArgs) -> Result<()> {
    info!("starting site24x7-oauth");

    let config = load_config(args.config.as_deref())?;
    let credential_path = config.credential_path(args.oauth_file.as_deref())?;

    info!(
        credential_file = %credential_path.display(),
        token_endpoint = %config.token_endpoint.url,
        listen_addr = %config.admin.listen_addr,
        "configuration loaded"
    );

    let (authenticator, prometheus_handle) =
        start_authenticator(&config, &credential_path, metrics::install_recorder).await?;

    if args.init_oauth {
        authenticator.shutdown().await;
        info!(credential_file = %credential_path.display(), "credential file initialized");
        return Ok(());
    }

    let app = build_admin_router(
        AdminState::new(authenticator.clone(), prometheus_handle),
        config.admin.max_connections,
    );

    let listener = TcpListener::bind(config.admin.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.admin.listen_addr))?;
    info!(addr = %config.admin.listen_addr, "admin API listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "admin server error");
    }

    authenticator.shutdown().await;
    info!("shutdown complete");
    Ok(())
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
