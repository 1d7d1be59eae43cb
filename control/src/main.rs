mod agent_http;
mod api;
mod config;
mod db;
mod services;
mod tls;
mod types;

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use agent_http::AgentClient;
use api::nodes::AppState;
use config::{Args, Settings};

/// How long in-flight requests get to finish after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::from_args(Args::parse())?;

    // Initialize logging
    let log_level = match settings.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Hangar control panel");

    // Initialize database
    let db = db::init_db(settings.db_path.clone())?;

    let agent = AgentClient::new(
        &settings.agent_username,
        settings.probe_timeout,
        settings.purge_timeout,
    )?;

    // Create application state
    let state = Arc::new(AppState {
        db,
        agent,
        panel_name: settings.panel_name.clone(),
    });

    // Create router
    let app = api::create_router(state)
        .into_make_service_with_connect_info::<SocketAddr>();

    // Parse bind address
    let addr: SocketAddr = settings
        .bind
        .parse()
        .with_context(|| format!("Invalid bind address {}", settings.bind))?;

    match &settings.tls {
        Some(tls_settings) => {
            let tls_config = tls::load_server_config(tls_settings)?;
            let rustls_config =
                axum_server::tls_rustls::RustlsConfig::from_config(Arc::new(tls_config));

            let handle = axum_server::Handle::new();
            let shutdown_handle = handle.clone();
            tokio::spawn(async move {
                shutdown_signal().await;
                shutdown_handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
            });

            info!("Listening on https://{}", addr);
            axum_server::bind_rustls(addr, rustls_config)
                .handle(handle)
                .serve(app)
                .await?;
        }
        None => {
            info!("Listening on http://{}", addr);
            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
    }

    info!("Hangar control panel stopped");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
