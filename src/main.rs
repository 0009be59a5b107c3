//! Collab Server - accounts, sessions and projects over HTTP.
//!
//! This binary parses the configuration, wires the in-memory services and
//! starts the HTTP server.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use collab_server::{create_app, AppServices, Config, MemoryStore};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Configuration:");
    info!("  Session lifetime: {} day(s)", config.session_ttl_days);
    info!("  Max body size: {} bytes", config.max_body_bytes);
    info!("  Max page size: {}", config.page_size_max);
    match config.cors_origins {
        Some(ref origins) if !origins.is_empty() => {
            info!("  CORS origins: {}", origins.join(", "))
        }
        Some(_) => warn!("  CORS: no origins allowed"),
        None => warn!("  CORS: any origin allowed"),
    }

    // Sessions and accounts live in process memory
    let services = AppServices::in_memory(
        Arc::new(MemoryStore::new()),
        config.session_lifetime(),
        config.page_limits(),
    );

    if let Err(e) = services.sessions.ping().await {
        error!("Session store is unreachable: {}", e);
        return ExitCode::FAILURE;
    }

    let router = match create_app(&services, config.router_config()) {
        Ok(router) => router,
        Err(e) => {
            error!("Failed to build routes: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let addr = config.bind_address();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    info!("Server listening on: http://{}", addr);
    info!("  curl http://{}/health", addr);

    if let Err(e) = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Server stopped");
    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "collab_server=debug,tower_http=debug"
    } else {
        "collab_server=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        // Keep serving if the signal handler cannot be installed
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
