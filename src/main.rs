//! Resilient Cache - operational server
//!
//! Composition root: builds the shared services, starts maintenance tasks
//! and serves the operational API.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use resilient_cache::api::create_router;
use resilient_cache::{AppState, BackgroundTasks, Config};

/// Main entry point for the operational server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build monitoring, circuit breakers and the cache factory
/// 4. Resolve the cache backend (falling back to memory if configured)
/// 5. Start background maintenance tasks
/// 6. Serve the operational API until SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "resilient_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Resilient Cache server");

    let config = Config::from_env();
    info!(
        "Configuration loaded: backend={}, fallback={}, port={}, sweep_interval={}s",
        config.cache_implementation,
        config.cache_fallback,
        config.server_port,
        config.sweep_interval
    );

    let state = AppState::from_config(&config);
    match state.cache.get_cache().await {
        Ok(cache) => info!(backend = %cache.implementation(), "Cache ready"),
        Err(e) => warn!(error = %e, "No cache backend available at startup"),
    }

    let tasks = BackgroundTasks::start(&state, &config);

    let app = create_router(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state, tasks))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM), then stops background work.
async fn shutdown_signal(state: AppState, mut tasks: BackgroundTasks) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    tasks.shutdown();
    state.breakers.shutdown();
}
