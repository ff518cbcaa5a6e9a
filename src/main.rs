//! Chat Gateway - HTTP front for a single text-generation backend
//!
//! Caches auxiliary context, keeps conversation history, sheds load under
//! memory pressure and batches requests by priority.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chat_gateway::content::{ContentSource, HttpContentSource};
use chat_gateway::inference::HttpInferenceEngine;
use chat_gateway::memory::ProcMeminfo;
use chat_gateway::tasks::{
    spawn_cache_purge_task, spawn_conversation_sweep_task, spawn_memory_sampler_task,
};
use chat_gateway::{create_router, AppState, Config, ServingFacade};

/// Main entry point for the chat gateway.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build the inference engine, content source and serving facade
/// 4. Start background purge, sweep and memory sampling tasks
/// 5. Create Axum router with all endpoints
/// 6. Start HTTP server on configured port
/// 7. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chat_gateway=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Chat Gateway");

    let config = Config::from_env();
    info!(
        "Configuration loaded: cache_max_entries={}, cache_ttl={}s, batch_size={}, batch_timeout={}ms, port={}",
        config.cache_max_entries,
        config.cache_ttl_seconds,
        config.batch_size,
        config.batch_timeout_ms,
        config.server_port
    );

    let engine = HttpInferenceEngine::new(config.inference_url.clone(), config.request_timeout())
        .context("building inference client")?;
    info!("Inference backend at {}", engine.url());

    let content = match &config.content_service_url {
        Some(url) => {
            let source = HttpContentSource::new(url.clone(), config.request_timeout())
                .context("building content client")?;
            info!("Content service at {}", url);
            Some(Arc::new(source) as Arc<dyn ContentSource>)
        }
        None => None,
    };

    let facade = Arc::new(ServingFacade::from_config(
        &config,
        Arc::new(engine),
        ProcMeminfo::new(),
        content,
    ));

    let background = vec![
        spawn_cache_purge_task(facade.cache().clone(), config.cache_purge_period()),
        spawn_conversation_sweep_task(
            facade.conversations().clone(),
            config.conversation_sweep_period(),
        ),
        spawn_memory_sampler_task(facade.memory().clone(), config.memory_sample_period()),
    ];
    info!("Background tasks started");

    let app = create_router(AppState::new(facade.clone()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(background))
        .await
        .context("serving HTTP")?;

    facade.shutdown();
    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM), then aborts the
/// background tasks.
async fn shutdown_signal(background: Vec<JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
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

    for handle in background {
        handle.abort();
    }
    warn!("Background tasks aborted");
}
