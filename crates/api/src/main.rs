use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hvac_api::config::ServerConfig;
use hvac_api::pipeline::LedgerSync;
use hvac_api::router::build_app_router;
use hvac_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hvac_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        runtime = %config.pipeline.runtime,
        script = %config.pipeline.script_path,
        max_concurrent = config.pipeline.max_concurrent,
        job_timeout_secs = config.pipeline.job_timeout_secs,
        "Loaded server configuration",
    );

    // --- App state ---
    let state = AppState::new(config.clone());

    // --- Ledger sync ---
    let sync_cancel = tokio_util::sync::CancellationToken::new();
    let sync_handle = if config.pipeline.auto_mark_complete {
        let sync = LedgerSync::new(Arc::clone(&state.ledger));
        let receiver = state.event_bus.subscribe();
        let cancel = sync_cancel.clone();
        tracing::info!("Automatic completion marking enabled");
        Some(tokio::spawn(async move { sync.run(receiver, cancel).await }))
    } else {
        None
    };

    let jobs = Arc::clone(&state.jobs);
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    let active = jobs.active_count().await;
    tracing::info!(active_jobs = active, "Cancelling pipeline jobs");
    jobs.shutdown();

    let drain_deadline = Duration::from_secs(config.shutdown_timeout_secs);
    let drained = tokio::time::timeout(drain_deadline, async {
        while jobs.active_count().await > 0 {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await;
    if drained.is_err() {
        tracing::warn!(
            remaining = jobs.active_count().await,
            "Pipeline jobs did not finish before the shutdown timeout",
        );
    }

    sync_cancel.cancel();
    if let Some(handle) = sync_handle {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
        tracing::info!("Ledger sync stopped");
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or (on Unix) SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
