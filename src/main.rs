//! Ledger Reconciler server
//!
//! Accepts normalized provider webhooks over HTTP and runs the background
//! workers (event dispatch, document sweep, retention pruning) alongside.

use std::sync::Arc;

use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ledger_reconciler::adapters::http::{webhook_router, WebhookAppState};
use ledger_reconciler::adapters::{postgres, LedgerStores};
use ledger_reconciler::config::AppConfig;
use ledger_reconciler::state::AppServices;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config);

    tracing::info!("Starting ledger-reconciler v{}", env!("CARGO_PKG_VERSION"));
    config.validate()?;

    let stores = match &config.database {
        Some(database) => {
            tracing::info!("Connecting to database...");
            let pool = postgres::connect(database).await?;
            tracing::info!("Database connection established");
            LedgerStores::postgres(pool)
        }
        None => {
            tracing::warn!("No database configured, ledger state lives in memory");
            LedgerStores::in_memory()
        }
    };

    let services = AppServices::build(&stores, &config);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let dispatcher = tokio::spawn(services.dispatcher.run(shutdown_rx.clone()));

    let sweeper = services.sweeper;
    let sweeper_shutdown = shutdown_rx.clone();
    let sweeper_task = tokio::spawn(async move { sweeper.run(sweeper_shutdown).await });

    let pruner = services.pruner;
    let prune_every = config.webhooks.prune_interval();
    let pruner_shutdown = shutdown_rx;
    let pruner_task =
        tokio::spawn(async move { pruner.run(prune_every, pruner_shutdown).await });

    let app = webhook_router(
        WebhookAppState::new(Arc::clone(&services.processor)),
        config.server.request_timeout(),
        config.webhooks.max_body_bytes,
    );

    let addr = config.server.socket_addr()?;
    tracing::info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped, draining background workers");
    let _ = shutdown_tx.send(true);
    for task in [dispatcher, sweeper_task, pruner_task] {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "Background worker panicked");
        }
    }

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.server.log_level.clone()));

    let registry = tracing_subscriber::registry().with(filter);
    if config.server.use_json_logs() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
