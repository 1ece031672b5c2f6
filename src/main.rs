use std::sync::Arc;

use anyhow::Context;
use pagesync::config::Config;
use pagesync::git::RepoSyncer;
use pagesync::registry::PageRegistry;
use pagesync::server::{AppState, build_router};
use pagesync::sync::{SyncOperation, SyncWorker};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pagesync=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("invalid configuration")?;

    let registry = Arc::new(
        PageRegistry::open(&config.db_path)
            .with_context(|| format!("opening registry at {}", config.db_path.display()))?,
    );

    let syncer = RepoSyncer::new(&config.repo_url, &config.content_path, config.transport());
    let operation = SyncOperation::new(syncer, Arc::clone(&registry));

    // The service is useless without content, so the first sync is fatal.
    let summary = operation
        .run()
        .await
        .context("initial sync of the content repository failed")?;
    info!(
        discovered = summary.discovered,
        created = summary.created,
        "Initial sync complete"
    );

    let shutdown = CancellationToken::new();
    let (sync, worker) = SyncWorker::spawn(operation, shutdown.clone());

    let app_state = AppState::new(
        config.webhook_secret.clone(),
        Arc::clone(&registry),
        sync,
        &config.content_path,
        config.admin_token.clone(),
    );
    if config.admin_token.is_none() {
        info!("ADMIN_TOKEN not set, admin routes disabled");
    }
    let app = build_router(app_state);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    info!("listening on {}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await
        .context("server error")?;

    shutdown.cancel();
    worker.await.context("sync worker panicked")?;
    info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        // Keep serving; the process can still be killed.
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
    shutdown.cancel();
}
