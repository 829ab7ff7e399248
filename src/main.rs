// ABOUTME: Entry point for the parlor binary.
// ABOUTME: Parses CLI arguments, initializes tracing, opens the message store, and serves HTTP.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use parlor_server::{AppState, ParlorConfig, SharedState, create_router};
use parlor_store::MessageStore;

/// Persisted chat-message collection with a real-time change stream.
#[derive(Debug, Parser)]
#[command(name = "parlor", version, about)]
struct Cli {
    /// Socket address to listen on (overrides PARLOR_BIND).
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Database file (overrides PARLOR_DB).
    #[arg(long)]
    db: Option<PathBuf>,

    /// Directory of static assets served at / (overrides PARLOR_STATIC_DIR).
    #[arg(long)]
    static_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parlor=debug,tower_http=debug".into()),
        )
        .init();

    let cli = Cli::parse();
    let mut config = ParlorConfig::from_env()?;
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Some(dir) = cli.static_dir {
        config.static_dir = Some(dir);
    }

    if let Some(parent) = config.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let store = Arc::new(
        MessageStore::open(&config.db_path).context("failed to open message store")?,
    );
    let state: SharedState = Arc::new(AppState::new(store.clone(), config.event_buffer));
    let app = create_router(Arc::clone(&state), config.static_dir.as_deref());

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    tracing::info!(
        bind = %config.bind,
        db = %config.db_path.display(),
        "parlor listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await
        .context("server error")?;

    match Arc::try_unwrap(store) {
        Ok(store) => store.close()?,
        Err(_) => tracing::warn!("message store still referenced at exit; closing on drop"),
    }
    tracing::info!("parlor stopped");
    Ok(())
}

/// Resolve on Ctrl-C and end open change streams so shutdown can drain.
async fn shutdown_signal(state: SharedState) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
    state.shutdown();
}
