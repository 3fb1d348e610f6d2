use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use scriptum::config::{self, AppConfig};
use scriptum::session::{MemorySessionStore, PostgresSessionStore};
use scriptum::store::{MemoryStore, PostgresStore};
use scriptum::AppState;

#[derive(Parser)]
#[command(name = "scriptum", about = "Blog platform API server", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve,
    /// Load demo users and articles into the store
    Seed,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, PORT, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = config::config();
    tracing::info!("Starting scriptum in {:?} mode", config.environment);

    let state = build_state(config).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(state, config).await,
        Command::Seed => scriptum::seed::run(&state).await,
    }
}

/// Postgres when DATABASE_URL is configured, in-memory otherwise.
async fn build_state(config: &AppConfig) -> Result<AppState> {
    match std::env::var("DATABASE_URL") {
        Ok(url) => {
            let store = PostgresStore::connect(&url, config.store.max_connections).await?;
            store.ensure_collection("users").await?;
            store.ensure_collection("articles").await?;
            let sessions = PostgresSessionStore::new(store.pool().clone()).await?;
            Ok(AppState::new(Arc::new(store), Arc::new(sessions)))
        }
        Err(_) => {
            tracing::warn!("DATABASE_URL not set; using the in-memory store, state will not survive restarts");
            Ok(AppState::new(
                Arc::new(MemoryStore::new()),
                Arc::new(MemorySessionStore::new()),
            ))
        }
    }
}

async fn serve(state: AppState, config: &AppConfig) -> Result<()> {
    // Sweep expired session records in the background.
    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(3600));
        loop {
            interval.tick().await;
            match sessions.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => tracing::info!("purged {} expired sessions", purged),
                Err(e) => tracing::error!("session purge failed: {}", e),
            }
        }
    });

    let app = scriptum::app(state);
    let bind_addr = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received, closing server");
}
