use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use needs_nearby::config::{BackendConfig, Config};
use needs_nearby::database::{Backend, RestBackend, SqliteBackend};
use needs_nearby::services::board_service::Board;
use needs_nearby::services::location_service::{FixedPosition, PositionSource};
use needs_nearby::web;
use needs_nearby::BoardError;

#[tokio::main]
async fn main() {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run().await {
        error!("❌ {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), BoardError> {
    let config = Config::from_env()?;

    let backend: Arc<dyn Backend> = match &config.backend {
        BackendConfig::Sqlite {
            database_url,
            max_connections,
        } => {
            info!("🗄️  Using SQLite backend: {}", database_url);
            Arc::new(SqliteBackend::connect(database_url, *max_connections).await?)
        }
        BackendConfig::Rest {
            base_url,
            anon_key,
            table,
        } => {
            info!("☁️  Using hosted backend: {} (table {})", base_url, table);
            Arc::new(RestBackend::new(base_url, anon_key, table))
        }
    };

    let ambient = config
        .fixed_position
        .map(|c| Arc::new(FixedPosition::new(Some(c))) as Arc<dyn PositionSource>);
    let board = Board::new(backend, config.board.clone(), ambient);
    let lifetime = board.start().await;

    let app = web::router(Arc::clone(&board));

    // Bind, with a fallback to the next port.
    let host = &config.server.host;
    let port = config.server.port;
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .map_err(|e| BoardError::Config(format!("invalid HOST/PORT: {}", e)))?;

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            let fallback: SocketAddr = format!("{}:{}", host, port.saturating_add(1))
                .parse()
                .map_err(|e| BoardError::Config(format!("invalid fallback address: {}", e)))?;
            warn!(
                "⚠️  Could not bind {}: {}. Trying fallback {}",
                addr, e, fallback
            );
            tokio::net::TcpListener::bind(fallback).await?
        }
    };

    if let Ok(bound) = listener.local_addr() {
        info!("🚀 Board running on http://{}", bound);
    }

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    lifetime.shutdown();
    info!("👋 Board stopped");
    Ok(served?)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Could not listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
