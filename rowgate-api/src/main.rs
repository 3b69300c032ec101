//! # rowgate API Server
//!
//! Serves the users/posts API over a bounded connection pool.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_NAME=rowgate cargo run -p rowgate-api
//! STORE_BACKEND=memory cargo run -p rowgate-api
//! ```

use rowgate_api::app::{build_router, AppState};
use rowgate_api::config::{Config, LogFormat, StoreBackend};
use rowgate_shared::db::memory::MemoryStore;
use rowgate_shared::db::pool::{DatabaseConfig, Pool};
use rowgate_shared::db::postgres::PgManager;
use rowgate_shared::db::store::ConnectionManager;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before reading LOG_FORMAT / RUST_LOG
    dotenvy::dotenv().ok();
    init_tracing(LogFormat::from_env()?);

    tracing::info!(
        "rowgate API server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env()?;
    tracing::debug!(database = ?config.database, "Loaded configuration");

    match config.backend {
        StoreBackend::Postgres => {
            let manager = PgManager::new(&config.database);
            let pool = build_pool(manager, config.database.clone()).await;
            serve(pool, config).await
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; data is lost on shutdown");
            let pool = build_pool(MemoryStore::new(), config.database.clone()).await;
            serve(pool, config).await
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "rowgate_api=debug,rowgate_shared=debug,tower_http=debug".into());

    match format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

/// Connects the pool, falling back to a lazy pool if the store is down
///
/// A store outage degrades requests to error responses; it does not keep the
/// server from starting.
async fn build_pool<M>(manager: M, config: DatabaseConfig) -> Pool<M>
where
    M: ConnectionManager + Clone,
{
    match Pool::connect(manager.clone(), config.clone()).await {
        Ok(pool) => pool,
        Err(err) => {
            tracing::error!(
                error = %err,
                "Store unreachable at startup; connections will be retried per request"
            );
            Pool::new(manager, config)
        }
    }
}

async fn serve<M: ConnectionManager>(pool: Pool<M>, config: Config) -> anyhow::Result<()> {
    let address = config.bind_address();
    let app = build_router(AppState::new(pool.clone(), config));

    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!("Server listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining requests...");
}
