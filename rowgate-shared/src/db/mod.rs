/// Database layer for rowgate
///
/// This module provides the connection pool and the store backends behind it.
///
/// # Modules
///
/// - `pool`: bounded connection pool with acquire policies and health checks
/// - `store`: traits a backend implements to plug into the pool
/// - `postgres`: PostgreSQL backend on top of sqlx
/// - `memory`: in-process backend for tests and demo mode
/// - `error`: store and pool error types
/// - Models are in the `models` module at crate root level
///
/// # Example
///
/// ```no_run
/// use rowgate_shared::db::pool::{Pool, DatabaseConfig};
/// use rowgate_shared::db::postgres::PgManager;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = DatabaseConfig {
///         database: std::env::var("DATABASE_NAME")?,
///         ..Default::default()
///     };
///
///     let pool = Pool::connect(PgManager::new(&config), config).await?;
///     Ok(())
/// }
/// ```

pub mod error;
pub mod memory;
pub mod pool;
pub mod postgres;
pub mod store;
