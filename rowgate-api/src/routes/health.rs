/// Health check endpoint
///
/// Provides a simple health check endpoint that verifies:
/// - The server is running
/// - A pooled connection can reach the store
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "database": "connected",
///   "pool": {
///     "open_connections": 1,
///     "idle_connections": 1,
///     "in_use_connections": 0,
///     "max_connections": 10
///   }
/// }
/// ```

use crate::app::AppState;
use axum::{extract::State, Json};
use rowgate_shared::db::pool::PoolStats;
use rowgate_shared::db::store::ConnectionManager;
use serde::{Deserialize, Serialize};

/// Overall service state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Healthy,
    Degraded,
}

/// Result of pinging the store through the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseStatus {
    Connected,
    Disconnected,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ServiceStatus,

    /// Server crate version
    pub version: String,

    pub database: DatabaseStatus,

    /// Pool occupancy after the check
    pub pool: PoolStats,
}

impl HealthResponse {
    fn new(database: DatabaseStatus, pool: PoolStats) -> Self {
        let status = match database {
            DatabaseStatus::Connected => ServiceStatus::Healthy,
            DatabaseStatus::Disconnected => ServiceStatus::Degraded,
        };

        Self {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            database,
            pool,
        }
    }
}

/// Health check handler
///
/// Always answers 200; a store problem shows up as `"degraded"`.
pub async fn health_check<M: ConnectionManager>(
    State(state): State<AppState<M>>,
) -> Json<HealthResponse> {
    let database = match state.pool.health_check().await {
        Ok(()) => DatabaseStatus::Connected,
        Err(err) => {
            tracing::warn!(error = %err, "Health check could not reach the store");
            DatabaseStatus::Disconnected
        }
    };

    Json(HealthResponse::new(database, state.pool.stats()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats() -> PoolStats {
        PoolStats {
            open_connections: 1,
            idle_connections: 1,
            in_use_connections: 0,
            max_connections: 4,
        }
    }

    #[test]
    fn test_status_follows_database() {
        let response = HealthResponse::new(DatabaseStatus::Connected, stats());
        assert_eq!(response.status, ServiceStatus::Healthy);

        let response = HealthResponse::new(DatabaseStatus::Disconnected, stats());
        assert_eq!(response.status, ServiceStatus::Degraded);
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(HealthResponse::new(DatabaseStatus::Disconnected, stats()))
            .unwrap();

        assert_eq!(json["status"], "degraded");
        assert_eq!(json["database"], "disconnected");
        assert_eq!(json["pool"]["max_connections"], 4);
        assert!(!json["version"].as_str().unwrap().is_empty());
    }
}
