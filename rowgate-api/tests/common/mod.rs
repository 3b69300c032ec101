/// Common test utilities for integration tests
///
/// This module provides shared infrastructure for integration tests:
/// - A router over the in-memory store, with the store handle kept for
///   inspection and fault injection
/// - Request builders and a JSON body reader

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use rowgate_api::app::{build_router, AppState};
use rowgate_api::config::{ApiConfig, Config, StoreBackend};
use rowgate_shared::db::memory::MemoryStore;
use rowgate_shared::db::pool::{AcquirePolicy, DatabaseConfig, Pool};
use serde_json::Value;
use tower::Service as _;

/// Test context containing all necessary resources
pub struct TestContext {
    pub store: MemoryStore,
    pub pool: Pool<MemoryStore>,
    pub app: axum::Router,
}

impl TestContext {
    /// Creates a context with a pool of `max_connections`
    pub fn new(max_connections: u32, acquire_policy: AcquirePolicy) -> Self {
        Self::with_store(MemoryStore::new(), max_connections, acquire_policy)
    }

    pub fn with_store(store: MemoryStore, max_connections: u32, acquire_policy: AcquirePolicy) -> Self {
        let database = DatabaseConfig {
            database: "rowgate_test".to_string(),
            max_connections,
            min_connections: 0,
            acquire_timeout_seconds: 5,
            acquire_policy,
            ..Default::default()
        };
        let config = Config {
            api: ApiConfig::default(),
            backend: StoreBackend::Memory,
            database: database.clone(),
        };

        let pool = Pool::new(store.clone(), database);
        let app = build_router(AppState::new(pool.clone(), config));

        TestContext { store, pool, app }
    }

    /// Sends a request through the router
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().call(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    /// POSTs a raw body as JSON
    pub async fn post_json(&self, uri: &str, body: impl Into<Body>) -> Response<Body> {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(body.into())
                .unwrap(),
        )
        .await
    }

    /// Creates a user through the API and returns status and body
    pub async fn create_user(&self, name: &str, email: &str) -> (StatusCode, Value) {
        let body = serde_json::json!({ "name": name, "email": email }).to_string();
        let response = self.post_json("/users", body).await;
        let status = response.status();
        (status, body_json(response).await)
    }
}

/// Reads a response body as JSON
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
