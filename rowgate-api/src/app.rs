/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// The state is generic over the store backend, so the same router runs
/// against PostgreSQL in production and the in-memory store in tests.
///
/// # Example
///
/// ```no_run
/// use rowgate_api::{app::{AppState, build_router}, config::Config};
/// use rowgate_shared::db::pool::Pool;
/// use rowgate_shared::db::postgres::PgManager;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = Pool::connect(PgManager::new(&config.database), config.database.clone()).await?;
/// let state = AppState::new(pool, config);
/// let app = build_router(state);
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, middleware::security::SecurityHeadersLayer};
use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use rowgate_shared::db::pool::Pool;
use rowgate_shared::db::store::ConnectionManager;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// The pool is the only shared mutable state.
pub struct AppState<M: ConnectionManager> {
    /// Database connection pool
    pub pool: Pool<M>,

    /// Application configuration
    pub config: Arc<Config>,
}

impl<M: ConnectionManager> Clone for AppState<M> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            config: Arc::clone(&self.config),
        }
    }
}

impl<M: ConnectionManager> AppState<M> {
    /// Creates new application state
    pub fn new(pool: Pool<M>, config: Config) -> Self {
        Self {
            pool,
            config: Arc::new(config),
        }
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── GET  /health
/// ├── /users
/// │   ├── GET  /        # List users
/// │   ├── POST /        # Create user
/// │   └── GET  /:id     # Fetch user
/// └── /posts
///     ├── GET  /        # List posts
///     └── GET  /:id     # Fetch post
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Logging (tower-http TraceLayer)
/// 2. CORS (tower-http CorsLayer)
/// 3. Security headers
pub fn build_router<M: ConnectionManager>(state: AppState<M>) -> Router {
    use crate::routes;

    let cors = cors_layer(&state.config.api.cors_origins);
    let production = state.config.api.production;

    Router::new()
        .route("/health", get(routes::health::health_check::<M>))
        .route(
            "/users",
            get(routes::users::list_users::<M>).post(routes::users::create_user::<M>),
        )
        .route("/users/:id", get(routes::users::get_user::<M>))
        .route("/posts", get(routes::posts::list_posts::<M>))
        .route("/posts/:id", get(routes::posts::get_post::<M>))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(production))
        .with_state(state)
}

/// Configures CORS from the allowed origin list
///
/// `*` anywhere in the list means permissive (development) CORS.
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600))
}
