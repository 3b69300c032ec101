/// Integration tests for the PostgreSQL backend
///
/// These tests require a running PostgreSQL database and are ignored by
/// default. Connection settings come from the same variables the server uses:
///
/// export DATABASE_HOST=localhost DATABASE_USER=postgres \
///        DATABASE_PASSWORD=postgres DATABASE_NAME=rowgate_test
///
/// Run with: cargo test --test postgres_store_tests -- --ignored --test-threads=1

use rowgate_shared::db::error::{PoolError, StoreError};
use rowgate_shared::db::pool::{DatabaseConfig, Pool};
use rowgate_shared::db::postgres::PgManager;
use rowgate_shared::db::store::StoreConnection;
use rowgate_shared::models::post::Post;
use rowgate_shared::models::user::{CreateUser, User};
use std::env;

fn test_config() -> DatabaseConfig {
    DatabaseConfig {
        host: env::var("DATABASE_HOST").unwrap_or_else(|_| "localhost".to_string()),
        port: env::var("DATABASE_PORT")
            .ok()
            .and_then(|port| port.parse().ok())
            .unwrap_or(5432),
        username: env::var("DATABASE_USER").unwrap_or_else(|_| "postgres".to_string()),
        password: env::var("DATABASE_PASSWORD").ok(),
        database: env::var("DATABASE_NAME").unwrap_or_else(|_| "rowgate_test".to_string()),
        max_connections: 3,
        min_connections: 1,
        acquire_timeout_seconds: 10,
        ..Default::default()
    }
}

async fn setup_pool() -> Pool<PgManager> {
    let config = test_config();
    let pool = Pool::connect(PgManager::new(&config), config)
        .await
        .expect("Failed to connect to test database");

    let mut conn = pool.acquire().await.unwrap();
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS users (
            id SERIAL PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT UNIQUE
        )",
    )
    .execute(&mut *conn)
    .await
    .unwrap();
    sqlx::query("CREATE TABLE IF NOT EXISTS posts (id SERIAL PRIMARY KEY, title TEXT NOT NULL)")
        .execute(&mut *conn)
        .await
        .unwrap();
    drop(conn);

    pool
}

fn unique_user() -> CreateUser {
    let tag = uuid::Uuid::new_v4().simple().to_string();
    CreateUser {
        name: format!("Test {}", &tag[..8]),
        email: format!("test-{}@example.com", tag),
    }
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_create_and_find_user() {
    let pool = setup_pool().await;
    let data = unique_user();

    let mut conn = pool.acquire().await.unwrap();
    let user = User::create(&mut conn, &data).await.unwrap();
    assert_eq!(user.name, data.name);
    assert_eq!(user.email.as_deref(), Some(data.email.as_str()));

    let found = User::find_by_id(&mut conn, user.id).await.unwrap();
    assert_eq!(found, Some(user.clone()));

    let listed = User::list(&mut conn).await.unwrap();
    assert!(listed.iter().any(|u| u.id == user.id));

    drop(conn);
    pool.close().await;
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_duplicate_email_is_conflict() {
    let pool = setup_pool().await;
    let data = unique_user();

    let mut conn = pool.acquire().await.unwrap();
    User::create(&mut conn, &data).await.unwrap();

    let err = User::create(&mut conn, &data).await.unwrap_err();
    assert!(err.is_conflict(), "expected conflict, got {:?}", err);
    assert!(matches!(err, StoreError::Conflict { constraint: Some(ref c) } if c.contains("email")));

    // A constraint violation leaves the connection usable
    assert!(!conn.is_broken());
    assert!(conn.ping().await.is_ok());

    drop(conn);
    pool.close().await;
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_missing_rows_are_none() {
    let pool = setup_pool().await;

    let mut conn = pool.acquire().await.unwrap();
    assert_eq!(User::find_by_id(&mut conn, -1).await.unwrap(), None);
    assert_eq!(Post::find_by_id(&mut conn, -1).await.unwrap(), None);
    assert!(Post::list(&mut conn).await.is_ok());

    drop(conn);
    pool.close().await;
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_wrong_credentials_fail_to_connect() {
    let config = DatabaseConfig {
        password: Some("definitely-not-the-password".to_string()),
        username: "rowgate_nobody".to_string(),
        ..test_config()
    };

    let result = Pool::connect(PgManager::new(&config), config).await;
    assert!(matches!(result, Err(PoolError::ConnectionFailed(_))));
}
