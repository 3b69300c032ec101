/// PostgreSQL backend
///
/// Opens plain `sqlx::PgConnection`s from discrete connection parameters and
/// runs the user/post queries on them. Pooling is done by
/// [`crate::db::pool::Pool`], not by sqlx.
///
/// Every statement binds its values as `$n` parameters.

use crate::db::error::{StoreError, StoreResult};
use crate::db::pool::DatabaseConfig;
use crate::db::store::{ConnectionManager, StoreConnection};
use crate::models::post::Post;
use crate::models::user::{CreateUser, User};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{ConnectOptions, Connection};
use tracing::debug;

/// Opens PostgreSQL connections for the pool
#[derive(Debug, Clone)]
pub struct PgManager {
    options: PgConnectOptions,
}

impl PgManager {
    /// Builds connect options from the pool configuration
    pub fn new(config: &DatabaseConfig) -> Self {
        let mut options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.username)
            .database(&config.database);

        if let Some(password) = &config.password {
            options = options.password(password);
        }

        Self { options }
    }

    /// Uses pre-built connect options (e.g. parsed from a URL)
    pub fn from_options(options: PgConnectOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl ConnectionManager for PgManager {
    type Connection = PgConnection;

    async fn connect(&self) -> StoreResult<PgConnection> {
        let conn = self.options.connect().await?;
        Ok(conn)
    }

    async fn disconnect(&self, conn: PgConnection) {
        if let Err(err) = conn.close().await {
            debug!(error = %err, "Error while closing store connection");
        }
    }
}

#[async_trait]
impl StoreConnection for PgConnection {
    async fn ping(&mut self) -> StoreResult<()> {
        Connection::ping(self).await?;
        Ok(())
    }

    async fn fetch_users(&mut self) -> StoreResult<Vec<User>> {
        let rows = sqlx::query("SELECT id, name, email FROM users")
            .fetch_all(&mut *self)
            .await?;

        rows.iter()
            .map(User::from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::from)
    }

    async fn fetch_user(&mut self, id: i32) -> StoreResult<Option<User>> {
        let row = sqlx::query("SELECT id, name, email FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self)
            .await?;

        row.as_ref()
            .map(User::from_row)
            .transpose()
            .map_err(StoreError::from)
    }

    async fn insert_user(&mut self, user: &CreateUser) -> StoreResult<User> {
        let row = sqlx::query(
            r#"
            INSERT INTO users (name, email)
            VALUES ($1, $2)
            RETURNING id, name, email
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .fetch_one(&mut *self)
        .await?;

        Ok(User::from_row(&row)?)
    }

    async fn fetch_posts(&mut self) -> StoreResult<Vec<Post>> {
        let rows = sqlx::query("SELECT id, title FROM posts")
            .fetch_all(&mut *self)
            .await?;

        rows.iter()
            .map(Post::from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::from)
    }

    async fn fetch_post(&mut self, id: i32) -> StoreResult<Option<Post>> {
        let row = sqlx::query("SELECT id, title FROM posts WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self)
            .await?;

        row.as_ref()
            .map(Post::from_row)
            .transpose()
            .map_err(StoreError::from)
    }
}
