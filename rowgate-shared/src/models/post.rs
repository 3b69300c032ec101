/// Post model
///
/// Posts are read-only through the API; rows are created by other tooling.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE posts (
///     id    SERIAL PRIMARY KEY,
///     title TEXT NOT NULL
/// );
/// ```

use crate::db::error::StoreResult;
use crate::db::store::StoreConnection;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::Row;

/// A stored post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: i32,
    pub title: String,
}

impl Post {
    /// Builds a post from a `posts` row
    pub fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Post {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
        })
    }

    /// Finds a post by ID
    pub async fn find_by_id<C: StoreConnection>(conn: &mut C, id: i32) -> StoreResult<Option<Self>> {
        conn.fetch_post(id).await
    }

    /// Lists all posts in store-defined order
    pub async fn list<C: StoreConnection>(conn: &mut C) -> StoreResult<Vec<Self>> {
        conn.fetch_posts().await
    }
}
