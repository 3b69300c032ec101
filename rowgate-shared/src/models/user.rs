/// User model and store operations
///
/// Users are created through the API and never updated or deleted by it.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id    SERIAL PRIMARY KEY,
///     name  TEXT NOT NULL,
///     email TEXT UNIQUE
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use rowgate_shared::db::pool::{Pool, DatabaseConfig};
/// use rowgate_shared::db::postgres::PgManager;
/// use rowgate_shared::models::user::{User, CreateUser};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = DatabaseConfig::default();
/// let pool = Pool::connect(PgManager::new(&config), config).await?;
/// let mut conn = pool.acquire().await?;
///
/// let new_user = CreateUser {
///     name: "Ada".to_string(),
///     email: "ada@example.com".to_string(),
/// };
///
/// let user = User::create(&mut conn, &new_user).await?;
/// println!("Created user: {}", user.id);
/// # Ok(())
/// # }
/// ```

use crate::db::error::StoreResult;
use crate::db::store::StoreConnection;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::Row;

/// A stored user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Server-generated id, never reused
    pub id: i32,

    /// Display name
    pub name: String,

    /// Email address, unique across all users
    ///
    /// Only `None` for rows inserted outside the API.
    pub email: Option<String>,
}

/// Input for creating a new user
///
/// Both fields are required and expected to be validated by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateUser {
    pub name: String,
    pub email: String,
}

impl User {
    /// Builds a user from a `users` row
    ///
    /// # Errors
    ///
    /// Returns an error if a column is missing or has an unexpected type.
    pub fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(User {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
        })
    }

    /// Creates a new user
    ///
    /// # Errors
    ///
    /// Returns [`crate::db::error::StoreError::Conflict`] when the email is
    /// already registered, or another store error if the insert fails.
    pub async fn create<C: StoreConnection>(conn: &mut C, data: &CreateUser) -> StoreResult<Self> {
        conn.insert_user(data).await
    }

    /// Finds a user by ID
    pub async fn find_by_id<C: StoreConnection>(conn: &mut C, id: i32) -> StoreResult<Option<Self>> {
        conn.fetch_user(id).await
    }

    /// Lists all users
    ///
    /// Order is whatever the store returns; callers must not rely on it.
    pub async fn list<C: StoreConnection>(conn: &mut C) -> StoreResult<Vec<Self>> {
        conn.fetch_users().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_serializes_null_email() {
        let user = User {
            id: 7,
            name: "Legacy".to_string(),
            email: None,
        };

        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["name"], "Legacy");
        assert!(json["email"].is_null());
    }

    #[test]
    fn test_create_user_struct() {
        let create_user = CreateUser {
            name: "Test User".to_string(),
            email: "test@example.com".to_string(),
        };

        assert_eq!(create_user.name, "Test User");
        assert_eq!(create_user.email, "test@example.com");
    }
}
