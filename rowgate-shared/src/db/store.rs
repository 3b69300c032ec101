/// Store abstraction used by the pool and the handlers
///
/// The pool does not know which database it talks to. A backend provides:
///
/// - a [`ConnectionManager`] that opens and health-checks connections
/// - a [`StoreConnection`] type that runs the queries the API needs
///
/// Two backends ship with the crate: [`crate::db::postgres`] for a real
/// PostgreSQL server and [`crate::db::memory`] for tests and demo mode.
///
/// # Example
///
/// ```no_run
/// use rowgate_shared::db::pool::{Pool, DatabaseConfig};
/// use rowgate_shared::db::postgres::PgManager;
/// use rowgate_shared::db::store::StoreConnection;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = DatabaseConfig {
///     database: "app".to_string(),
///     ..Default::default()
/// };
/// let pool = Pool::connect(PgManager::new(&config), config).await?;
///
/// let mut conn = pool.acquire().await?;
/// let users = conn.fetch_users().await?;
/// println!("{} users", users.len());
/// # Ok(())
/// # }
/// ```

use crate::db::error::StoreResult;
use crate::models::post::Post;
use crate::models::user::{CreateUser, User};
use async_trait::async_trait;

/// Queries a single store connection can run
///
/// Every method is one statement. Implementations must bind values as
/// parameters and never splice them into query text.
#[async_trait]
pub trait StoreConnection: Send + 'static {
    /// Round-trips a trivial statement to prove the connection is alive
    async fn ping(&mut self) -> StoreResult<()>;

    /// Returns every user, in store-defined order
    async fn fetch_users(&mut self) -> StoreResult<Vec<User>>;

    /// Returns the user with the given id, if any
    async fn fetch_user(&mut self, id: i32) -> StoreResult<Option<User>>;

    /// Inserts a user and returns the stored record with its generated id
    ///
    /// Fails with [`crate::db::error::StoreError::Conflict`] when the email is
    /// already taken.
    async fn insert_user(&mut self, user: &CreateUser) -> StoreResult<User>;

    /// Returns every post, in store-defined order
    async fn fetch_posts(&mut self) -> StoreResult<Vec<Post>>;

    /// Returns the post with the given id, if any
    async fn fetch_post(&mut self, id: i32) -> StoreResult<Option<Post>>;
}

/// Opens and validates connections for a [`crate::db::pool::Pool`]
#[async_trait]
pub trait ConnectionManager: Send + Sync + 'static {
    /// Connection type handed out by the pool
    type Connection: StoreConnection;

    /// Opens a new connection to the store
    async fn connect(&self) -> StoreResult<Self::Connection>;

    /// Checks that an idle connection is still usable
    async fn is_valid(&self, conn: &mut Self::Connection) -> StoreResult<()> {
        conn.ping().await
    }

    /// Closes a connection the pool no longer needs
    ///
    /// The default simply drops it.
    async fn disconnect(&self, conn: Self::Connection) {
        drop(conn);
    }
}
