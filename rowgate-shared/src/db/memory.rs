/// In-process store backend
///
/// Keeps users and posts in memory behind a mutex. It behaves like the
/// PostgreSQL backend where the API can observe it (generated ids, unique
/// emails, unspecified list order) and adds hooks for tests:
///
/// - counters for open connections, the peak number open at once, and total
///   connects
/// - fault injection: failing queries, connections that die mid-query, a
///   simulated server restart, and a store that refuses new connections
/// - artificial per-query and per-connect delays to hold connections leased
///   or mid-handshake
///
/// The API server can also run on it (`STORE_BACKEND=memory`) for demos.
///
/// # Example
///
/// ```
/// use rowgate_shared::db::memory::MemoryStore;
/// use rowgate_shared::db::pool::{Pool, DatabaseConfig};
/// use rowgate_shared::db::store::StoreConnection;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryStore::new();
/// store.insert_post("Hello");
///
/// let pool = Pool::new(store.clone(), DatabaseConfig::default());
/// let mut conn = pool.acquire().await?;
/// assert_eq!(conn.fetch_posts().await?.len(), 1);
/// assert_eq!(store.open_connections(), 1);
/// # Ok(())
/// # }
/// ```

use crate::db::error::{StoreError, StoreResult};
use crate::db::store::{ConnectionManager, StoreConnection};
use crate::models::post::Post;
use crate::models::user::{CreateUser, User};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Constraint name reported for duplicate emails, matching PostgreSQL's default
pub const USERS_EMAIL_KEY: &str = "users_email_key";

#[derive(Debug, Default)]
struct Tables {
    users: Vec<User>,
    posts: Vec<Post>,
    last_user_id: i32,
    last_post_id: i32,
}

#[derive(Debug, Default)]
struct MemoryState {
    tables: Mutex<Tables>,
    open: AtomicUsize,
    peak_open: AtomicUsize,
    connects: AtomicUsize,
    failing_queries: AtomicUsize,
    breaking_queries: AtomicUsize,
    refuse_connections: AtomicBool,
    query_delay_ms: AtomicU64,
    connect_delay_ms: AtomicU64,
    /// Bumped by `restart`; connections from an older epoch are dead
    epoch: AtomicU64,
}

impl MemoryState {
    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Consumes one unit of an injected-fault budget
fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// In-memory store and its connection manager
///
/// Clones share the same data and counters.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every query sleep for `delay` before running
    pub fn with_query_delay(self, delay: Duration) -> Self {
        self.set_query_delay(delay);
        self
    }

    pub fn set_query_delay(&self, delay: Duration) {
        self.state
            .query_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Makes every connect sleep for `delay` before completing
    pub fn set_connect_delay(&self, delay: Duration) {
        self.state
            .connect_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Seeds a post; the API has no create path for posts
    pub fn insert_post(&self, title: &str) -> Post {
        let mut tables = self.state.tables();
        tables.last_post_id += 1;
        let post = Post {
            id: tables.last_post_id,
            title: title.to_string(),
        };
        tables.posts.push(post.clone());
        post
    }

    pub fn user_count(&self) -> usize {
        self.state.tables().users.len()
    }

    /// Connections currently open against this store
    pub fn open_connections(&self) -> usize {
        self.state.open.load(Ordering::SeqCst)
    }

    /// Highest number of connections ever open at the same time
    pub fn peak_open_connections(&self) -> usize {
        self.state.peak_open.load(Ordering::SeqCst)
    }

    /// Total successful connects since creation
    pub fn total_connects(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    /// The next `count` queries fail with a non-fatal [`StoreError::Query`]
    pub fn fail_next_queries(&self, count: usize) {
        self.state.failing_queries.store(count, Ordering::SeqCst);
    }

    /// The next `count` queries fail with [`StoreError::Connection`] and leave
    /// their connection dead
    pub fn break_next_queries(&self, count: usize) {
        self.state.breaking_queries.store(count, Ordering::SeqCst);
    }

    /// Severs every open connection, as if the server had restarted
    ///
    /// Data is kept. Existing connections fail their next ping or query.
    pub fn restart(&self) {
        self.state.epoch.fetch_add(1, Ordering::SeqCst);
    }

    /// While set, `connect` fails as if the server were down
    pub fn refuse_connections(&self, refuse: bool) {
        self.state.refuse_connections.store(refuse, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConnectionManager for MemoryStore {
    type Connection = MemoryConnection;

    async fn connect(&self) -> StoreResult<MemoryConnection> {
        let delay = self.state.connect_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if self.state.refuse_connections.load(Ordering::SeqCst) {
            return Err(StoreError::Connection("connection refused".to_string()));
        }

        self.state.connects.fetch_add(1, Ordering::SeqCst);
        let open = self.state.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.peak_open.fetch_max(open, Ordering::SeqCst);

        Ok(MemoryConnection {
            state: Arc::clone(&self.state),
            epoch: self.state.epoch.load(Ordering::SeqCst),
            broken: false,
        })
    }
}

/// A connection to a [`MemoryStore`]
#[derive(Debug)]
pub struct MemoryConnection {
    state: Arc<MemoryState>,
    epoch: u64,
    broken: bool,
}

impl MemoryConnection {
    fn check_alive(&self) -> StoreResult<()> {
        if self.broken || self.epoch != self.state.epoch.load(Ordering::SeqCst) {
            return Err(StoreError::Connection("connection is closed".to_string()));
        }
        Ok(())
    }

    /// Shared prelude of every query: delay, then injected faults
    async fn begin_query(&mut self) -> StoreResult<()> {
        self.check_alive()?;

        let delay = self.state.query_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if take_one(&self.state.breaking_queries) {
            self.broken = true;
            return Err(StoreError::Connection(
                "connection reset by peer".to_string(),
            ));
        }
        if take_one(&self.state.failing_queries) {
            return Err(StoreError::Query("simulated query failure".to_string()));
        }
        Ok(())
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.state.open.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl StoreConnection for MemoryConnection {
    async fn ping(&mut self) -> StoreResult<()> {
        self.check_alive()
    }

    async fn fetch_users(&mut self) -> StoreResult<Vec<User>> {
        self.begin_query().await?;
        Ok(self.state.tables().users.clone())
    }

    async fn fetch_user(&mut self, id: i32) -> StoreResult<Option<User>> {
        self.begin_query().await?;
        Ok(self
            .state
            .tables()
            .users
            .iter()
            .find(|user| user.id == id)
            .cloned())
    }

    async fn insert_user(&mut self, user: &CreateUser) -> StoreResult<User> {
        self.begin_query().await?;

        let mut tables = self.state.tables();
        let taken = tables
            .users
            .iter()
            .any(|existing| existing.email.as_deref() == Some(user.email.as_str()));
        if taken {
            return Err(StoreError::Conflict {
                constraint: Some(USERS_EMAIL_KEY.to_string()),
            });
        }

        tables.last_user_id += 1;
        let created = User {
            id: tables.last_user_id,
            name: user.name.clone(),
            email: Some(user.email.clone()),
        };
        tables.users.push(created.clone());
        Ok(created)
    }

    async fn fetch_posts(&mut self) -> StoreResult<Vec<Post>> {
        self.begin_query().await?;
        Ok(self.state.tables().posts.clone())
    }

    async fn fetch_post(&mut self, id: i32) -> StoreResult<Option<Post>> {
        self.begin_query().await?;
        Ok(self
            .state
            .tables()
            .posts
            .iter()
            .find(|post| post.id == id)
            .cloned())
    }
}
