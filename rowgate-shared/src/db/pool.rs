/// Database connection pool management
///
/// This module provides a bounded connection pool that works with any store
/// backend implementing [`ConnectionManager`]. It enforces a hard ceiling on
/// open connections, supports a queueing or fail-fast acquire policy, health
/// checks idle connections, and replaces connections that die mid-request.
///
/// # Leases
///
/// [`Pool::acquire`] returns a [`PooledConnection`] guard. Dropping the guard
/// returns the connection to the idle set, so every exit path (error, early
/// return, cancelled future) releases it. A connection that reported a fatal
/// fault, or whose query was abandoned mid-flight, is discarded instead.
///
/// # Example
///
/// ```no_run
/// use rowgate_shared::db::pool::{Pool, DatabaseConfig};
/// use rowgate_shared::db::postgres::PgManager;
/// use rowgate_shared::db::store::StoreConnection;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = DatabaseConfig {
///         host: "localhost".to_string(),
///         port: 5432,
///         username: "postgres".to_string(),
///         password: Some("postgres".to_string()),
///         database: "app".to_string(),
///         max_connections: 10,
///         ..Default::default()
///     };
///
///     let pool = Pool::connect(PgManager::new(&config), config).await?;
///
///     // Use the pool
///     let mut conn = pool.acquire().await?;
///     let users = conn.fetch_users().await?;
///     println!("{} users", users.len());
///
///     Ok(())
/// }
/// ```

use crate::db::error::{PoolError, StoreResult};
use crate::db::store::{ConnectionManager, StoreConnection};
use crate::models::post::Post;
use crate::models::user::{CreateUser, User};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tracing::{debug, info, warn};

/// What `acquire` does when every connection is leased
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquirePolicy {
    /// Queue until a connection frees up or the acquire timeout elapses
    #[default]
    Wait,

    /// Fail immediately with [`PoolError::Exhausted`]
    FailFast,
}

impl FromStr for AcquirePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wait" => Ok(AcquirePolicy::Wait),
            "fail_fast" | "fail-fast" => Ok(AcquirePolicy::FailFast),
            other => Err(format!(
                "unknown acquire policy '{}', expected 'wait' or 'fail_fast'",
                other
            )),
        }
    }
}

/// Configuration for the database connection pool
///
/// All timeouts are specified in seconds for ease of configuration from environment variables.
#[derive(Clone)]
pub struct DatabaseConfig {
    /// Store host name or address
    pub host: String,

    /// Store port
    pub port: u16,

    /// Login user
    pub username: String,

    /// Optional password
    pub password: Option<String>,

    /// Target database name
    pub database: String,

    /// Maximum number of simultaneously open connections
    ///
    /// Default: 10. Values below 1 are treated as 1.
    pub max_connections: u32,

    /// Number of connections opened eagerly and kept warm
    ///
    /// Default: 1. Clamped to `max_connections`.
    pub min_connections: u32,

    /// How long `acquire` waits under [`AcquirePolicy::Wait`] (seconds)
    ///
    /// Default: 30 seconds
    pub acquire_timeout_seconds: u64,

    /// Behavior when every connection is leased
    pub acquire_policy: AcquirePolicy,

    /// How long a connection can remain idle before being closed (seconds)
    ///
    /// Default: Some(600) (10 minutes)
    /// None = connections never closed due to idle time
    pub idle_timeout_seconds: Option<u64>,

    /// Maximum lifetime of a connection before forced recycling (seconds)
    ///
    /// Default: Some(1800) (30 minutes)
    /// None = connections live forever
    pub max_lifetime_seconds: Option<u64>,

    /// Whether to ping idle connections before handing them out
    ///
    /// Default: true
    pub test_before_acquire: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            username: "postgres".to_string(),
            password: None,
            database: String::new(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout_seconds: 30,
            acquire_policy: AcquirePolicy::Wait,
            idle_timeout_seconds: Some(600),
            max_lifetime_seconds: Some(1800),
            test_before_acquire: true,
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("database", &self.database)
            .field("max_connections", &self.max_connections)
            .field("min_connections", &self.min_connections)
            .field("acquire_timeout_seconds", &self.acquire_timeout_seconds)
            .field("acquire_policy", &self.acquire_policy)
            .field("idle_timeout_seconds", &self.idle_timeout_seconds)
            .field("max_lifetime_seconds", &self.max_lifetime_seconds)
            .field("test_before_acquire", &self.test_before_acquire)
            .finish()
    }
}

impl DatabaseConfig {
    /// Effective connection ceiling (at least 1)
    pub fn max_size(&self) -> usize {
        self.max_connections.max(1) as usize
    }

    /// Effective warm connection count (never above the ceiling)
    pub fn min_size(&self) -> usize {
        (self.min_connections as usize).min(self.max_size())
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_seconds)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_seconds.map(Duration::from_secs)
    }

    pub fn max_lifetime(&self) -> Option<Duration> {
        self.max_lifetime_seconds.map(Duration::from_secs)
    }
}

/// Snapshot of pool occupancy for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Connections currently open (idle + in use)
    pub open_connections: usize,

    /// Number of idle connections available
    pub idle_connections: usize,

    /// Number of connections currently leased
    pub in_use_connections: usize,

    /// Configured ceiling
    pub max_connections: usize,
}

struct IdleConnection<C> {
    conn: C,
    created_at: Instant,
    idle_since: Instant,
}

struct PoolInner<M: ConnectionManager> {
    manager: M,
    config: DatabaseConfig,
    /// One permit per lease; bounds concurrent holders
    semaphore: Arc<Semaphore>,
    idle: Mutex<VecDeque<IdleConnection<M::Connection>>>,
    /// Every live connection: idle, leased, or being opened
    open: AtomicUsize,
    /// Signalled when a connection goes idle or an open slot frees up
    available: Notify,
    closed: AtomicBool,
}

/// A reserved open slot; gives it back unless the connection it covers survives
struct OpenSlot<'a, M: ConnectionManager> {
    pool: &'a PoolInner<M>,
    armed: bool,
}

impl<M: ConnectionManager> OpenSlot<'_, M> {
    fn keep(mut self) {
        self.armed = false;
    }
}

impl<M: ConnectionManager> Drop for OpenSlot<'_, M> {
    fn drop(&mut self) {
        if self.armed {
            self.pool.free_slot();
        }
    }
}

impl<M: ConnectionManager> PoolInner<M> {
    fn lock_idle(&self) -> MutexGuard<'_, VecDeque<IdleConnection<M::Connection>>> {
        self.idle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn is_expired(&self, idle: &IdleConnection<M::Connection>) -> bool {
        let idle_expired = self
            .config
            .idle_timeout()
            .is_some_and(|timeout| idle.idle_since.elapsed() >= timeout);
        let lifetime_expired = self
            .config
            .max_lifetime()
            .is_some_and(|lifetime| idle.created_at.elapsed() >= lifetime);

        idle_expired || lifetime_expired
    }

    fn free_slot(&self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
        self.available.notify_one();
    }

    /// Drops a connection and gives its slot back
    fn discard(&self, conn: M::Connection) {
        drop(conn);
        self.free_slot();
    }

    fn push_idle(&self, conn: M::Connection, created_at: Instant) {
        self.lock_idle().push_back(IdleConnection {
            conn,
            created_at,
            idle_since: Instant::now(),
        });
        self.available.notify_one();
    }

    /// Reserves an open slot if fewer than `limit` connections are open
    fn reserve_slot(&self, limit: usize) -> Option<OpenSlot<'_, M>> {
        self.open
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |open| {
                (open < limit).then_some(open + 1)
            })
            .ok()
            .map(|_| OpenSlot {
                pool: self,
                armed: true,
            })
    }

    /// Connects through a reserved slot
    async fn open_connection(&self, slot: OpenSlot<'_, M>) -> StoreResult<(M::Connection, Instant)> {
        let conn = self.manager.connect().await?;
        slot.keep();

        debug!(
            open_connections = self.open.load(Ordering::SeqCst),
            "Opened store connection"
        );
        Ok((conn, Instant::now()))
    }

    /// Tops the pool up to `min_connections`
    ///
    /// Reserves open slots directly; never holds a lease permit.
    async fn replenish(&self) -> StoreResult<()> {
        while !self.is_closed() {
            let Some(slot) = self.reserve_slot(self.config.min_size()) else {
                break;
            };
            let (conn, created_at) = self.open_connection(slot).await?;
            if self.is_closed() {
                self.discard(conn);
                break;
            }
            self.push_idle(conn, created_at);
        }
        Ok(())
    }

    fn schedule_replenish(self: &Arc<Self>) {
        if self.is_closed() || self.open.load(Ordering::SeqCst) >= self.config.min_size() {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let inner = Arc::clone(self);
        handle.spawn(async move {
            if let Err(err) = inner.replenish().await {
                warn!(error = %err, "Failed to replace discarded connection");
            }
        });
    }

    fn release(self: &Arc<Self>, conn: M::Connection, created_at: Instant, broken: bool) {
        if broken {
            self.discard(conn);
            warn!(
                open_connections = self.open.load(Ordering::SeqCst),
                "Discarded broken connection"
            );
            self.schedule_replenish();
        } else if self.is_closed() {
            self.discard(conn);
            debug!("Pool closed, dropping released connection");
        } else {
            self.push_idle(conn, created_at);
        }
    }
}

/// Bounded pool of store connections
///
/// Cloning is cheap; clones share the same connections.
pub struct Pool<M: ConnectionManager> {
    inner: Arc<PoolInner<M>>,
}

impl<M: ConnectionManager> Clone for Pool<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M: ConnectionManager> fmt::Debug for Pool<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("stats", &self.stats())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<M: ConnectionManager> Pool<M> {
    /// Creates a pool without opening any connection
    ///
    /// Connections are opened on first use.
    pub fn new(manager: M, config: DatabaseConfig) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_size()));
        Self {
            inner: Arc::new(PoolInner {
                manager,
                config,
                semaphore,
                idle: Mutex::new(VecDeque::new()),
                open: AtomicUsize::new(0),
                available: Notify::new(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Creates a pool, opens `min_connections`, and checks the store responds
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::ConnectionFailed`] if the store is unreachable or
    /// rejects the credentials.
    pub async fn connect(manager: M, config: DatabaseConfig) -> Result<Self, PoolError> {
        info!(
            max_connections = config.max_size(),
            min_connections = config.min_size(),
            acquire_timeout_seconds = config.acquire_timeout_seconds,
            acquire_policy = ?config.acquire_policy,
            "Creating database connection pool"
        );

        let pool = Self::new(manager, config);
        pool.inner
            .replenish()
            .await
            .map_err(PoolError::ConnectionFailed)?;
        pool.health_check().await?;

        info!("Database connection pool created successfully");
        Ok(pool)
    }

    /// Leases a connection
    ///
    /// # Errors
    ///
    /// - [`PoolError::Exhausted`] when no connection frees up in time
    ///   (immediately under [`AcquirePolicy::FailFast`])
    /// - [`PoolError::ConnectionFailed`] when a new connection cannot be opened
    /// - [`PoolError::Closed`] after [`Pool::close`]
    pub async fn acquire(&self) -> Result<PooledConnection<M>, PoolError> {
        let inner = &self.inner;
        if inner.is_closed() {
            return Err(PoolError::Closed);
        }

        let started = Instant::now();
        let permit = match inner.config.acquire_policy {
            AcquirePolicy::FailFast => match inner.semaphore.clone().try_acquire_owned() {
                Ok(permit) => permit,
                Err(TryAcquireError::NoPermits) => {
                    debug!("No connection available, failing fast");
                    return Err(PoolError::Exhausted {
                        waited: started.elapsed(),
                    });
                }
                Err(TryAcquireError::Closed) => return Err(PoolError::Closed),
            },
            AcquirePolicy::Wait => {
                let timeout = inner.config.acquire_timeout();
                match tokio::time::timeout(timeout, inner.semaphore.clone().acquire_owned()).await {
                    Ok(Ok(permit)) => permit,
                    Ok(Err(_)) => return Err(PoolError::Closed),
                    Err(_) => {
                        warn!(
                            timeout_seconds = timeout.as_secs_f64(),
                            "Timed out waiting for a pooled connection"
                        );
                        return Err(PoolError::Exhausted {
                            waited: started.elapsed(),
                        });
                    }
                }
            }
        };

        let mut permit = Some(permit);

        loop {
            if inner.is_closed() {
                return Err(PoolError::Closed);
            }

            // Prefer the most recently used idle connection
            let next_idle = inner.lock_idle().pop_back();
            if let Some(idle) = next_idle {
                if inner.is_expired(&idle) {
                    debug!("Closing expired idle connection");
                    inner.discard(idle.conn);
                    continue;
                }

                let mut lease = PooledConnection::new(Arc::clone(inner), idle.conn, idle.created_at, permit.take());
                if !inner.config.test_before_acquire {
                    return Ok(lease);
                }

                // Stays flagged if the ping is abandoned halfway
                lease.broken = true;
                let valid = inner.manager.is_valid(lease.conn_mut()).await;
                match valid {
                    Ok(()) => {
                        lease.broken = false;
                        return Ok(lease);
                    }
                    Err(err) => {
                        warn!(error = %err, "Idle connection failed validation, replacing it");
                        permit = lease.permit.take();
                        continue;
                    }
                }
            }

            if let Some(slot) = inner.reserve_slot(inner.config.max_size()) {
                let (conn, created_at) = inner.open_connection(slot).await.map_err(|err| {
                    warn!(error = %err, "Failed to open store connection");
                    PoolError::ConnectionFailed(err)
                })?;
                return Ok(PooledConnection::new(Arc::clone(inner), conn, created_at, permit));
            }

            // No lease is free to take and every open slot is held by a
            // background refill; its connection lands in the idle set.
            debug!("Waiting for a connection being opened in the background");
            inner.available.notified().await;
        }
    }

    /// Returns a leased connection to the pool
    ///
    /// Equivalent to dropping the guard.
    pub fn release(&self, conn: PooledConnection<M>) {
        drop(conn);
    }

    /// Acquires a connection and pings the store through it
    pub async fn health_check(&self) -> Result<(), PoolError> {
        debug!("Performing database health check");

        let mut conn = self.acquire().await?;
        conn.ping().await.map_err(|err| {
            warn!(error = %err, "Database health check failed");
            PoolError::ConnectionFailed(err)
        })?;

        debug!("Database health check passed");
        Ok(())
    }

    /// Gets current pool statistics for monitoring
    pub fn stats(&self) -> PoolStats {
        let open = self.inner.open.load(Ordering::SeqCst);
        let idle = self.inner.lock_idle().len();

        PoolStats {
            open_connections: open,
            idle_connections: idle,
            in_use_connections: open.saturating_sub(idle),
            max_connections: self.inner.config.max_size(),
        }
    }

    /// Pool configuration
    pub fn config(&self) -> &DatabaseConfig {
        &self.inner.config
    }

    /// Backend that opens the connections
    pub fn manager(&self) -> &M {
        &self.inner.manager
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Gracefully closes the connection pool
    ///
    /// New acquires fail with [`PoolError::Closed`], waiters are woken with the
    /// same error, and idle connections are disconnected. Leased connections
    /// are closed when their guards drop.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.semaphore.close();
        self.inner.available.notify_waiters();
        self.inner.available.notify_one();

        let drained: Vec<_> = self.inner.lock_idle().drain(..).collect();
        for idle in drained {
            self.inner.manager.disconnect(idle.conn).await;
            self.inner.free_slot();
        }

        info!("Database connection pool closed");
    }
}

/// A leased connection
///
/// Derefs to the backend connection. Query methods called through the guard
/// itself (via [`StoreConnection`]) also track connection health: a fatal
/// fault or an abandoned call marks the connection broken so it is discarded
/// on release.
pub struct PooledConnection<M: ConnectionManager> {
    pool: Arc<PoolInner<M>>,
    conn: Option<M::Connection>,
    created_at: Instant,
    /// Set while a call is in flight and after a fatal fault
    broken: bool,
    /// Set by `mark_broken`; never cleared
    marked_broken: bool,
    permit: Option<OwnedSemaphorePermit>,
}

impl<M: ConnectionManager> PooledConnection<M> {
    fn new(
        pool: Arc<PoolInner<M>>,
        conn: M::Connection,
        created_at: Instant,
        permit: Option<OwnedSemaphorePermit>,
    ) -> Self {
        Self {
            pool,
            conn: Some(conn),
            created_at,
            broken: false,
            marked_broken: false,
            permit,
        }
    }

    fn conn_mut(&mut self) -> &mut M::Connection {
        self.conn
            .as_mut()
            .expect("connection is present until the lease is dropped")
    }

    /// Flags the connection so release discards it instead of reusing it
    ///
    /// For callers that hit a fault on the raw connection (through `Deref`)
    /// which the guard could not see. Later successful calls do not undo it.
    pub fn mark_broken(&mut self) {
        self.marked_broken = true;
    }

    pub fn is_broken(&self) -> bool {
        self.broken || self.marked_broken
    }

    /// Clears the in-flight flag unless the call failed fatally
    fn settle<T>(&mut self, result: StoreResult<T>) -> StoreResult<T> {
        self.broken = matches!(&result, Err(err) if err.is_fatal());
        result
    }
}

impl<M: ConnectionManager> Deref for PooledConnection<M> {
    type Target = M::Connection;

    fn deref(&self) -> &Self::Target {
        self.conn
            .as_ref()
            .expect("connection is present until the lease is dropped")
    }
}

impl<M: ConnectionManager> DerefMut for PooledConnection<M> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn_mut()
    }
}

impl<M: ConnectionManager> Drop for PooledConnection<M> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn, self.created_at, self.is_broken());
        }
        // The permit field drops after this, once the connection is back in the idle set.
    }
}

#[async_trait]
impl<M: ConnectionManager> StoreConnection for PooledConnection<M> {
    async fn ping(&mut self) -> StoreResult<()> {
        self.broken = true;
        let result = self.conn_mut().ping().await;
        self.settle(result)
    }

    async fn fetch_users(&mut self) -> StoreResult<Vec<User>> {
        self.broken = true;
        let result = self.conn_mut().fetch_users().await;
        self.settle(result)
    }

    async fn fetch_user(&mut self, id: i32) -> StoreResult<Option<User>> {
        self.broken = true;
        let result = self.conn_mut().fetch_user(id).await;
        self.settle(result)
    }

    async fn insert_user(&mut self, user: &CreateUser) -> StoreResult<User> {
        self.broken = true;
        let result = self.conn_mut().insert_user(user).await;
        self.settle(result)
    }

    async fn fetch_posts(&mut self) -> StoreResult<Vec<Post>> {
        self.broken = true;
        let result = self.conn_mut().fetch_posts().await;
        self.settle(result)
    }

    async fn fetch_post(&mut self, id: i32) -> StoreResult<Option<Post>> {
        self.broken = true;
        let result = self.conn_mut().fetch_post(id).await;
        self.settle(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_config_default() {
        let config = DatabaseConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 5432);
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 1);
        assert_eq!(config.acquire_timeout_seconds, 30);
        assert_eq!(config.acquire_policy, AcquirePolicy::Wait);
        assert_eq!(config.idle_timeout_seconds, Some(600));
        assert_eq!(config.max_lifetime_seconds, Some(1800));
        assert!(config.test_before_acquire);
    }

    #[test]
    fn test_sizes_are_clamped() {
        let config = DatabaseConfig {
            max_connections: 0,
            min_connections: 5,
            ..Default::default()
        };
        assert_eq!(config.max_size(), 1);
        assert_eq!(config.min_size(), 1);
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = DatabaseConfig {
            password: Some("hunter2".to_string()),
            ..Default::default()
        };
        let printed = format!("{:?}", config);
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn test_acquire_policy_from_str() {
        assert_eq!("wait".parse::<AcquirePolicy>(), Ok(AcquirePolicy::Wait));
        assert_eq!("fail_fast".parse::<AcquirePolicy>(), Ok(AcquirePolicy::FailFast));
        assert_eq!(" Fail-Fast ".parse::<AcquirePolicy>(), Ok(AcquirePolicy::FailFast));
        assert!("block".parse::<AcquirePolicy>().is_err());
    }

    #[test]
    fn test_durations() {
        let config = DatabaseConfig {
            idle_timeout_seconds: None,
            ..Default::default()
        };
        assert_eq!(config.acquire_timeout(), Duration::from_secs(30));
        assert_eq!(config.idle_timeout(), None);
        assert_eq!(config.max_lifetime(), Some(Duration::from_secs(1800)));
    }

    // Behavioral pool tests run against the in-memory store in tests/db_pool_tests.rs
}
