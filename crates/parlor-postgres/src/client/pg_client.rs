use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use deadpool::managed::{Hook, Pool};
use derive_more::{Deref, DerefMut};
use diesel_async::AsyncConnection;
use diesel_async::pooled_connection::{AsyncDieselConnectionManager, ManagerConfig};
use diesel_async::scoped_futures::ScopedBoxFuture;

use super::lifecycle;
use crate::{
    ConnectionPool, PgConfig, PgError, PgResult, PooledConnection, TRACING_TARGET_CLIENT,
    TRACING_TARGET_CONNECTION,
};

/// Acquisitions slower than this get a warning in the logs.
const SLOW_ACQUIRE: Duration = Duration::from_millis(100);

/// Point-in-time snapshot of the connection pool.
#[derive(Debug, Clone)]
pub struct PgPoolStatus {
    /// Configured pool capacity.
    pub max_size: usize,
    /// Connections currently managed by the pool.
    pub size: usize,
    /// Connections sitting idle, ready to hand out.
    pub available: usize,
    /// Callers currently waiting for a connection.
    pub waiting: usize,
}

impl PgPoolStatus {
    /// Fraction of the pool capacity currently checked out, 0.0 to 1.0.
    #[inline]
    pub fn utilization(&self) -> f64 {
        if self.max_size == 0 {
            return 0.0;
        }
        (self.size - self.available) as f64 / self.max_size as f64
    }

    /// Whether callers are queueing or utilization is running hot.
    #[inline]
    pub fn is_under_pressure(&self) -> bool {
        self.waiting > 0 || self.utilization() > 0.8
    }
}

/// Handle to the comment-store database.
///
/// Owns the connection pool and implements the repository traits in
/// [`crate::query`]. Cloning shares the pool, so one client can be handed to
/// as many tasks as needed.
#[derive(Clone)]
pub struct PgClient {
    inner: Arc<PgClientInner>,
}

struct PgClientInner {
    pool: ConnectionPool,
    config: PgConfig,
}

impl PgClient {
    /// Builds the pool for the given configuration.
    ///
    /// No connection is opened here; they are established lazily as
    /// operations ask for them.
    ///
    /// # Errors
    ///
    /// Returns an error when the pool cannot be assembled from the
    /// configuration.
    #[tracing::instrument(
        skip(config),
        target = TRACING_TARGET_CLIENT,
        fields(database_url = %config.database_url_masked())
    )]
    pub fn new(config: PgConfig) -> PgResult<Self> {
        let mut manager_config = ManagerConfig::default();
        manager_config.custom_setup = Box::new(lifecycle::connect);
        let manager =
            AsyncDieselConnectionManager::new_with_config(config.database_url(), manager_config);

        let pool = Pool::builder(manager)
            .max_size(config.max_connections as usize)
            .wait_timeout(config.connection_timeout())
            .create_timeout(config.connection_timeout())
            .recycle_timeout(config.idle_timeout())
            .runtime(deadpool::Runtime::Tokio1)
            .post_create(Hook::sync_fn(lifecycle::on_create))
            .pre_recycle(Hook::sync_fn(lifecycle::on_pre_recycle))
            .post_recycle(Hook::sync_fn(lifecycle::on_post_recycle))
            .build()
            .map_err(|source| {
                tracing::error!(
                    target: TRACING_TARGET_CONNECTION,
                    error = %source,
                    "pool construction failed"
                );
                PgError::Unexpected(format!("pool construction failed: {source}").into())
            })?;

        tracing::info!(
            target: TRACING_TARGET_CLIENT,
            max_connections = config.max_connections,
            "database client ready"
        );

        Ok(Self {
            inner: Arc::new(PgClientInner { pool, config }),
        })
    }

    /// Checks a connection out of the pool.
    ///
    /// The returned [`PgConn`] goes back to the pool on drop, so each
    /// repository operation holds its connection for exactly the span of one
    /// call, error paths included.
    ///
    /// # Errors
    ///
    /// Returns an error when no connection becomes available within the
    /// configured timeout.
    #[tracing::instrument(skip(self), target = TRACING_TARGET_CONNECTION)]
    pub async fn get_connection(&self) -> PgResult<PgConn> {
        let started = Instant::now();
        let conn = self.inner.pool.get().await.map_err(|source| {
            tracing::error!(
                target: TRACING_TARGET_CONNECTION,
                error = %source,
                waited = ?started.elapsed(),
                "could not acquire a pooled connection"
            );
            PgError::from(source)
        })?;

        let waited = started.elapsed();
        if waited > SLOW_ACQUIRE {
            tracing::warn!(
                target: TRACING_TARGET_CONNECTION,
                waited = ?waited,
                "slow connection acquisition"
            );
        }

        Ok(PgConn::new(conn))
    }

    /// Checks a raw pooled connection out, bypassing the [`PgConn`] wrapper.
    ///
    /// The migration runner needs this to move the connection into a
    /// blocking task.
    pub(crate) async fn get_pooled_connection(&self) -> PgResult<PooledConnection> {
        self.inner.pool.get().await.map_err(PgError::from)
    }

    /// Snapshots the pool counters.
    #[inline]
    pub fn pool_status(&self) -> PgPoolStatus {
        let status = self.inner.pool.status();
        PgPoolStatus {
            max_size: status.max_size,
            size: status.size,
            available: status.available,
            waiting: status.waiting,
        }
    }

    /// The configuration this client was built from.
    #[inline]
    pub fn config(&self) -> &PgConfig {
        &self.inner.config
    }
}

impl fmt::Debug for PgClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgClient")
            .field("config", &self.inner.config)
            .field("pool", &self.pool_status())
            .finish()
    }
}

/// A pooled connection scoped to one repository operation.
///
/// Derefs to the underlying [`AsyncPgConnection`] and returns itself to the
/// pool when dropped.
///
/// [`AsyncPgConnection`]: crate::PgConnection
#[derive(Deref, DerefMut)]
pub struct PgConn {
    #[deref]
    #[deref_mut]
    conn: PooledConnection,
}

impl PgConn {
    /// Wraps a checked-out pooled connection.
    pub fn new(conn: PooledConnection) -> Self {
        Self { conn }
    }

    /// Runs the given closure inside a database transaction.
    ///
    /// Commits on `Ok`, rolls back on `Err`.
    pub async fn transaction<'a, T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: for<'r> FnOnce(&'r mut PooledConnection) -> ScopedBoxFuture<'a, 'r, Result<T, E>>
            + Send
            + 'a,
        T: Send + 'a,
        E: From<diesel::result::Error> + Send + 'a,
    {
        self.conn.transaction(f).await
    }
}

impl fmt::Debug for PgConn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgConn").finish_non_exhaustive()
    }
}
