//! Lifecycle management for the PostgreSQL connection pool.
//!
//! The pool is process-wide state: opened once at startup (a failure there is
//! fatal — the server must not accept traffic against a pool that never
//! initialized), shared by every in-flight request, and drained once at
//! shutdown. The pool itself is the lock boundary; callers acquire, use, and
//! release connections without holding them across unrelated awaits.

use crate::config::Config;
use async_trait::async_trait;
use sqlx::Postgres;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::time::Duration;
use thiserror::Error;

/// Errors raised by the connection pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool could not be created at startup (store unreachable or
    /// credentials rejected). Fatal: the process must not serve requests.
    #[error("failed to initialize connection pool: {0}")]
    Init(#[source] sqlx::Error),
    /// A connection was requested from a pool that has been closed.
    #[error("connection pool is closed")]
    Closed,
    /// No connection became available within the acquire timeout.
    #[error("connection pool exhausted: no connection available within {wait_secs}s")]
    Exhausted {
        /// Seconds the acquire waited before giving up.
        wait_secs: u64,
    },
    /// Any other backend failure while acquiring or using a connection.
    #[error("pool request failed: {0}")]
    Backend(#[source] sqlx::Error),
}

/// Handle to the pooled PostgreSQL connections.
///
/// The live connection count stays within the configured `[min, max]` for the
/// pool's whole lifetime; acquires beyond `max` block until a connection is
/// released. Connections check themselves back in when dropped.
pub struct StorePool {
    inner: PgPool,
    acquire_timeout: Duration,
}

impl StorePool {
    /// Open the pool, connecting eagerly so a bad address or credential
    /// fails here rather than on the first request.
    pub async fn open(config: &Config) -> Result<Self, PoolError> {
        let options = PgConnectOptions::new()
            .host(&config.pg_host)
            .port(config.pg_port)
            .database(&config.pg_database)
            .username(&config.pg_user)
            .password(&config.pg_password);

        let acquire_timeout = Duration::from_secs(config.pool_acquire_timeout_secs);
        let inner = PgPoolOptions::new()
            .min_connections(config.pool_min_size)
            .max_connections(config.pool_max_size)
            .acquire_timeout(acquire_timeout)
            .connect_with(options)
            .await
            .map_err(PoolError::Init)?;

        tracing::info!(
            host = %config.pg_host,
            database = %config.pg_database,
            min = config.pool_min_size,
            max = config.pool_max_size,
            "Connection pool ready"
        );

        Ok(Self {
            inner,
            acquire_timeout,
        })
    }

    /// Check a connection out of the pool, waiting up to the acquire timeout.
    pub async fn acquire(&self) -> Result<PoolConnection<Postgres>, PoolError> {
        self.inner
            .acquire()
            .await
            .map_err(|err| classify_acquire_error(err, self.acquire_timeout))
    }

    /// Number of connections currently live (checked out or idle).
    pub fn size(&self) -> u32 {
        self.inner.size()
    }

    /// Number of idle connections waiting in the pool.
    pub fn num_idle(&self) -> usize {
        self.inner.num_idle()
    }

    /// Whether the pool has been closed.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Drain the pool at shutdown.
    ///
    /// Connections still checked out are released forcibly as they return;
    /// that condition is logged rather than waited out indefinitely.
    pub async fn close(&self) {
        let checked_out = self.size() as usize - self.num_idle();
        if checked_out > 0 {
            tracing::warn!(
                checked_out,
                "Closing pool with connections still in use; forcing release"
            );
        }
        self.inner.close().await;
        tracing::info!("Connection pool closed");
    }
}

fn classify_acquire_error(err: sqlx::Error, acquire_timeout: Duration) -> PoolError {
    match err {
        sqlx::Error::PoolClosed => PoolError::Closed,
        sqlx::Error::PoolTimedOut => PoolError::Exhausted {
            wait_secs: acquire_timeout.as_secs(),
        },
        other => PoolError::Backend(other),
    }
}

/// Reachability probe for the backing store, abstracted so the HTTP health
/// handler can be driven with a stub in tests.
#[async_trait]
pub trait StoreHealth: Send + Sync {
    /// Round-trip a trivial query through a pooled connection.
    async fn ping(&self) -> Result<(), PoolError>;
}

#[async_trait]
impl StoreHealth for StorePool {
    async fn ping(&self) -> Result<(), PoolError> {
        let mut conn = self.acquire().await?;
        sqlx::query("SELECT 1")
            .execute(&mut *conn)
            .await
            .map_err(PoolError::Backend)?;
        Ok(())
    }
}
