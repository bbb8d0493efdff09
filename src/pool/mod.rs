use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures_core::future::BoxFuture;
use tokio::sync::{Mutex as AsyncMutex, OwnedSemaphorePermit, Semaphore};

use crate::connection::MySqlConnection;
use crate::error::{Error, Result};
use crate::options::ConnectOptions;
use crate::result::MySqlResultSet;
use crate::transaction::Transaction;
use crate::value::Value;

mod options;

pub use options::PoolOptions;

/// A bounded pool of MySQL sessions.
///
/// At most [`max_connections`][PoolOptions::max_connections]
/// connections are checked out at any moment; idle connections are
/// reused when their endpoint settings match and they have not
/// expired by age or accumulated busy time.
///
/// [`execute`][Self::execute] and
/// [`transactional`][Self::transactional] transparently retry once
/// on a fresh connection when the pooled one turns out to be closed
/// or broken.
#[derive(Clone)]
pub struct MySqlPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    connect_options: ConnectOptions,
    options: PoolOptions,
    semaphore: Arc<Semaphore>,
    idle: Mutex<Vec<Idle>>,

    // serializes eviction and connect so the pool cannot overshoot
    // its cap while several acquirers miss the idle list at once
    create_lock: AsyncMutex<()>,

    closed: AtomicBool,
}

struct Idle {
    connection: MySqlConnection,
    settings: ConnectOptions,
    created_at: Instant,
    busy_time: Duration,
    last_returned_at: Instant,
}

impl Idle {
    fn is_expired(&self, options: &PoolOptions) -> bool {
        self.created_at.elapsed() >= options.max_connection_age
            || self.busy_time >= options.max_session_use
    }
}

/// Exclusive access to one pooled connection.
///
/// Dropping the guard returns the connection to the pool, or
/// disposes of it when it is closed, the pool is closed, or the
/// work done on it failed with a client error.
pub struct PoolConnection {
    connection: Option<MySqlConnection>,
    settings: ConnectOptions,
    created_at: Instant,
    busy_time: Duration,
    acquired_at: Instant,
    reusable: bool,
    pool: Arc<PoolInner>,
    _permit: OwnedSemaphorePermit,
}

impl std::ops::Deref for PoolConnection {
    type Target = MySqlConnection;

    fn deref(&self) -> &MySqlConnection {
        self.connection.as_ref().expect("connection is present until drop")
    }
}

impl PoolConnection {
    /// Flags the connection to be disposed instead of returned.
    pub(crate) fn mark_not_reusable(&mut self) {
        self.reusable = false;
    }
}

impl Drop for PoolConnection {
    fn drop(&mut self) {
        let connection = self.connection.take().expect("dropped once");

        let pool_closed = self.pool.closed.load(Ordering::Acquire);

        if pool_closed || !self.reusable || !connection.is_open() {
            dispose(connection);
            return;
        }

        let now = Instant::now();

        let mut idle = self.pool.idle.lock().expect("pool idle lock");
        idle.push(Idle {
            connection,
            settings: self.settings.clone(),
            created_at: self.created_at,
            busy_time: self.busy_time + (now - self.acquired_at),
            last_returned_at: now,
        });
    }
}

fn dispose(connection: MySqlConnection) {
    tokio::spawn(async move {
        if let Err(e) = connection.close().await {
            tracing::debug!(error = %e, "error closing pooled connection");
        }
    });
}

impl MySqlPool {
    /// Creates a pool from a `mysql://` URL with default pool
    /// options. No connection is opened until first use.
    pub fn connect_lazy(url: &str) -> Result<Self> {
        Ok(Self::new(url.parse()?, PoolOptions::new()))
    }

    /// Creates a pool with explicit connection and pool options.
    #[must_use]
    pub fn new(connect_options: ConnectOptions, options: PoolOptions) -> Self {
        let permits = options.max_connections;

        Self {
            inner: Arc::new(PoolInner {
                connect_options,
                options,
                semaphore: Arc::new(Semaphore::new(permits)),
                idle: Mutex::new(Vec::new()),
                create_lock: AsyncMutex::new(()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Checks a connection out of the pool, waiting for a slot when
    /// every connection is in use.
    pub async fn acquire(&self) -> Result<PoolConnection> {
        self.acquire_with(&self.inner.connect_options).await
    }

    /// Checks out a connection opened with specific settings. Idle
    /// connections are reused only when their settings match.
    pub async fn acquire_with(&self, settings: &ConnectOptions) -> Result<PoolConnection> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(Error::ClosedConnection);
        }

        let permit = Arc::clone(&self.inner.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| Error::ClosedConnection)?;

        // prefer a matching, unexpired idle connection
        loop {
            let candidate = {
                let mut idle = self.inner.idle.lock().expect("pool idle lock");

                match idle.iter().position(|idle| idle.settings == *settings) {
                    Some(index) => Some(idle.remove(index)),
                    None => None,
                }
            };

            let Some(candidate) = candidate else { break };

            if candidate.is_expired(&self.inner.options) || !candidate.connection.is_open() {
                tracing::debug!("evicting expired idle connection");
                dispose(candidate.connection);
                continue;
            }

            return Ok(PoolConnection {
                connection: Some(candidate.connection),
                settings: candidate.settings,
                created_at: candidate.created_at,
                busy_time: candidate.busy_time,
                acquired_at: Instant::now(),
                reusable: true,
                pool: Arc::clone(&self.inner),
                _permit: permit,
            });
        }

        // no idle match: evict over the cap, then connect fresh
        let _create = self.inner.create_lock.lock().await;

        loop {
            let over_cap = {
                let mut idle = self.inner.idle.lock().expect("pool idle lock");

                if idle.len() >= self.inner.options.max_connections {
                    let index = idle
                        .iter()
                        .enumerate()
                        .min_by_key(|(_, idle)| idle.last_returned_at)
                        .map(|(index, _)| index)
                        .expect("idle list is non-empty");

                    Some(idle.remove(index))
                } else {
                    None
                }
            };

            match over_cap {
                Some(evicted) => dispose(evicted.connection),
                None => break,
            }
        }

        let connection = MySqlConnection::connect_with(settings).await?;

        Ok(PoolConnection {
            connection: Some(connection),
            settings: settings.clone(),
            created_at: Instant::now(),
            busy_time: Duration::ZERO,
            acquired_at: Instant::now(),
            reusable: true,
            pool: Arc::clone(&self.inner),
            _permit: permit,
        })
    }

    /// Executes a query on a pooled connection.
    pub async fn execute(&self, query: &str) -> Result<MySqlResultSet> {
        self.execute_with(query, &[]).await
    }

    /// Executes a query with `:name` parameters on a pooled
    /// connection, retrying once on a fresh connection when the
    /// pooled one was closed or broken.
    pub async fn execute_with(
        &self,
        query: &str,
        params: &[(&str, Value)],
    ) -> Result<MySqlResultSet> {
        let mut attempts = 0;

        loop {
            let mut conn = self.acquire().await?;

            match conn.execute_with(query, params).await {
                Ok(result) => return Ok(result),

                Err(e) => {
                    if e.is_client_error() {
                        conn.mark_not_reusable();
                    }

                    attempts += 1;

                    if e.is_retryable() && attempts == 1 {
                        tracing::debug!(error = %e, "retrying on a fresh connection");
                        continue;
                    }

                    return Err(e);
                }
            }
        }
    }

    /// Runs `body` inside a transaction on a pooled connection,
    /// retrying once on a fresh connection when the pooled one was
    /// closed or broken before any work happened.
    pub async fn transactional<T, F>(&self, body: F) -> Result<T>
    where
        F: for<'t> Fn(&'t mut Transaction) -> BoxFuture<'t, Result<T>>,
    {
        let mut attempts = 0;

        loop {
            let mut conn = self.acquire().await?;

            match conn.transactional(&body).await {
                Ok(value) => return Ok(value),

                Err(e) => {
                    if e.is_client_error() {
                        conn.mark_not_reusable();
                    }

                    attempts += 1;

                    if e.is_retryable() && attempts == 1 {
                        tracing::debug!(error = %e, "retrying transaction on a fresh connection");
                        continue;
                    }

                    return Err(e);
                }
            }
        }
    }

    /// Gives `body` exclusive use of one pooled connection.
    pub async fn with_connection<T, F>(&self, body: F) -> Result<T>
    where
        F: for<'c> FnOnce(&'c MySqlConnection) -> BoxFuture<'c, Result<T>>,
    {
        let mut conn = self.acquire().await?;

        let result = body(&conn).await;

        if let Err(e) = &result {
            if e.is_client_error() {
                conn.mark_not_reusable();
            }
        }

        result
    }

    /// Number of idle connections currently parked in the pool.
    #[must_use]
    pub fn num_idle(&self) -> usize {
        self.inner.idle.lock().expect("pool idle lock").len()
    }

    /// `true` once [`close`][Self::close] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Closes the pool: pending and future acquires fail with
    /// [`Error::ClosedConnection`] and idle connections are closed
    /// gracefully. Connections currently checked out are disposed of
    /// when returned.
    pub async fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.semaphore.close();

        let idle = {
            let mut idle = self.inner.idle.lock().expect("pool idle lock");
            std::mem::take(&mut *idle)
        };

        for entry in idle {
            if let Err(e) = entry.connection.close().await {
                tracing::debug!(error = %e, "error closing pooled connection");
            }
        }
    }
}

impl std::fmt::Debug for MySqlPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlPool")
            .field("max_connections", &self.inner.options.max_connections)
            .field("num_idle", &self.num_idle())
            .field("closed", &self.is_closed())
            .finish()
    }
}
