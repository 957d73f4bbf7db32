use std::{
    collections::VecDeque,
    ops::{Deref, DerefMut},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use reckon_core::StoreAddress;
use tokio::time::Instant;
use tracing::debug;

use crate::{Connector, StoreConnection as _, StoreError};

const DEFAULT_MAX_IDLE: usize = 3;
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(240);

/// Connection pool configuration.
#[derive(Clone, Copy, Debug)]
pub struct PoolConfig {
    max_idle: usize,
    idle_timeout: Duration,
}

impl PoolConfig {
    /// Sets the maximum number of idle connections retained by the pool.
    ///
    /// Defaults to 3.
    pub fn with_max_idle(mut self, max_idle: usize) -> Self {
        self.max_idle = max_idle;
        self
    }

    /// Sets how long a connection may sit idle before it is closed instead of reused.
    ///
    /// Defaults to 240 seconds.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Returns the maximum number of idle connections retained by the pool.
    pub fn max_idle(&self) -> usize {
        self.max_idle
    }

    /// Returns the idle timeout.
    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle: DEFAULT_MAX_IDLE,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

/// A pool of connections to a single store instance.
///
/// Connections are handed out as [`PooledConnection`] guards, which return the connection to the pool when dropped.
/// Idle connections are checked with a `PING` before being handed out again, and any that fail the check are closed.
///
/// The pool is cheaply cloneable, and can be shared across tasks. Each borrowed connection is exclusive to its holder.
pub struct ConnectionPool<C: Connector> {
    shared: Arc<Shared<C>>,
}

impl<C: Connector> ConnectionPool<C> {
    /// Creates a new `ConnectionPool` with the default configuration.
    pub fn new(connector: C) -> Self {
        Self::with_config(connector, PoolConfig::default())
    }

    /// Creates a new `ConnectionPool` with the given configuration.
    pub fn with_config(connector: C, config: PoolConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                connector,
                config,
                idle: Mutex::new(VecDeque::new()),
            }),
        }
    }

    /// Returns the address of the store this pool connects to.
    pub fn address(&self) -> &StoreAddress {
        self.shared.connector.address()
    }

    /// Returns the number of idle connections currently held by the pool.
    pub fn idle_connections(&self) -> usize {
        self.shared.lock_idle().len()
    }

    /// Borrows a connection from the pool.
    ///
    /// The most recently returned idle connection that passes a liveness check is reused. Otherwise, a new connection is
    /// opened.
    ///
    /// # Errors
    ///
    /// If no idle connection is usable and a new connection cannot be opened, an error is returned.
    pub async fn acquire(&self) -> Result<PooledConnection<C>, StoreError> {
        while let Some(mut connection) = self.shared.pop_idle() {
            match connection.ping().await {
                Ok(()) => return Ok(self.guard(connection)),
                Err(e) => debug!(
                    address = %self.address(),
                    error = %e,
                    "Discarding idle connection that failed liveness check."
                ),
            }
        }

        let connection = self.shared.connector.connect().await?;
        debug!(address = %self.address(), "Opened new store connection.");

        Ok(self.guard(connection))
    }

    fn guard(&self, connection: C::Connection) -> PooledConnection<C> {
        PooledConnection {
            connection: Some(connection),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: Connector> Clone for ConnectionPool<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

struct IdleConnection<T> {
    connection: T,
    idle_since: Instant,
}

struct Shared<C: Connector> {
    connector: C,
    config: PoolConfig,
    idle: Mutex<VecDeque<IdleConnection<C::Connection>>>,
}

impl<C: Connector> Shared<C> {
    fn lock_idle(&self) -> MutexGuard<'_, VecDeque<IdleConnection<C::Connection>>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pop_idle(&self) -> Option<C::Connection> {
        let now = Instant::now();
        let idle_timeout = self.config.idle_timeout;

        let mut idle = self.lock_idle();
        idle.retain(|entry| now.duration_since(entry.idle_since) < idle_timeout);
        idle.pop_front().map(|entry| entry.connection)
    }

    fn reclaim(&self, connection: C::Connection) {
        // Newest at the front, so truncating drops the connections that have been idle the longest.
        let mut idle = self.lock_idle();
        idle.push_front(IdleConnection {
            connection,
            idle_since: Instant::now(),
        });
        idle.truncate(self.config.max_idle);
    }
}

/// A connection borrowed from a [`ConnectionPool`].
///
/// Returned to the pool when dropped, unless [`discard`][Self::discard] is called.
pub struct PooledConnection<C: Connector> {
    connection: Option<C::Connection>,
    shared: Arc<Shared<C>>,
}

impl<C: Connector> PooledConnection<C> {
    /// Closes the connection instead of returning it to the pool.
    ///
    /// Used when the connection may be left in an unknown protocol state, such as after a failed command.
    pub fn discard(mut self) {
        self.connection = None;
    }
}

impl<C: Connector> Deref for PooledConnection<C> {
    type Target = C::Connection;

    fn deref(&self) -> &Self::Target {
        self.connection.as_ref().expect("connection is only taken on drop")
    }
}

impl<C: Connector> DerefMut for PooledConnection<C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.connection.as_mut().expect("connection is only taken on drop")
    }
}

impl<C: Connector> Drop for PooledConnection<C> {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            self.shared.reclaim(connection);
        }
    }
}
