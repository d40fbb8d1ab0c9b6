//! Async connection pool shared by the ledger and result store adapters.
//!
//! A reconciliation unit keeps one connection checked out for its whole
//! transaction, so a pool smaller than the reconciler fan-out leaves units
//! queued on checkout until the timeout reports them as poll failures.
//! [`PoolConfig::covers_fan_out`] is the guard the job applies before
//! connecting.

use std::time::Duration;

use diesel_async::AsyncPgConnection;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::pooled_connection::bb8::{Pool, PooledConnection, RunError};

const DEFAULT_MAX_SIZE: u32 = 10;
const DEFAULT_CHECKOUT_TIMEOUT: Duration = Duration::from_secs(30);

/// Failures to obtain a PostgreSQL connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// Every pooled connection stayed busy for the whole checkout timeout.
    #[error("all {max_size} database connections busy for {}ms", .timeout.as_millis())]
    Exhausted { max_size: u32, timeout: Duration },
    /// PostgreSQL refused the connection or the URL was unusable.
    #[error("database connection failed: {message}")]
    Connect { message: String },
}

impl PoolError {
    pub fn connect(message: impl Into<String>) -> Self {
        Self::Connect {
            message: message.into(),
        }
    }
}

/// Sizing for the shared pool.
///
/// # Example
///
/// ```
/// use poll_ledger::outbound::persistence::PoolConfig;
///
/// let config = PoolConfig::new("postgres://ledger@localhost/votes").with_max_size(8);
/// assert!(config.covers_fan_out(8));
/// assert!(!config.covers_fan_out(9));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    database_url: String,
    max_size: u32,
    checkout_timeout: Duration,
}

impl PoolConfig {
    /// Ten connections with a thirty second checkout timeout.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_size: DEFAULT_MAX_SIZE,
            checkout_timeout: DEFAULT_CHECKOUT_TIMEOUT,
        }
    }

    pub fn with_max_size(mut self, max_size: u32) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn max_size(&self) -> u32 {
        self.max_size
    }

    pub fn checkout_timeout(&self) -> Duration {
        self.checkout_timeout
    }

    /// True when every concurrent reconciliation unit can hold a connection
    /// at once.
    pub fn covers_fan_out(&self, max_concurrent_polls: usize) -> bool {
        usize::try_from(self.max_size)
            .is_ok_and(|size| size >= max_concurrent_polls)
    }
}

/// Async PostgreSQL pool via Diesel and `bb8`.
///
/// Cloning is cheap; every adapter holds its own handle to the same pool.
#[derive(Clone)]
pub struct DbPool {
    inner: Pool<AsyncPgConnection>,
    max_size: u32,
    checkout_timeout: Duration,
}

impl DbPool {
    /// Build the pool, keeping one idle connection warm between passes.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Connect`] when the URL is invalid or the first
    /// connection is refused.
    pub async fn new(config: PoolConfig) -> Result<Self, PoolError> {
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(&config.database_url);
        let inner = Pool::builder()
            .max_size(config.max_size)
            .min_idle(Some(1))
            .connection_timeout(config.checkout_timeout)
            .build(manager)
            .await
            .map_err(|err| PoolError::connect(err.to_string()))?;

        Ok(Self {
            inner,
            max_size: config.max_size,
            checkout_timeout: config.checkout_timeout,
        })
    }

    /// Check out a connection for one unit of work.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Exhausted`] when no connection frees up within
    /// the checkout timeout.
    pub async fn get(&self) -> Result<PooledConnection<'_, AsyncPgConnection>, PoolError> {
        self.inner.get().await.map_err(|err| match err {
            RunError::TimedOut => PoolError::Exhausted {
                max_size: self.max_size,
                timeout: self.checkout_timeout,
            },
            RunError::User(source) => PoolError::connect(source.to_string()),
        })
    }
}
