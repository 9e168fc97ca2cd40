//! Connection pooling for SQLORM.
//!
//! A [`Pool`] keeps between `min` and `max` backend connections. Each thread
//! checks out one [`PooledDatasource`]; further checkouts on the same thread
//! share it and the connection goes back to the pool when the last of them
//! is dropped.
//!
//! # Example
//!
//! ```ignore
//! let cs: ConnectionString = "adapter=pgsql db=shop pool=2,8".parse()?;
//! let pool = Pool::open(&cs, connector)?;
//!
//! pool.with_datasource(|ds| {
//!     let order = ds.select_for_update(&order_class, &[Value::Int(17)])?;
//!     order.set("state", "shipped")?;
//!     ds.commit()
//! })?;
//! ```
//!
//! A checkout that ends in an error, a panic or with uncommitted work is
//! rolled back before its connection is reused.

mod checkout;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, LazyLock, Mutex, MutexGuard};

use regex::Regex;
use sqlorm_core::{ConnectParams, Connection, Connector, Error, Result, TextEncoding};
use sqlorm_session::{AdapterKind, ConnectionString, Datasource, DatasourceConfig};

pub use checkout::PooledDatasource;

/// Bounds used when the `pool=` value is not `min,max`.
pub const DEFAULT_MIN_CONNECTIONS: usize = 5;
pub const DEFAULT_MAX_CONNECTIONS: usize = 10;

static POOL_SPEC_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)\s*,\s*(\d+)\s*$").ok());

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

// ============================================================================
// Configuration
// ============================================================================

/// Connection bounds of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Connections opened up front
    pub min: usize,
    /// Connections open at most; further checkouts wait
    pub max: usize,
}

impl PoolConfig {
    /// `max` is at least 1 and `min` never exceeds it.
    pub fn new(min: usize, max: usize) -> Self {
        let max = max.max(1);
        Self {
            min: min.min(max),
            max,
        }
    }

    /// Parse a `pool=min,max` connection string value.
    pub fn from_spec(spec: &str) -> Self {
        let parsed = POOL_SPEC_RE
            .as_ref()
            .and_then(|re| re.captures(spec))
            .and_then(|caps| Some((caps[1].parse().ok()?, caps[2].parse().ok()?)));
        match parsed {
            Some((min, max)) => Self::new(min, max),
            None => {
                tracing::debug!(spec, "Pool bounds not understood, using defaults");
                Self::default()
            }
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_CONNECTIONS, DEFAULT_MAX_CONNECTIONS)
    }
}

/// Point-in-time connection counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub open: usize,
    pub idle: usize,
    pub min: usize,
    pub max: usize,
}

impl PoolStats {
    /// Connections currently checked out.
    pub fn in_use(&self) -> usize {
        self.open - self.idle
    }
}

// ============================================================================
// Pool
// ============================================================================

struct PoolState {
    idle: Vec<Box<dyn Connection>>,
    open: usize,
    closed: bool,
}

struct PoolInner {
    id: u64,
    adapter: AdapterKind,
    connector: Arc<dyn Connector>,
    driver_params: ConnectParams,
    config: PoolConfig,
    ds_config: DatasourceConfig,
    state: Mutex<PoolState>,
    available: Condvar,
    encoding: Mutex<Option<TextEncoding>>,
}

/// A bounded set of connections to one database.
///
/// Cloning is cheap; clones share the connections.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

impl Pool {
    /// Create a pool and open its first `config.min` connections.
    #[tracing::instrument(level = "debug", skip(connector, params, ds_config))]
    pub fn new(
        adapter: AdapterKind,
        connector: Arc<dyn Connector>,
        params: ConnectParams,
        config: PoolConfig,
        ds_config: DatasourceConfig,
    ) -> Result<Self> {
        if !adapter.supports_pool() {
            return Err(Error::NoPoolForAdapter(adapter.to_string()));
        }
        let driver_params = adapter.driver_params(params)?;

        let mut idle = Vec::with_capacity(config.max);
        for _ in 0..config.min {
            idle.push(connector.connect(&driver_params)?);
        }
        tracing::info!(
            adapter = %adapter,
            min = config.min,
            max = config.max,
            "Created connection pool"
        );

        Ok(Self {
            inner: Arc::new(PoolInner {
                id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
                adapter,
                connector,
                driver_params,
                config,
                ds_config,
                state: Mutex::new(PoolState {
                    open: idle.len(),
                    idle,
                    closed: false,
                }),
                available: Condvar::new(),
                encoding: Mutex::new(None),
            }),
        })
    }

    /// Create a pool as described by a connection string with a `pool=`
    /// keyword.
    pub fn open(connection_string: &ConnectionString, connector: Arc<dyn Connector>) -> Result<Self> {
        let config = PoolConfig::from_spec(connection_string.pool().unwrap_or_default());
        Self::new(
            connection_string.adapter(),
            connector,
            connection_string.params().clone(),
            config,
            connection_string.config(),
        )
    }

    pub fn adapter(&self) -> AdapterKind {
        self.inner.adapter
    }

    pub fn config(&self) -> PoolConfig {
        self.inner.config
    }

    pub fn stats(&self) -> Result<PoolStats> {
        let state = self.inner.lock_state()?;
        Ok(PoolStats {
            open: state.open,
            idle: state.idle.len(),
            min: self.inner.config.min,
            max: self.inner.config.max,
        })
    }

    /// The calling thread's datasource, checked out if it has none yet.
    ///
    /// Blocks while all `max` connections are in use by other threads.
    pub fn datasource(&self) -> Result<PooledDatasource> {
        PooledDatasource::checkout(self)
    }

    /// Run `f` with the calling thread's datasource.
    ///
    /// When `f` fails the transaction is rolled back.
    pub fn with_datasource<T>(&self, f: impl FnOnce(&mut Datasource) -> Result<T>) -> Result<T> {
        self.datasource()?.with(f)
    }

    /// Close every idle connection. Checked out connections are closed when
    /// they come back; later checkouts fail.
    pub fn close(&self) -> Result<()> {
        let idle: Vec<Box<dyn Connection>> = {
            let mut state = self.inner.lock_state()?;
            state.closed = true;
            let idle = std::mem::take(&mut state.idle);
            state.open -= idle.len();
            idle
        };
        self.inner.available.notify_all();
        tracing::info!(pool = self.inner.id, closing = idle.len(), "Closing pool");
        close_all(idle);
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock_state().is_ok_and(|state| state.closed)
    }

    pub(crate) fn id(&self) -> u64 {
        self.inner.id
    }

    /// A datasource around a connection taken from the pool.
    pub(crate) fn new_datasource(&self) -> Result<Datasource> {
        let conn = self.inner.acquire()?;
        let inner = &self.inner;
        let ds = Datasource::from_connection(inner.adapter, conn, inner.ds_config.clone())
            .with_connector(Arc::clone(&inner.connector), inner.driver_params.clone());
        Ok(match inner.shared_encoding() {
            Some(encoding) => ds.with_backend_encoding(encoding),
            None => ds,
        })
    }

    /// Take back the connection of a finished datasource.
    pub(crate) fn restore(&self, ds: Datasource) {
        if let Some(encoding) = ds.resolved_encoding() {
            self.inner.share_encoding(encoding);
        }
        match ds.into_connection() {
            Some(conn) => self.inner.release(conn),
            None => self.inner.forget(),
        }
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("id", &self.inner.id)
            .field("adapter", &self.inner.adapter)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl PoolInner {
    fn lock_state(&self) -> Result<MutexGuard<'_, PoolState>> {
        self.state
            .lock()
            .map_err(|_| Error::Pool("pool state lock poisoned".to_string()))
    }

    fn acquire(&self) -> Result<Box<dyn Connection>> {
        let mut state = self.lock_state()?;
        loop {
            if state.closed {
                return Err(Error::Pool("the pool is closed".to_string()));
            }
            if let Some(conn) = state.idle.pop() {
                tracing::debug!(pool = self.id, "Reusing idle connection");
                return Ok(conn);
            }
            if state.open < self.config.max {
                state.open += 1;
                drop(state);
                return self.connect_new();
            }
            tracing::debug!(pool = self.id, max = self.config.max, "Pool exhausted, waiting");
            state = self
                .available
                .wait(state)
                .map_err(|_| Error::Pool("pool state lock poisoned".to_string()))?;
        }
    }

    fn connect_new(&self) -> Result<Box<dyn Connection>> {
        match self.connector.connect(&self.driver_params) {
            Ok(conn) => {
                tracing::info!(pool = self.id, "Opened pooled connection");
                Ok(conn)
            }
            Err(err) => {
                self.forget();
                Err(err)
            }
        }
    }

    fn release(&self, conn: Box<dyn Connection>) {
        match self.state.lock() {
            Ok(mut state) if state.closed => {
                state.open = state.open.saturating_sub(1);
                drop(state);
                tracing::debug!(pool = self.id, "Pool closed, closing returned connection");
                close_all(vec![conn]);
            }
            Ok(mut state) => {
                state.idle.push(conn);
                self.available.notify_one();
            }
            Err(_) => {
                tracing::warn!(pool = self.id, "Pool state poisoned, closing returned connection");
                close_all(vec![conn]);
            }
        }
    }

    /// Account for a connection that will not come back.
    fn forget(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.open = state.open.saturating_sub(1);
            self.available.notify_one();
        }
    }

    fn shared_encoding(&self) -> Option<TextEncoding> {
        self.encoding.lock().ok().and_then(|e| e.clone())
    }

    fn share_encoding(&self, encoding: &TextEncoding) {
        if let Ok(mut shared) = self.encoding.lock() {
            if shared.is_none() {
                *shared = Some(encoding.clone());
            }
        }
    }
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        if let Ok(state) = self.state.get_mut() {
            close_all(state.idle.drain(..).collect());
        }
    }
}

fn close_all(connections: Vec<Box<dyn Connection>>) {
    for mut conn in connections {
        if let Err(err) = conn.close() {
            tracing::warn!(error = %err, "Closing pooled connection failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_spec() {
        assert_eq!(PoolConfig::from_spec("2,8"), PoolConfig { min: 2, max: 8 });
        assert_eq!(PoolConfig::from_spec(" 1 , 3 "), PoolConfig { min: 1, max: 3 });
    }

    #[test]
    fn test_pool_spec_defaults() {
        for spec in ["", "yes", "2", "2,8,9", "-1,4"] {
            assert_eq!(PoolConfig::from_spec(spec), PoolConfig { min: 5, max: 10 }, "{spec}");
        }
    }

    #[test]
    fn test_bounds_are_normalized() {
        assert_eq!(PoolConfig::new(4, 2), PoolConfig { min: 2, max: 2 });
        assert_eq!(PoolConfig::new(0, 0), PoolConfig { min: 0, max: 1 });
    }

    #[test]
    fn test_stats_in_use() {
        let stats = PoolStats {
            open: 4,
            idle: 1,
            min: 2,
            max: 8,
        };
        assert_eq!(stats.in_use(), 3);
    }
}
