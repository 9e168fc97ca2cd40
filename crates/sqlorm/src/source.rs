//! Opening datasources from connection strings.
//!
//! # Example
//!
//! ```rust,ignore
//! use sqlorm::prelude::*;
//!
//! // A single connection
//! let mut source = sqlorm::connect("adapter=mysql db=shop user=ann", connector.clone())?;
//!
//! // A pool of two to eight connections, one per thread
//! let source = sqlorm::connect("adapter=pgsql db=shop pool=2,8", connector)?;
//! source.with_datasource(|ds| ds.commit())?;
//! ```

use std::sync::Arc;

use sqlorm_core::{Connector, Result};
use sqlorm_pool::Pool;
use sqlorm_session::{AdapterKind, ConnectionString, Datasource};

/// What a connection string opens: one datasource, or a pool handing out
/// one datasource per thread.
#[derive(Debug)]
pub enum Source {
    Single(Datasource),
    Pooled(Pool),
}

impl Source {
    pub fn adapter(&self) -> AdapterKind {
        match self {
            Source::Single(ds) => ds.adapter(),
            Source::Pooled(pool) => pool.adapter(),
        }
    }

    pub fn is_pooled(&self) -> bool {
        matches!(self, Source::Pooled(_))
    }

    /// Run `f` with a datasource: the single one, or the calling thread's
    /// checkout of the pool. Pooled work that fails is rolled back.
    pub fn with_datasource<T>(&mut self, f: impl FnOnce(&mut Datasource) -> Result<T>) -> Result<T> {
        match self {
            Source::Single(ds) => f(ds),
            Source::Pooled(pool) => pool.with_datasource(f),
        }
    }

    /// The single datasource, `None` for a pool.
    pub fn into_datasource(self) -> Option<Datasource> {
        match self {
            Source::Single(ds) => Some(ds),
            Source::Pooled(_) => None,
        }
    }

    /// The pool, `None` for a single datasource.
    pub fn into_pool(self) -> Option<Pool> {
        match self {
            Source::Single(_) => None,
            Source::Pooled(pool) => Some(pool),
        }
    }
}

/// Open what `connection_string` describes through `connector`.
///
/// A `pool=` keyword selects a pool; the adapter must support one.
#[tracing::instrument(level = "debug", skip_all)]
pub fn connect(connection_string: &str, connector: Arc<dyn Connector>) -> Result<Source> {
    let parsed = ConnectionString::parse(connection_string)?;
    if parsed.pool().is_some() {
        Ok(Source::Pooled(Pool::open(&parsed, connector)?))
    } else {
        Ok(Source::Single(Datasource::open(&parsed, connector)?))
    }
}
