//! Per-thread checkouts.
//!
//! A connection never carries a transaction from one checkout to the next:
//! work left uncommitted when the last handle is dropped is rolled back.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use sqlorm_core::{Error, Result};
use sqlorm_session::Datasource;

use crate::Pool;

thread_local! {
    /// Live checkout of each pool on this thread, by pool id.
    static CHECKOUTS: RefCell<HashMap<u64, Weak<Checkout>>> = RefCell::new(HashMap::new());
}

struct Checkout {
    pool: Pool,
    ds: RefCell<Option<Datasource>>,
}

impl Drop for Checkout {
    fn drop(&mut self) {
        let id = self.pool.id();
        let _ = CHECKOUTS.try_with(|checkouts| {
            let mut checkouts = checkouts.borrow_mut();
            if checkouts.get(&id).is_some_and(|weak| weak.strong_count() == 0) {
                checkouts.remove(&id);
            }
        });

        let Some(mut ds) = self.ds.get_mut().take() else {
            return;
        };
        let pending = ds.pending_writes();
        if pending > 0 {
            tracing::warn!(pool = id, pending, "Discarding uncommitted changes of pooled datasource");
        }
        if std::thread::panicking() || ds.in_transaction() || pending > 0 {
            rollback_quietly(&mut ds);
        }
        tracing::info!(pool = id, "Returning connection to pool");
        self.pool.restore(ds);
    }
}

/// A datasource checked out of a [`Pool`] for the current thread.
///
/// Clones and further checkouts on the same thread share one connection.
/// It goes back to the pool once the last of them is dropped.
#[derive(Clone)]
pub struct PooledDatasource {
    checkout: Rc<Checkout>,
}

impl PooledDatasource {
    pub(crate) fn checkout(pool: &Pool) -> Result<Self> {
        let id = pool.id();
        let existing = CHECKOUTS.with(|checkouts| checkouts.borrow().get(&id).and_then(Weak::upgrade));
        if let Some(checkout) = existing {
            tracing::debug!(pool = id, "Sharing this thread's checkout");
            return Ok(Self { checkout });
        }

        let ds = pool.new_datasource()?;
        let checkout = Rc::new(Checkout {
            pool: pool.clone(),
            ds: RefCell::new(Some(ds)),
        });
        CHECKOUTS.with(|checkouts| {
            checkouts.borrow_mut().insert(id, Rc::downgrade(&checkout));
        });
        tracing::info!(pool = id, "Checked out connection");
        Ok(Self { checkout })
    }

    /// Run `f` with the datasource. When `f` fails the transaction is
    /// rolled back.
    ///
    /// Calls may not nest: the datasource is borrowed for the duration of
    /// `f`.
    pub fn with<T>(&self, f: impl FnOnce(&mut Datasource) -> Result<T>) -> Result<T> {
        let mut slot = self
            .checkout
            .ds
            .try_borrow_mut()
            .map_err(|_| Error::Pool("the pooled datasource is already in use".to_string()))?;
        let ds = slot.as_mut().ok_or(Error::DatasourceClosed)?;
        let result = f(ds);
        if result.is_err() {
            rollback_quietly(ds);
        }
        result
    }

    /// Live handles sharing this checkout.
    pub fn checkouts(&self) -> usize {
        Rc::strong_count(&self.checkout)
    }

    pub fn pool(&self) -> &Pool {
        &self.checkout.pool
    }
}

impl fmt::Debug for PooledDatasource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledDatasource")
            .field("pool", &self.checkout.pool)
            .field("checkouts", &self.checkouts())
            .finish_non_exhaustive()
    }
}

fn rollback_quietly(ds: &mut Datasource) {
    if let Err(err) = ds.rollback() {
        tracing::warn!(error = %err, "Rollback of pooled datasource failed");
    }
}
