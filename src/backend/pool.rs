//! Bounded blocking connection pool shared by every backend.
//!
//! Connections are opened lazily up to `max_size`. Callers block on a
//! condition variable when the pool is exhausted. A [`PooledConnection`]
//! returns its connection on drop, including during unwinding.

use std::mem;
use std::ops::{Deref, DerefMut};

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::error::{BenchError, Result};

type Factory<C> = Box<dyn Fn() -> Result<C> + Send + Sync>;

struct PoolState<C> {
    idle: Vec<C>,
    open: usize,
    closed: bool,
}

/// Snapshot of pool occupancy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolStatus {
    /// Connections currently open (idle + checked out).
    pub open: usize,
    /// Connections waiting in the pool.
    pub idle: usize,
    /// Upper bound on open connections.
    pub max_size: usize,
    /// Whether [`Pool::close`] has been called.
    pub closed: bool,
}

/// Fixed-capacity pool of backend connections.
pub struct Pool<C> {
    label: &'static str,
    max_size: usize,
    state: Mutex<PoolState<C>>,
    available: Condvar,
    factory: Factory<C>,
}

impl<C> Pool<C> {
    /// Creates an empty pool; `max_size` is clamped to at least one.
    pub fn new<F>(label: &'static str, max_size: usize, factory: F) -> Self
    where
        F: Fn() -> Result<C> + Send + Sync + 'static,
    {
        Self {
            label,
            max_size: max_size.max(1),
            state: Mutex::new(PoolState {
                idle: Vec::new(),
                open: 0,
                closed: false,
            }),
            available: Condvar::new(),
            factory: Box::new(factory),
        }
    }

    /// Checks out a connection, opening one if below capacity and blocking
    /// otherwise.
    pub fn acquire(&self) -> Result<PooledConnection<'_, C>> {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return Err(BenchError::Connection(format!(
                    "{} pool is closed",
                    self.label
                )));
            }
            if let Some(conn) = state.idle.pop() {
                return Ok(PooledConnection::new(self, conn));
            }
            if state.open < self.max_size {
                state.open += 1;
                let open = state.open;
                drop(state);
                debug!(pool = self.label, open, "pool.open_connection");
                return match (self.factory)() {
                    Ok(conn) => Ok(PooledConnection::new(self, conn)),
                    Err(err) => {
                        self.state.lock().open -= 1;
                        self.available.notify_one();
                        Err(err)
                    }
                };
            }
            self.available.wait(&mut state);
        }
    }

    /// Drops idle connections and rejects further checkouts. Connections
    /// still checked out are closed when returned. Idempotent.
    pub fn close(&self) {
        let idle = {
            let mut state = self.state.lock();
            state.closed = true;
            let idle = mem::take(&mut state.idle);
            state.open -= idle.len();
            idle
        };
        if !idle.is_empty() {
            debug!(pool = self.label, closed = idle.len(), "pool.close");
        }
        drop(idle);
        self.available.notify_all();
    }

    /// Current occupancy.
    pub fn status(&self) -> PoolStatus {
        let state = self.state.lock();
        PoolStatus {
            open: state.open,
            idle: state.idle.len(),
            max_size: self.max_size,
            closed: state.closed,
        }
    }

    fn release(&self, conn: C) {
        let mut state = self.state.lock();
        if state.closed {
            state.open -= 1;
            drop(state);
            drop(conn);
        } else {
            state.idle.push(conn);
            drop(state);
        }
        self.available.notify_one();
    }
}

/// Connection checked out of a [`Pool`]; returned on drop.
pub struct PooledConnection<'a, C> {
    pool: &'a Pool<C>,
    conn: Option<C>,
}

impl<'a, C> PooledConnection<'a, C> {
    fn new(pool: &'a Pool<C>, conn: C) -> Self {
        Self {
            pool,
            conn: Some(conn),
        }
    }
}

impl<C> Deref for PooledConnection<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.conn.as_ref().expect("pooled connection already released")
    }
}

impl<C> DerefMut for PooledConnection<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        self.conn.as_mut().expect("pooled connection already released")
    }
}

impl<C> Drop for PooledConnection<'_, C> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}
