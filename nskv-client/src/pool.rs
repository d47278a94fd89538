//! # Connection Pool
//!
//! Purpose: Reuse store connections across calls to avoid a handshake per
//! command, while bounding how many sockets one process opens.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: Keep a bounded LIFO list of reusable connections.
//! 2. **Minimal Locking**: Hold the mutex only while moving connections in and
//!    out of the idle list; dialing and probing happen unlocked.
//! 3. **Admission Control**: `max_active` is the single limit; waiters either
//!    block on a condvar or fail fast, per configuration.
//! 4. **RAII Release**: `PooledConnection` returns itself on drop, on every path.

use std::collections::VecDeque;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::context::Context;
use crate::error::{Error, Result};

/// Longest uninterrupted condvar wait, so cancellation is noticed promptly.
const WAIT_SLICE: Duration = Duration::from_millis(50);

/// Dials, checks and vets connections for a [`Pool`].
pub trait ManageConnection: Send + Sync + 'static {
    type Connection: Send + 'static;

    /// Opens a new connection.
    fn connect(&self) -> Result<Self::Connection>;

    /// Liveness check run on connections that sat idle for a while. Must not
    /// block past `deadline` when one is given.
    fn is_valid(&self, conn: &mut Self::Connection, deadline: Option<Instant>) -> Result<()>;

    /// Cheap check run on release; broken connections are closed.
    fn has_broken(&self, conn: &mut Self::Connection) -> bool;
}

/// Limits and policies of a pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of idle connections to keep.
    pub max_idle: usize,
    /// Maximum open connections (idle + leased). Zero means unbounded.
    pub max_active: usize,
    /// Close idle connections older than this. Zero disables eviction.
    pub idle_timeout: Duration,
    /// Check idle connections older than this before handing them out.
    pub stale_check_after: Duration,
    /// Block when exhausted instead of returning `PoolExhausted`.
    pub wait: bool,
}

/// Point-in-time pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Open connections, idle and leased.
    pub active: usize,
    /// Connections sitting in the idle list.
    pub idle: usize,
}

struct IdleConn<C> {
    conn: C,
    since: Instant,
}

struct PoolState<C> {
    // Most recently returned first.
    idle: VecDeque<IdleConn<C>>,
    active: usize,
    closed: bool,
}

struct PoolInner<M: ManageConnection> {
    manager: M,
    config: PoolConfig,
    state: Mutex<PoolState<M::Connection>>,
    available: Condvar,
}

enum Checkout<C> {
    Idle(IdleConn<C>),
    Dial,
    Retry,
}

/// Connection pool handle. Clones share the same pool.
pub struct Pool<M: ManageConnection> {
    inner: Arc<PoolInner<M>>,
}

impl<M: ManageConnection> Clone for Pool<M> {
    fn clone(&self) -> Self {
        Pool {
            inner: self.inner.clone(),
        }
    }
}

impl<M: ManageConnection> fmt::Debug for Pool<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("config", &self.inner.config)
            .field("stats", &self.stats())
            .finish()
    }
}

impl<M: ManageConnection> Pool<M> {
    /// Creates an empty pool; connections are dialed on first demand.
    pub fn new(manager: M, config: PoolConfig) -> Self {
        let state = PoolState {
            idle: VecDeque::with_capacity(config.max_idle.min(64)),
            active: 0,
            closed: false,
        };
        Pool {
            inner: Arc::new(PoolInner {
                manager,
                config,
                state: Mutex::new(state),
                available: Condvar::new(),
            }),
        }
    }

    pub fn manager(&self) -> &M {
        &self.inner.manager
    }

    /// Leases a connection, honouring the context while waiting.
    pub fn get(&self, ctx: &Context) -> Result<PooledConnection<M>> {
        loop {
            ctx.check()?;

            match self.checkout(ctx)? {
                Checkout::Idle(idle) => {
                    let mut conn = idle.conn;
                    if idle.since.elapsed() >= self.inner.config.stale_check_after {
                        if let Err(err) = self.inner.manager.is_valid(&mut conn, ctx.deadline()) {
                            warn!(error = %err, "discarding stale pooled connection");
                            drop(conn);
                            self.release_slot();
                            // A check cut short by the caller's deadline must not redial.
                            ctx.check()?;
                            continue;
                        }
                    }
                    return Ok(PooledConnection::new(self.clone(), conn));
                }
                Checkout::Dial => {
                    return match self.inner.manager.connect() {
                        Ok(conn) => Ok(PooledConnection::new(self.clone(), conn)),
                        Err(err) => {
                            self.release_slot();
                            Err(err)
                        }
                    };
                }
                Checkout::Retry => continue,
            }
        }
    }

    /// Current counters.
    pub fn stats(&self) -> PoolStats {
        let state = self.inner.state.lock();
        PoolStats {
            active: state.active,
            idle: state.idle.len(),
        }
    }

    /// Closes idle connections and refuses new leases. Leased connections are
    /// closed when they are released.
    pub fn close(&self) {
        let idle = {
            let mut state = self.inner.state.lock();
            state.closed = true;
            state.active = state.active.saturating_sub(state.idle.len());
            std::mem::take(&mut state.idle)
        };
        debug!(closed_idle = idle.len(), "pool closed");
        drop(idle);
        self.inner.available.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    fn checkout(&self, ctx: &Context) -> Result<Checkout<M::Connection>> {
        let config = &self.inner.config;
        let mut state = self.inner.state.lock();
        if state.closed {
            return Err(Error::PoolClosed);
        }

        self.evict_expired(&mut state);

        if let Some(idle) = state.idle.pop_front() {
            return Ok(Checkout::Idle(idle));
        }

        if config.max_active == 0 || state.active < config.max_active {
            state.active += 1;
            return Ok(Checkout::Dial);
        }

        if !config.wait {
            return Err(Error::PoolExhausted);
        }

        let slice = ctx.remaining().map_or(WAIT_SLICE, |left| left.min(WAIT_SLICE));
        self.inner.available.wait_for(&mut state, slice);
        Ok(Checkout::Retry)
    }

    fn evict_expired(&self, state: &mut PoolState<M::Connection>) {
        let timeout = self.inner.config.idle_timeout;
        if timeout.is_zero() {
            return;
        }
        while state
            .idle
            .back()
            .is_some_and(|idle| idle.since.elapsed() >= timeout)
        {
            state.idle.pop_back();
            state.active = state.active.saturating_sub(1);
        }
    }

    fn release_slot(&self) {
        {
            let mut state = self.inner.state.lock();
            state.active = state.active.saturating_sub(1);
        }
        self.inner.available.notify_one();
    }

    fn return_connection(&self, mut conn: M::Connection, broken: bool) {
        let broken = broken || self.inner.manager.has_broken(&mut conn);
        let discarded = {
            let mut state = self.inner.state.lock();
            if broken || state.closed || state.idle.len() >= self.inner.config.max_idle {
                state.active = state.active.saturating_sub(1);
                Some(conn)
            } else {
                state.idle.push_front(IdleConn {
                    conn,
                    since: Instant::now(),
                });
                None
            }
        };
        if broken {
            debug!("closing broken connection");
        }
        drop(discarded);
        self.inner.available.notify_one();
    }
}

/// RAII wrapper returning a connection to the pool on drop.
pub struct PooledConnection<M: ManageConnection> {
    pool: Pool<M>,
    conn: Option<M::Connection>,
    broken: bool,
}

impl<M: ManageConnection> PooledConnection<M> {
    fn new(pool: Pool<M>, conn: M::Connection) -> Self {
        PooledConnection {
            pool,
            conn: Some(conn),
            broken: false,
        }
    }

    /// Closes the connection on release instead of recycling it.
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }

    pub fn is_broken(&self) -> bool {
        self.broken
    }
}

impl<M: ManageConnection> Deref for PooledConnection<M> {
    type Target = M::Connection;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref().expect("connection exists")
    }
}

impl<M: ManageConnection> DerefMut for PooledConnection<M> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().expect("connection exists")
    }
}

impl<M: ManageConnection> Drop for PooledConnection<M> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.return_connection(conn, self.broken);
        }
    }
}
