//! # Manager
//!
//! Purpose: Hand out namespaced, pooled connections and run single commands
//! on them.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `Manager` hides pooling, prefixing and decoding.
//! 2. **Fail Fast at Construction**: A PING runs before `new` returns.
//! 3. **Cheap Views**: `with_context` clones share the pool and prefix.
//! 4. **One Lease per Call**: Every helper leases, runs, decodes and releases.

use std::fmt;
use std::sync::Arc;

use redis::{Cmd, Value};
use tracing::{info, warn};

use crate::args::Arg;
use crate::config::Options;
use crate::connection::RedisConnector;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::pool::{Pool, PoolStats, PooledConnection};
use crate::reply;

/// A connection leased from a manager's pool.
pub type Connection = PooledConnection<RedisConnector>;

/// Pooled client bound to one key namespace.
///
/// Cloning is cheap; clones share the pool.
#[derive(Clone)]
pub struct Manager {
    pool: Pool<RedisConnector>,
    prefix: Arc<str>,
    ctx: Context,
}

impl Manager {
    /// Builds the pool and checks liveness with a PING.
    ///
    /// Connections are dialed lazily; the PING dials the first one. Any
    /// failure (bad address, rejected auth, unreachable host) is returned as
    /// [`Error::Connect`] and is not retried.
    pub fn new(options: Options) -> Result<Self> {
        let connector = RedisConnector::new(&options)?;
        let manager = Manager {
            pool: Pool::new(connector, options.pool_config()),
            prefix: options.key_prefix().into(),
            ctx: Context::background(),
        };

        manager.ping().map_err(|err| match err {
            Error::Command(source) => Error::Connect {
                address: options.address.clone(),
                source,
            },
            other => other,
        })?;

        info!(
            network = %options.network,
            address = %options.address,
            db = options.db,
            prefix = %manager.prefix,
            max_active = options.max_active,
            "store manager ready"
        );
        Ok(manager)
    }

    /// Prefix prepended to every key, separator included.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns `prefix + key`.
    pub fn prefix_key(&self, key: &str) -> String {
        let mut full = String::with_capacity(self.prefix.len() + key.len());
        full.push_str(&self.prefix);
        full.push_str(key);
        full
    }

    /// A view of this manager whose operations honour `ctx`.
    pub fn with_context(&self, ctx: Context) -> Manager {
        Manager {
            pool: self.pool.clone(),
            prefix: self.prefix.clone(),
            ctx,
        }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Leases a connection; it returns to the pool when dropped.
    pub fn acquire(&self) -> Result<Connection> {
        self.pool.get(&self.ctx)
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Closes the pool for every clone of this manager.
    pub fn close(&self) {
        self.pool.close();
    }

    pub fn ping(&self) -> Result<()> {
        let value = self.query(&redis::cmd("PING"))?;
        match value {
            Value::SimpleString(ref text) if text == "PONG" => Ok(()),
            Value::BulkString(ref data) if data == b"PONG" => Ok(()),
            other => Err(Error::unexpected("PONG", &other)),
        }
    }

    /// Runs an arbitrary command. Arguments are sent as given, without
    /// prefixing.
    pub fn do_command(&self, name: &str, args: &[Arg]) -> Result<Value> {
        let mut cmd = redis::cmd(name);
        for arg in args {
            cmd.arg(arg);
        }
        self.query(&cmd)
    }

    /// Evaluates a Lua script with `EVAL`.
    ///
    /// The first `key_count` entries of `keys_and_args` are keys and get the
    /// namespace prefix; the rest are passed unchanged as `ARGV`.
    pub fn lua(&self, key_count: usize, script: &str, keys_and_args: &[&str]) -> Result<Value> {
        let mut cmd = redis::cmd("EVAL");
        cmd.arg(script).arg(key_count);
        for (idx, item) in keys_and_args.iter().enumerate() {
            if idx < key_count {
                cmd.arg(self.prefix_key(item));
            } else {
                cmd.arg(*item);
            }
        }
        self.query(&cmd)
    }

    /// Leases a connection for one command.
    pub(crate) fn query(&self, cmd: &Cmd) -> Result<Value> {
        let mut conn = self.acquire()?;
        self.query_on(&mut conn, cmd)
    }

    /// Runs one command on an already leased connection.
    ///
    /// Connections that failed mid-command are marked broken so a stale reply
    /// never reaches the next caller.
    pub(crate) fn query_on(&self, conn: &mut Connection, cmd: &Cmd) -> Result<Value> {
        self.ctx.check()?;
        conn.apply_deadline(self.ctx.deadline())?;
        match conn.query(cmd) {
            Ok(value) => Ok(value),
            Err(err) => {
                if err.is_io_error() || err.is_timeout() || err.is_connection_dropped() {
                    warn!(error = %err, "discarding connection after transport error");
                    conn.mark_broken();
                }
                if self.ctx.is_expired() {
                    conn.mark_broken();
                    return Err(Error::DeadlineExceeded);
                }
                Err(Error::Command(err))
            }
        }
    }

    pub(crate) fn expect_ok(&self, cmd: &Cmd) -> Result<()> {
        reply::into_ok(self.query(cmd)?)
    }

    pub(crate) fn prefix_arc(&self) -> Arc<str> {
        self.prefix.clone()
    }
}

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("prefix", &self.prefix)
            .field("pool", &self.pool)
            .field("ctx", &self.ctx)
            .finish()
    }
}
