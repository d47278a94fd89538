//! # Store Connections
//!
//! Dial function and per-connection state for the pool: URL building, auth,
//! database selection and socket timeouts. Framing is left to the `redis`
//! crate; this module only decides what to send after the socket is open.

use std::fmt;
use std::time::{Duration, Instant};

use redis::{Cmd, ConnectionLike, RedisResult, Value};
use tracing::debug;

use crate::config::Options;
use crate::error::{Error, Result};
use crate::pool::ManageConnection;

/// Dials connections for the pool.
pub struct RedisConnector {
    client: redis::Client,
    address: String,
    password: Option<String>,
    db: i64,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
}

impl RedisConnector {
    /// Parses the address; no I/O happens until the pool asks for a connection.
    pub fn new(options: &Options) -> Result<Self> {
        let url = options.network.url(&options.address);
        let client = redis::Client::open(url.as_str()).map_err(|source| Error::Connect {
            address: options.address.clone(),
            source,
        })?;
        Ok(RedisConnector {
            client,
            address: options.address.clone(),
            password: options.password.clone(),
            db: options.db,
            connect_timeout: options.connect_timeout,
            read_timeout: options.read_timeout,
            write_timeout: options.write_timeout,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    fn connect_error(&self, source: redis::RedisError) -> Error {
        Error::Connect {
            address: self.address.clone(),
            source,
        }
    }
}

impl fmt::Debug for RedisConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisConnector")
            .field("address", &self.address)
            .field("db", &self.db)
            .field("auth", &self.password.is_some())
            .finish()
    }
}

impl ManageConnection for RedisConnector {
    type Connection = RedisConnection;

    fn connect(&self) -> Result<RedisConnection> {
        let inner = match self.connect_timeout {
            Some(timeout) => self.client.get_connection_with_timeout(timeout),
            None => self.client.get_connection(),
        }
        .map_err(|err| self.connect_error(err))?;

        let mut conn = RedisConnection {
            inner,
            read_timeout: self.read_timeout,
            write_timeout: self.write_timeout,
            applied: (None, None),
        };
        conn.apply_deadline(None)
            .map_err(|err| match err {
                Error::Command(source) => self.connect_error(source),
                other => other,
            })?;

        if let Some(password) = &self.password {
            conn.query(redis::cmd("AUTH").arg(password))
                .map_err(|err| self.connect_error(err))?;
        }
        if self.db != 0 {
            conn.query(redis::cmd("SELECT").arg(self.db))
                .map_err(|err| self.connect_error(err))?;
        }

        debug!(address = %self.address, db = self.db, "dialed connection");
        Ok(conn)
    }

    fn is_valid(&self, conn: &mut RedisConnection, deadline: Option<Instant>) -> Result<()> {
        conn.apply_deadline(deadline)?;
        conn.query(&redis::cmd("PING"))?;
        Ok(())
    }

    fn has_broken(&self, conn: &mut RedisConnection) -> bool {
        !conn.inner.is_open()
    }
}

/// One open store connection with its configured socket timeouts.
pub struct RedisConnection {
    inner: redis::Connection,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
    // Timeouts currently set on the socket, to skip redundant syscalls.
    applied: (Option<Duration>, Option<Duration>),
}

impl RedisConnection {
    /// Runs one command and returns the raw reply.
    pub fn query(&mut self, cmd: &Cmd) -> RedisResult<Value> {
        cmd.query(&mut self.inner)
    }

    /// Writes a command without reading a reply (pub/sub).
    pub(crate) fn send(&mut self, cmd: &Cmd) -> RedisResult<()> {
        self.inner.send_packed_command(&cmd.get_packed_command())
    }

    /// Reads the next reply or push message.
    pub(crate) fn receive(&mut self) -> RedisResult<Value> {
        self.inner.recv_response()
    }

    /// Clamps socket timeouts to `deadline`, or restores the configured ones.
    pub(crate) fn apply_deadline(&mut self, deadline: Option<Instant>) -> Result<()> {
        let wanted = match deadline {
            None => (self.read_timeout, self.write_timeout),
            Some(deadline) => {
                let left = deadline.saturating_duration_since(Instant::now());
                if left.is_zero() {
                    return Err(Error::DeadlineExceeded);
                }
                (
                    Some(clamp(self.read_timeout, left)),
                    Some(clamp(self.write_timeout, left)),
                )
            }
        };
        self.set_timeouts(wanted)
    }

    /// Overrides the read timeout until the next `apply_deadline`.
    pub(crate) fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.set_timeouts((timeout, self.applied.1))
    }

    fn set_timeouts(&mut self, wanted: (Option<Duration>, Option<Duration>)) -> Result<()> {
        if wanted.0 != self.applied.0 {
            self.inner.set_read_timeout(wanted.0)?;
            self.applied.0 = wanted.0;
        }
        if wanted.1 != self.applied.1 {
            self.inner.set_write_timeout(wanted.1)?;
            self.applied.1 = wanted.1;
        }
        Ok(())
    }
}

fn clamp(configured: Option<Duration>, left: Duration) -> Duration {
    configured.map_or(left, |timeout| timeout.min(left))
}
