//! # Client Options
//!
//! Purpose: Describe how to reach the store, how large the pool may grow and
//! which namespace the manager owns.
//!
//! ## Design Principles
//! 1. **Independent Defaults**: Every field has a default; setting one option
//!    never changes another.
//! 2. **Three Front Doors**: `with_*` builder methods, struct-update syntax, or
//!    serde deserialization (durations as fractional seconds).
//! 3. **No Hidden Globals**: Defaults are constants consumed by `Default`.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::Error;
use crate::pool::PoolConfig;

/// Maximum number of idle connections kept in the pool.
pub const DEFAULT_MAX_IDLE: usize = 30;
/// Maximum number of connections open at a given time.
pub const DEFAULT_MAX_ACTIVE: usize = 100;
/// Idle connections older than this are closed.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);
/// Database index selected after dialing.
pub const DEFAULT_DB: i64 = 0;
/// Server address.
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:6379";
/// Idle time after which a pooled connection is pinged before reuse.
pub const STALE_CHECK_AFTER: Duration = Duration::from_secs(60);
/// Separator appended to a non-empty namespace.
pub const PREFIX_SEPARATOR: &str = ":";

/// Transport used to reach the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// `host:port` over TCP.
    #[default]
    Tcp,
    /// Filesystem path of a unix domain socket.
    Unix,
}

impl Network {
    /// Connection URL understood by the wire client.
    pub(crate) fn url(self, address: &str) -> String {
        match self {
            Network::Tcp => format!("redis://{address}/"),
            Network::Unix => format!("redis+unix://{address}"),
        }
    }
}

impl FromStr for Network {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Network::Tcp),
            "unix" => Ok(Network::Unix),
            other => Err(Error::Config(format!("unsupported network {other:?}"))),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Tcp => f.write_str("tcp"),
            Network::Unix => f.write_str("unix"),
        }
    }
}

/// Options for [`Manager::new`](crate::Manager::new).
#[derive(Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    /// Transport, `tcp` by default.
    pub network: Network,
    /// Server address, e.g. "127.0.0.1:6379", or a socket path for `unix`.
    pub address: String,
    /// Sent with `AUTH` after dialing when set.
    pub password: Option<String>,
    /// Database index; `SELECT` is issued when non-zero.
    pub db: i64,
    /// Namespace for every key and channel. Empty means no namespace.
    pub prefix: String,
    /// Maximum idle connections kept in the pool.
    pub max_idle: usize,
    /// Maximum open connections (idle + leased). Zero means unbounded.
    pub max_active: usize,
    /// Idle connections older than this are closed. Zero disables eviction.
    #[serde(with = "secs")]
    pub idle_timeout: Duration,
    /// Block in acquire when the pool is exhausted instead of failing fast.
    pub wait: bool,
    /// Optional dial timeout.
    #[serde(with = "opt_secs")]
    pub connect_timeout: Option<Duration>,
    /// Optional socket read timeout.
    #[serde(with = "opt_secs")]
    pub read_timeout: Option<Duration>,
    /// Optional socket write timeout.
    #[serde(with = "opt_secs")]
    pub write_timeout: Option<Duration>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            network: Network::default(),
            address: DEFAULT_ADDRESS.to_string(),
            password: None,
            db: DEFAULT_DB,
            prefix: String::new(),
            max_idle: DEFAULT_MAX_IDLE,
            max_active: DEFAULT_MAX_ACTIVE,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            wait: true,
            connect_timeout: None,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("network", &self.network)
            .field("address", &self.address)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("db", &self.db)
            .field("prefix", &self.prefix)
            .field("max_idle", &self.max_idle)
            .field("max_active", &self.max_active)
            .field("idle_timeout", &self.idle_timeout)
            .field("wait", &self.wait)
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("write_timeout", &self.write_timeout)
            .finish()
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    pub fn with_network(mut self, network: Network) -> Self {
        self.network = network;
        self
    }

    /// An empty password disables `AUTH`.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        let password = password.into();
        self.password = (!password.is_empty()).then_some(password);
        self
    }

    pub fn with_db(mut self, db: i64) -> Self {
        self.db = db;
        self
    }

    /// Namespace without separator; `"app"` yields keys like `"app:user"`.
    /// An empty prefix behaves exactly like no prefix: keys are sent as given,
    /// with no leading `":"`.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_max_idle(mut self, max_idle: usize) -> Self {
        self.max_idle = max_idle;
        self
    }

    pub fn with_max_active(mut self, max_active: usize) -> Self {
        self.max_active = max_active;
        self
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn with_wait(mut self, wait: bool) -> Self {
        self.wait = wait;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = Some(timeout);
        self
    }

    /// Prefix prepended to every key: namespace plus separator, or empty.
    pub fn key_prefix(&self) -> String {
        if self.prefix.is_empty() {
            String::new()
        } else {
            format!("{}{PREFIX_SEPARATOR}", self.prefix)
        }
    }

    pub(crate) fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            max_idle: self.max_idle,
            max_active: self.max_active,
            idle_timeout: self.idle_timeout,
            stale_check_after: STALE_CHECK_AFTER,
            wait: self.wait,
        }
    }
}

mod secs {
    use std::time::Duration;

    use serde::{de::Error as _, Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}

mod opt_secs {
    use std::time::Duration;

    use serde::{de::Error as _, Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<f64>::deserialize(deserializer)?
            .map(|secs| Duration::try_from_secs_f64(secs).map_err(D::Error::custom))
            .transpose()
    }
}
