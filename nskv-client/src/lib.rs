//! # nskv Client
//!
//! Purpose: Provide a synchronous, pooled client for Redis-compatible stores
//! that scopes every key and channel to one namespace.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: Reuse connections, bounded by `max_active`.
//! 2. **Namespace Isolation**: One prefix per manager, applied to every key.
//! 3. **Typed Replies**: Each helper decodes exactly the reply shapes its
//!    command can produce; anything else is an error, never a default.
//! 4. **Protocol Delegation**: RESP framing comes from the `redis` crate.
//!
//! ```no_run
//! use std::time::Duration;
//! use nskv_client::{Manager, Options};
//!
//! let manager = Manager::new(Options::new().with_prefix("app"))?;
//! manager.set_string("greeting", "hello", Some(Duration::from_secs(60)))?;
//! assert_eq!(manager.get_string("greeting")?.as_deref(), Some("hello"));
//! # Ok::<(), nskv_client::Error>(())
//! ```

mod args;
mod commands;
mod config;
mod connection;
mod context;
mod error;
mod manager;
mod pool;
mod pubsub;
mod reply;

pub use args::Arg;
pub use commands::{Ttl, ZSetMember, SCAN_BATCH};
pub use config::{
    Network, Options, DEFAULT_ADDRESS, DEFAULT_DB, DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_ACTIVE,
    DEFAULT_MAX_IDLE, PREFIX_SEPARATOR, STALE_CHECK_AFTER,
};
pub use connection::{RedisConnection, RedisConnector};
pub use context::{CancelHandle, Context};
pub use error::{Error, Result};
pub use manager::{Connection, Manager};
pub use pool::{ManageConnection, Pool, PoolConfig, PoolStats, PooledConnection};
pub use pubsub::{Event, Message, Subscription, SubscriptionKind};

/// Raw reply value, as returned by [`Manager::do_command`] and [`Manager::lua`].
pub use redis::Value;
