//! # Publish / Subscribe
//!
//! Purpose: Namespaced pub/sub on top of the pooled connections.
//!
//! ## Design Principles
//! 1. **Dedicated Lease**: A `Subscription` owns one pooled connection for its
//!    whole lifetime; the connection is closed, never recycled, afterwards.
//! 2. **Confirmed Start**: `subscribe`/`psubscribe` return only after the
//!    server confirmed every channel.
//! 3. **Transparent Namespacing**: Channels are prefixed on the way out and
//!    stripped on the way in.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use redis::Value;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::args::Arg;
use crate::error::{Error, Result};
use crate::manager::{Connection, Manager};
use crate::reply;

/// Which subscription change the server confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionKind {
    Subscribe,
    PSubscribe,
    Unsubscribe,
    PUnsubscribe,
}

impl SubscriptionKind {
    fn command(self) -> &'static str {
        match self {
            SubscriptionKind::Subscribe => "SUBSCRIBE",
            SubscriptionKind::PSubscribe => "PSUBSCRIBE",
            SubscriptionKind::Unsubscribe => "UNSUBSCRIBE",
            SubscriptionKind::PUnsubscribe => "PUNSUBSCRIBE",
        }
    }

    fn parse(tag: &str) -> Option<Self> {
        match tag {
            "subscribe" => Some(SubscriptionKind::Subscribe),
            "psubscribe" => Some(SubscriptionKind::PSubscribe),
            "unsubscribe" => Some(SubscriptionKind::Unsubscribe),
            "punsubscribe" => Some(SubscriptionKind::PUnsubscribe),
            _ => None,
        }
    }
}

/// A published payload delivered to a subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    channel: String,
    pattern: Option<String>,
    payload: Bytes,
}

impl Message {
    /// Channel name without the namespace prefix.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Pattern that matched, for pattern subscriptions.
    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_deref()
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn payload_str(&self) -> Result<&str> {
        std::str::from_utf8(&self.payload).map_err(|err| {
            Error::UnexpectedReply(format!("invalid utf-8 at byte {}", err.valid_up_to()))
        })
    }

    /// Decodes the payload as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.payload)?)
    }
}

/// Anything read from a subscribed connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The server confirmed a subscription change. `count` is the number of
    /// channels and patterns still subscribed.
    Subscription {
        kind: SubscriptionKind,
        channel: String,
        count: i64,
    },
    Message(Message),
}

impl Manager {
    /// Publishes `message` on the namespaced channel. Returns the number of
    /// subscribers that received it.
    pub fn publish(&self, channel: &str, message: impl Into<Arg>) -> Result<i64> {
        let mut cmd = redis::cmd("PUBLISH");
        cmd.arg(self.prefix_key(channel)).arg(Arg::scalar(message.into())?);
        reply::into_int(self.query(&cmd)?)
    }

    /// Subscribes to channels on a dedicated connection.
    pub fn subscribe(&self, channels: &[&str]) -> Result<Subscription> {
        self.open_subscription(|sub| sub.subscribe(channels))
    }

    /// Subscribes to glob patterns on a dedicated connection.
    pub fn psubscribe(&self, patterns: &[&str]) -> Result<Subscription> {
        self.open_subscription(|sub| sub.psubscribe(patterns))
    }

    fn open_subscription<F>(&self, start: F) -> Result<Subscription>
    where
        F: FnOnce(&mut Subscription) -> Result<()>,
    {
        self.context().check()?;
        let mut conn = self.acquire()?;
        // The handshake honours the context; the session itself does not.
        conn.apply_deadline(self.context().deadline())?;
        let mut sub = Subscription::new(conn, self.prefix_arc());
        if let Err(err) = start(&mut sub) {
            if self.context().is_expired() {
                return Err(Error::DeadlineExceeded);
            }
            return Err(err);
        }
        sub.conn.apply_deadline(None)?;
        Ok(sub)
    }
}

/// A live subscription session.
///
/// Dropping it closes the underlying connection.
pub struct Subscription {
    conn: Connection,
    prefix: Arc<str>,
    pending: VecDeque<Message>,
}

impl Subscription {
    fn new(conn: Connection, prefix: Arc<str>) -> Self {
        Subscription {
            conn,
            prefix,
            pending: VecDeque::new(),
        }
    }

    /// Adds channels and waits for their confirmations.
    pub fn subscribe(&mut self, channels: &[&str]) -> Result<()> {
        self.change(SubscriptionKind::Subscribe, channels)?;
        self.await_confirmations(SubscriptionKind::Subscribe, channels.len())
    }

    /// Adds patterns and waits for their confirmations.
    pub fn psubscribe(&mut self, patterns: &[&str]) -> Result<()> {
        self.change(SubscriptionKind::PSubscribe, patterns)?;
        self.await_confirmations(SubscriptionKind::PSubscribe, patterns.len())
    }

    /// Leaves channels; an empty slice leaves all of them. Confirmations
    /// arrive later as [`Event::Subscription`].
    pub fn unsubscribe(&mut self, channels: &[&str]) -> Result<()> {
        self.change(SubscriptionKind::Unsubscribe, channels)
    }

    /// Leaves patterns; an empty slice leaves all of them.
    pub fn punsubscribe(&mut self, patterns: &[&str]) -> Result<()> {
        self.change(SubscriptionKind::PUnsubscribe, patterns)
    }

    /// Blocks for the next event. Messages that arrived while waiting for a
    /// confirmation are returned first.
    pub fn receive(&mut self) -> Result<Event> {
        if let Some(message) = self.pending.pop_front() {
            return Ok(Event::Message(message));
        }
        self.read_event()
    }

    /// Blocks for the next message, skipping confirmations.
    pub fn next_message(&mut self) -> Result<Message> {
        loop {
            if let Event::Message(message) = self.receive()? {
                return Ok(message);
            }
        }
    }

    /// Bounds how long `receive` blocks; `None` waits forever.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.conn.set_read_timeout(timeout)
    }

    fn change(&mut self, kind: SubscriptionKind, names: &[&str]) -> Result<()> {
        let subscribing = matches!(
            kind,
            SubscriptionKind::Subscribe | SubscriptionKind::PSubscribe
        );
        if subscribing && names.is_empty() {
            return Ok(());
        }
        let mut cmd = redis::cmd(kind.command());
        for name in names {
            cmd.arg(format!("{}{}", self.prefix, name));
        }
        self.conn.send(&cmd)?;
        debug!(command = kind.command(), count = names.len(), "subscription change sent");
        Ok(())
    }

    fn await_confirmations(&mut self, kind: SubscriptionKind, mut expected: usize) -> Result<()> {
        while expected > 0 {
            match self.read_event()? {
                Event::Subscription { kind: got, .. } if got == kind => expected -= 1,
                Event::Subscription { .. } => {}
                Event::Message(message) => self.pending.push_back(message),
            }
        }
        Ok(())
    }

    fn read_event(&mut self) -> Result<Event> {
        let value = self.conn.receive()?;
        parse_event(&self.prefix, value)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // Still in subscribed mode; the connection cannot serve commands.
        self.conn.mark_broken();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("prefix", &self.prefix)
            .field("pending", &self.pending.len())
            .finish()
    }
}

fn parse_event(prefix: &str, value: Value) -> Result<Event> {
    let items = match value {
        Value::Array(items) => items,
        other => return Err(Error::unexpected("pub/sub event", &other)),
    };
    let mut iter = items.into_iter();
    let tag = match iter.next() {
        Some(tag) => reply::into_string(tag)?,
        None => return Err(Error::UnexpectedReply("empty pub/sub event".into())),
    };

    match (tag.as_str(), iter.next(), iter.next(), iter.next()) {
        ("message", Some(channel), Some(payload), None) => Ok(Event::Message(Message {
            channel: strip(prefix, reply::into_string(channel)?),
            pattern: None,
            payload: payload_bytes(payload)?,
        })),
        ("pmessage", Some(pattern), Some(channel), Some(payload)) => {
            Ok(Event::Message(Message {
                channel: strip(prefix, reply::into_string(channel)?),
                pattern: Some(strip(prefix, reply::into_string(pattern)?)),
                payload: payload_bytes(payload)?,
            }))
        }
        (tag, Some(channel), Some(count), None) => match SubscriptionKind::parse(tag) {
            Some(kind) => Ok(Event::Subscription {
                kind,
                channel: strip(prefix, reply::into_opt_string(channel)?.unwrap_or_default()),
                count: reply::into_int(count)?,
            }),
            None => Err(Error::UnexpectedReply(format!("unknown pub/sub event {tag:?}"))),
        },
        (tag, ..) => Err(Error::UnexpectedReply(format!("malformed pub/sub event {tag:?}"))),
    }
}

fn payload_bytes(value: Value) -> Result<Bytes> {
    match reply::into_opt_bytes(value)? {
        Some(data) => Ok(Bytes::from(data)),
        None => Err(Error::UnexpectedReply("nil pub/sub payload".into())),
    }
}

fn strip(prefix: &str, name: String) -> String {
    match name.strip_prefix(prefix) {
        Some(rest) => rest.to_string(),
        None => name,
    }
}
