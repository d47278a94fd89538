use std::time::Duration;

use redis::Value;
use tracing::debug;

use super::{expire_command, SCAN_BATCH};
use crate::error::{Error, Result};
use crate::manager::Manager;
use crate::reply;

/// TTL state of a key, as reported by `TTL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// Key is missing or already expired.
    Missing,
    /// Key exists without expiration.
    NoExpiry,
    /// Key expires after the provided duration.
    ExpiresIn(Duration),
}

impl Manager {
    pub fn exists(&self, key: &str) -> Result<bool> {
        let mut cmd = redis::cmd("EXISTS");
        cmd.arg(self.prefix_key(key));
        reply::into_bool(self.query(&cmd)?)
    }

    /// Deletes a key. Returns true when a key was removed.
    pub fn del(&self, key: &str) -> Result<bool> {
        let mut cmd = redis::cmd("DEL");
        cmd.arg(self.prefix_key(key));
        reply::into_bool(self.query(&cmd)?)
    }

    /// Returns the TTL status of a key, in whole seconds.
    pub fn ttl(&self, key: &str) -> Result<Ttl> {
        let mut cmd = redis::cmd("TTL");
        cmd.arg(self.prefix_key(key));
        match self.query(&cmd)? {
            Value::Int(-2) => Ok(Ttl::Missing),
            Value::Int(-1) => Ok(Ttl::NoExpiry),
            Value::Int(secs) if secs >= 0 => Ok(Ttl::ExpiresIn(Duration::from_secs(secs as u64))),
            other => Err(Error::unexpected("ttl", &other)),
        }
    }

    /// Sets a time-to-live on a key. Returns false when the key does not
    /// exist.
    pub fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let cmd = expire_command(&self.prefix_key(key), ttl);
        reply::into_bool(self.query(&cmd)?)
    }

    /// Deletes every key in the namespace whose name contains `pattern`.
    ///
    /// Keys are found with `SCAN ... MATCH *<prefix><pattern>*` and removed
    /// page by page on a single leased connection, so the server is never
    /// blocked by a full keyspace walk. The walk is not atomic: keys written
    /// while it runs may or may not be seen, and an error part-way through
    /// leaves earlier pages deleted.
    ///
    /// Returns the number of keys removed.
    pub fn batch_del(&self, pattern: &str) -> Result<u64> {
        let matcher = scan_pattern(self.prefix(), pattern);
        let mut conn = self.acquire()?;
        let mut cursor = 0u64;
        let mut removed = 0u64;

        loop {
            let mut scan = redis::cmd("SCAN");
            scan.arg(cursor)
                .arg("MATCH")
                .arg(&matcher)
                .arg("COUNT")
                .arg(SCAN_BATCH);
            let (next, keys) = reply::into_scan_page(self.query_on(&mut conn, &scan)?)?;

            if !keys.is_empty() {
                let mut del = redis::cmd("DEL");
                del.arg(&keys);
                let count = reply::into_int(self.query_on(&mut conn, &del)?)?;
                removed += count.max(0) as u64;
                debug!(pattern = %matcher, cursor, matched = keys.len(), deleted = count, "batch delete page");
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        Ok(removed)
    }
}

fn scan_pattern(prefix: &str, pattern: &str) -> String {
    format!("*{prefix}{pattern}*")
}
