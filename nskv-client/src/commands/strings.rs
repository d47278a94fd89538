use std::time::Duration;

use bytes::Bytes;

use super::push_expiry;
use crate::args::Arg;
use crate::error::Result;
use crate::manager::Manager;
use crate::reply;

impl Manager {
    /// Stores `value` under `key`, expiring after `ttl` when it is non-zero.
    pub fn set(&self, key: &str, value: impl Into<Arg>, ttl: Option<Duration>) -> Result<()> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(self.prefix_key(key)).arg(Arg::scalar(value.into())?);
        push_expiry(&mut cmd, ttl);
        self.expect_ok(&cmd)
    }

    pub fn set_string(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        self.set(key, value, ttl)
    }

    /// Fetches a value by key.
    ///
    /// Returns `Ok(None)` when the key is missing; an empty value is
    /// `Some` of an empty buffer.
    pub fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let mut cmd = redis::cmd("GET");
        cmd.arg(self.prefix_key(key));
        Ok(reply::into_opt_bytes(self.query(&cmd)?)?.map(Bytes::from))
    }

    /// Like [`get`](Manager::get), decoding the value as UTF-8.
    pub fn get_string(&self, key: &str) -> Result<Option<String>> {
        let mut cmd = redis::cmd("GET");
        cmd.arg(self.prefix_key(key));
        reply::into_opt_string(self.query(&cmd)?)
    }

    /// Stores `value` only if `key` does not exist yet.
    ///
    /// Returns false, not an error, when the key was already present.
    pub fn set_nx(&self, key: &str, value: impl Into<Arg>, ttl: Option<Duration>) -> Result<bool> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(self.prefix_key(key)).arg(Arg::scalar(value.into())?).arg("NX");
        push_expiry(&mut cmd, ttl);
        reply::into_applied(self.query(&cmd)?)
    }

    pub fn incr(&self, key: &str) -> Result<i64> {
        let mut cmd = redis::cmd("INCR");
        cmd.arg(self.prefix_key(key));
        reply::into_int(self.query(&cmd)?)
    }

    pub fn incr_by(&self, key: &str, amount: i64) -> Result<i64> {
        let mut cmd = redis::cmd("INCRBY");
        cmd.arg(self.prefix_key(key)).arg(amount);
        reply::into_int(self.query(&cmd)?)
    }

    pub fn decr(&self, key: &str) -> Result<i64> {
        let mut cmd = redis::cmd("DECR");
        cmd.arg(self.prefix_key(key));
        reply::into_int(self.query(&cmd)?)
    }

    pub fn decr_by(&self, key: &str, amount: i64) -> Result<i64> {
        let mut cmd = redis::cmd("DECRBY");
        cmd.arg(self.prefix_key(key)).arg(amount);
        reply::into_int(self.query(&cmd)?)
    }
}
