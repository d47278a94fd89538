use bytes::Bytes;

use crate::args::{self, Arg};
use crate::error::Result;
use crate::manager::Manager;
use crate::reply;

impl Manager {
    /// Pushes values onto the head of a list. Returns the new length.
    pub fn lpush<I>(&self, key: &str, values: I) -> Result<i64>
    where
        I: IntoIterator,
        I::Item: Into<Arg>,
    {
        self.push("LPUSH", key, args::scalars(values)?)
    }

    /// Pushes values onto the tail of a list. Returns the new length.
    pub fn rpush<I>(&self, key: &str, values: I) -> Result<i64>
    where
        I: IntoIterator,
        I::Item: Into<Arg>,
    {
        self.push("RPUSH", key, args::scalars(values)?)
    }

    /// Pops the head of a list, or `None` when it is empty.
    pub fn lpop(&self, key: &str) -> Result<Option<Bytes>> {
        self.pop("LPOP", key)
    }

    pub fn rpop(&self, key: &str) -> Result<Option<Bytes>> {
        self.pop("RPOP", key)
    }

    pub(crate) fn push(&self, name: &str, key: &str, values: Vec<Arg>) -> Result<i64> {
        // A push without values is a syntax error; report the current length.
        let mut cmd = redis::cmd(if values.is_empty() { "LLEN" } else { name });
        cmd.arg(self.prefix_key(key)).arg(&values);
        reply::into_int(self.query(&cmd)?)
    }

    pub(crate) fn pop(&self, name: &str, key: &str) -> Result<Option<Bytes>> {
        let mut cmd = redis::cmd(name);
        cmd.arg(self.prefix_key(key));
        Ok(reply::into_opt_bytes(self.query(&cmd)?)?.map(Bytes::from))
    }
}
