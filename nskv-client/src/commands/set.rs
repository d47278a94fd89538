use crate::args::{self, Arg};
use crate::error::Result;
use crate::manager::Manager;
use crate::reply;

impl Manager {
    /// Adds members to a set. Returns how many were not already present.
    pub fn sadd<I>(&self, key: &str, members: I) -> Result<i64>
    where
        I: IntoIterator,
        I::Item: Into<Arg>,
    {
        self.set_members("SADD", key, members)
    }

    /// Removes members from a set. Returns how many were present.
    pub fn srem<I>(&self, key: &str, members: I) -> Result<i64>
    where
        I: IntoIterator,
        I::Item: Into<Arg>,
    {
        self.set_members("SREM", key, members)
    }

    pub fn smembers(&self, key: &str) -> Result<Vec<String>> {
        let mut cmd = redis::cmd("SMEMBERS");
        cmd.arg(self.prefix_key(key));
        reply::into_strings(self.query(&cmd)?)
    }

    pub fn scard(&self, key: &str) -> Result<i64> {
        let mut cmd = redis::cmd("SCARD");
        cmd.arg(self.prefix_key(key));
        reply::into_int(self.query(&cmd)?)
    }

    pub fn sismember(&self, key: &str, member: impl Into<Arg>) -> Result<bool> {
        let mut cmd = redis::cmd("SISMEMBER");
        cmd.arg(self.prefix_key(key)).arg(Arg::scalar(member.into())?);
        reply::into_bool(self.query(&cmd)?)
    }

    /// Removes and returns a random member, or `None` for an empty set.
    pub fn spop(&self, key: &str) -> Result<Option<String>> {
        let mut cmd = redis::cmd("SPOP");
        cmd.arg(self.prefix_key(key));
        reply::into_opt_string(self.query(&cmd)?)
    }

    /// Returns a random member without removing it.
    pub fn srand_member(&self, key: &str) -> Result<Option<String>> {
        let mut cmd = redis::cmd("SRANDMEMBER");
        cmd.arg(self.prefix_key(key));
        reply::into_opt_string(self.query(&cmd)?)
    }

    fn set_members<I>(&self, name: &str, key: &str, members: I) -> Result<i64>
    where
        I: IntoIterator,
        I::Item: Into<Arg>,
    {
        let members = args::scalars(members)?;
        if members.is_empty() {
            return Ok(0);
        }
        let mut cmd = redis::cmd(name);
        cmd.arg(self.prefix_key(key)).arg(&members);
        reply::into_int(self.query(&cmd)?)
    }
}
