use serde::{Deserialize, Serialize};

use crate::args::Arg;
use crate::error::{Error, Result};
use crate::manager::Manager;
use crate::reply;

/// One sorted-set entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZSetMember {
    pub score: f64,
    pub member: String,
}

impl ZSetMember {
    pub fn new(score: f64, member: impl Into<String>) -> Self {
        ZSetMember {
            score,
            member: member.into(),
        }
    }
}

impl Manager {
    /// Adds or rescores members. Returns how many were newly added.
    pub fn zadd(&self, key: &str, members: &[ZSetMember]) -> Result<i64> {
        if members.is_empty() {
            return Ok(0);
        }
        let mut cmd = redis::cmd("ZADD");
        cmd.arg(self.prefix_key(key));
        for entry in members {
            cmd.arg(Arg::Float(entry.score)).arg(&entry.member);
        }
        reply::into_int(self.query(&cmd)?)
    }

    pub fn zrem(&self, key: &str, members: &[&str]) -> Result<i64> {
        if members.is_empty() {
            return Ok(0);
        }
        let mut cmd = redis::cmd("ZREM");
        cmd.arg(self.prefix_key(key)).arg(members);
        reply::into_int(self.query(&cmd)?)
    }

    /// Members ranked `start..=stop` in ascending score order. Negative
    /// indexes count from the end.
    pub fn zrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        self.range("ZRANGE", key, start, stop)
    }

    pub fn zrange_with_scores(&self, key: &str, start: i64, stop: i64) -> Result<Vec<ZSetMember>> {
        self.range_with_scores("ZRANGE", key, start, stop)
    }

    /// Like [`zrange`](Manager::zrange) in descending score order.
    pub fn zrev_range(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        self.range("ZREVRANGE", key, start, stop)
    }

    pub fn zrev_range_with_scores(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<ZSetMember>> {
        self.range_with_scores("ZREVRANGE", key, start, stop)
    }

    pub fn zcard(&self, key: &str) -> Result<i64> {
        let mut cmd = redis::cmd("ZCARD");
        cmd.arg(self.prefix_key(key));
        reply::into_int(self.query(&cmd)?)
    }

    pub fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>> {
        let mut cmd = redis::cmd("ZSCORE");
        cmd.arg(self.prefix_key(key)).arg(member);
        reply::into_opt_float(self.query(&cmd)?)
    }

    /// Zero-based ascending rank, or `None` when the member is absent.
    pub fn zrank(&self, key: &str, member: &str) -> Result<Option<u64>> {
        self.rank("ZRANK", key, member)
    }

    pub fn zrev_rank(&self, key: &str, member: &str) -> Result<Option<u64>> {
        self.rank("ZREVRANK", key, member)
    }

    fn range(&self, name: &str, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        let mut cmd = redis::cmd(name);
        cmd.arg(self.prefix_key(key)).arg(start).arg(stop);
        reply::into_strings(self.query(&cmd)?)
    }

    fn range_with_scores(
        &self,
        name: &str,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<ZSetMember>> {
        let mut cmd = redis::cmd(name);
        cmd.arg(self.prefix_key(key))
            .arg(start)
            .arg(stop)
            .arg("WITHSCORES");
        let scored = reply::into_scored(self.query(&cmd)?)?;
        Ok(scored
            .into_iter()
            .map(|(member, score)| ZSetMember { score, member })
            .collect())
    }

    fn rank(&self, name: &str, key: &str, member: &str) -> Result<Option<u64>> {
        let mut cmd = redis::cmd(name);
        cmd.arg(self.prefix_key(key)).arg(member);
        match reply::into_opt_int(self.query(&cmd)?)? {
            None => Ok(None),
            Some(rank) => u64::try_from(rank)
                .map(Some)
                .map_err(|_| Error::UnexpectedReply(format!("negative rank {rank}"))),
        }
    }
}
