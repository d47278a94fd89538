use std::collections::HashMap;

use crate::args::Arg;
use crate::error::Result;
use crate::manager::Manager;
use crate::reply;

impl Manager {
    /// Sets one hash field. Returns true when the field did not exist before.
    pub fn hset(&self, key: &str, field: &str, value: impl Into<Arg>) -> Result<bool> {
        let mut cmd = redis::cmd("HSET");
        cmd.arg(self.prefix_key(key)).arg(field).arg(Arg::scalar(value.into())?);
        reply::into_int(self.query(&cmd)?).map(|added| added > 0)
    }

    /// Sets several hash fields at once. Returns how many were new.
    pub fn hset_multiple<I, F, V>(&self, key: &str, pairs: I) -> Result<i64>
    where
        I: IntoIterator<Item = (F, V)>,
        F: Into<String>,
        V: Into<Arg>,
    {
        let pairs = pairs
            .into_iter()
            .map(|(field, value)| -> Result<(String, Arg)> {
                Ok((field.into(), Arg::scalar(value.into())?))
            })
            .collect::<Result<Vec<(String, Arg)>>>()?;
        if pairs.is_empty() {
            return Ok(0);
        }
        let mut cmd = redis::cmd("HSET");
        cmd.arg(self.prefix_key(key)).arg(Arg::Pairs(pairs));
        reply::into_int(self.query(&cmd)?)
    }

    pub fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        let mut cmd = redis::cmd("HGET");
        cmd.arg(self.prefix_key(key)).arg(field);
        reply::into_opt_string(self.query(&cmd)?)
    }

    /// All fields of a hash; empty when the key is missing.
    pub fn hget_all(&self, key: &str) -> Result<HashMap<String, String>> {
        let mut cmd = redis::cmd("HGETALL");
        cmd.arg(self.prefix_key(key));
        reply::into_string_map(self.query(&cmd)?)
    }

    /// Removes fields from a hash. Returns how many existed.
    pub fn hdel(&self, key: &str, fields: &[&str]) -> Result<i64> {
        if fields.is_empty() {
            return Ok(0);
        }
        let mut cmd = redis::cmd("HDEL");
        cmd.arg(self.prefix_key(key)).arg(fields);
        reply::into_int(self.query(&cmd)?)
    }
}
