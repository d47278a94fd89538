//! # Command Arguments
//!
//! Closed set of argument variants accepted by the typed helpers. Each variant
//! has one serialization rule, so nothing depends on runtime type inspection.

use bytes::Bytes;
use redis::{RedisWrite, ToRedisArgs};

use crate::error::{Error, Result};

/// A single command argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// UTF-8 text, sent as its bytes.
    Str(String),
    /// Signed integer, sent in decimal.
    Int(i64),
    /// Float, sent in shortest round-trip form (`inf`/`-inf` for infinities).
    Float(f64),
    /// Raw bytes, sent verbatim.
    Bytes(Bytes),
    /// Field/value pairs, flattened to `field value field value ...`. Only
    /// [`hset_multiple`](crate::Manager::hset_multiple) takes these; helpers
    /// that send one value per argument reject them.
    Pairs(Vec<(String, Arg)>),
}

impl Arg {
    /// Builds `Pairs` from any iterator of field/value tuples.
    pub fn pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Arg>,
    {
        Arg::Pairs(
            pairs
                .into_iter()
                .map(|(field, value)| (field.into(), value.into()))
                .collect(),
        )
    }

    /// Passes single values through and rejects `Pairs`.
    pub(crate) fn scalar(self) -> Result<Arg> {
        match self {
            Arg::Pairs(_) => Err(Error::InvalidArgument(
                "field/value pairs where a single value is expected".into(),
            )),
            arg => Ok(arg),
        }
    }

    /// Number of wire arguments this value expands to.
    pub fn arity(&self) -> usize {
        match self {
            Arg::Pairs(pairs) => pairs.iter().map(|(_, value)| 1 + value.arity()).sum(),
            _ => 1,
        }
    }
}

impl ToRedisArgs for Arg {
    fn write_redis_args<W>(&self, out: &mut W)
    where
        W: ?Sized + RedisWrite,
    {
        match self {
            Arg::Str(text) => out.write_arg(text.as_bytes()),
            Arg::Int(value) => out.write_arg(value.to_string().as_bytes()),
            Arg::Float(value) => out.write_arg(format_float(*value).as_bytes()),
            Arg::Bytes(data) => out.write_arg(data),
            Arg::Pairs(pairs) => {
                for (field, value) in pairs {
                    out.write_arg(field.as_bytes());
                    value.write_redis_args(out);
                }
            }
        }
    }
}

/// Converts items sent one wire argument each, rejecting any `Pairs`.
pub(crate) fn scalars<I>(items: I) -> Result<Vec<Arg>>
where
    I: IntoIterator,
    I::Item: Into<Arg>,
{
    items.into_iter().map(Into::into).map(Arg::scalar).collect()
}

fn format_float(value: f64) -> String {
    if value == f64::INFINITY {
        "inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        value.to_string()
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Str(value.to_string())
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Arg::Str(value)
    }
}

impl From<&String> for Arg {
    fn from(value: &String) -> Self {
        Arg::Str(value.clone())
    }
}

impl From<i64> for Arg {
    fn from(value: i64) -> Self {
        Arg::Int(value)
    }
}

impl From<i32> for Arg {
    fn from(value: i32) -> Self {
        Arg::Int(value.into())
    }
}

impl From<u32> for Arg {
    fn from(value: u32) -> Self {
        Arg::Int(value.into())
    }
}

impl From<f64> for Arg {
    fn from(value: f64) -> Self {
        Arg::Float(value)
    }
}

impl From<Bytes> for Arg {
    fn from(value: Bytes) -> Self {
        Arg::Bytes(value)
    }
}

impl From<Vec<u8>> for Arg {
    fn from(value: Vec<u8>) -> Self {
        Arg::Bytes(Bytes::from(value))
    }
}

impl From<&[u8]> for Arg {
    fn from(value: &[u8]) -> Self {
        Arg::Bytes(Bytes::copy_from_slice(value))
    }
}

impl<const N: usize> From<&[u8; N]> for Arg {
    fn from(value: &[u8; N]) -> Self {
        Arg::Bytes(Bytes::copy_from_slice(value))
    }
}
