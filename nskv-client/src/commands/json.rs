use std::time::Duration;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::args::Arg;
use crate::error::Result;
use crate::manager::Manager;

impl Manager {
    /// Stores `value` as JSON text.
    pub fn set_json<T>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let encoded = serde_json::to_vec(value)?;
        self.set(key, encoded, ttl)
    }

    /// Reads and decodes a JSON value; `None` when the key is missing.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.get(key)?.map(|data| decode(&data)).transpose()
    }

    /// Pushes each value as one JSON element onto the head of a list.
    pub fn lpush_json<T: Serialize>(&self, key: &str, values: &[T]) -> Result<i64> {
        self.push("LPUSH", key, encode_all(values)?)
    }

    pub fn rpush_json<T: Serialize>(&self, key: &str, values: &[T]) -> Result<i64> {
        self.push("RPUSH", key, encode_all(values)?)
    }

    pub fn lpop_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.pop("LPOP", key)?.map(|data| decode(&data)).transpose()
    }

    pub fn rpop_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.pop("RPOP", key)?.map(|data| decode(&data)).transpose()
    }
}

fn encode_all<T: Serialize>(values: &[T]) -> Result<Vec<Arg>> {
    values
        .iter()
        .map(|value| -> Result<Arg> {
            let encoded = serde_json::to_vec(value)?;
            Ok(Arg::Bytes(Bytes::from(encoded)))
        })
        .collect()
}

fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(data)?)
}
