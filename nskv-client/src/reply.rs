//! # Reply Decoding
//!
//! Converts raw store replies into the typed results of the command helpers.
//! Every shape outside the expected set is reported as `UnexpectedReply`
//! instead of being coerced to a default.

use std::collections::HashMap;

use redis::Value;

use crate::error::{Error, Result};

/// `OK` status reply.
pub(crate) fn into_ok(value: Value) -> Result<()> {
    match value {
        Value::Okay => Ok(()),
        Value::SimpleString(ref text) if text == "OK" => Ok(()),
        other => Err(Error::unexpected("OK", &other)),
    }
}

/// `OK` as true, nil as false (conditional writes).
pub(crate) fn into_applied(value: Value) -> Result<bool> {
    match value {
        Value::Nil => Ok(false),
        other => into_ok(other).map(|()| true),
    }
}

pub(crate) fn into_int(value: Value) -> Result<i64> {
    match value {
        Value::Int(n) => Ok(n),
        Value::BulkString(ref data) => parse_text(data, &value),
        Value::SimpleString(ref text) => parse_text(text.as_bytes(), &value),
        other => Err(Error::unexpected("integer", &other)),
    }
}

pub(crate) fn into_opt_int(value: Value) -> Result<Option<i64>> {
    match value {
        Value::Nil => Ok(None),
        other => into_int(other).map(Some),
    }
}

/// Integer reply read as a 0/1 flag.
pub(crate) fn into_bool(value: Value) -> Result<bool> {
    match value {
        Value::Int(n) => Ok(n != 0),
        other => Err(Error::unexpected("integer flag", &other)),
    }
}

pub(crate) fn into_opt_bytes(value: Value) -> Result<Option<Vec<u8>>> {
    match value {
        Value::Nil => Ok(None),
        Value::BulkString(data) => Ok(Some(data)),
        Value::SimpleString(text) => Ok(Some(text.into_bytes())),
        Value::Okay => Ok(Some(b"OK".to_vec())),
        other => Err(Error::unexpected("bulk string", &other)),
    }
}

pub(crate) fn into_opt_string(value: Value) -> Result<Option<String>> {
    into_opt_bytes(value)?.map(utf8).transpose()
}

pub(crate) fn into_string(value: Value) -> Result<String> {
    match value {
        Value::Nil => Err(Error::unexpected("string", &Value::Nil)),
        other => into_opt_string(other).map(Option::unwrap_or_default),
    }
}

pub(crate) fn into_opt_float(value: Value) -> Result<Option<f64>> {
    match into_opt_string(value)? {
        None => Ok(None),
        Some(text) => parse_float(&text).map(Some),
    }
}

/// Array of strings; nil is read as an empty list.
pub(crate) fn into_strings(value: Value) -> Result<Vec<String>> {
    match value {
        Value::Nil => Ok(Vec::new()),
        Value::Array(items) => items.into_iter().map(into_string).collect(),
        other => Err(Error::unexpected("array", &other)),
    }
}

/// Flat `field value field value` array.
pub(crate) fn into_string_map(value: Value) -> Result<HashMap<String, String>> {
    let items = into_strings(value)?;
    if items.len() % 2 != 0 {
        return Err(Error::UnexpectedReply(format!(
            "odd number of elements ({}) in field/value reply",
            items.len()
        )));
    }
    let mut map = HashMap::with_capacity(items.len() / 2);
    let mut iter = items.into_iter();
    while let (Some(field), Some(value)) = (iter.next(), iter.next()) {
        map.insert(field, value);
    }
    Ok(map)
}

/// Flat `member score member score` array.
pub(crate) fn into_scored(value: Value) -> Result<Vec<(String, f64)>> {
    let items = into_strings(value)?;
    if items.len() % 2 != 0 {
        return Err(Error::UnexpectedReply(format!(
            "odd number of elements ({}) in member/score reply",
            items.len()
        )));
    }
    let mut scored = Vec::with_capacity(items.len() / 2);
    let mut iter = items.into_iter();
    while let (Some(member), Some(score)) = (iter.next(), iter.next()) {
        scored.push((member, parse_float(&score)?));
    }
    Ok(scored)
}

/// `SCAN` page: next cursor and the keys matched in this batch.
pub(crate) fn into_scan_page(value: Value) -> Result<(u64, Vec<String>)> {
    match value {
        Value::Array(items) if items.len() == 2 => {
            let mut iter = items.into_iter();
            let cursor = iter.next().map(into_string).transpose()?.unwrap_or_default();
            let cursor = cursor
                .parse::<u64>()
                .map_err(|_| Error::UnexpectedReply(format!("invalid scan cursor {cursor:?}")))?;
            let keys = iter.next().map(into_strings).transpose()?.unwrap_or_default();
            Ok((cursor, keys))
        }
        other => Err(Error::unexpected("scan page", &other)),
    }
}

fn utf8(data: Vec<u8>) -> Result<String> {
    String::from_utf8(data).map_err(|err| {
        Error::UnexpectedReply(format!("invalid utf-8 at byte {}", err.utf8_error().valid_up_to()))
    })
}

fn parse_text(data: &[u8], value: &Value) -> Result<i64> {
    std::str::from_utf8(data)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or_else(|| Error::unexpected("integer", value))
}

fn parse_float(text: &str) -> Result<f64> {
    match text {
        "inf" | "+inf" => Ok(f64::INFINITY),
        "-inf" => Ok(f64::NEG_INFINITY),
        _ => text
            .parse()
            .map_err(|_| Error::UnexpectedReply(format!("invalid float {text:?}"))),
    }
}
