//! Page normalization
//!
//! Upstream pages arrive newest-first. Everything downstream works
//! oldest-first with the timestamp lifted out as the ordering key.

use super::types::{Page, RawPage, Record};
use crate::error::{Error, Result};
use crate::types::parse_timestamp;
use serde_json::Value;

/// Split a response body into rows.
///
/// The body must be a JSON array of objects.
pub fn decode_raw_page(body: Value) -> Result<RawPage> {
    let Value::Array(items) = body else {
        return Err(Error::decode(format!(
            "expected a JSON array of records, got {}",
            json_kind(&body)
        )));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(obj) => Ok(obj),
            other => Err(Error::decode(format!(
                "record {i} is {}, expected an object",
                json_kind(&other)
            ))),
        })
        .collect()
}

/// Reverse a raw page, key it by `time_field`, and sort ascending.
///
/// The sort is stable, so rows sharing a timestamp keep their reversed
/// (oldest-first) order.
pub fn normalize(raw: RawPage, time_field: &str) -> Result<Page> {
    let mut records = raw
        .into_iter()
        .rev()
        .map(|mut row| {
            let value = row
                .remove(time_field)
                .ok_or_else(|| Error::schema(time_field, "field not present in page"))?;
            let timestamp = parse_timestamp(&value).ok_or_else(|| {
                Error::schema(time_field, format!("cannot read {value} as a timestamp"))
            })?;
            Ok(Record::new(timestamp, row))
        })
        .collect::<Result<Vec<_>>>()?;

    records.sort_by_key(|r| r.timestamp);
    Ok(Page::from_sorted(records))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
