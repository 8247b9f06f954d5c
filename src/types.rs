//! Common types used throughout match-harvest
//!
//! This module contains shared type definitions, type aliases,
//! and the timestamp codec used by both the fetch and storage paths.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// JSON object type
pub type JsonObject = serde_json::Map<String, JsonValue>;

/// Upstream record identifier
pub type MatchId = i64;

/// Ordering key of a record
pub type Timestamp = DateTime<Utc>;

/// Format used for timestamps in persisted files
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ============================================================================
// Backoff Type
// ============================================================================

/// Type of backoff for retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    /// Constant delay between retries
    #[default]
    Constant,
    /// Linear increase in delay
    Linear,
    /// Exponential increase in delay
    Exponential,
}

// ============================================================================
// Merge Policy
// ============================================================================

/// What makes two dataset rows duplicates of each other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupKey {
    /// Rows sharing an identifier are duplicates; the first occurrence wins
    #[default]
    Identifier,
    /// Rows are duplicates only when timestamp and every field are equal
    FullRow,
}

/// How the incremental update reacts when the upstream stays unreachable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateExhaustion {
    /// Propagate the failure and persist nothing
    #[default]
    Abort,
    /// Stop fetching and persist what was fetched so far
    KeepPartial,
}

// ============================================================================
// Timestamp Codec
// ============================================================================

/// Parse a timestamp from a JSON value.
///
/// Accepts epoch seconds (integer, integer-valued float, or a numeric string),
/// RFC 3339 strings, and `YYYY-MM-DD HH:MM:SS` strings (treated as UTC).
pub fn parse_timestamp(value: &Value) -> Option<Timestamp> {
    match value {
        Value::Number(n) => {
            if let Some(secs) = n.as_i64() {
                return Utc.timestamp_opt(secs, 0).single();
            }
            n.as_f64()
                .filter(|f| f.fract() == 0.0)
                .and_then(|f| Utc.timestamp_opt(f as i64, 0).single())
        }
        Value::String(s) => parse_timestamp_str(s),
        _ => None,
    }
}

/// Parse a timestamp from text
pub fn parse_timestamp_str(text: &str) -> Option<Timestamp> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(secs) = text.parse::<i64>() {
        return Utc.timestamp_opt(secs, 0).single();
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .map(|naive| naive.and_utc())
}

/// Format a timestamp the way persisted files store it
pub fn format_timestamp(ts: &Timestamp) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Read a JSON value as an integer identifier.
///
/// Integer-valued floats and numeric strings are accepted since a column
/// with missing values may have been widened on its way through a file.
pub fn value_as_id(value: &Value) -> Option<MatchId> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.is_finite())
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// ============================================================================
// Utilities
// ============================================================================

/// Extension trait for Option<String> to handle empty strings
pub trait OptionStringExt {
    /// Returns None if the string is empty
    fn none_if_empty(self) -> Option<String>;
}

impl OptionStringExt for Option<String> {
    fn none_if_empty(self) -> Option<String> {
        self.filter(|s| !s.is_empty())
    }
}
