//! Record and page types
//!
//! A [`Record`] is one upstream row with its time column lifted out into an
//! ordering key. A [`Page`] is the canonically ordered (oldest-first) form of
//! one upstream response.

use crate::error::{Error, Result};
use crate::types::{value_as_id, JsonObject, MatchId, Timestamp};
use serde::{Deserialize, Serialize};

/// One upstream response as received, natively newest-first
pub type RawPage = Vec<JsonObject>;

/// Names of the index and identity columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordLayout {
    /// Column holding the ordering timestamp
    #[serde(default = "default_time_field")]
    pub time_field: String,
    /// Column holding the unique integer identifier
    #[serde(default = "default_id_field")]
    pub id_field: String,
}

fn default_time_field() -> String {
    "start_time".to_string()
}

fn default_id_field() -> String {
    "match_id".to_string()
}

impl Default for RecordLayout {
    fn default() -> Self {
        Self {
            time_field: default_time_field(),
            id_field: default_id_field(),
        }
    }
}

/// A single row keyed by its timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Ordering key
    pub timestamp: Timestamp,
    /// Every other column, identifier included
    pub fields: JsonObject,
}

impl Record {
    /// Create a record
    pub fn new(timestamp: Timestamp, fields: JsonObject) -> Self {
        Self { timestamp, fields }
    }

    /// Identifier of this record, if present and integer-valued
    pub fn id(&self, id_field: &str) -> Option<MatchId> {
        self.fields.get(id_field).and_then(value_as_id)
    }

    /// Identifier of this record, or a schema error naming the field
    pub fn require_id(&self, id_field: &str) -> Result<MatchId> {
        self.id(id_field).ok_or_else(|| {
            Error::schema(
                id_field,
                format!("missing or non-integer identifier in row at {}", self.timestamp),
            )
        })
    }
}

/// Records from one upstream call, ascending by timestamp
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    records: Vec<Record>,
}

impl Page {
    /// Wrap records that are already in ascending order
    pub(crate) fn from_sorted(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// Records, oldest first
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Take ownership of the records
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the page carries no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Oldest record in the page
    pub fn oldest(&self) -> Option<&Record> {
        self.records.first()
    }

    /// Newest record in the page
    pub fn newest(&self) -> Option<&Record> {
        self.records.last()
    }

    /// Identifier of the oldest record: the cursor for the next older page.
    ///
    /// `Ok(None)` for an empty page.
    pub fn oldest_id(&self, id_field: &str) -> Result<Option<MatchId>> {
        self.oldest().map(|r| r.require_id(id_field)).transpose()
    }

    /// First and last timestamps
    pub fn time_range(&self) -> Option<(Timestamp, Timestamp)> {
        Some((self.oldest()?.timestamp, self.newest()?.timestamp))
    }
}
