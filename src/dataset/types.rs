//! Dataset type
//!
//! The accumulated record collection, ascending by timestamp.

use crate::error::{Error, Result};
use crate::page::Record;
use crate::types::{format_timestamp, MatchId, Timestamp};
use std::collections::HashSet;

/// All records observed so far, ascending by timestamp
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    records: Vec<Record>,
}

impl Dataset {
    /// Create an empty dataset
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a dataset from records, checking the ordering invariant
    pub fn from_records(records: Vec<Record>) -> Result<Self> {
        check_ordering(&records)?;
        Ok(Self { records })
    }

    /// Records, oldest first
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Take ownership of the records
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the dataset has no rows
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether timestamps never decrease
    pub fn is_monotonic(&self) -> bool {
        is_monotonic(&self.records)
    }

    /// First and last timestamps
    pub fn time_range(&self) -> Option<(Timestamp, Timestamp)> {
        Some((self.records.first()?.timestamp, self.records.last()?.timestamp))
    }

    /// Identifier of the oldest row (the resume point for a backfill)
    pub fn oldest_id(&self, id_field: &str) -> Result<Option<MatchId>> {
        self.records
            .first()
            .map(|r| r.require_id(id_field))
            .transpose()
    }

    /// Every identifier present in the dataset
    pub fn ids(&self, id_field: &str) -> HashSet<MatchId> {
        self.records.iter().filter_map(|r| r.id(id_field)).collect()
    }
}

/// Whether timestamps never decrease across `records`
pub(crate) fn is_monotonic(records: &[Record]) -> bool {
    records.windows(2).all(|w| w[0].timestamp <= w[1].timestamp)
}

/// Fail with [`Error::OrderingViolation`] at the first decreasing step
pub(crate) fn check_ordering(records: &[Record]) -> Result<()> {
    match records
        .windows(2)
        .position(|w| w[0].timestamp > w[1].timestamp)
    {
        None => Ok(()),
        Some(i) => Err(Error::OrderingViolation {
            position: i + 1,
            previous: format_timestamp(&records[i].timestamp),
            next: format_timestamp(&records[i + 1].timestamp),
        }),
    }
}
