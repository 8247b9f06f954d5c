//! Dataset merging
//!
//! Concatenates pages (and optionally the persisted dataset) into one
//! dataset, restores ascending order, and drops duplicates.

use super::types::{is_monotonic, Dataset};
use crate::error::Result;
use crate::page::{Page, Record, RecordLayout};
use crate::types::{DedupKey, MatchId};
use std::collections::HashSet;
use tracing::{debug, info};

/// Combines fetched pages with previously persisted data
#[derive(Debug, Clone)]
pub struct DatasetMerger {
    id_field: String,
    dedup: DedupKey,
}

impl DatasetMerger {
    /// Create a merger for the given layout and dedup key
    pub fn new(layout: &RecordLayout, dedup: DedupKey) -> Self {
        Self {
            id_field: layout.id_field.clone(),
            dedup,
        }
    }

    /// The configured dedup key
    pub fn dedup_key(&self) -> DedupKey {
        self.dedup
    }

    /// Merge `existing` (first, when present) and `pages` (in the order given).
    ///
    /// The result is sorted when the concatenation is not already ascending,
    /// deduplicated, and checked: a decreasing step is returned as
    /// [`crate::Error::OrderingViolation`] and nothing should be persisted.
    pub fn merge(&self, pages: Vec<Page>, existing: Option<Dataset>) -> Result<Dataset> {
        let mut records = existing.map(Dataset::into_records).unwrap_or_default();
        for page in pages {
            records.extend(page.into_records());
        }

        if !is_monotonic(&records) {
            info!("Index not monotonic, sorting {} rows", records.len());
            records.sort_by_key(|r| r.timestamp);
        }

        let before = records.len();
        let records = self.dedup(records)?;
        if records.len() < before {
            debug!(
                "Dropped {} duplicate rows ({:?} key)",
                before - records.len(),
                self.dedup
            );
        }

        Dataset::from_records(records)
    }

    /// Drop repeated rows, keeping the first occurrence
    fn dedup(&self, records: Vec<Record>) -> Result<Vec<Record>> {
        let mut seen_ids: HashSet<MatchId> = HashSet::new();
        let mut seen_rows: HashSet<String> = HashSet::new();
        let mut kept = Vec::with_capacity(records.len());

        for record in records {
            let fresh = match (self.dedup, record.id(&self.id_field)) {
                (DedupKey::Identifier, Some(id)) => seen_ids.insert(id),
                // Rows without an identifier can only be compared whole
                _ => seen_rows.insert(row_key(&record)?),
            };
            if fresh {
                kept.push(record);
            }
        }

        Ok(kept)
    }
}

/// Canonical text of a row: timestamp plus fields in key order
fn row_key(record: &Record) -> Result<String> {
    Ok(format!(
        "{}|{}",
        record.timestamp.timestamp(),
        serde_json::to_string(&record.fields)?
    ))
}
