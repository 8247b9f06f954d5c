//! Engine types
//!
//! Per-iteration fetch outcomes, driver configuration and run statistics.

use crate::error::{Error, Result};
use crate::page::{normalize, Page, RawPage};
use crate::types::{DedupKey, MatchId, UpdateExhaustion};

/// Default attempts per page request
pub const DEFAULT_MAX_RETRY: u32 = 10;

/// Result of one fetch-and-normalize step in a driver loop
#[derive(Debug)]
pub enum FetchOutcome {
    /// A normalized page, possibly empty
    Fetched(Page),
    /// The retry budget ran out for this cursor
    Exhausted {
        /// Cursor of the failed request
        cursor: Option<MatchId>,
        /// Attempts made
        attempts: u32,
    },
    /// Anything else: decoding, schema or configuration failures
    Fatal(Error),
}

impl FetchOutcome {
    /// Classify a fetch result, normalizing the page on success
    pub fn from_fetch(result: Result<RawPage>, time_field: &str) -> Self {
        match result {
            Ok(raw) => match normalize(raw, time_field) {
                Ok(page) => Self::Fetched(page),
                Err(e) => Self::Fatal(e),
            },
            Err(Error::RetryExhausted { cursor, attempts }) => Self::Exhausted { cursor, attempts },
            Err(e) => Self::Fatal(e),
        }
    }
}

/// Why a driver loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopReason {
    /// The call budget was used up
    #[default]
    MaxCalls,
    /// A page could not be fetched within the retry budget
    Exhausted,
    /// The upstream returned no rows
    EmptyPage,
    /// A fetched identifier is already persisted
    Overlap,
    /// The run was cancelled
    Cancelled,
}

/// Configuration shared by the backfill and update drivers
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Attempts per page request
    pub max_retry: u32,
    /// Duplicate detection for the merge
    pub dedup: DedupKey,
    /// Reaction of the update driver to an unreachable upstream
    pub update_exhaustion: UpdateExhaustion,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            max_retry: DEFAULT_MAX_RETRY,
            dedup: DedupKey::default(),
            update_exhaustion: UpdateExhaustion::default(),
        }
    }
}

impl DriverConfig {
    /// Create a new driver config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set attempts per page request
    #[must_use]
    pub fn with_max_retry(mut self, max_retry: u32) -> Self {
        self.max_retry = max_retry;
        self
    }

    /// Set the dedup key
    #[must_use]
    pub fn with_dedup(mut self, dedup: DedupKey) -> Self {
        self.dedup = dedup;
        self
    }

    /// Set the update exhaustion policy
    #[must_use]
    pub fn with_update_exhaustion(mut self, policy: UpdateExhaustion) -> Self {
        self.update_exhaustion = policy;
        self
    }
}

/// Statistics from one driver run
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Pages fetched, empty ones included
    pub pages_fetched: usize,
    /// Rows across all fetched pages
    pub rows_fetched: usize,
    /// Rows in the merged dataset
    pub rows_total: usize,
    /// Rows in the cleaned projection
    pub rows_clean: usize,
    /// Why the loop stopped
    pub stop_reason: StopReason,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl RunStats {
    /// Create new stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fetched page
    pub fn add_page(&mut self, rows: usize) {
        self.pages_fetched += 1;
        self.rows_fetched += rows;
    }

    /// Record why the loop stopped
    pub fn stop(&mut self, reason: StopReason) {
        self.stop_reason = reason;
    }

    /// Set duration
    pub fn set_duration(&mut self, ms: u64) {
        self.duration_ms = ms;
    }
}
