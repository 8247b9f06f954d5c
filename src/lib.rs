// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # match-harvest
//!
//! Incremental harvester for a paginated, rate-limited match history API.
//!
//! ## Features
//!
//! - **Backfill**: Walk backwards through history with a "strictly older
//!   than" cursor, resuming below the oldest persisted row if asked
//! - **Incremental Update**: Walk forward from the newest page until a
//!   persisted identifier is reached
//! - **Retry & Rate Limiting**: Fixed-backoff retries per page and
//!   client-side pacing
//! - **Ordered Datasets**: Merged output is ascending by timestamp and
//!   deduplicated, written atomically as CSV (plus an optional Parquet
//!   export of the cleaned projection)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use match_harvest::{ApiFetcher, DatasetStore, Harvester, HttpClient, RecordLayout, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let fetcher = ApiFetcher::new(HttpClient::new()?, match_harvest::fetch::DEFAULT_ENDPOINT)?;
//!     let store = DatasetStore::new("data/matches.csv", RecordLayout::default());
//!
//!     let mut harvester = Harvester::new(fetcher, store);
//!     harvester.backfill(100, false).await?;
//!     harvester.update(10).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Harvester                              │
//! │  backfill(max_calls, resume) → Dataset   update(max_calls)      │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌───────────┬──────────────┬───┴──────────┬─────────────────────┐
//! │   Fetch   │     Page     │   Dataset    │       Output        │
//! ├───────────┼──────────────┼──────────────┼─────────────────────┤
//! │ Cursor    │ Decode       │ Merge        │ CSV (arrow)         │
//! │ Retry     │ Reverse      │ Sort         │ Clean projection    │
//! │ Rate Limit│ Set index    │ Dedup        │ Parquet             │
//! │ API key   │              │              │ Lock file           │
//! └───────────┴──────────────┴──────────────┴─────────────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types for the crate
pub mod error;

/// Common types and type aliases
pub mod types;

/// HTTP client with retry and rate limiting
pub mod http;

/// Paginated page fetching
pub mod fetch;

/// Records, pages and page normalization
pub mod page;

/// Ordered datasets and merging
pub mod dataset;

/// CSV/Parquet persistence
pub mod output;

/// Backfill and update drivers
pub mod engine;

/// Run configuration
pub mod config;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use config::HarvestConfig;
pub use dataset::{Dataset, DatasetMerger};
pub use engine::{DriverConfig, FetchOutcome, Harvester};
pub use fetch::{ApiFetcher, PageFetcher};
pub use http::HttpClient;
pub use output::{DatasetLock, DatasetStore};
pub use page::{Page, Record, RecordLayout};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
