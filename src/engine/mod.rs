//! Execution engine module
//!
//! The backfill and incremental update drivers.
//!
//! # Overview
//!
//! The engine module provides:
//! - `Harvester` - Runs either driver against a fetcher and a dataset store
//! - `DriverConfig` - Retry budget, dedup key and update exhaustion policy
//! - `FetchOutcome` - Tri-state result of one loop iteration
//!
//! Both drivers fetch strictly sequentially: every cursor is derived from
//! the oldest row of the previous page. Pages are accumulated oldest-first,
//! merged once the loop ends, and only then written.

mod types;

pub use types::{DriverConfig, FetchOutcome, RunStats, StopReason, DEFAULT_MAX_RETRY};

use crate::dataset::{Dataset, DatasetMerger};
use crate::error::{Error, Result};
use crate::fetch::PageFetcher;
use crate::output::DatasetStore;
use crate::page::Page;
use crate::types::{format_timestamp, MatchId, UpdateExhaustion};
use std::collections::VecDeque;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::instrument::WithSubscriber;
use tracing::{debug, info, warn, Dispatch};

/// Drives fetch loops and persists their merged result
pub struct Harvester<F: PageFetcher> {
    /// Upstream page source
    fetcher: F,
    /// Persisted dataset
    store: DatasetStore,
    /// Page merger
    merger: DatasetMerger,
    /// Driver configuration
    config: DriverConfig,
    /// Subscriber every run is scoped to
    dispatch: Option<Dispatch>,
    /// Checked once per loop iteration
    cancel: CancellationToken,
    /// Statistics of the last run
    stats: RunStats,
}

impl<F: PageFetcher> Harvester<F> {
    /// Create a new harvester
    pub fn new(fetcher: F, store: DatasetStore) -> Self {
        let config = DriverConfig::default();
        Self {
            merger: DatasetMerger::new(store.layout(), config.dedup),
            fetcher,
            store,
            config,
            dispatch: None,
            cancel: CancellationToken::new(),
            stats: RunStats::default(),
        }
    }

    /// Set driver configuration
    #[must_use]
    pub fn with_config(mut self, config: DriverConfig) -> Self {
        self.merger = DatasetMerger::new(self.store.layout(), config.dedup);
        self.config = config;
        self
    }

    /// Send every event of a run to `dispatch`
    #[must_use]
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    /// Stop fetching once `token` is cancelled
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Get the dataset store
    pub fn store(&self) -> &DatasetStore {
        &self.store
    }

    /// Get the driver configuration
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Get statistics of the last run
    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Walk backwards through history for up to `max_calls` pages.
    ///
    /// With `resume_from_existing` the walk starts below the oldest
    /// persisted row and the persisted rows are kept; otherwise it starts
    /// from the newest upstream page and replaces the persisted dataset.
    /// Running out of retries ends the walk and keeps what was fetched.
    /// A fresh walk that fetched no page leaves a persisted dataset as is
    /// and returns it.
    pub async fn backfill(&mut self, max_calls: u32, resume_from_existing: bool) -> Result<Dataset> {
        match self.dispatch.clone() {
            Some(dispatch) => {
                self.run_backfill(max_calls, resume_from_existing)
                    .with_subscriber(dispatch)
                    .await
            }
            None => self.run_backfill(max_calls, resume_from_existing).await,
        }
    }

    /// Fetch forward from the newest upstream page until a persisted
    /// identifier is reached or `max_calls` pages were fetched, then
    /// merge into the persisted dataset.
    pub async fn update(&mut self, max_calls: u32) -> Result<Dataset> {
        match self.dispatch.clone() {
            Some(dispatch) => self.run_update(max_calls).with_subscriber(dispatch).await,
            None => self.run_update(max_calls).await,
        }
    }

    async fn run_backfill(&mut self, max_calls: u32, resume_from_existing: bool) -> Result<Dataset> {
        let start = Instant::now();
        self.stats = RunStats::new();
        let _lock = self.store.lock()?;
        let id_field = self.store.layout().id_field.clone();

        let mut cursor: Option<MatchId> = None;
        let mut pages: VecDeque<Page> = VecDeque::new();

        if resume_from_existing {
            let existing = self.store.load()?;
            cursor = existing.oldest_id(&id_field)?;
            info!(
                "Resuming backfill below {} from {} persisted rows",
                display_cursor(cursor),
                existing.len()
            );
            pages.push_back(Page::from_sorted(existing.into_records()));
        } else if self.store.exists() {
            info!(
                "Starting a fresh backfill; {} will be replaced once a page arrives",
                self.store.path().display()
            );
        }

        for call in 0..max_calls {
            if self.cancel.is_cancelled() {
                info!("Backfill cancelled after {call} calls");
                self.stats.stop(StopReason::Cancelled);
                break;
            }

            match self.fetch_page(cursor).await {
                FetchOutcome::Fetched(page) => {
                    self.stats.add_page(page.len());
                    if page.is_empty() {
                        info!("No rows below {}, reached start of history", display_cursor(cursor));
                        self.stats.stop(StopReason::EmptyPage);
                        break;
                    }
                    cursor = page.oldest_id(&id_field)?;
                    log_page(&page);
                    pages.push_front(page);
                }
                FetchOutcome::Exhausted { cursor: at, attempts } => {
                    warn!(
                        "Stopping backfill: {attempts} attempts failed below {}, keeping {} pages",
                        display_cursor(at),
                        pages.len()
                    );
                    self.stats.stop(StopReason::Exhausted);
                    break;
                }
                FetchOutcome::Fatal(e) => return Err(e),
            }
        }

        if pages.is_empty() && self.store.exists() {
            warn!(
                "No pages fetched; leaving {} untouched",
                self.store.path().display()
            );
            let existing = self.store.load()?;
            self.stats.rows_total = existing.len();
            self.finish(start);
            return Ok(existing);
        }

        let merged = self.merger.merge(pages.into(), None)?;
        self.persist(&merged)?;
        self.finish(start);
        Ok(merged)
    }

    async fn run_update(&mut self, max_calls: u32) -> Result<Dataset> {
        let start = Instant::now();
        self.stats = RunStats::new();
        let _lock = self.store.lock()?;
        let id_field = self.store.layout().id_field.clone();

        let existing = self.store.load()?;
        let known = existing.ids(&id_field);
        debug!("{} known identifiers", known.len());

        let mut cursor: Option<MatchId> = None;
        let mut pages: VecDeque<Page> = VecDeque::new();
        let mut reconnected = false;

        for call in 0..max_calls {
            if self.cancel.is_cancelled() {
                info!("Update cancelled after {call} calls");
                self.stats.stop(StopReason::Cancelled);
                break;
            }

            match self.fetch_page(cursor).await {
                FetchOutcome::Fetched(page) => {
                    self.stats.add_page(page.len());
                    if page.is_empty() {
                        info!("No rows below {}", display_cursor(cursor));
                        self.stats.stop(StopReason::EmptyPage);
                        break;
                    }
                    cursor = page.oldest_id(&id_field)?;
                    log_page(&page);
                    pages.push_front(page);

                    if let Some(id) = cursor.filter(|id| known.contains(id)) {
                        info!("Duplicate {id_field} hit at {id}, reached persisted data");
                        reconnected = true;
                        self.stats.stop(StopReason::Overlap);
                        break;
                    }
                }
                FetchOutcome::Exhausted { cursor: at, attempts } => {
                    match self.config.update_exhaustion {
                        UpdateExhaustion::Abort => {
                            return Err(Error::RetryExhausted { cursor: at, attempts });
                        }
                        UpdateExhaustion::KeepPartial => {
                            warn!(
                                "Stopping update: {attempts} attempts failed below {}",
                                display_cursor(at)
                            );
                            self.stats.stop(StopReason::Exhausted);
                            break;
                        }
                    }
                }
                FetchOutcome::Fatal(e) => return Err(e),
            }
        }

        if !reconnected && !existing.is_empty() {
            let newest = existing
                .time_range()
                .map(|(_, newest)| format_timestamp(&newest))
                .unwrap_or_default();
            warn!(
                "Did not reach persisted data after {} pages; a gap may remain after {newest}",
                self.stats.pages_fetched
            );
        }

        let merged = self.merger.merge(pages.into(), Some(existing))?;
        self.persist(&merged)?;
        self.finish(start);
        Ok(merged)
    }

    async fn fetch_page(&self, cursor: Option<MatchId>) -> FetchOutcome {
        let result = self.fetcher.fetch(cursor, self.config.max_retry).await;
        FetchOutcome::from_fetch(result, &self.store.layout().time_field)
    }

    fn persist(&mut self, dataset: &Dataset) -> Result<()> {
        self.stats.rows_total = self.store.save(dataset)?;
        self.stats.rows_clean = self.store.save_clean(dataset)?;
        Ok(())
    }

    fn finish(&mut self, start: Instant) {
        #[allow(clippy::cast_possible_truncation)]
        self.stats.set_duration(start.elapsed().as_millis() as u64);
        info!(
            "Run finished ({:?}): {} pages, {} rows fetched, {} rows total in {}ms",
            self.stats.stop_reason,
            self.stats.pages_fetched,
            self.stats.rows_fetched,
            self.stats.rows_total,
            self.stats.duration_ms
        );
    }
}

/// Log the rows a page adds
fn log_page(page: &Page) {
    if let Some((oldest, newest)) = page.time_range() {
        info!(
            "{} points added from {} to {}",
            page.len(),
            format_timestamp(&oldest),
            format_timestamp(&newest)
        );
    }
}

fn display_cursor(cursor: Option<MatchId>) -> String {
    cursor.map_or_else(|| "latest".to_string(), |id| id.to_string())
}
