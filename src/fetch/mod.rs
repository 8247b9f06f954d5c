//! Fetch module
//!
//! The [`PageFetcher`] seam between the drivers and the upstream API,
//! plus its HTTP implementation.

mod fetcher;

pub use fetcher::{ApiFetcher, PageFetcher, DEFAULT_CURSOR_PARAM, DEFAULT_ENDPOINT};

#[cfg(test)]
mod tests;
