//! Dataset module
//!
//! The durable, ascending, deduplicated record collection and the merger
//! that extends it with freshly fetched pages.

mod merge;
mod types;

pub use merge::DatasetMerger;
pub use types::Dataset;
