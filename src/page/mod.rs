//! Page module
//!
//! Record and page types plus the normalizer that turns an upstream
//! (newest-first) response into an oldest-first [`Page`].

mod normalize;
mod types;

pub use normalize::{decode_raw_page, normalize};
pub use types::{Page, RawPage, Record, RecordLayout};
