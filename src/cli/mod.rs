//! CLI module
//!
//! Command-line interface for harvest runs.
//!
//! # Modes
//!
//! - default - Backfill from the newest page backwards
//! - `--start-from-prev` - Continue a backfill below the oldest persisted row
//! - `--update-data` - Fetch forward until reaching persisted data

mod commands;
mod runner;

pub use commands::{Cli, Mode};
pub use runner::Runner;
