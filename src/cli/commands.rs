//! CLI commands and argument parsing

use clap::Parser;
use std::path::PathBuf;

/// Harvest professional match history into a local dataset
#[derive(Parser, Debug)]
#[command(name = "match-harvest")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Dataset file name inside the data directory
    pub file_name: String,

    /// Fetch new matches forward into an existing dataset
    #[arg(long, alias = "update_data", conflicts_with = "start_from_prev")]
    pub update_data: bool,

    /// Continue a backfill below the oldest persisted match
    #[arg(long, alias = "start_from_prev")]
    pub start_from_prev: bool,

    /// Maximum number of page requests for this run
    #[arg(long, alias = "max_api_call", default_value_t = 1000)]
    pub max_api_call: u32,

    /// Directory holding the datasets [default: data]
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Configuration file (YAML)
    #[arg(short = 'C', long)]
    pub config: Option<PathBuf>,

    /// API key (overrides MATCH_HARVEST_API_KEY and the config file)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Attempts per page request
    #[arg(long)]
    pub max_retry: Option<u32>,

    /// Also export the cleaned dataset as Parquet
    #[arg(long)]
    pub parquet: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

/// Which driver a run uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Walk backwards through history
    Backfill {
        /// Continue below the oldest persisted row
        resume: bool,
    },
    /// Fetch forward until reaching persisted data
    Update,
}

impl Cli {
    /// The driver selected by the flags
    pub fn mode(&self) -> Mode {
        if self.update_data {
            Mode::Update
        } else {
            Mode::Backfill {
                resume: self.start_from_prev,
            }
        }
    }
}
