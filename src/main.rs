// Allow common clippy pedantic lints
#![allow(clippy::must_use_candidate)]

//! match-harvest CLI
//!
//! Backfills or updates a local dataset of professional matches

use clap::Parser;
use match_harvest::cli::{Cli, Runner};
use tokio_util::sync::CancellationToken;
use tracing::Dispatch;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let dispatch = Dispatch::new(tracing_subscriber::fmt().with_env_filter(filter).finish());

    // Ctrl-C lets the current page finish, then persists what was fetched
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let runner = Runner::new(cli)
        .with_dispatch(dispatch)
        .with_cancellation(cancel);

    if let Err(e) = runner.run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
