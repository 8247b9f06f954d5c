//! CLI runner - executes a harvest run

use crate::cli::commands::{Cli, Mode};
use crate::config::HarvestConfig;
use crate::dataset::Dataset;
use crate::engine::Harvester;
use crate::error::Result;
use crate::fetch::ApiFetcher;
use crate::http::HttpClient;
use crate::types::OptionStringExt;
use tokio_util::sync::CancellationToken;
use tracing::Dispatch;

/// CLI runner
pub struct Runner {
    cli: Cli,
    dispatch: Option<Dispatch>,
    cancel: CancellationToken,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self {
            cli,
            dispatch: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Send run events to `dispatch`
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

    /// Resolve configuration from the file, the environment and the flags
    pub fn config(&self) -> Result<HarvestConfig> {
        self.config_with_env(|name| std::env::var(name).ok())
    }

    /// [`Self::config`] with an explicit environment lookup
    pub fn config_with_env<L>(&self, lookup: L) -> Result<HarvestConfig>
    where
        L: Fn(&str) -> Option<String>,
    {
        let config = match self.cli.config {
            Some(ref path) => HarvestConfig::from_file(path)?,
            None => HarvestConfig::default(),
        };
        let mut config = config.with_env_from(lookup);

        if let Some(key) = self.cli.api_key.clone().none_if_empty() {
            config.api_key = Some(key);
        }
        if let Some(ref dir) = self.cli.data_dir {
            config.output.data_dir = dir.clone();
        }
        if let Some(max_retry) = self.cli.max_retry {
            config.http.max_retry = max_retry;
        }
        if self.cli.parquet {
            config.output.parquet = true;
        }

        config.validate()?;
        Ok(config)
    }

    /// Run the selected driver and return the persisted dataset
    pub async fn run(&self) -> Result<Dataset> {
        let config = self.config()?;
        self.run_with_config(&config).await
    }

    /// Run the selected driver with an already resolved configuration
    pub async fn run_with_config(&self, config: &HarvestConfig) -> Result<Dataset> {
        let client = HttpClient::with_config(config.http_client_config())?;
        let fetcher = ApiFetcher::new(client, &config.endpoint)?
            .with_api_key(config.api_key.clone())
            .with_cursor_param(&config.cursor_param);

        let store = config.dataset_store(&self.cli.file_name);
        let mut harvester = Harvester::new(fetcher, store)
            .with_config(config.driver_config())
            .with_cancellation(self.cancel.clone());
        if let Some(ref dispatch) = self.dispatch {
            harvester = harvester.with_dispatch(dispatch.clone());
        }

        let max_calls = self.cli.max_api_call;
        match self.cli.mode() {
            Mode::Update => harvester.update(max_calls).await,
            Mode::Backfill { resume } => harvester.backfill(max_calls, resume).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use clap::Parser;
    use std::io::Write;
    use std::path::PathBuf;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("match-harvest").chain(args.iter().copied())).unwrap()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_parse_defaults() {
        let cli = parse(&["matches.csv"]);
        assert_eq!(cli.file_name, "matches.csv");
        assert_eq!(cli.max_api_call, 1000);
        assert_eq!(cli.mode(), Mode::Backfill { resume: false });
        assert!(!cli.parquet);
    }

    #[test]
    fn test_parse_modes() {
        assert_eq!(parse(&["m.csv", "--update-data"]).mode(), Mode::Update);
        assert_eq!(
            parse(&["m.csv", "--start-from-prev"]).mode(),
            Mode::Backfill { resume: true }
        );
        assert_eq!(
            parse(&["m.csv", "--update_data", "--max_api_call", "5"]).mode(),
            Mode::Update
        );
    }

    #[test]
    fn test_update_conflicts_with_resume() {
        let result = Cli::try_parse_from(["match-harvest", "m.csv", "--update-data", "--start-from-prev"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_flags_override() {
        let cli = parse(&[
            "m.csv",
            "--data-dir",
            "/tmp/out",
            "--max-retry",
            "2",
            "--parquet",
        ]);
        let config = Runner::new(cli).config_with_env(no_env).unwrap();

        assert_eq!(config.output.data_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.http.max_retry, 2);
        assert!(config.output.parquet);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_api_key_precedence() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "api_key: from-file").unwrap();
        let path = file.path().to_string_lossy().into_owned();

        let env = |name: &str| (name == "MATCH_HARVEST_API_KEY").then(|| "from-env".to_string());

        let runner = Runner::new(parse(&["m.csv", "--config", &path]));
        assert_eq!(
            runner.config_with_env(no_env).unwrap().api_key.as_deref(),
            Some("from-file")
        );
        assert_eq!(
            runner.config_with_env(env).unwrap().api_key.as_deref(),
            Some("from-env")
        );

        let runner = Runner::new(parse(&["m.csv", "--config", &path, "--api-key", "from-flag"]));
        assert_eq!(
            runner.config_with_env(env).unwrap().api_key.as_deref(),
            Some("from-flag")
        );
    }

    #[test]
    fn test_missing_config_file() {
        let runner = Runner::new(parse(&["m.csv", "-C", "/nonexistent/harvest.yaml"]));
        assert!(matches!(
            runner.config_with_env(no_env),
            Err(Error::Config { .. })
        ));
    }
}
