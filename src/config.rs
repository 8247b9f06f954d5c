//! Configuration types for harvest runs
//!
//! A run is configured from an optional YAML file, the
//! `MATCH_HARVEST_API_KEY` environment variable and command-line flags,
//! in increasing order of precedence.

use crate::engine::{DriverConfig, DEFAULT_MAX_RETRY};
use crate::error::{Error, Result};
use crate::fetch::{DEFAULT_CURSOR_PARAM, DEFAULT_ENDPOINT};
use crate::http::{HttpClientConfig, RateLimiterConfig, RetryPolicy};
use crate::output::{DatasetStore, ParquetWriterConfig, DEFAULT_REQUIRED_INT_FIELDS};
use crate::page::RecordLayout;
use crate::types::{BackoffType, DedupKey, OptionStringExt, UpdateExhaustion};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Environment variable holding the API key
pub const API_KEY_ENV: &str = "MATCH_HARVEST_API_KEY";

// ============================================================================
// Top-Level Harvest Config
// ============================================================================

/// Complete harvest configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// Paginated endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// API key sent as the `api_key` query parameter
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Query parameter carrying the cursor
    #[serde(default = "default_cursor_param")]
    pub cursor_param: String,

    /// HTTP client configuration
    #[serde(default)]
    pub http: HttpConfig,

    /// Index and identity columns
    #[serde(default)]
    pub layout: RecordLayout,

    /// Merge behavior
    #[serde(default)]
    pub merge: MergeConfig,

    /// Where and how datasets are written
    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
            cursor_param: default_cursor_param(),
            http: HttpConfig::default(),
            layout: RecordLayout::default(),
            merge: MergeConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_cursor_param() -> String {
    DEFAULT_CURSOR_PARAM.to_string()
}

// ============================================================================
// HTTP Config
// ============================================================================

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Attempts per page request
    #[serde(default = "default_max_retry")]
    pub max_retry: u32,

    /// Delay between attempts
    #[serde(default)]
    pub retry_backoff: BackoffConfig,

    /// Client-side request pacing; `null` disables it
    #[serde(default = "default_rate_limit")]
    pub rate_limit: Option<RateLimiterConfig>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            max_retry: default_max_retry(),
            retry_backoff: BackoffConfig::default(),
            rate_limit: default_rate_limit(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_max_retry() -> u32 {
    DEFAULT_MAX_RETRY
}

fn default_rate_limit() -> Option<RateLimiterConfig> {
    Some(RateLimiterConfig::default())
}

/// Backoff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Type of backoff
    #[serde(rename = "type", default)]
    pub backoff_type: BackoffType,

    /// Delay after the first failure in milliseconds
    #[serde(default = "default_initial_ms")]
    pub initial_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            backoff_type: BackoffType::Constant,
            initial_ms: default_initial_ms(),
            max_ms: default_max_ms(),
        }
    }
}

fn default_initial_ms() -> u64 {
    1000
}

fn default_max_ms() -> u64 {
    60000
}

// ============================================================================
// Merge & Output Config
// ============================================================================

/// Merge behavior
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeConfig {
    /// What makes two rows duplicates
    #[serde(default)]
    pub dedup: DedupKey,

    /// Update reaction to an unreachable upstream
    #[serde(default)]
    pub update_exhaustion: UpdateExhaustion,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory holding the datasets
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Fields the cleaned dataset requires as integers
    #[serde(default = "default_required_int_fields")]
    pub required_int_fields: Vec<String>,

    /// Also export the cleaned dataset as Parquet
    #[serde(default)]
    pub parquet: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            required_int_fields: default_required_int_fields(),
            parquet: false,
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_required_int_fields() -> Vec<String> {
    DEFAULT_REQUIRED_INT_FIELDS
        .iter()
        .map(|f| (*f).to_string())
        .collect()
}

// ============================================================================
// Loading & Derived Settings
// ============================================================================

impl HarvestConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Override the API key with `MATCH_HARVEST_API_KEY` when it is set
    #[must_use]
    pub fn with_env(self) -> Self {
        self.with_env_from(|name| std::env::var(name).ok())
    }

    /// [`Self::with_env`] with an explicit variable lookup
    #[must_use]
    pub fn with_env_from<L>(mut self, lookup: L) -> Self
    where
        L: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(API_KEY_ENV).none_if_empty() {
            self.api_key = Some(key);
        }
        self
    }

    /// Check invariants serde cannot express
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.endpoint)?;

        if self.layout.time_field.is_empty() || self.layout.id_field.is_empty() {
            return Err(Error::config("layout fields must not be empty"));
        }
        if self.layout.time_field == self.layout.id_field {
            return Err(Error::config("time_field and id_field must differ"));
        }
        if self.cursor_param.is_empty() {
            return Err(Error::missing_field("cursor_param"));
        }
        if let Some(ref limit) = self.http.rate_limit {
            if limit.requests_per_minute == 0 {
                return Err(Error::config("rate_limit.requests_per_minute must be positive"));
            }
        }

        Ok(())
    }

    /// Retry policy for page requests
    pub fn retry_policy(&self) -> RetryPolicy {
        let backoff = &self.http.retry_backoff;
        RetryPolicy::fixed(self.http.max_retry, Duration::from_millis(backoff.initial_ms))
            .with_backoff(
                backoff.backoff_type,
                Duration::from_millis(backoff.initial_ms),
                Duration::from_millis(backoff.max_ms),
            )
    }

    /// HTTP client settings
    pub fn http_client_config(&self) -> HttpClientConfig {
        let builder = HttpClientConfig::builder()
            .timeout(Duration::from_secs(self.http.timeout_seconds))
            .retry(self.retry_policy());

        let builder = match self.http.rate_limit {
            Some(ref limit) => builder.rate_limit(limit.clone()),
            None => builder.no_rate_limit(),
        };
        builder.build()
    }

    /// Driver settings
    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig::new()
            .with_max_retry(self.http.max_retry)
            .with_dedup(self.merge.dedup)
            .with_update_exhaustion(self.merge.update_exhaustion)
    }

    /// Store for `file_name` inside the data directory
    pub fn dataset_store(&self, file_name: &str) -> DatasetStore {
        let parquet = self.output.parquet.then(ParquetWriterConfig::default);
        DatasetStore::new(self.output.data_dir.join(file_name), self.layout.clone())
            .with_required_int_fields(self.output.required_int_fields.clone())
            .with_parquet_export(parquet)
    }
}
