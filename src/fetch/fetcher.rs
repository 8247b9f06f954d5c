//! Paginated fetcher
//!
//! One call returns one upstream page, optionally bounded by a
//! "strictly older than this identifier" cursor.

use crate::error::{Error, Result};
use crate::http::{HttpClient, RequestConfig};
use crate::page::{decode_raw_page, RawPage};
use crate::types::MatchId;
use async_trait::async_trait;
use tracing::{debug, error};
use url::Url;

/// Default endpoint for professional match history
pub const DEFAULT_ENDPOINT: &str = "https://api.opendota.com/api/proMatches";

/// Default query parameter carrying the cursor
pub const DEFAULT_CURSOR_PARAM: &str = "less_than_match_id";

/// Source of upstream pages
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch the newest page of records strictly older than `cursor`
    /// (or the newest page overall when `cursor` is `None`).
    ///
    /// Transient failures are retried up to `max_retry` attempts in total;
    /// past that the call fails with [`Error::RetryExhausted`].
    async fn fetch(&self, cursor: Option<MatchId>, max_retry: u32) -> Result<RawPage>;
}

/// [`PageFetcher`] backed by the upstream HTTP API
pub struct ApiFetcher {
    client: HttpClient,
    endpoint: Url,
    api_key: Option<String>,
    cursor_param: String,
}

impl ApiFetcher {
    /// Create a fetcher for `endpoint`
    pub fn new(client: HttpClient, endpoint: &str) -> Result<Self> {
        Ok(Self {
            client,
            endpoint: Url::parse(endpoint)?,
            api_key: None,
            cursor_param: DEFAULT_CURSOR_PARAM.to_string(),
        })
    }

    /// Send `api_key` with every request
    #[must_use]
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    /// Use a different query parameter for the cursor
    #[must_use]
    pub fn with_cursor_param(mut self, param: impl Into<String>) -> Self {
        self.cursor_param = param.into();
        self
    }

    /// The endpoint being paged
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Query parameters and retry budget for one page request
    fn request_config(&self, cursor: Option<MatchId>, max_retry: u32) -> RequestConfig {
        let retry = self.client.config().retry.with_max_attempts(max_retry);
        let mut config = RequestConfig::new().retry(retry);

        if let Some(ref key) = self.api_key {
            config = config.query("api_key", key);
        }
        if let Some(id) = cursor {
            config = config.query(&self.cursor_param, id.to_string());
        }

        config
    }
}

impl std::fmt::Debug for ApiFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiFetcher")
            .field("endpoint", &self.endpoint.as_str())
            .field("has_api_key", &self.api_key.is_some())
            .field("cursor_param", &self.cursor_param)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl PageFetcher for ApiFetcher {
    async fn fetch(&self, cursor: Option<MatchId>, max_retry: u32) -> Result<RawPage> {
        let config = self.request_config(cursor, max_retry);

        match self.client.get_json(self.endpoint.as_str(), &config).await {
            Ok(body) => {
                let page = decode_raw_page(body)?;
                debug!("Fetched {} rows before {:?}", page.len(), cursor);
                Ok(page)
            }
            Err(Error::MaxRetriesExceeded { attempts }) => {
                let err = Error::RetryExhausted { cursor, attempts };
                error!("{err}");
                Err(err)
            }
            Err(e) => Err(e),
        }
    }
}
