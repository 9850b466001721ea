//! Endpoint and pacing configuration.
//!
//! All service constants live in [`HarvestConfig`] and are handed to the
//! client when it is built. The configuration can be loaded from an optional
//! YAML file; any key left out keeps its default.
//!
//! ```yaml
//! comments_url: "https://www.nytimes.com/svc/community/V3/requestHandler?callback=NYTD.commentsInstance.drawComments&method=&cmd=GetCommentsAll"
//! comment_delay_ms: 1000
//! max_transient_failures: 4
//! ```

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::time::Duration;
use tracing::{info, instrument};

/// Article search endpoint.
pub const DEFAULT_SEARCH_URL: &str = "https://api.nytimes.com/svc/search/v2/articlesearch.json";

/// Comments endpoint; `url`, `offset` and `sort` are appended per request.
pub const DEFAULT_COMMENTS_URL: &str = "http://www.nytimes.com/svc/community/V3/requestHandler?callback=NYTD.commentsInstance.drawComments&method=&cmd=GetCommentsAll";

/// Callback name wrapping every comments payload.
pub const DEFAULT_COMMENTS_CALLBACK: &str = "NYTD.commentsInstance.drawComments";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HarvestConfig {
    pub search_url: String,
    pub comments_url: String,
    pub comments_callback: String,
    /// Comments per page; the offset advances by this much per call.
    pub comments_page_size: u32,
    /// Pause before every comments request.
    pub comment_delay_ms: u64,
    /// Pause before every search request.
    pub search_delay_ms: u64,
    /// Consecutive transient failures tolerated before a run is aborted.
    pub max_transient_failures: u32,
    /// Exclusive upper bound on search pages the service will serve.
    pub max_search_page: i32,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            search_url: DEFAULT_SEARCH_URL.to_string(),
            comments_url: DEFAULT_COMMENTS_URL.to_string(),
            comments_callback: DEFAULT_COMMENTS_CALLBACK.to_string(),
            comments_page_size: 25,
            comment_delay_ms: 1000,
            search_delay_ms: 1000,
            max_transient_failures: 4,
            max_search_page: 200,
        }
    }
}

impl HarvestConfig {
    pub fn comment_delay(&self) -> Duration {
        Duration::from_millis(self.comment_delay_ms)
    }

    pub fn search_delay(&self) -> Duration {
        Duration::from_millis(self.search_delay_ms)
    }

    /// Parse a configuration from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    /// Load the configuration from `path`, or the defaults when no path is given.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid YAML.
    #[instrument(level = "info")]
    pub async fn load(path: Option<&str>) -> Result<Self, Box<dyn Error>> {
        let Some(path) = path else {
            info!("No config file given; using built-in endpoints");
            return Ok(Self::default());
        };
        let text = tokio::fs::read_to_string(path).await?;
        let config = Self::from_yaml(&text)?;
        info!(path, "Loaded configuration");
        Ok(config)
    }
}
