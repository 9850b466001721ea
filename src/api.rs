//! HTTP access to the article search and comments endpoints.
//!
//! The module uses a trait-based design so the pagination loops never talk to
//! `reqwest` directly:
//! - [`CommentSource`]: fetch one page of comments for an article
//! - [`ArticleSource`]: fetch one page of article search results
//! - [`NytClient`]: the real implementation of both over HTTP
//! - [`Throttled`]: decorator that waits a fixed delay before every call
//!
//! # Pacing
//!
//! The remote service enforces an undocumented rate limit, so every comments
//! request (and every search request) is preceded by a fixed pause. There is
//! no backoff: failures are classified and handled by the callers.

use crate::config::HarvestConfig;
use crate::error::FetchError;
use crate::models::{CommentsResponse, PageBatch, SearchPage, SearchResponse};
use crate::params::{SearchQuery, Sort};
use crate::utils::{encode_article_url, looks_truncated, truncate_for_log, JsonpUnwrapper};
use reqwest::StatusCode;
use std::error::Error;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

/// A source of comment pages for a single article.
pub trait CommentSource {
    /// Fetch the page of comments starting at `offset` for `article_url`.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] describing how the request failed; the caller
    /// decides from its severity whether to skip the article or abort.
    async fn fetch_page(&self, article_url: &str, offset: u32) -> Result<PageBatch, FetchError>;
}

/// A source of article search result pages.
pub trait ArticleSource {
    /// Fetch search results page `page` for `query`.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] if the request failed or the body did not decode.
    async fn search_page(&self, query: &SearchQuery, page: i32) -> Result<SearchPage, FetchError>;
}

/// Wrapper that imposes a fixed delay before every request of the wrapped source.
pub struct Throttled<T> {
    /// The underlying source.
    inner: T,
    /// Pause before each comments page.
    comment_delay: Duration,
    /// Pause before each search page.
    search_delay: Duration,
}

impl<T> Throttled<T> {
    pub fn new(inner: T, comment_delay: Duration, search_delay: Duration) -> Self {
        Self {
            inner,
            comment_delay,
            search_delay,
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl<T> fmt::Debug for Throttled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Throttled")
            .field("comment_delay", &self.comment_delay)
            .field("search_delay", &self.search_delay)
            .finish()
    }
}

impl<T> CommentSource for Throttled<T>
where
    T: CommentSource,
{
    async fn fetch_page(&self, article_url: &str, offset: u32) -> Result<PageBatch, FetchError> {
        sleep(self.comment_delay).await;
        self.inner.fetch_page(article_url, offset).await
    }
}

impl<T> ArticleSource for Throttled<T>
where
    T: ArticleSource,
{
    async fn search_page(&self, query: &SearchQuery, page: i32) -> Result<SearchPage, FetchError> {
        sleep(self.search_delay).await;
        self.inner.search_page(query, page).await
    }
}

/// HTTP client for the article search and comments endpoints.
#[derive(Debug, Clone)]
pub struct NytClient {
    http: reqwest::Client,
    search_url: String,
    comments_url: String,
    jsonp: JsonpUnwrapper,
}

impl NytClient {
    /// Build a client for the endpoints in `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized or the
    /// configured callback name cannot be turned into a pattern.
    pub fn new(config: &HarvestConfig) -> Result<Self, Box<dyn Error>> {
        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            search_url: config.search_url.clone(),
            comments_url: config.comments_url.clone(),
            jsonp: JsonpUnwrapper::new(&config.comments_callback)?,
        })
    }

    /// Build a client wrapped in the configured request pacing.
    ///
    /// # Errors
    ///
    /// See [`NytClient::new`].
    pub fn throttled(config: &HarvestConfig) -> Result<Throttled<Self>, Box<dyn Error>> {
        Ok(Throttled::new(
            Self::new(config)?,
            config.comment_delay(),
            config.search_delay(),
        ))
    }

    /// Full request URL for one comments page.
    ///
    /// The article URL is embedded by hand rather than through the query
    /// builder, since the endpoint wants it encoded twice.
    pub fn comments_page_url(&self, article_url: &str, offset: u32) -> String {
        let sep = if self.comments_url.contains('?') { '&' } else { '?' };
        format!(
            "{}{}url={}&offset={}&sort={}",
            self.comments_url,
            sep,
            encode_article_url(article_url),
            offset,
            Sort::Newest
        )
    }

    /// Unwrap and decode one comments response body.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Malformed`] if the body is not wrapped in the
    /// expected callback or the payload is not valid JSON.
    pub fn decode_comments_body(&self, body: &str) -> Result<PageBatch, FetchError> {
        let Some(json) = self.jsonp.unwrap(body) else {
            return Err(FetchError::Malformed(format!(
                "body is not wrapped in the comments callback: {}",
                truncate_for_log(body, 120)
            )));
        };
        let resp: CommentsResponse = serde_json::from_str(json).map_err(|e| {
            if looks_truncated(&e) {
                warn!(error = %e, bytes = json.len(), "Comments payload looks truncated");
            }
            FetchError::from(e)
        })?;
        Ok(PageBatch::from(resp))
    }
}

impl CommentSource for NytClient {
    #[instrument(level = "debug", skip(self))]
    async fn fetch_page(&self, article_url: &str, offset: u32) -> Result<PageBatch, FetchError> {
        let t0 = Instant::now();
        let url = self.comments_page_url(article_url, offset);
        let body = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let batch = self.decode_comments_body(&body)?;
        debug!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            status = %batch.status,
            returned = batch.total_comments_returned,
            replies = batch.total_reply_comments_returned,
            found = batch.total_comments_found,
            "Fetched comments page"
        );
        Ok(batch)
    }
}

impl ArticleSource for NytClient {
    #[instrument(level = "debug", skip(self, query))]
    async fn search_page(&self, query: &SearchQuery, page: i32) -> Result<SearchPage, FetchError> {
        let resp = self
            .http
            .get(&self.search_url)
            .query(&query.to_params(page))
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            let page = serde_json::from_str::<SearchResponse>(&body)
                .ok()
                .map(SearchPage::from);
            return Ok(match page {
                Some(quota @ SearchPage::QuotaExhausted(_)) => quota,
                _ => SearchPage::QuotaExhausted(format!("{status} from article search")),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Http(format!(
                "{status} from article search: {}",
                truncate_for_log(&body, 120)
            )));
        }

        let resp: SearchResponse = serde_json::from_str(&body)?;
        Ok(SearchPage::from(resp))
    }
}
