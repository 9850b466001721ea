//! Batch orchestration across many articles.
//!
//! [`Harvester`] exposes the three public runs:
//! - [`Harvester::get_comments`]: comments for a caller-supplied list of article URLs
//! - [`Harvester::get_articles`]: article search results only
//! - [`Harvester::get_dataset`]: article search results plus the comments of each
//!   article, keeping only articles that have at least one comment
//!
//! Every run is sequential and returns a [`Dataset`] with whatever was
//! collected before it stopped; the reason is recorded in
//! [`Dataset::stop`] rather than raised.

use crate::api::{ArticleSource, CommentSource};
use crate::collector::{CollectOutcome, CommentCollector};
use crate::config::HarvestConfig;
use crate::error::{FetchError, StopReason};
use crate::interrupt::Interrupt;
use crate::models::{ArticleRecord, CommentRecord, Dataset, RawArticle, SearchPage};
use crate::normalize::{article_context, normalize_article, normalize_comment};
use crate::params::{SearchOptions, SearchQuery};
use std::ops::Range;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// Output caps for a run. A run stops once a running total reaches its cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caps {
    pub max_comments: usize,
    pub max_articles: usize,
}

impl Default for Caps {
    fn default() -> Self {
        Self {
            max_comments: 100_000,
            max_articles: 10_000,
        }
    }
}

impl Caps {
    fn check(&self, comments: usize, articles: usize) -> Option<StopReason> {
        if articles >= self.max_articles {
            info!(max_articles = self.max_articles, "Maximum limit for the articles reached; terminating retrieval");
            Some(StopReason::ArticleCap)
        } else if comments >= self.max_comments {
            info!(max_comments = self.max_comments, "Maximum limit for the comments reached; terminating retrieval");
            Some(StopReason::CommentCap)
        } else {
            None
        }
    }
}

enum PagerStep {
    Docs(Vec<RawArticle>),
    Stop(StopReason),
}

/// Walks the search pages of one query, absorbing transient failures up to
/// the configured tolerance.
struct SearchPager<'a, S> {
    source: &'a S,
    query: &'a SearchQuery,
    interrupt: &'a Interrupt,
    pages: Range<i32>,
    consecutive_failures: u32,
    max_failures: u32,
}

impl<'a, S> SearchPager<'a, S>
where
    S: ArticleSource,
{
    fn new(source: &'a S, query: &'a SearchQuery, interrupt: &'a Interrupt, max_failures: u32) -> Self {
        Self {
            source,
            query,
            interrupt,
            pages: query.pages(),
            consecutive_failures: 0,
            max_failures,
        }
    }

    async fn next(&mut self) -> PagerStep {
        loop {
            if self.interrupt.is_triggered() {
                return PagerStep::Stop(StopReason::Aborted(FetchError::Interrupted));
            }
            let Some(page) = self.pages.next() else {
                return PagerStep::Stop(StopReason::Completed);
            };
            info!(page, "Requesting search page");

            let result = tokio::select! {
                biased;
                _ = self.interrupt.triggered() => Err(FetchError::Interrupted),
                r = self.source.search_page(self.query, page) => r,
            };
            if self.interrupt.is_triggered() {
                warn!(page, "Retrieval interrupted");
                return PagerStep::Stop(StopReason::Aborted(FetchError::Interrupted));
            }

            match result {
                Ok(SearchPage::Docs(docs)) if docs.is_empty() => {
                    info!(page, "No articles found on page");
                    return PagerStep::Stop(StopReason::NoMoreResults);
                }
                Ok(SearchPage::Docs(docs)) => {
                    self.consecutive_failures = 0;
                    debug!(page, count = docs.len(), "Search page returned documents");
                    return PagerStep::Docs(docs);
                }
                Ok(SearchPage::QuotaExhausted(message)) => {
                    warn!(
                        %message,
                        "Article search quota exhausted for today; comments can still be fetched for known URLs"
                    );
                    return PagerStep::Stop(StopReason::QuotaExhausted(message));
                }
                Ok(SearchPage::NotOk(status)) => {
                    warn!(page, %status, "Search page returned a non-OK status; skipping page");
                }
                Err(e) if e.is_fatal() => {
                    error!(page, error = %e, "Retrieval interrupted");
                    return PagerStep::Stop(StopReason::Aborted(e));
                }
                Err(e) => {
                    self.consecutive_failures += 1;
                    if self.consecutive_failures > self.max_failures {
                        error!(page, error = %e, failures = self.consecutive_failures, "Retrieval is terminated due to repeated HTTP errors");
                        return PagerStep::Stop(StopReason::TooManyTransientFailures);
                    }
                    warn!(page, error = %e, failures = self.consecutive_failures, "Page is skipped; retrieval continues from the next page");
                }
            }
        }
    }
}

/// Runs harvests against a source using one configuration and interrupt.
pub struct Harvester<'a, S> {
    source: &'a S,
    config: &'a HarvestConfig,
    interrupt: &'a Interrupt,
}

impl<'a, S> Harvester<'a, S> {
    pub fn new(source: &'a S, config: &'a HarvestConfig, interrupt: &'a Interrupt) -> Self {
        Self {
            source,
            config,
            interrupt,
        }
    }

    fn build_query(&self, api_key: &str, opts: &SearchOptions) -> Result<SearchQuery, StopReason> {
        SearchQuery::build(api_key, opts, self.config.max_search_page).map_err(|e| {
            error!(error = %e, "Invalid search parameters; no articles or comments are returned");
            StopReason::Rejected(e)
        })
    }
}

impl<'a, S> Harvester<'a, S>
where
    S: CommentSource,
{
    /// Collect the comments of each URL in turn.
    ///
    /// Stops early on the comment cap or a fatal failure. URLs that do not
    /// parse are skipped.
    #[instrument(level = "info", skip_all, fields(urls = urls.len(), max_comments = max_comments))]
    pub async fn get_comments(&self, urls: &[String], max_comments: usize) -> Dataset {
        let collector = CommentCollector::new(self.source, self.interrupt, self.config.comments_page_size);
        let caps = Caps {
            max_comments,
            max_articles: usize::MAX,
        };
        let mut comments: Vec<CommentRecord> = Vec::new();

        let stop = 'urls: {
            for url in urls {
                if let Some(cap) = caps.check(comments.len(), 0) {
                    break 'urls cap;
                }
                if let Err(e) = Url::parse(url) {
                    warn!(%url, error = %e, "Not a valid article URL; skipping");
                    continue;
                }
                let collected = collector.collect(url).await;
                if let CollectOutcome::Aborted(e) = collected.outcome {
                    break 'urls StopReason::Aborted(e);
                }
                comments.extend(collected.comments.into_iter().map(|c| normalize_comment(c, None)));
            }
            StopReason::Completed
        };

        info!(total_comments = comments.len(), %stop, "Comment retrieval finished");
        Dataset {
            articles: Vec::new(),
            comments,
            stop,
        }
    }
}

impl<'a, S> Harvester<'a, S>
where
    S: ArticleSource,
{
    /// Collect article search results without comments.
    ///
    /// Multimedia documents are kept. The article cap is checked before each
    /// search page.
    #[instrument(level = "info", skip(self, api_key))]
    pub async fn get_articles(&self, api_key: &str, opts: &SearchOptions, max_articles: usize) -> Dataset {
        let query = match self.build_query(api_key, opts) {
            Ok(q) => q,
            Err(stop) => return Dataset::empty(stop),
        };
        let caps = Caps {
            max_comments: usize::MAX,
            max_articles,
        };
        let mut pager = SearchPager::new(self.source, &query, self.interrupt, self.config.max_transient_failures);
        let mut articles: Vec<ArticleRecord> = Vec::new();

        let stop = loop {
            if let Some(cap) = caps.check(0, articles.len()) {
                break cap;
            }
            match pager.next().await {
                PagerStep::Docs(docs) => {
                    for doc in &docs {
                        debug!(url = doc.web_url.as_deref().unwrap_or(""), "Article");
                        articles.push(normalize_article(doc));
                    }
                }
                PagerStep::Stop(reason) => break reason,
            }
        };

        info!(total_articles = articles.len(), %stop, "Article retrieval finished");
        Dataset {
            articles,
            comments: Vec::new(),
            stop,
        }
    }
}

impl<'a, S> Harvester<'a, S>
where
    S: ArticleSource + CommentSource,
{
    /// Collect articles together with their comments.
    ///
    /// Multimedia documents are ignored, and an article is stored only if at
    /// least one of its comments was retrieved. Each stored comment carries
    /// its article's id, section, desk, word count, print page and type.
    #[instrument(level = "info", skip(self, api_key))]
    pub async fn get_dataset(&self, api_key: &str, opts: &SearchOptions, caps: Caps) -> Dataset {
        let query = match self.build_query(api_key, opts) {
            Ok(q) => q,
            Err(stop) => return Dataset::empty(stop),
        };
        let collector = CommentCollector::new(self.source, self.interrupt, self.config.comments_page_size);
        let mut pager = SearchPager::new(self.source, &query, self.interrupt, self.config.max_transient_failures);
        let mut articles: Vec<ArticleRecord> = Vec::new();
        let mut comments: Vec<CommentRecord> = Vec::new();

        let stop = 'pages: loop {
            if let Some(cap) = caps.check(comments.len(), articles.len()) {
                break cap;
            }
            let docs = match pager.next().await {
                PagerStep::Docs(docs) => docs,
                PagerStep::Stop(reason) => break reason,
            };

            for doc in &docs {
                if let Some(cap) = caps.check(comments.len(), articles.len()) {
                    break 'pages cap;
                }
                if doc.is_multimedia() {
                    debug!(id = doc.id.as_deref().unwrap_or(""), "Skipping multimedia document");
                    continue;
                }
                let Some(url) = doc.web_url.as_deref() else {
                    warn!(id = doc.id.as_deref().unwrap_or(""), "Search document has no web_url; skipping");
                    continue;
                };

                let collected = collector.collect(url).await;
                if let CollectOutcome::Aborted(e) = collected.outcome {
                    break 'pages StopReason::Aborted(e);
                }
                if collected.comments.is_empty() {
                    continue;
                }

                let ctx = article_context(doc);
                comments.extend(
                    collected
                        .comments
                        .into_iter()
                        .map(|c| normalize_comment(c, Some(&ctx))),
                );
                articles.push(normalize_article(doc));
            }
        };

        info!(
            total_articles = articles.len(),
            total_comments = comments.len(),
            %stop,
            "Dataset retrieval finished"
        );
        Dataset {
            articles,
            comments,
            stop,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::testing::{
        article, comment, ok_batch, Scripted, ScriptedArticles, ScriptedComments,
    };
    use crate::models::PageBatch;
    use serde_json::json;

    const A: &str = "https://www.nytimes.com/2020/01/01/a.html";
    const B: &str = "https://www.nytimes.com/2020/01/01/b.html";
    const C: &str = "https://www.nytimes.com/2020/01/01/c.html";

    fn opts() -> SearchOptions {
        SearchOptions {
            begin_date: Some("20200101".into()),
            end_date: Some("20200131".into()),
            ..SearchOptions::default()
        }
    }

    fn page(ids: &[i64]) -> PageBatch {
        ok_batch(
            ids.iter()
                .map(|id| comment(json!({"commentID": id, "replyCount": 0})))
                .collect(),
        )
    }

    fn multimedia(id: &str, url: &str) -> RawArticle {
        RawArticle {
            document_type: Some("multimedia".into()),
            ..article(id, url)
        }
    }

    fn http_err() -> Result<SearchPage, FetchError> {
        Err(FetchError::Http("503 Service Unavailable".into()))
    }

    #[tokio::test]
    async fn test_empty_search_page_stops_immediately() {
        let source = Scripted {
            articles: ScriptedArticles::new(vec![Ok(SearchPage::Docs(vec![]))]),
            comments: ScriptedComments::new(),
        };
        let config = HarvestConfig::default();
        let interrupt = Interrupt::new();
        let data = Harvester::new(&source, &config, &interrupt)
            .get_dataset("key", &opts(), Caps::default())
            .await;

        assert_eq!(data.stop, StopReason::NoMoreResults);
        assert!(data.is_empty());
        assert_eq!(source.articles.requested.borrow().len(), 1);
        assert_eq!(source.comments.call_count(), 0);
    }

    #[tokio::test]
    async fn test_reversed_dates_rejected_before_any_request() {
        let source = Scripted {
            articles: ScriptedArticles::new(vec![Ok(SearchPage::Docs(vec![article("a", A)]))]),
            comments: ScriptedComments::new(),
        };
        let config = HarvestConfig::default();
        let interrupt = Interrupt::new();
        let bad = SearchOptions {
            begin_date: Some("20200601".into()),
            end_date: Some("20200101".into()),
            ..SearchOptions::default()
        };
        let data = Harvester::new(&source, &config, &interrupt)
            .get_dataset("key", &bad, Caps::default())
            .await;

        assert!(matches!(data.stop, StopReason::Rejected(ValidationError::DateOrder { .. })));
        assert!(data.is_empty());
        assert!(source.articles.requested.borrow().is_empty());
        assert_eq!(source.comments.call_count(), 0);
    }

    #[tokio::test]
    async fn test_dataset_keeps_only_articles_with_comments() {
        let source = Scripted {
            articles: ScriptedArticles::new(vec![Ok(SearchPage::Docs(vec![
                multimedia("m", C),
                article("a", A),
                article("b", B),
            ]))]),
            comments: ScriptedComments::new().script(
                A,
                vec![Ok(ok_batch(vec![comment(json!({
                    "commentID": 1,
                    "replyCount": 1,
                    "replies": [{"commentID": 2, "replyCount": 0}]
                }))]))],
            ),
        };
        let config = HarvestConfig::default();
        let interrupt = Interrupt::new();
        let data = Harvester::new(&source, &config, &interrupt)
            .get_dataset("key", &opts(), Caps::default())
            .await;

        assert_eq!(data.stop, StopReason::NoMoreResults);
        assert_eq!(data.articles.len(), 1);
        assert_eq!(data.articles[0].article_id, "a");
        assert_eq!(data.comments.len(), 2);
        assert!(data.comments.iter().all(|c| c.article_id == "a" && c.section_name == "World"));
        assert_eq!(data.comments[1].in_reply_to, 1);

        let fetched: Vec<String> = source.comments.calls.borrow().iter().map(|(u, _)| u.clone()).collect();
        assert!(!fetched.iter().any(|u| u == C));
        assert!(fetched.iter().any(|u| u == B));
    }

    #[tokio::test]
    async fn test_transient_failures_within_tolerance_skip_pages() {
        let source = ScriptedArticles::new(vec![
            http_err(),
            http_err(),
            http_err(),
            http_err(),
            Ok(SearchPage::Docs(vec![article("a", A)])),
            http_err(),
            Ok(SearchPage::Docs(vec![])),
        ]);
        let config = HarvestConfig::default();
        let interrupt = Interrupt::new();
        let data = Harvester::new(&source, &config, &interrupt)
            .get_articles("key", &opts(), 100)
            .await;

        assert_eq!(data.stop, StopReason::NoMoreResults);
        assert_eq!(data.articles.len(), 1);
        assert_eq!(*source.requested.borrow(), vec![0, 1, 2, 3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn test_fifth_consecutive_failure_aborts() {
        let source = ScriptedArticles::new(vec![
            Ok(SearchPage::Docs(vec![article("a", A)])),
            http_err(),
            http_err(),
            http_err(),
            http_err(),
            http_err(),
            Ok(SearchPage::Docs(vec![article("b", B)])),
        ]);
        let config = HarvestConfig::default();
        let interrupt = Interrupt::new();
        let data = Harvester::new(&source, &config, &interrupt)
            .get_articles("key", &opts(), 100)
            .await;

        assert_eq!(data.stop, StopReason::TooManyTransientFailures);
        assert_eq!(data.articles.len(), 1);
        assert_eq!(source.requested.borrow().len(), 6);
    }

    #[tokio::test]
    async fn test_quota_exhaustion_keeps_collected_data() {
        let source = Scripted {
            articles: ScriptedArticles::new(vec![
                Ok(SearchPage::Docs(vec![article("a", A)])),
                Ok(SearchPage::QuotaExhausted("API rate limit exceeded".into())),
            ]),
            comments: ScriptedComments::new().script(A, vec![Ok(page(&[1, 2]))]),
        };
        let config = HarvestConfig::default();
        let interrupt = Interrupt::new();
        let data = Harvester::new(&source, &config, &interrupt)
            .get_dataset("key", &opts(), Caps::default())
            .await;

        assert_eq!(data.stop, StopReason::QuotaExhausted("API rate limit exceeded".into()));
        assert!(!data.stop.is_error());
        assert_eq!(data.articles.len(), 1);
        assert_eq!(data.comments.len(), 2);
    }

    #[tokio::test]
    async fn test_collector_error_flag_aborts_run() {
        let source = Scripted {
            articles: ScriptedArticles::new(vec![
                Ok(SearchPage::Docs(vec![article("a", A), article("b", B), article("c", C)])),
                Ok(SearchPage::Docs(vec![article("d", A)])),
            ]),
            comments: ScriptedComments::new()
                .script(A, vec![Ok(page(&[1]))])
                .script(B, vec![Err(FetchError::Connection("network unreachable".into()))])
                .script(C, vec![Ok(page(&[3]))]),
        };
        let config = HarvestConfig::default();
        let interrupt = Interrupt::new();
        let data = Harvester::new(&source, &config, &interrupt)
            .get_dataset("key", &opts(), Caps::default())
            .await;

        assert!(matches!(data.stop, StopReason::Aborted(FetchError::Connection(_))));
        assert_eq!(data.articles.len(), 1);
        assert_eq!(data.comments.len(), 1);
        assert_eq!(source.articles.requested.borrow().len(), 1);
        assert!(!source.comments.calls.borrow().iter().any(|(u, _)| u == C));
    }

    #[tokio::test]
    async fn test_malformed_comments_skip_only_that_article() {
        let source = Scripted {
            articles: ScriptedArticles::new(vec![Ok(SearchPage::Docs(vec![article("a", A), article("b", B)]))]),
            comments: ScriptedComments::new()
                .script(A, vec![Err(FetchError::Malformed("bad".into()))])
                .script(B, vec![Ok(page(&[5]))]),
        };
        let config = HarvestConfig::default();
        let interrupt = Interrupt::new();
        let data = Harvester::new(&source, &config, &interrupt)
            .get_dataset("key", &opts(), Caps::default())
            .await;

        assert_eq!(data.stop, StopReason::NoMoreResults);
        assert_eq!(data.articles.len(), 1);
        assert_eq!(data.articles[0].article_id, "b");
    }

    #[tokio::test]
    async fn test_comment_cap_stops_before_next_article() {
        let source = Scripted {
            articles: ScriptedArticles::new(vec![Ok(SearchPage::Docs(vec![article("a", A), article("b", B)]))]),
            comments: ScriptedComments::new()
                .script(A, vec![Ok(page(&[1, 2, 3]))])
                .script(B, vec![Ok(page(&[4]))]),
        };
        let config = HarvestConfig::default();
        let interrupt = Interrupt::new();
        let caps = Caps {
            max_comments: 2,
            max_articles: 10,
        };
        let data = Harvester::new(&source, &config, &interrupt)
            .get_dataset("key", &opts(), caps)
            .await;

        assert_eq!(data.stop, StopReason::CommentCap);
        assert_eq!(data.comments.len(), 3);
        assert!(!source.comments.calls.borrow().iter().any(|(u, _)| u == B));
    }

    #[tokio::test]
    async fn test_get_articles_keeps_multimedia_and_honors_cap() {
        let source = ScriptedArticles::new(vec![
            Ok(SearchPage::Docs(vec![article("a", A), multimedia("m", C)])),
            Ok(SearchPage::Docs(vec![article("b", B)])),
        ]);
        let config = HarvestConfig::default();
        let interrupt = Interrupt::new();
        let data = Harvester::new(&source, &config, &interrupt)
            .get_articles("key", &opts(), 2)
            .await;

        assert_eq!(data.stop, StopReason::ArticleCap);
        assert_eq!(data.articles.len(), 2);
        assert_eq!(data.articles[1].document_type, "multimedia");
    }

    #[tokio::test]
    async fn test_not_ok_search_page_is_skipped() {
        let source = ScriptedArticles::new(vec![
            Ok(SearchPage::NotOk("ERROR".into())),
            Ok(SearchPage::Docs(vec![article("a", A)])),
        ]);
        let config = HarvestConfig::default();
        let interrupt = Interrupt::new();
        let data = Harvester::new(&source, &config, &interrupt)
            .get_articles("key", &opts(), 100)
            .await;

        assert_eq!(data.articles.len(), 1);
        assert_eq!(data.stop, StopReason::NoMoreResults);
    }

    #[tokio::test]
    async fn test_page_range_completes() {
        let source = ScriptedArticles::new(vec![
            Ok(SearchPage::Docs(vec![article("a", A)])),
            Ok(SearchPage::Docs(vec![article("b", B)])),
        ]);
        let config = HarvestConfig::default();
        let interrupt = Interrupt::new();
        let range = SearchOptions {
            page_lower: 3,
            page_upper: 5,
            ..opts()
        };
        let data = Harvester::new(&source, &config, &interrupt)
            .get_articles("key", &range, 100)
            .await;

        assert_eq!(data.stop, StopReason::Completed);
        assert_eq!(*source.requested.borrow(), vec![3, 4]);
    }

    #[tokio::test]
    async fn test_get_comments_over_urls() {
        let source = ScriptedComments::new()
            .script(A, vec![Ok(page(&[1, 2]))])
            .script(B, vec![Ok(page(&[3]))]);
        let config = HarvestConfig::default();
        let interrupt = Interrupt::new();
        let urls = vec![A.to_string(), "not a url".to_string(), B.to_string()];
        let data = Harvester::new(&source, &config, &interrupt)
            .get_comments(&urls, 50_000)
            .await;

        assert_eq!(data.stop, StopReason::Completed);
        assert_eq!(data.comments.len(), 3);
        assert!(data.articles.is_empty());
        assert!(data.comments.iter().all(|c| c.section_name == "Unknown"));
        assert!(!source.calls.borrow().iter().any(|(u, _)| u == "not a url"));
    }

    #[tokio::test]
    async fn test_get_comments_cap_and_interrupt() {
        let source = ScriptedComments::new()
            .script(A, vec![Ok(page(&[1, 2]))])
            .script(B, vec![Ok(page(&[3]))]);
        let config = HarvestConfig::default();
        let interrupt = Interrupt::new();
        let urls = vec![A.to_string(), B.to_string()];
        let data = Harvester::new(&source, &config, &interrupt)
            .get_comments(&urls, 1)
            .await;
        assert_eq!(data.stop, StopReason::CommentCap);
        assert_eq!(data.comments.len(), 2);

        interrupt.trigger();
        let data = Harvester::new(&source, &config, &interrupt)
            .get_comments(&urls, 50_000)
            .await;
        assert_eq!(data.stop, StopReason::Aborted(FetchError::Interrupted));
        assert!(data.comments.is_empty());
    }
}
