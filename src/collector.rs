//! Comment collection for a single article.
//!
//! [`CommentCollector::collect`] drives a [`CommentSource`] from offset 0 in
//! page-size steps until the article is exhausted, then flattens reply trees
//! and deduplicates the result by `commentID`.
//!
//! # Termination
//!
//! | Page result | Next state |
//! |-------------|------------|
//! | comments returned | fetch `offset + page_size` |
//! | zero comments returned / status not `OK` | done, [`CollectOutcome::Exhausted`] |
//! | transient failure (HTTP, malformed body) | done, [`CollectOutcome::Skipped`] |
//! | fatal failure (interrupt, connection loss) | done, [`CollectOutcome::Aborted`] |
//!
//! Only an exhausted article yields comments. A skipped or aborted article
//! discards the pages it had gathered.

use crate::api::CommentSource;
use crate::error::FetchError;
use crate::flatten::flatten_replies;
use crate::interrupt::Interrupt;
use crate::models::RawComment;
use itertools::Itertools;
use tracing::{debug, error, info, instrument, warn};

/// How the pagination of one article ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectOutcome {
    Exhausted,
    /// A transient failure; the article is dropped and the run continues.
    Skipped(FetchError),
    /// A fatal failure; the run must stop.
    Aborted(FetchError),
}

/// The flattened, deduplicated comments of one article.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleComments {
    pub comments: Vec<RawComment>,
    pub outcome: CollectOutcome,
    /// Number of page requests issued.
    pub pages: u32,
}

impl ArticleComments {
    /// True when the outer loops have to stop.
    pub fn error_flag(&self) -> bool {
        matches!(self.outcome, CollectOutcome::Aborted(_))
    }
}

pub struct CommentCollector<'a, S> {
    source: &'a S,
    interrupt: &'a Interrupt,
    page_size: u32,
}

impl<'a, S> CommentCollector<'a, S>
where
    S: CommentSource,
{
    pub fn new(source: &'a S, interrupt: &'a Interrupt, page_size: u32) -> Self {
        Self {
            source,
            interrupt,
            page_size,
        }
    }

    /// Collect every comment and nested reply of `article_url`.
    ///
    /// Never fails: failures are reported through [`ArticleComments::outcome`].
    #[instrument(level = "info", skip(self))]
    pub async fn collect(&self, article_url: &str) -> ArticleComments {
        let mut offset = 0u32;
        let mut pages = 0u32;
        let mut batches: Vec<Vec<RawComment>> = Vec::new();

        let outcome = loop {
            let result = tokio::select! {
                biased;
                _ = self.interrupt.triggered() => Err(FetchError::Interrupted),
                r = self.source.fetch_page(article_url, offset) => r,
            };
            pages += 1;

            if self.interrupt.is_triggered() {
                warn!(offset, "Retrieval interrupted");
                break CollectOutcome::Aborted(FetchError::Interrupted);
            }

            match result {
                Ok(batch) if !batch.is_ok() => {
                    debug!(offset, status = %batch.status, "Non-OK status; treating as end of comments");
                    break CollectOutcome::Exhausted;
                }
                Ok(batch) if batch.total_comments_returned == 0 || batch.comments.is_empty() => {
                    debug!(offset, "No more comments returned");
                    break CollectOutcome::Exhausted;
                }
                Ok(batch) => {
                    debug!(
                        offset,
                        returned = batch.total_comments_returned,
                        replies = batch.total_reply_comments_returned,
                        "Collected comments page"
                    );
                    batches.push(batch.comments);
                    offset += self.page_size;
                }
                Err(e) if e.is_fatal() => {
                    error!(offset, error = %e, "Retrieval interrupted");
                    break CollectOutcome::Aborted(e);
                }
                Err(e) => {
                    warn!(offset, error = %e, "Article is skipped; retrieval continues with the next article");
                    break CollectOutcome::Skipped(e);
                }
            }
        };

        if outcome != CollectOutcome::Exhausted {
            return ArticleComments {
                comments: Vec::new(),
                outcome,
                pages,
            };
        }

        let top_level = batches
            .into_iter()
            .flatten()
            .map(|mut c| {
                c.in_reply_to = None;
                c
            })
            .collect();
        let comments = dedupe_by_id(flatten_replies(top_level));

        if !comments.is_empty() {
            info!(count = comments.len(), "Retrieved comments from article");
        }
        ArticleComments {
            comments,
            outcome,
            pages,
        }
    }
}

/// Keep one record per `commentID`, the last one seen, in the order those
/// survivors appeared. Records without an identifier are dropped.
pub fn dedupe_by_id(comments: Vec<RawComment>) -> Vec<RawComment> {
    let total = comments.len();
    let (with_id, without_id): (Vec<_>, Vec<_>) =
        comments.into_iter().partition(|c| c.comment_id.is_some());
    if !without_id.is_empty() {
        warn!(dropped = without_id.len(), "Dropping comments without a commentID");
    }

    let mut unique: Vec<RawComment> = with_id
        .into_iter()
        .rev()
        .unique_by(|c| c.comment_id)
        .collect();
    unique.reverse();

    if unique.len() + without_id.len() < total {
        debug!(
            duplicates = total - without_id.len() - unique.len(),
            "Removed duplicate comments"
        );
    }
    unique
}
