//! CSV output for the two datasets.
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── Articles{suffix}.csv
//! └── Comments{suffix}.csv
//! ```
//!
//! A run that only produced comments (or only articles) still writes both
//! files; the empty one holds just its header row.

use crate::models::{ArticleRecord, CommentRecord, Dataset};
use serde::Serialize;
use std::error::Error;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// Paths of the files written by [`write_datasets`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFiles {
    pub articles: PathBuf,
    pub comments: PathBuf,
}

pub fn articles_path(dir: &Path, suffix: &str) -> PathBuf {
    dir.join(format!("Articles{suffix}.csv"))
}

pub fn comments_path(dir: &Path, suffix: &str) -> PathBuf {
    dir.join(format!("Comments{suffix}.csv"))
}

/// Write both datasets of `dataset` into `dir`.
///
/// # Errors
///
/// Returns an error if either file cannot be created or a row fails to serialize.
#[instrument(level = "info", skip(dataset), fields(articles = dataset.articles.len(), comments = dataset.comments.len()))]
pub async fn write_datasets(
    dir: &Path,
    suffix: &str,
    dataset: &Dataset,
) -> Result<WrittenFiles, Box<dyn Error>> {
    let files = WrittenFiles {
        articles: articles_path(dir, suffix),
        comments: comments_path(dir, suffix),
    };

    let articles = to_csv::<ArticleRecord>(&dataset.articles, ARTICLE_HEADERS)?;
    let comments = to_csv::<CommentRecord>(&dataset.comments, COMMENT_HEADERS)?;

    tokio::fs::write(&files.articles, articles).await?;
    info!(path = %files.articles.display(), rows = dataset.articles.len(), "Wrote articles CSV");
    tokio::fs::write(&files.comments, comments).await?;
    info!(path = %files.comments.display(), rows = dataset.comments.len(), "Wrote comments CSV");

    Ok(files)
}

const ARTICLE_HEADERS: &[&str] = &[
    "articleID",
    "webURL",
    "snippet",
    "abstract",
    "source",
    "documentType",
    "sectionName",
    "newDesk",
    "articleWordCount",
    "printPage",
    "typeOfMaterial",
    "byline",
    "headline",
    "keywords",
    "multimedia",
    "pubDate",
];

const COMMENT_HEADERS: &[&str] = &[
    "commentID",
    "articleID",
    "parentID",
    "inReplyTo",
    "replyCount",
    "depth",
    "commentSequence",
    "createDate",
    "approveDate",
    "updateDate",
    "recommendations",
    "editorsSelection",
    "commentTitle",
    "commentBody",
    "commentType",
    "status",
    "recommendedFlag",
    "reportAbuseFlag",
    "sharing",
    "timespeople",
    "trusted",
    "permID",
    "userID",
    "userDisplayName",
    "userLocation",
    "userTitle",
    "userURL",
    "picURL",
    "parentUserDisplayName",
    "sectionName",
    "newDesk",
    "articleWordCount",
    "printPage",
    "typeOfMaterial",
];

/// Serialize `rows` to CSV bytes. The header row comes from the records'
/// field names, or from `headers` when there are no rows.
fn to_csv<T: Serialize>(rows: &[T], headers: &[&str]) -> Result<Vec<u8>, Box<dyn Error>> {
    let mut wtr = ::csv::Writer::from_writer(Vec::new());
    if rows.is_empty() {
        wtr.write_record(headers)?;
    }
    for row in rows {
        wtr.serialize(row)?;
    }
    Ok(wtr.into_inner().map_err(|e| e.into_error())?)
}
