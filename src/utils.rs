//! Utility functions for wire-format handling, logging, and file system checks.
//!
//! This module provides helper functions used throughout the application:
//! - JSONP unwrapping for the comments endpoint
//! - The double percent-encoding the comments endpoint expects for article URLs
//! - String truncation for logging response bodies
//! - JSON error classification for decode diagnostics
//! - File system validation for output directories

use regex::Regex;
use std::error::Error;
use std::fs as stdfs;
use tokio::fs;
use tracing::{info, instrument};

/// Strips the callback-invocation wrapper from a comments response.
///
/// The endpoint answers with `<callback>(<json>);`, optionally preceded by a
/// `/**/` comment and padded with whitespace.
#[derive(Debug, Clone)]
pub struct JsonpUnwrapper {
    re: Regex,
}

impl JsonpUnwrapper {
    /// Build an unwrapper for the given callback name.
    ///
    /// # Errors
    ///
    /// Only fails if the escaped pattern is rejected by the regex engine,
    /// which would mean an absurdly large callback name.
    pub fn new(callback: &str) -> Result<Self, regex::Error> {
        let pattern = format!(
            r"(?s)\A\s*(?:/\*\*/\s*)?{}\((.*)\)\s*;?\s*\z",
            regex::escape(callback)
        );
        Ok(Self {
            re: Regex::new(&pattern)?,
        })
    }

    /// Return the JSON payload inside the wrapper, or `None` if the body is not
    /// wrapped in the expected callback.
    pub fn unwrap<'a>(&self, body: &'a str) -> Option<&'a str> {
        self.re
            .captures(body)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }
}

/// Encode an article URL for the comments endpoint's `url` query value.
///
/// The endpoint expects the URL percent-encoded twice, so `:` travels as
/// `%253A` and `/` as `%252F`.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(encode_article_url("https://a.b/c"), "https%253A%252F%252Fa.b%252Fc");
/// ```
pub fn encode_article_url(article_url: &str) -> String {
    let once = urlencoding::encode(article_url);
    urlencoding::encode(&once).into_owned()
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` bytes (backing off to the nearest
/// character boundary) with an ellipsis and byte count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log("a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Detect if a serde_json error indicates truncated/incomplete JSON.
///
/// A comments body cut off mid-transfer fails with an EOF error rather than a
/// syntax error; the distinction is only used for diagnostics.
pub fn looks_truncated(e: &serde_json::Error) -> bool {
    use serde_json::error::Category;
    matches!(e.classify(), Category::Eof)
}

/// Ensure a directory exists and is writable.
///
/// This function creates the directory if it doesn't exist, then performs
/// a write test by creating and immediately deleting a probe file.
///
/// # Errors
///
/// Returns an error if:
/// - The directory cannot be created
/// - The directory is not writable (permission denied, read-only filesystem, etc.)
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    if let Err(e) = fs::create_dir_all(path).await {
        return Err(Box::new(e));
    }
    // Try a small sync write using std fs (simpler error surface)
    let probe_path = format!("{}/..__probe_write__", path.trim_end_matches('/'));
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("Output directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}
