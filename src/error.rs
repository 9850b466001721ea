//! Failure taxonomy for the harvesting pipeline.
//!
//! Network failures are not collapsed into one catch-all branch. Each failure
//! is a [`FetchError`] variant with a fixed [`Severity`], and every loop that
//! reacts to one ends in a named outcome ([`crate::collector::CollectOutcome`]
//! per article, [`StopReason`] per run) so callers can tell a skipped article
//! apart from an aborted run.

use std::fmt;

/// How far a failure reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Confined to one request: skip the page or article and keep going.
    Transient,
    /// Unwind every active loop and return what has been collected.
    Fatal,
}

/// A failure while fetching one search page or one comments page.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The request reached the service but failed (bad status, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The service could not be reached at all.
    #[error("Connection lost: {0}")]
    Connection(String),

    /// The payload could not be unwrapped or decoded.
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// The external interrupt fired while the request was in flight.
    #[error("Retrieval interrupted")]
    Interrupted,
}

impl FetchError {
    pub fn severity(&self) -> Severity {
        match self {
            FetchError::Http(_) | FetchError::Malformed(_) => Severity::Transient,
            FetchError::Connection(_) | FetchError::Interrupted => Severity::Fatal,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() {
            FetchError::Connection(e.to_string())
        } else if e.is_decode() {
            FetchError::Malformed(e.to_string())
        } else {
            FetchError::Http(e.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        FetchError::Malformed(e.to_string())
    }
}

/// Search parameters rejected before any request is issued.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("page_lower ({lower}) is greater than page_upper ({upper})")]
    PageBounds { lower: i32, upper: i32 },

    #[error("begin_date {begin} is after end_date {end}")]
    DateOrder { begin: String, end: String },

    #[error("{field} {value:?} is not a recognizable date; use YYYYMMDD")]
    UnparseableDate { field: &'static str, value: String },
}

/// Why a harvesting run stopped.
///
/// Every variant still comes with whatever was collected before the stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The requested page range (or URL list) was fully processed.
    Completed,
    /// A search page came back with no documents.
    NoMoreResults,
    /// The running comment total reached its cap.
    CommentCap,
    /// The running article total reached its cap.
    ArticleCap,
    /// The search service reported its daily quota used up.
    QuotaExhausted(String),
    /// Too many consecutive transient request failures.
    TooManyTransientFailures,
    /// A fatal failure (interrupt, connectivity loss) unwound the run.
    Aborted(FetchError),
    /// The parameters never made it past validation.
    Rejected(ValidationError),
}

impl StopReason {
    /// True when the run ended because something went wrong rather than
    /// because it ran out of work or hit a cap.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            StopReason::TooManyTransientFailures | StopReason::Aborted(_) | StopReason::Rejected(_)
        )
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Completed => write!(f, "completed"),
            StopReason::NoMoreResults => write!(f, "no more search results"),
            StopReason::CommentCap => write!(f, "comment cap reached"),
            StopReason::ArticleCap => write!(f, "article cap reached"),
            StopReason::QuotaExhausted(msg) => write!(f, "quota exhausted: {msg}"),
            StopReason::TooManyTransientFailures => {
                write!(f, "terminated after repeated HTTP errors")
            }
            StopReason::Aborted(e) => write!(f, "aborted: {e}"),
            StopReason::Rejected(e) => write!(f, "rejected: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_classification() {
        assert_eq!(FetchError::Http("500".into()).severity(), Severity::Transient);
        assert_eq!(FetchError::Malformed("eof".into()).severity(), Severity::Transient);
        assert_eq!(FetchError::Connection("refused".into()).severity(), Severity::Fatal);
        assert!(FetchError::Interrupted.is_fatal());
    }

    #[test]
    fn test_json_error_is_malformed() {
        let err = serde_json::from_str::<serde_json::Value>("{\"a\":").unwrap_err();
        assert!(matches!(FetchError::from(err), FetchError::Malformed(_)));
    }

    #[test]
    fn test_stop_reason_is_error() {
        assert!(!StopReason::Completed.is_error());
        assert!(!StopReason::QuotaExhausted("limit".into()).is_error());
        assert!(!StopReason::CommentCap.is_error());
        assert!(StopReason::Aborted(FetchError::Interrupted).is_error());
        assert!(StopReason::TooManyTransientFailures.is_error());
    }

    #[test]
    fn test_validation_error_messages() {
        let e = ValidationError::DateOrder {
            begin: "20200601".into(),
            end: "20200101".into(),
        };
        assert_eq!(e.to_string(), "begin_date 20200601 is after end_date 20200101");
    }
}
