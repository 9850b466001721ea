//! Data models for raw service payloads and the normalized datasets.
//!
//! Two layers live here:
//! - Raw wire types ([`RawComment`], [`RawArticle`], the response envelopes)
//!   mirror whatever the endpoints send. Every field is optional and decoded
//!   leniently, since the payload shape drifted across endpoint versions.
//! - Normalized rows ([`CommentRecord`], [`ArticleRecord`]) have every column
//!   present with a concrete type. They are produced only by
//!   [`crate::normalize`].
//!
//! Column names in the normalized rows keep the camelCase names the service
//! uses so the CSV headers line up with the upstream field names.

use crate::error::StopReason;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// Lenient scalar decoders for fields whose JSON type is not stable.
pub(crate) mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Accept numbers, numeric strings and booleans as an integer.
    pub fn int<'de, D>(d: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<Value>::deserialize(d)?.as_ref().and_then(int_of))
    }

    /// Accept strings, numbers and booleans as text.
    pub fn text<'de, D>(d: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<Value>::deserialize(d)?.as_ref().and_then(text_of))
    }

    pub fn flag<'de, D>(d: D) -> Result<Option<bool>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<Value>::deserialize(d)? {
            Some(Value::Bool(b)) => Some(b),
            Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0),
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        })
    }

    pub fn int_of(v: &Value) -> Option<i64> {
        match v {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
            }
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn text_of(v: &Value) -> Option<String> {
        match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

/// One comment as returned by the comments endpoint.
///
/// `replies` stays an untyped JSON value until the reply flattener decodes
/// it, so a malformed reply list cannot poison the decoding of the page it
/// came in. `in_reply_to` is never read from the wire; the flattener sets it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawComment {
    #[serde(rename = "commentID", default, deserialize_with = "lenient::int")]
    pub comment_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient::int")]
    pub comment_sequence: Option<i64>,
    #[serde(rename = "userID", default, deserialize_with = "lenient::text")]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub user_display_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub user_location: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub user_title: Option<String>,
    #[serde(rename = "userURL", default, deserialize_with = "lenient::text")]
    pub user_url: Option<String>,
    #[serde(rename = "picURL", default, deserialize_with = "lenient::text")]
    pub pic_url: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub comment_title: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub comment_body: Option<String>,
    #[serde(default, deserialize_with = "lenient::int")]
    pub create_date: Option<i64>,
    #[serde(default, deserialize_with = "lenient::int")]
    pub update_date: Option<i64>,
    #[serde(default, deserialize_with = "lenient::int")]
    pub approve_date: Option<i64>,
    #[serde(default, deserialize_with = "lenient::int")]
    pub recommendations: Option<i64>,
    #[serde(default, deserialize_with = "lenient::int")]
    pub reply_count: Option<i64>,
    #[serde(default)]
    pub replies: Option<Value>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub editors_selection: Option<bool>,
    #[serde(rename = "parentID", default, deserialize_with = "lenient::int")]
    pub parent_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub parent_user_display_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::int")]
    pub depth: Option<i64>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub comment_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub trusted: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub recommended_flag: Option<String>,
    #[serde(rename = "permID", default, deserialize_with = "lenient::text")]
    pub perm_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub timespeople: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub sharing: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub report_abuse_flag: Option<String>,
    #[serde(skip)]
    pub in_reply_to: Option<i64>,
}

impl RawComment {
    /// Number of direct children, treating an absent count as zero.
    pub fn reply_count(&self) -> i64 {
        self.reply_count.unwrap_or(0).max(0)
    }
}

/// One page of the comments endpoint, already unwrapped from its envelope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageBatch {
    pub status: String,
    pub comments: Vec<RawComment>,
    pub total_comments_returned: u64,
    pub total_reply_comments_returned: u64,
    pub total_comments_found: u64,
}

impl PageBatch {
    pub fn is_ok(&self) -> bool {
        self.status == "OK"
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommentsResponse {
    #[serde(default, deserialize_with = "lenient::text")]
    status: Option<String>,
    #[serde(default)]
    results: Option<CommentsResults>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentsResults {
    #[serde(default, deserialize_with = "lenient::int")]
    total_comments_returned: Option<i64>,
    #[serde(default, deserialize_with = "lenient::int")]
    total_reply_comments_returned: Option<i64>,
    #[serde(default, deserialize_with = "lenient::int")]
    total_comments_found: Option<i64>,
    #[serde(default)]
    comments: Vec<RawComment>,
}

impl From<CommentsResponse> for PageBatch {
    fn from(resp: CommentsResponse) -> Self {
        let count = |v: Option<i64>| v.unwrap_or(0).max(0) as u64;
        let status = resp.status.unwrap_or_default();
        match resp.results {
            Some(results) => PageBatch {
                status,
                total_comments_returned: count(results.total_comments_returned),
                total_reply_comments_returned: count(results.total_reply_comments_returned),
                total_comments_found: count(results.total_comments_found),
                comments: results.comments,
            },
            None => PageBatch {
                status,
                ..PageBatch::default()
            },
        }
    }
}

/// One document from the article search endpoint.
///
/// The nested sub-objects (`byline`, `headline`, `keywords`, `multimedia`)
/// are kept as raw JSON and projected to scalars by the normalizer.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawArticle {
    #[serde(rename = "_id", default, deserialize_with = "lenient::text")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub web_url: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub snippet: Option<String>,
    #[serde(rename = "abstract", default, deserialize_with = "lenient::text")]
    pub abstract_text: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub source: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub document_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub section_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub new_desk: Option<String>,
    #[serde(default, deserialize_with = "lenient::int")]
    pub word_count: Option<i64>,
    #[serde(default, deserialize_with = "lenient::int")]
    pub print_page: Option<i64>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub type_of_material: Option<String>,
    #[serde(default)]
    pub byline: Option<Value>,
    #[serde(default)]
    pub headline: Option<Value>,
    #[serde(default)]
    pub keywords: Option<Value>,
    #[serde(default)]
    pub multimedia: Option<Value>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub pub_date: Option<String>,
}

impl RawArticle {
    pub fn is_multimedia(&self) -> bool {
        self.document_type.as_deref() == Some("multimedia")
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default, deserialize_with = "lenient::text")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub message: Option<String>,
    #[serde(default)]
    pub fault: Option<Value>,
    #[serde(default)]
    pub response: Option<SearchBody>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchBody {
    #[serde(default)]
    pub docs: Vec<RawArticle>,
}

/// What one article-search request produced.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchPage {
    Docs(Vec<RawArticle>),
    /// The service answered with a quota message instead of results.
    QuotaExhausted(String),
    /// The service answered with a status other than `OK`.
    NotOk(String),
}

impl From<SearchResponse> for SearchPage {
    fn from(resp: SearchResponse) -> Self {
        if let Some(message) = resp.message {
            return SearchPage::QuotaExhausted(message);
        }
        if let Some(fault) = resp.fault {
            let message = fault
                .get("faultstring")
                .and_then(lenient::text_of)
                .unwrap_or_else(|| "Rate limit quota violation".to_string());
            return SearchPage::QuotaExhausted(message);
        }
        match resp.status.as_deref() {
            Some("OK") => SearchPage::Docs(resp.response.map(|r| r.docs).unwrap_or_default()),
            other => SearchPage::NotOk(other.unwrap_or("missing").to_string()),
        }
    }
}

/// Article columns copied onto every comment of a stored article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleContext {
    pub article_id: String,
    pub section_name: String,
    pub new_desk: String,
    pub article_word_count: i64,
    pub print_page: i64,
    pub type_of_material: String,
}

/// A normalized comment row.
///
/// `in_reply_to` and `parent_id` use `0` for "no parent".
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRecord {
    #[serde(rename = "commentID")]
    pub comment_id: i64,
    #[serde(rename = "articleID")]
    pub article_id: String,
    #[serde(rename = "parentID")]
    pub parent_id: i64,
    pub in_reply_to: i64,
    pub reply_count: i64,
    pub depth: i64,
    pub comment_sequence: i64,
    pub create_date: i64,
    pub approve_date: i64,
    pub update_date: i64,
    pub recommendations: i64,
    pub editors_selection: bool,
    pub comment_title: String,
    pub comment_body: String,
    pub comment_type: String,
    pub status: String,
    pub recommended_flag: String,
    pub report_abuse_flag: String,
    pub sharing: String,
    pub timespeople: String,
    pub trusted: String,
    #[serde(rename = "permID")]
    pub perm_id: String,
    #[serde(rename = "userID")]
    pub user_id: String,
    pub user_display_name: String,
    pub user_location: String,
    pub user_title: String,
    #[serde(rename = "userURL")]
    pub user_url: String,
    #[serde(rename = "picURL")]
    pub pic_url: String,
    pub parent_user_display_name: String,
    pub section_name: String,
    pub new_desk: String,
    pub article_word_count: i64,
    pub print_page: i64,
    pub type_of_material: String,
}

/// A normalized article row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleRecord {
    #[serde(rename = "articleID")]
    pub article_id: String,
    #[serde(rename = "webURL")]
    pub web_url: String,
    pub snippet: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub source: String,
    pub document_type: String,
    pub section_name: String,
    pub new_desk: String,
    pub article_word_count: i64,
    pub print_page: i64,
    pub type_of_material: String,
    pub byline: String,
    pub headline: String,
    #[serde(serialize_with = "join_keywords")]
    pub keywords: Vec<String>,
    pub multimedia: usize,
    #[serde(serialize_with = "rfc3339_or_empty")]
    pub pub_date: Option<DateTime<FixedOffset>>,
}

fn join_keywords<S: Serializer>(keywords: &[String], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&keywords.join("; "))
}

fn rfc3339_or_empty<S: Serializer>(
    date: &Option<DateTime<FixedOffset>>,
    s: S,
) -> Result<S::Ok, S::Error> {
    match date {
        Some(d) => s.serialize_str(&d.to_rfc3339()),
        None => s.serialize_str(""),
    }
}

/// The result of a harvesting run: both tables plus why the run ended.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub articles: Vec<ArticleRecord>,
    pub comments: Vec<CommentRecord>,
    pub stop: StopReason,
}

impl Dataset {
    pub fn empty(stop: StopReason) -> Self {
        Self {
            articles: Vec::new(),
            comments: Vec::new(),
            stop,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty() && self.comments.is_empty()
    }
}
