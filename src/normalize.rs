//! Projection of raw payload records into the fixed output schema.
//!
//! Every function here is total: any [`RawComment`] or [`RawArticle`],
//! however sparse, maps to a complete row. Defaults are decided once, here:
//!
//! | Kind of column | Default |
//! |----------------|---------|
//! | counts, timestamps | `0` |
//! | parent links (`parentID`, `inReplyTo`) | `0`, meaning no parent |
//! | categorical (status, flags, names, sections) | `"Unknown"` |
//! | free text and URLs | `""` |
//! | byline | `"By UNKNOWN"` |

use crate::models::{ArticleContext, ArticleRecord, CommentRecord, RawArticle, RawComment};
use chrono::{DateTime, FixedOffset};
use serde_json::Value;

pub const UNKNOWN: &str = "Unknown";
pub const UNKNOWN_BYLINE: &str = "By UNKNOWN";

fn category(v: Option<String>) -> String {
    v.filter(|s| !s.is_empty()).unwrap_or_else(|| UNKNOWN.to_string())
}

fn text(v: Option<String>) -> String {
    v.unwrap_or_default()
}

/// Article columns to copy onto each of its comments.
pub fn article_context(raw: &RawArticle) -> ArticleContext {
    ArticleContext {
        article_id: text(raw.id.clone()),
        section_name: category(raw.section_name.clone()),
        new_desk: category(raw.new_desk.clone()),
        article_word_count: raw.word_count.unwrap_or(0),
        print_page: raw.print_page.unwrap_or(0),
        type_of_material: category(raw.type_of_material.clone()),
    }
}

/// Normalize one flattened comment, optionally tagging it with its article.
pub fn normalize_comment(raw: RawComment, ctx: Option<&ArticleContext>) -> CommentRecord {
    let (article_id, section_name, new_desk, article_word_count, print_page, type_of_material) =
        match ctx {
            Some(c) => (
                c.article_id.clone(),
                c.section_name.clone(),
                c.new_desk.clone(),
                c.article_word_count,
                c.print_page,
                c.type_of_material.clone(),
            ),
            None => (
                String::new(),
                UNKNOWN.to_string(),
                UNKNOWN.to_string(),
                0,
                0,
                UNKNOWN.to_string(),
            ),
        };

    CommentRecord {
        comment_id: raw.comment_id.unwrap_or(0),
        article_id,
        parent_id: raw.parent_id.unwrap_or(0),
        in_reply_to: raw.in_reply_to.unwrap_or(0),
        reply_count: raw.reply_count(),
        depth: raw.depth.unwrap_or(0),
        comment_sequence: raw.comment_sequence.unwrap_or(0),
        create_date: raw.create_date.unwrap_or(0),
        approve_date: raw.approve_date.unwrap_or(0),
        update_date: raw.update_date.unwrap_or(0),
        recommendations: raw.recommendations.unwrap_or(0).max(0),
        editors_selection: raw.editors_selection.unwrap_or(false),
        comment_title: category(raw.comment_title),
        comment_body: text(raw.comment_body),
        comment_type: category(raw.comment_type),
        status: category(raw.status),
        recommended_flag: category(raw.recommended_flag),
        report_abuse_flag: category(raw.report_abuse_flag),
        sharing: category(raw.sharing),
        timespeople: category(raw.timespeople),
        trusted: category(raw.trusted),
        perm_id: category(raw.perm_id),
        user_id: category(raw.user_id),
        user_display_name: category(raw.user_display_name),
        user_location: category(raw.user_location),
        user_title: category(raw.user_title),
        user_url: text(raw.user_url),
        pic_url: text(raw.pic_url),
        parent_user_display_name: category(raw.parent_user_display_name),
        section_name,
        new_desk,
        article_word_count,
        print_page,
        type_of_material,
    }
}

/// Normalize one search document.
pub fn normalize_article(raw: &RawArticle) -> ArticleRecord {
    let ctx = article_context(raw);
    ArticleRecord {
        article_id: ctx.article_id,
        web_url: text(raw.web_url.clone()),
        snippet: text(raw.snippet.clone()),
        abstract_text: text(raw.abstract_text.clone()),
        source: category(raw.source.clone()),
        document_type: category(raw.document_type.clone()),
        section_name: ctx.section_name,
        new_desk: ctx.new_desk,
        article_word_count: ctx.article_word_count,
        print_page: ctx.print_page,
        type_of_material: ctx.type_of_material,
        byline: byline(raw.byline.as_ref()),
        headline: headline(raw.headline.as_ref()),
        keywords: keywords(raw.keywords.as_ref()),
        multimedia: multimedia_count(raw.multimedia.as_ref()),
        pub_date: raw.pub_date.as_deref().and_then(parse_pub_date),
    }
}

fn nonempty_str<'a>(v: Option<&'a Value>, key: &str) -> Option<&'a str> {
    v?.get(key)?.as_str().filter(|s| !s.is_empty())
}

/// The byline's original text, e.g. `"By Jane Doe"`.
pub fn byline(v: Option<&Value>) -> String {
    nonempty_str(v, "original").unwrap_or(UNKNOWN_BYLINE).to_string()
}

/// The print headline; empty or missing maps to `"Unknown"`.
pub fn headline(v: Option<&Value>) -> String {
    nonempty_str(v, "print_headline").unwrap_or(UNKNOWN).to_string()
}

/// Keyword values, in order.
pub fn keywords(v: Option<&Value>) -> Vec<String> {
    v.and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|k| k.get("value").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub fn multimedia_count(v: Option<&Value>) -> usize {
    v.and_then(Value::as_array).map_or(0, Vec::len)
}

/// Parse the search service's timestamp (`2020-01-01T05:00:00+0000`) or RFC 3339.
pub fn parse_pub_date(s: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%z")
        .or_else(|_| DateTime::parse_from_rfc3339(s))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::article;
    use serde_json::json;

    #[test]
    fn test_empty_comment_gets_all_defaults() {
        let record = normalize_comment(RawComment::default(), None);
        assert_eq!(record.comment_id, 0);
        assert_eq!(record.in_reply_to, 0);
        assert_eq!(record.parent_id, 0);
        assert_eq!(record.print_page, 0);
        assert_eq!(record.section_name, UNKNOWN);
        assert_eq!(record.new_desk, UNKNOWN);
        assert_eq!(record.type_of_material, UNKNOWN);
        assert_eq!(record.status, UNKNOWN);
        assert_eq!(record.comment_body, "");
        assert!(!record.editors_selection);
    }

    #[test]
    fn test_comment_columns_all_serialized() {
        let record = normalize_comment(RawComment::default(), None);
        let v = serde_json::to_value(&record).unwrap();
        for column in [
            "commentID",
            "articleID",
            "parentID",
            "inReplyTo",
            "replyCount",
            "createDate",
            "approveDate",
            "updateDate",
            "recommendations",
            "sectionName",
            "newDesk",
            "articleWordCount",
            "printPage",
            "typeOfMaterial",
            "userDisplayName",
            "permID",
            "picURL",
        ] {
            assert!(v.get(column).is_some(), "missing column {column}");
        }
        assert!(v.get("replies").is_none());
    }

    #[test]
    fn test_comment_takes_article_context() {
        let raw: RawComment = serde_json::from_value(json!({
            "commentID": 5,
            "parentID": 2,
            "recommendations": 11,
            "userDisplayName": "reader"
        }))
        .unwrap();
        let ctx = article_context(&article("abc", "https://x/y"));
        let record = normalize_comment(
            RawComment {
                in_reply_to: Some(2),
                ..raw
            },
            Some(&ctx),
        );
        assert_eq!(record.article_id, "abc");
        assert_eq!(record.section_name, "World");
        assert_eq!(record.print_page, 12);
        assert_eq!(record.article_word_count, 900);
        assert_eq!(record.in_reply_to, 2);
        assert_eq!(record.parent_id, 2);
        assert_eq!(record.recommendations, 11);
        assert_eq!(record.user_display_name, "reader");
    }

    #[test]
    fn test_empty_article_gets_all_defaults() {
        let record = normalize_article(&RawArticle::default());
        assert_eq!(record.section_name, UNKNOWN);
        assert_eq!(record.new_desk, UNKNOWN);
        assert_eq!(record.type_of_material, UNKNOWN);
        assert_eq!(record.print_page, 0);
        assert_eq!(record.byline, UNKNOWN_BYLINE);
        assert_eq!(record.headline, UNKNOWN);
        assert!(record.keywords.is_empty());
        assert_eq!(record.multimedia, 0);
        assert_eq!(record.pub_date, None);
    }

    #[test]
    fn test_article_projection() {
        let record = normalize_article(&article("abc", "https://x/y"));
        assert_eq!(record.article_id, "abc");
        assert_eq!(record.web_url, "https://x/y");
        assert_eq!(record.byline, "By A Writer");
        assert_eq!(record.headline, "Headline abc");
        assert_eq!(record.keywords, vec!["Politics".to_string()]);
        assert_eq!(record.multimedia, 2);
        assert_eq!(
            record.pub_date.map(|d| d.to_rfc3339()),
            Some("2020-01-01T05:00:00+00:00".to_string())
        );
    }

    #[test]
    fn test_empty_headline_is_unknown() {
        assert_eq!(headline(Some(&json!({"main": "M", "print_headline": ""}))), UNKNOWN);
        assert_eq!(headline(Some(&json!({"main": "M", "print_headline": null}))), UNKNOWN);
        assert_eq!(headline(Some(&json!("not an object"))), UNKNOWN);
    }

    #[test]
    fn test_byline_variants() {
        assert_eq!(byline(Some(&json!({"original": null}))), UNKNOWN_BYLINE);
        assert_eq!(byline(Some(&Value::Null)), UNKNOWN_BYLINE);
        assert_eq!(byline(Some(&json!({"original": "By X"}))), "By X");
    }

    #[test]
    fn test_keywords_keep_order_and_skip_valueless() {
        let kw = keywords(Some(&json!([
            {"value": "B"},
            {"name": "glocations"},
            {"value": "A"}
        ])));
        assert_eq!(kw, vec!["B".to_string(), "A".to_string()]);
    }

    #[test]
    fn test_unparseable_pub_date() {
        assert_eq!(parse_pub_date("yesterday"), None);
        assert!(parse_pub_date("2021-05-04T10:00:00Z").is_some());
    }
}
