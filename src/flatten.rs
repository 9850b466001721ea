//! Reply flattening.
//!
//! Comments arrive as trees: a top-level comment embeds its replies, which
//! may embed their own replies, to any depth. [`flatten_replies`] turns a
//! batch of such trees into one flat list where each reply carries the
//! identifier of its direct parent in `in_reply_to`.
//!
//! Expansion is breadth-first over an explicit queue, so depth is bounded by
//! memory rather than by the call stack. The output order is the input batch
//! first, then every first-level reply, then every second-level reply, and
//! so on.

use crate::models::RawComment;
use serde_json::Value;
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Flatten `batch` and every transitively nested reply into one list.
///
/// Records in `batch` keep whatever `in_reply_to` they already have; every
/// surfaced reply gets its parent's `comment_id`. The `replies` field is
/// consumed on every output record.
///
/// Only records with a positive `replyCount` are expanded. A positive count
/// with a missing or undecodable `replies` list contributes no replies.
pub fn flatten_replies(batch: Vec<RawComment>) -> Vec<RawComment> {
    let mut queue: VecDeque<RawComment> = batch.into();
    let mut flat = Vec::with_capacity(queue.len());

    while let Some(mut comment) = queue.pop_front() {
        let replies = comment.replies.take();
        if comment.reply_count() > 0 {
            for mut reply in decode_replies(comment.comment_id, replies) {
                reply.in_reply_to = comment.comment_id;
                queue.push_back(reply);
            }
        }
        flat.push(comment);
    }

    debug!(count = flat.len(), "Flattened reply trees");
    flat
}

fn decode_replies(parent: Option<i64>, replies: Option<Value>) -> Vec<RawComment> {
    match replies {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<RawComment>(item) {
                Ok(reply) => Some(reply),
                Err(e) => {
                    warn!(parent = ?parent, error = %e, "Skipping undecodable reply");
                    None
                }
            })
            .collect(),
        Some(Value::Null) | None => {
            debug!(parent = ?parent, "replyCount is positive but no replies are embedded");
            Vec::new()
        }
        Some(other) => {
            warn!(parent = ?parent, kind = json_kind(&other), "Skipping malformed replies field");
            Vec::new()
        }
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
