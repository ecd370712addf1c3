use chrono::{DateTime, Utc};
use tracing::warn;

use quill_db::models::{CommentRow, PostRow};
use quill_types::models::{Comment, Post};

fn parse_timestamp(raw: &str, what: &str, id: i64) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}' on row {}: {}", what, raw, id, e);
        DateTime::default()
    })
}

pub fn post_from_row(row: PostRow) -> Post {
    Post {
        date_published: parse_timestamp(&row.date_published, "date_published", row.id),
        id: row.id,
        title: row.title,
        content: row.content,
        user_id: row.user_id,
    }
}

pub fn comment_from_row(row: CommentRow) -> Comment {
    Comment {
        date_commented: parse_timestamp(&row.date_commented, "date_commented", row.id),
        id: row.id,
        content: row.content,
        user_id: row.user_id,
        post_id: row.post_id,
    }
}
