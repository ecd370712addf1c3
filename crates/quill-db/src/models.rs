/// Database row types — these map directly to SQLite rows.
/// Distinct from quill-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password: String,
    pub created_at: String,
}

pub struct PostRow {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub date_published: String,
    pub user_id: i64,
}

pub struct CommentRow {
    pub id: i64,
    pub content: String,
    pub date_commented: String,
    pub user_id: i64,
    pub post_id: i64,
}

pub struct SessionRow {
    pub id: String,
    pub user_id: i64,
    pub created_at: String,
    pub expires_at: String,
}
