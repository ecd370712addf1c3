use crate::models::{CommentRow, PostRow, SessionRow, UserRow};
use crate::Database;
use anyhow::Result;
use rusqlite::{Connection, ErrorCode, Row};

impl Database {
    // -- Users --

    /// Inserts a user and returns its id, or `None` when the username or
    /// email is already taken.
    pub fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        created_at: &str,
    ) -> Result<Option<i64>> {
        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (username, email, password, created_at) VALUES (?1, ?2, ?3, ?4)",
                (username, email, password_hash, created_at),
            );
            match inserted {
                Ok(_) => Ok(Some(conn.last_insert_rowid())),
                Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                    Ok(None)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    /// True if any user already has this username or this email.
    pub fn user_exists(&self, username: &str, email: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: i64 = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1 OR email = ?2)",
                (username, email),
                |row| row.get(0),
            )?;
            Ok(found != 0)
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, username, email, password, created_at FROM users WHERE username = ?1",
                [username],
                user_from_row,
            )
            .optional()
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, username, email, password, created_at FROM users WHERE id = ?1",
                [id],
                user_from_row,
            )
            .optional()
        })
    }

    /// Returns `(post_count, comment_count)` for a user.
    pub fn count_user_activity(&self, user_id: i64) -> Result<(i64, i64)> {
        self.with_conn(|conn| {
            let posts: i64 =
                conn.query_row("SELECT COUNT(*) FROM posts WHERE user_id = ?1", [user_id], |r| r.get(0))?;
            let comments: i64 =
                conn.query_row("SELECT COUNT(*) FROM comments WHERE user_id = ?1", [user_id], |r| r.get(0))?;
            Ok((posts, comments))
        })
    }

    // -- Sessions --

    pub fn create_session(
        &self,
        id: &str,
        user_id: i64,
        created_at: &str,
        expires_at: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO sessions (id, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id, user_id, created_at, expires_at],
            )?;
            Ok(())
        })
    }

    pub fn get_session(&self, id: &str) -> Result<Option<SessionRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, user_id, created_at, expires_at FROM sessions WHERE id = ?1",
                [id],
                |row| {
                    Ok(SessionRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        created_at: row.get(2)?,
                        expires_at: row.get(3)?,
                    })
                },
            )
            .optional()
        })
    }

    /// Returns false if the session did not exist.
    pub fn delete_session(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM sessions WHERE id = ?1", [id])?;
            Ok(n > 0)
        })
    }

    /// Deletes every session whose `expires_at` is at or before `now`.
    pub fn delete_expired_sessions(&self, now: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", [now])?;
            Ok(n)
        })
    }

    // -- Posts --

    pub fn insert_post(
        &self,
        title: &str,
        content: &str,
        date_published: &str,
        user_id: i64,
    ) -> Result<PostRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO posts (title, content, date_published, user_id) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![title, content, date_published, user_id],
            )?;
            Ok(PostRow {
                id: conn.last_insert_rowid(),
                title: title.to_string(),
                content: content.to_string(),
                date_published: date_published.to_string(),
                user_id,
            })
        })
    }

    /// All posts, newest first.
    pub fn list_posts(&self) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, content, date_published, user_id
                 FROM posts
                 ORDER BY date_published DESC, id DESC",
            )?;
            let rows = stmt
                .query_map([], post_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_post(&self, id: i64) -> Result<Option<PostRow>> {
        self.with_conn(|conn| query_post(conn, id))
    }

    /// Applies a partial update; `None` fields keep their stored value.
    /// Returns the updated row, or `None` if the post does not exist.
    pub fn update_post(
        &self,
        id: i64,
        title: Option<&str>,
        content: Option<&str>,
    ) -> Result<Option<PostRow>> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE posts
                 SET title = COALESCE(?2, title), content = COALESCE(?3, content)
                 WHERE id = ?1",
                rusqlite::params![id, title, content],
            )?;
            if n == 0 {
                return Ok(None);
            }
            query_post(conn, id)
        })
    }

    /// Deletes a post and, through the foreign key, its comments.
    pub fn delete_post(&self, id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM posts WHERE id = ?1", [id])?;
            Ok(n > 0)
        })
    }

    // -- Comments --

    pub fn insert_comment(
        &self,
        content: &str,
        date_commented: &str,
        user_id: i64,
        post_id: i64,
    ) -> Result<CommentRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO comments (content, date_commented, user_id, post_id) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![content, date_commented, user_id, post_id],
            )?;
            Ok(CommentRow {
                id: conn.last_insert_rowid(),
                content: content.to_string(),
                date_commented: date_commented.to_string(),
                user_id,
                post_id,
            })
        })
    }

    /// Comments on a post, oldest first.
    pub fn list_comments_for_post(&self, post_id: i64) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, content, date_commented, user_id, post_id
                 FROM comments
                 WHERE post_id = ?1
                 ORDER BY date_commented ASC, id ASC",
            )?;
            let rows = stmt
                .query_map([post_id], comment_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_comment(&self, id: i64) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, content, date_commented, user_id, post_id FROM comments WHERE id = ?1",
                [id],
                comment_from_row,
            )
            .optional()
        })
    }

    pub fn delete_comment(&self, id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM comments WHERE id = ?1", [id])?;
            Ok(n > 0)
        })
    }
}

fn query_post(conn: &Connection, id: i64) -> Result<Option<PostRow>> {
    conn.query_row(
        "SELECT id, title, content, date_published, user_id FROM posts WHERE id = ?1",
        [id],
        post_from_row,
    )
    .optional()
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        date_published: row.get(3)?,
        user_id: row.get(4)?,
    })
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: row.get(0)?,
        content: row.get(1)?,
        date_commented: row.get(2)?,
        user_id: row.get(3)?,
        post_id: row.get(4)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
