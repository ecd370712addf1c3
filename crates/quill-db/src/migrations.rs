use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);"
    )?;

    let version: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                username    TEXT NOT NULL UNIQUE,
                email       TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE posts (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                title           TEXT NOT NULL,
                content         TEXT NOT NULL,
                date_published  TEXT NOT NULL,
                user_id         INTEGER NOT NULL REFERENCES users(id)
            );

            CREATE INDEX idx_posts_published ON posts(date_published);
            CREATE INDEX idx_posts_user ON posts(user_id);

            CREATE TABLE comments (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                content         TEXT NOT NULL,
                date_commented  TEXT NOT NULL,
                user_id         INTEGER NOT NULL REFERENCES users(id),
                post_id         INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE
            );

            CREATE INDEX idx_comments_post ON comments(post_id, date_commented);
            CREATE INDEX idx_comments_user ON comments(user_id);

            CREATE TABLE sessions (
                id          TEXT PRIMARY KEY,
                user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL,
                expires_at  TEXT NOT NULL
            );

            CREATE INDEX idx_sessions_expires ON sessions(expires_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
