use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            username    TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            location    TEXT,
            email       TEXT,
            image       TEXT,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS listings (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            title       TEXT NOT NULL,
            condition   TEXT NOT NULL,
            description TEXT NOT NULL,
            price       REAL NOT NULL CHECK (price >= 0),
            image       TEXT NOT NULL,
            likes       INTEGER NOT NULL DEFAULT 0 CHECK (likes >= 0),
            dislikes    INTEGER NOT NULL DEFAULT 0 CHECK (dislikes >= 0),
            author_id   INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_listings_author
            ON listings(author_id);

        -- Tags are a shared vocabulary: created lazily, never deleted.
        CREATE TABLE IF NOT EXISTS tags (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS listing_tags (
            listing_id  INTEGER NOT NULL REFERENCES listings(id) ON DELETE CASCADE,
            tag_id      INTEGER NOT NULL REFERENCES tags(id),
            PRIMARY KEY (listing_id, tag_id)
        );

        CREATE TABLE IF NOT EXISTS favorites (
            user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            listing_id  INTEGER NOT NULL REFERENCES listings(id) ON DELETE CASCADE,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (user_id, listing_id)
        );

        CREATE TABLE IF NOT EXISTS blocks (
            blocker_id  INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            blocked_id  INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (blocker_id, blocked_id)
        );

        CREATE TABLE IF NOT EXISTS messages (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            sender_id   INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            receiver_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            content     TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_messages_receiver
            ON messages(receiver_id, created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
