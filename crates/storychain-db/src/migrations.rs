use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            username    TEXT NOT NULL UNIQUE,
            email       TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS stories (
            id          TEXT PRIMARY KEY,
            title       TEXT NOT NULL,
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_stories_user
            ON stories(user_id);

        CREATE TABLE IF NOT EXISTS paragraphs (
            id          TEXT PRIMARY KEY,
            story_id    TEXT NOT NULL REFERENCES stories(id) ON DELETE CASCADE,
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            content     TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_paragraphs_story
            ON paragraphs(story_id, created_at);

        -- Vote ledgers. The composite primary key is the invariant: at most
        -- one row per (target, user) pair, enforced by the store itself.
        CREATE TABLE IF NOT EXISTS story_votes (
            story_id    TEXT NOT NULL REFERENCES stories(id) ON DELETE CASCADE,
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (story_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS paragraph_votes (
            paragraph_id TEXT NOT NULL REFERENCES paragraphs(id) ON DELETE CASCADE,
            user_id      TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at   TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (paragraph_id, user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_paragraph_votes_user
            ON paragraph_votes(user_id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
