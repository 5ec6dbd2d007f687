use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id              TEXT PRIMARY KEY,
            display_name    TEXT NOT NULL,
            age             INTEGER NOT NULL,
            mode            TEXT NOT NULL,
            goals           TEXT NOT NULL DEFAULT '[]',
            interests       TEXT NOT NULL DEFAULT '[]',
            drinks          INTEGER NOT NULL DEFAULT 0,
            smokes          INTEGER NOT NULL DEFAULT 0,
            bio             TEXT NOT NULL DEFAULT '',
            lat             REAL NOT NULL,
            lon             REAL NOT NULL,
            cell            TEXT NOT NULL,
            created_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_users_cell_mode
            ON users(cell, mode);

        CREATE TABLE IF NOT EXISTS swipes (
            actor_id    TEXT NOT NULL REFERENCES users(id),
            target_id   TEXT NOT NULL REFERENCES users(id),
            decision    TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            PRIMARY KEY (actor_id, target_id)
        );

        CREATE TABLE IF NOT EXISTS matches (
            id          TEXT PRIMARY KEY,
            user_a      TEXT NOT NULL REFERENCES users(id),
            user_b      TEXT NOT NULL REFERENCES users(id),
            pair_key    TEXT NOT NULL UNIQUE,
            channel_id  TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_matches_channel
            ON matches(channel_id);

        -- Fast per-channel append log. Source of truth for live replay and
        -- history; survives actor retirement.
        CREATE TABLE IF NOT EXISTS chat_log (
            channel_id  TEXT NOT NULL,
            message_id  TEXT NOT NULL,
            sender_id   TEXT NOT NULL,
            body        TEXT NOT NULL,
            kind        TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            PRIMARY KEY (channel_id, created_at, message_id)
        );

        -- Durable cross-channel record. Best-effort copy; a failed write here
        -- is logged and swallowed, never surfaced.
        CREATE TABLE IF NOT EXISTS messages (
            id          TEXT PRIMARY KEY,
            match_id    TEXT NOT NULL REFERENCES matches(id),
            sender_id   TEXT NOT NULL,
            body        TEXT NOT NULL,
            kind        TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
