//! Database schema and migrations

use rusqlite::Connection;

use crate::Result;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
///
/// # Errors
///
/// Returns error if migration fails
pub fn init(conn: &Connection) -> Result<()> {
    let version: i32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- Whisper history: one row per (sender, receiver) pair
        CREATE TABLE IF NOT EXISTS history (
            sender_id         TEXT NOT NULL,
            receiver_id       TEXT NOT NULL,
            display_name      TEXT NOT NULL,
            first_name        TEXT NOT NULL,
            profile_photo_url TEXT,
            PRIMARY KEY (sender_id, receiver_id)
        );

        PRAGMA user_version = 1;
        ",
    )?;

    Ok(())
}
