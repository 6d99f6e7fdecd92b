//! SQLite schema for Albumbot
//!
//! Cards are the catalog, users track draw cooldowns, user_cards records
//! how many copies of each card a user owns.

use rusqlite::{Connection, Result};

/// Initialize the database with required tables
pub fn init_db(conn: &Connection) -> Result<()> {
    // Enable foreign key enforcement for CASCADE deletes
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS cards (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            category TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            image_url TEXT,
            percentage REAL NOT NULL DEFAULT 0
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL,
            last_draw_at TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS user_cards (
            user_id TEXT NOT NULL,
            card_id INTEGER NOT NULL,
            amount INTEGER NOT NULL DEFAULT 1,
            PRIMARY KEY (user_id, card_id),
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY (card_id) REFERENCES cards(id) ON DELETE CASCADE
        )",
        [],
    )?;

    create_indexes(conn)?;

    Ok(())
}

/// Create database indexes for query performance
fn create_indexes(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_cards_category ON cards(category, id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_user_cards_card ON user_cards(card_id)",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_db() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(init_db(&conn).is_ok());
        // Idempotent on an existing database
        assert!(init_db(&conn).is_ok());

        let table_count: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table'",
                [],
                |row| row.get(0),
            )
            .unwrap();

        assert_eq!(table_count, 3);
    }
}
