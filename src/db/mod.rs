//! Database module for Albumbot
//!
//! Provides SQLite storage for cards, users and owned cards.

pub mod queries;
pub mod schema;

use crate::error::{BotError, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Database manager around a single serialized connection
pub struct Database {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl Database {
    /// Create a new database connection
    pub fn new(db_path: PathBuf) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        schema::init_db(&conn)?;

        Ok(Database {
            conn: Mutex::new(conn),
            path: db_path,
        })
    }

    /// Run `f` against the connection on the blocking pool.
    ///
    /// Keeps SQLite work off the async workers that serve interactions.
    pub async fn with_conn<F, T>(self: &Arc<Self>, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(self);
        tokio::task::spawn_blocking(move || {
            let mut conn = db
                .conn
                .lock()
                .map_err(|e| BotError::StoreUnavailable(format!("connection lock poisoned: {}", e)))?;
            f(&mut *conn).map_err(BotError::from)
        })
        .await?
    }

    /// Get the database file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}
