//! Persistent page registry backed by SQLite.
//!
//! The registry stores one row per markdown document discovered in the
//! content tree:
//!
//! ```text
//! pages(path TEXT PRIMARY KEY, title TEXT, is_visible INTEGER, visit_count INTEGER)
//! ```
//!
//! # Consistency
//!
//! Every operation is a single SQL statement, so each mutation relies on
//! SQLite's own atomicity for the affected row. The connection sits behind a
//! mutex; callers in async contexts should dispatch through `spawn_blocking`.
//!
//! Rows are never deleted. A page whose file disappears from the content tree
//! keeps its row (and its visit count) until an operator intervenes.

mod pages;

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::Connection;
use thiserror::Error;
use tracing::debug;

use crate::types::PagePath;

/// Errors from registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No row exists for the given path.
    #[error("page not found: {0}")]
    NotFound(PagePath),

    /// SQLite error.
    #[error("sqlite error: {0}")]
    Sql(#[from] rusqlite::Error),

    /// IO error while preparing the database location.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS pages (
    path TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    is_visible INTEGER NOT NULL DEFAULT 1,
    visit_count INTEGER NOT NULL DEFAULT 0
);
"#;

/// Handle to the page registry.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
#[derive(Debug)]
pub struct PageRegistry {
    conn: Mutex<Connection>,
}

impl PageRegistry {
    /// Opens (or creates) the registry database at `db_path`.
    ///
    /// The parent directory is created if needed and the schema is applied
    /// idempotently.
    pub fn open(db_path: impl AsRef<Path>) -> RegistryResult<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        debug!(path = %db_path.display(), "Opened page registry");
        Self::from_connection(conn)
    }

    /// Opens a private in-memory registry.
    pub fn open_in_memory() -> RegistryResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> RegistryResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(PageRegistry {
            conn: Mutex::new(conn),
        })
    }

    /// Locks the connection, ignoring poisoning. Each operation is a single
    /// statement, so a panicking holder leaves no partial write behind.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
