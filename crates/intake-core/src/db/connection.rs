//! Database connection management

use crate::config::StoreConfig;
use crate::error::Result;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::migrations;

/// Database wrapper for a single `SQLite` connection
pub struct Database {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Database {
    /// Open a database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub fn open(path: impl AsRef<Path>, config: &StoreConfig) -> Result<Self> {
        let database = Self::connect(path, config)?;
        database.migrate()?;
        Ok(database)
    }

    /// Open a connection to an already migrated database file
    pub fn connect(path: impl AsRef<Path>, config: &StoreConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)?;

        let database = Self {
            conn,
            path: Some(path),
        };
        database.configure(config.busy_timeout())?;
        Ok(database)
    }

    /// Open an in-memory database (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;

        let database = Self { conn, path: None };
        database.configure(StoreConfig::default().busy_timeout())?;
        database.migrate()?;
        Ok(database)
    }

    /// Configure `SQLite` for concurrent writers
    fn configure(&self, busy_timeout: Duration) -> Result<()> {
        // Lock waits beyond this fail with SQLITE_BUSY
        self.conn.busy_timeout(busy_timeout)?;

        if self.path.is_some() {
            // WAL lets readers proceed while a writer holds the lock
            let mode: String =
                self.conn
                    .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
            tracing::debug!("journal_mode = {mode}");
            self.conn.pragma_update(None, "synchronous", "NORMAL")?;
        }
        self.conn.pragma_update(None, "foreign_keys", true)?;
        Ok(())
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        migrations::run(&self.conn)
    }

    /// Get a reference to the underlying connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Database file, `None` for in-memory databases
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// Begin a write transaction that takes the database write lock up front.
///
/// `SQLite` has no `SELECT ... FOR UPDATE`; `BEGIN IMMEDIATE` acquires the
/// reserved lock before the first read, so a clock read inside the
/// transaction cannot be invalidated by a concurrent writer.
pub(crate) fn write_transaction(conn: &Connection) -> Result<Transaction<'_>> {
    Ok(Transaction::new_unchecked(
        conn,
        TransactionBehavior::Immediate,
    )?)
}
