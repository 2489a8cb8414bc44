//! SQLite-backed contacts store and metadata sync table.
//!
//! One database file holds both the contact-store tables (accounts, raw
//! contacts, data rows, usage counters, aggregation exceptions) and the
//! `metadata_sync` table. Sharing a connection is what lets a metadata write
//! and the projection it triggers commit or roll back together.

use std::path::PathBuf;

use rusqlite::Connection;

pub mod accounts;
pub mod aggregation;
pub mod data;
pub mod metadata;
pub mod query;
pub mod raw_contacts;
pub mod types;

pub use query::ResultSet;
pub use types::*;

pub struct ContactsDb {
    conn: Connection,
}

impl ContactsDb {
    /// Borrow the underlying connection for ad-hoc queries.
    pub fn conn_ref(&self) -> &Connection {
        &self.conn
    }

    /// Execute a closure within a SQLite transaction.
    /// Commits on Ok, rolls back on Err.
    pub fn with_transaction<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<DbError>,
    {
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(DbError::from)?;
        match f(self) {
            Ok(val) => {
                if let Err(e) = self.conn.execute_batch("COMMIT") {
                    let _ = self.conn.execute_batch("ROLLBACK");
                    return Err(DbError::from(e).into());
                }
                Ok(val)
            }
            Err(e) => {
                let _ = self.conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }

    /// Execute a closure inside a named savepoint.
    ///
    /// On Err only the work done since the savepoint is undone; the enclosing
    /// transaction stays open. `name` must be a plain identifier.
    pub fn with_savepoint<F, T, E>(&self, name: &str, f: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<DbError>,
    {
        self.conn
            .execute_batch(&format!("SAVEPOINT {name}"))
            .map_err(DbError::from)?;
        match f(self) {
            Ok(val) => {
                self.conn
                    .execute_batch(&format!("RELEASE {name}"))
                    .map_err(DbError::from)?;
                Ok(val)
            }
            Err(e) => {
                let _ = self
                    .conn
                    .execute_batch(&format!("ROLLBACK TO {name}; RELEASE {name}"));
                Err(e)
            }
        }
    }

    /// Open (or create) the database at the configured path and apply the schema.
    pub fn open(config: &crate::config::Config) -> Result<Self, DbError> {
        let path = config.resolved_database_path()?;
        Self::open_with(path, config.wal_mode)
    }

    /// Open a database at an explicit path with WAL enabled.
    pub fn open_at(path: PathBuf) -> Result<Self, DbError> {
        Self::open_with(path, true)
    }

    fn open_with(path: PathBuf, wal_mode: bool) -> Result<Self, DbError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(DbError::CreateDir)?;
            }
        }

        let conn = Connection::open(&path)?;

        if wal_mode {
            conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        }

        crate::migrations::run_migrations(&conn).map_err(DbError::Migration)?;

        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        log::debug!("Opened contacts database at {}", path.display());
        Ok(Self { conn })
    }

    /// Default database location: `~/.contactsync/contacts.db`.
    pub fn default_path() -> Result<PathBuf, DbError> {
        let home = dirs::home_dir().ok_or(DbError::HomeDirNotFound)?;
        Ok(home.join(".contactsync").join("contacts.db"))
    }
}
