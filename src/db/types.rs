//! Shared type definitions for the database layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors specific to database operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),
}

impl DbError {
    /// True when SQLite rejected the statement because of a UNIQUE index.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            DbError::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => {
                err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
            }
            _ => false,
        }
    }
}

/// Account identity as the contact store and sync documents see it.
///
/// `data_set` is part of the key: `(name, type, None)` and
/// `(name, type, Some("plus"))` are different accounts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountIdentity {
    pub account_name: String,
    pub account_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_set: Option<String>,
}

impl AccountIdentity {
    pub fn new(name: &str, account_type: &str, data_set: Option<&str>) -> Self {
        Self {
            account_name: name.to_string(),
            account_type: account_type.to_string(),
            data_set: data_set.map(str::to_string),
        }
    }
}

impl std::fmt::Display for AccountIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.data_set {
            Some(ds) => write!(f, "{}/{}/{}", self.account_type, self.account_name, ds),
            None => write!(f, "{}/{}", self.account_type, self.account_name),
        }
    }
}

/// A row from the `metadata_sync` table, joined with its account.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DbMetadataSync {
    pub id: i64,
    pub account_id: i64,
    pub account: AccountIdentity,
    pub backup_id: String,
    pub data: String,
    pub deleted: bool,
    pub last_modified: String,
}

/// A row from the `raw_contacts` table.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DbRawContact {
    pub id: i64,
    pub account_id: i64,
    pub backup_id: Option<String>,
    pub send_to_voicemail: bool,
    pub starred: bool,
    pub pinned: i64,
}

/// Columns for a new row in the `data` table.
#[derive(Debug, Clone, Default)]
pub struct NewDataRow {
    pub raw_contact_id: i64,
    pub mimetype: String,
    pub data1: Option<String>,
    pub data2: Option<String>,
    pub data3: Option<String>,
    pub is_primary: bool,
    pub is_super_primary: bool,
}

/// The three columns a metadata document projects onto its raw contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactPreferences {
    pub send_to_voicemail: bool,
    pub starred: bool,
    pub pinned: i64,
}
