//! Runtime configuration, read from `~/.contactsync/config.json`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::db::{ContactsDb, DbError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Database file; `~` expands to the home directory. Defaults to
    /// `~/.contactsync/contacts.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<String>,
    /// `env_logger` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

fn default_log_filter() -> String {
    "info".to_string()
}

fn default_wal_mode() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            log_filter: default_log_filter(),
            wal_mode: default_wal_mode(),
        }
    }
}

impl Config {
    pub fn resolved_database_path(&self) -> Result<PathBuf, DbError> {
        match self.database_path.as_deref() {
            None => ContactsDb::default_path(),
            Some(path) => match path.strip_prefix("~/") {
                Some(rest) => {
                    let home = dirs::home_dir().ok_or(DbError::HomeDirNotFound)?;
                    Ok(home.join(rest))
                }
                None => Ok(PathBuf::from(path)),
            },
        }
    }
}

pub fn config_path() -> Result<PathBuf, String> {
    let home = dirs::home_dir().ok_or("Could not find home directory")?;
    Ok(home.join(".contactsync").join("config.json"))
}

/// Load the config file, falling back to defaults when there is none.
pub fn load_config() -> Result<Config, String> {
    load_config_from(&config_path()?)
}

pub fn load_config_from(path: &Path) -> Result<Config, String> {
    if !path.exists() {
        log::debug!("No config at {}, using defaults", path.display());
        return Ok(Config::default());
    }

    let content =
        fs::read_to_string(path).map_err(|e| format!("Failed to read config: {}", e))?;

    serde_json::from_str(&content).map_err(|e| format!("Failed to parse config: {}", e))
}
