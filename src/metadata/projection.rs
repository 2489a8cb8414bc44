//! Collaborator seams: resolving sync identities to local rows and writing
//! the projected preference columns.
//!
//! Both are implemented by `ContactsDb`, which shares its connection (and so
//! its open transaction) with the metadata table.

use crate::db::{AccountIdentity, ContactPreferences, ContactsDb, DbError};
use crate::error::ProviderError;

/// Local contact store as seen by the metadata engine.
pub trait LocalContactStore {
    /// Local raw contact id for `(account, backup_id)`, or `None` when the
    /// contact has not been created locally yet.
    fn resolve_local_id(
        &self,
        account: &AccountIdentity,
        backup_id: &str,
    ) -> Result<Option<i64>, DbError>;

    /// Overwrite the three projected columns on a local record.
    fn update_projection_columns(
        &self,
        local_id: i64,
        prefs: &ContactPreferences,
    ) -> Result<(), DbError>;
}

/// Account bookkeeping as seen by the metadata engine.
pub trait AccountLookup {
    /// Internal id for an account; `InvalidAccount` when it does not exist.
    fn resolve_account_internal_id(&self, account: &AccountIdentity) -> Result<i64, ProviderError>;
}

impl LocalContactStore for ContactsDb {
    fn resolve_local_id(
        &self,
        account: &AccountIdentity,
        backup_id: &str,
    ) -> Result<Option<i64>, DbError> {
        match self.find_account_id(account)? {
            Some(account_id) => self.find_raw_contact_by_backup_id(account_id, backup_id),
            None => Ok(None),
        }
    }

    fn update_projection_columns(
        &self,
        local_id: i64,
        prefs: &ContactPreferences,
    ) -> Result<(), DbError> {
        self.update_raw_contact_preferences(local_id, prefs)?;
        Ok(())
    }
}

impl AccountLookup for ContactsDb {
    fn resolve_account_internal_id(&self, account: &AccountIdentity) -> Result<i64, ProviderError> {
        self.find_account_id(account)?
            .ok_or_else(|| ProviderError::InvalidAccount(account.to_string()))
    }
}
