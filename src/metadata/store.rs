//! The metadata record store: writes to `metadata_sync` and the projection
//! each write triggers.
//!
//! Every public write runs in its own transaction. The `*_in_tx` variants
//! assume the caller already holds one (see `batch.rs`).

use std::collections::HashSet;

use serde::Deserialize;

use super::parser::{parse_metadata_entry, MetadataEntry};
use super::projection::{AccountLookup, LocalContactStore};
use crate::columns::metadata_sync;
use crate::db::metadata::metadata_table;
use crate::db::{AccountIdentity, ContactsDb, DbError, DbMetadataSync, ResultSet};
use crate::error::ProviderError;
use crate::filter::Filter;

/// Column values for a metadata write.
///
/// On update the identity fields (`account_*`, `raw_contact_backup_id`)
/// never reassign a row; each one present narrows which rows the update hits.
/// An omitted `data_set` matches any data set.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MetadataValues {
    #[serde(default)]
    pub account_name: Option<String>,
    #[serde(default)]
    pub account_type: Option<String>,
    #[serde(default)]
    pub data_set: Option<String>,
    #[serde(default, rename = "raw_contact_backup_id")]
    pub backup_id: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub deleted: Option<bool>,
}

impl MetadataValues {
    /// Values for a full document row.
    pub fn new(account: &AccountIdentity, backup_id: &str, data: &str) -> Self {
        Self {
            account_name: Some(account.account_name.clone()),
            account_type: Some(account.account_type.clone()),
            data_set: account.data_set.clone(),
            backup_id: Some(backup_id.to_string()),
            data: Some(data.to_string()),
            deleted: Some(false),
        }
    }

    /// Values that only replace the document body.
    pub fn document(data: &str) -> Self {
        Self {
            data: Some(data.to_string()),
            ..Default::default()
        }
    }

    pub fn with_deleted(mut self, deleted: bool) -> Self {
        self.deleted = Some(deleted);
        self
    }

    /// The account these values name, if both name and type are present.
    pub fn account(&self) -> Option<AccountIdentity> {
        match (&self.account_name, &self.account_type) {
            (Some(name), Some(account_type)) => Some(AccountIdentity {
                account_name: name.clone(),
                account_type: account_type.clone(),
                data_set: self.data_set.clone(),
            }),
            _ => None,
        }
    }
}

/// Which metadata rows an update or delete addresses.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Target {
    /// A single row by id.
    Row(i64),
    /// Every row matching a filter (deleted rows included).
    Matching(Filter),
    /// The row created by an earlier insert in the same batch.
    InsertedBy(usize),
}

/// Metadata engine bound to a database and its collaborators.
pub struct MetadataStore<'a> {
    db: &'a ContactsDb,
    contacts: &'a dyn LocalContactStore,
    accounts: &'a dyn AccountLookup,
}

impl<'a> MetadataStore<'a> {
    /// Engine whose collaborators live in the same database.
    pub fn new(db: &'a ContactsDb) -> Self {
        Self {
            db,
            contacts: db,
            accounts: db,
        }
    }

    pub fn with_collaborators(
        db: &'a ContactsDb,
        contacts: &'a dyn LocalContactStore,
        accounts: &'a dyn AccountLookup,
    ) -> Self {
        Self {
            db,
            contacts,
            accounts,
        }
    }

    pub(crate) fn db(&self) -> &'a ContactsDb {
        self.db
    }

    /// Insert one document. Returns the new row id.
    pub fn insert(&self, values: &MetadataValues) -> Result<i64, ProviderError> {
        self.db.with_transaction(|_| self.insert_in_tx(values))
    }

    /// Update the rows `target` addresses. Returns how many rows changed.
    pub fn update(&self, target: &Target, values: &MetadataValues) -> Result<usize, ProviderError> {
        self.db.with_transaction(|_| self.update_in_tx(target, values))
    }

    /// Physically delete the rows `target` addresses. Returns how many were removed.
    pub fn delete(&self, target: &Target) -> Result<usize, ProviderError> {
        self.db.with_transaction(|_| self.delete_in_tx(target))
    }

    /// Insert each document independently. Returns how many were inserted.
    ///
    /// A document the caller got wrong (bad JSON, taken key, unknown account)
    /// is skipped; a storage failure aborts the whole call.
    pub fn bulk_insert(&self, values: &[MetadataValues]) -> Result<usize, ProviderError> {
        self.db.with_transaction(|db| {
            let mut inserted = 0;
            for (index, row) in values.iter().enumerate() {
                match db.with_savepoint("metadata_bulk_row", |_| self.insert_in_tx(row)) {
                    Ok(_) => inserted += 1,
                    Err(e) if e.is_caller_error() => {
                        log::warn!("Bulk insert skipped row {}: {}", index, e);
                    }
                    Err(e) => return Err(e),
                }
            }
            Ok(inserted)
        })
    }

    /// Read metadata rows. `columns = None` returns every column, including
    /// the derived `account_id`.
    pub fn query(&self, filter: &Filter, columns: Option<&[String]>) -> Result<ResultSet, ProviderError> {
        let spec = metadata_table();
        let projection = spec.compile_projection(columns)?;
        let clause = spec.compile_where(filter, 1)?;
        Ok(self.db.query_table(&spec, &projection, &clause)?)
    }

    pub(crate) fn insert_in_tx(&self, values: &MetadataValues) -> Result<i64, ProviderError> {
        let data = values
            .data
            .as_deref()
            .ok_or_else(|| ProviderError::InvalidDocument("data is required".to_string()))?;
        let entry = parse_metadata_entry(data)?;

        let backup_id = values
            .backup_id
            .as_deref()
            .filter(|b| !b.is_empty())
            .ok_or_else(|| {
                ProviderError::InvalidDocument(format!(
                    "{} is required",
                    metadata_sync::RAW_CONTACT_BACKUP_ID
                ))
            })?;
        let account = values.account().ok_or_else(|| {
            ProviderError::InvalidAccount("account_name and account_type are required".to_string())
        })?;
        let account_id = self.accounts.resolve_account_internal_id(&account)?;
        let deleted = values.deleted.unwrap_or(false);

        if !deleted
            && self
                .db
                .find_active_metadata_id(account_id, backup_id, None)?
                .is_some()
        {
            return Err(constraint_violation(&account, backup_id));
        }

        let id = self
            .db
            .insert_metadata_row(account_id, backup_id, data, deleted)
            .map_err(|e| unique_or_db(e, &account, backup_id))?;

        if !deleted {
            self.project(&account, backup_id, &entry)?;
        }
        log::debug!("Inserted metadata row {} for {} / {}", id, account, backup_id);
        Ok(id)
    }

    pub(crate) fn update_in_tx(
        &self,
        target: &Target,
        values: &MetadataValues,
    ) -> Result<usize, ProviderError> {
        let data = values
            .data
            .as_deref()
            .ok_or_else(|| ProviderError::InvalidDocument("data is required".to_string()))?;
        let entry = parse_metadata_entry(data)?;

        let mut rows = self.target_rows(target)?;
        narrow_to_key(&mut rows, values);

        for row in &rows {
            let deleted = values.deleted.unwrap_or(row.deleted);
            if !deleted
                && row.deleted
                && self
                    .db
                    .find_active_metadata_id(row.account_id, &row.backup_id, Some(row.id))?
                    .is_some()
            {
                return Err(constraint_violation(&row.account, &row.backup_id));
            }

            self.db
                .update_metadata_row(row.id, data, deleted)
                .map_err(|e| unique_or_db(e, &row.account, &row.backup_id))?;

            if !deleted {
                self.project(&row.account, &row.backup_id, &entry)?;
            }
        }
        log::debug!("Updated {} metadata row(s)", rows.len());
        Ok(rows.len())
    }

    pub(crate) fn delete_in_tx(&self, target: &Target) -> Result<usize, ProviderError> {
        let filter = match target {
            Target::Row(id) => Filter::all().eq(metadata_sync::ID, *id),
            Target::Matching(filter) => filter.clone(),
            Target::InsertedBy(_) => return Err(back_reference_outside_batch()),
        };
        let clause = metadata_table().compile_where(&filter, 1)?;
        let removed = self.db.delete_metadata_rows(&clause)?;
        log::debug!("Deleted {} metadata row(s)", removed);
        Ok(removed)
    }

    fn target_rows(&self, target: &Target) -> Result<Vec<DbMetadataSync>, ProviderError> {
        match target {
            Target::Row(id) => Ok(self.db.get_metadata_row(*id)?.into_iter().collect()),
            Target::Matching(filter) => {
                let clause = metadata_table().compile_where(filter, 1)?;
                Ok(self.db.select_metadata_rows(&clause)?)
            }
            Target::InsertedBy(_) => Err(back_reference_outside_batch()),
        }
    }

    /// Copy the document's preferences onto the matching local contact.
    /// Returns whether a local contact was written.
    fn project(
        &self,
        account: &AccountIdentity,
        backup_id: &str,
        entry: &MetadataEntry,
    ) -> Result<bool, ProviderError> {
        if entry.contact_id != backup_id {
            log::warn!(
                "Document for {} names contact '{}' but is stored under backup id '{}'; not projecting",
                account,
                entry.contact_id,
                backup_id
            );
            return Ok(false);
        }

        match self.contacts.resolve_local_id(account, backup_id)? {
            Some(local_id) => {
                self.contacts
                    .update_projection_columns(local_id, &entry.preferences)?;
                log::debug!("Projected metadata for {} onto raw contact {}", backup_id, local_id);
                Ok(true)
            }
            None => {
                log::debug!("No local contact for {} / {} yet; projection skipped", account, backup_id);
                Ok(false)
            }
        }
    }
}

/// Apply the identity values of an update as extra match conditions, one
/// field at a time. When they name a backup id whose key has an active row,
/// that key's soft-deleted rows drop out.
fn narrow_to_key(rows: &mut Vec<DbMetadataSync>, values: &MetadataValues) {
    if let Some(name) = values.account_name.as_deref() {
        rows.retain(|row| row.account.account_name == name);
    }
    if let Some(account_type) = values.account_type.as_deref() {
        rows.retain(|row| row.account.account_type == account_type);
    }
    if let Some(data_set) = values.data_set.as_deref() {
        rows.retain(|row| row.account.data_set.as_deref() == Some(data_set));
    }
    if let Some(backup_id) = values.backup_id.as_deref() {
        rows.retain(|row| row.backup_id == backup_id);
        let active: HashSet<i64> = rows
            .iter()
            .filter(|row| !row.deleted)
            .map(|row| row.account_id)
            .collect();
        rows.retain(|row| !row.deleted || !active.contains(&row.account_id));
    }
}

fn constraint_violation(account: &AccountIdentity, backup_id: &str) -> ProviderError {
    ProviderError::ConstraintViolation {
        account: account.to_string(),
        backup_id: backup_id.to_string(),
    }
}

fn unique_or_db(err: DbError, account: &AccountIdentity, backup_id: &str) -> ProviderError {
    if err.is_unique_violation() {
        constraint_violation(account, backup_id)
    } else {
        ProviderError::Db(err)
    }
}

fn back_reference_outside_batch() -> ProviderError {
    ProviderError::UnsupportedResource("insertedBy targets are only valid inside a batch".to_string())
}
