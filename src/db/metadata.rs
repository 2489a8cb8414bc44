use chrono::Utc;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};

use super::query::{TableSpec, WhereClause};
use super::*;

const METADATA_COLUMNS: &[(&str, &str)] = &[
    ("_id", "m._id"),
    ("account_name", "a.account_name"),
    ("account_type", "a.account_type"),
    ("data_set", "a.data_set"),
    ("raw_contact_backup_id", "m.raw_contact_backup_id"),
    ("data", "m.data"),
    ("deleted", "m.deleted"),
    ("account_id", "m.account_id"),
];

const METADATA_FROM: &str = "metadata_sync m JOIN accounts a ON a._id = m.account_id";

/// Column map for reads and filters on the `metadata_sync` resource.
pub fn metadata_table() -> TableSpec {
    TableSpec {
        name: "metadata_sync",
        from: METADATA_FROM.to_string(),
        columns: METADATA_COLUMNS,
        order_by: "m._id",
    }
}

impl ContactsDb {
    // =========================================================================
    // metadata_sync rows
    // =========================================================================

    /// Insert a metadata row. Uniqueness among active rows is enforced by the
    /// `metadata_sync_active_key` index; callers check first for a clean error.
    pub fn insert_metadata_row(
        &self,
        account_id: i64,
        backup_id: &str,
        data: &str,
        deleted: bool,
    ) -> Result<i64, DbError> {
        self.conn.execute(
            "INSERT INTO metadata_sync (account_id, raw_contact_backup_id, data, deleted, last_modified)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![account_id, backup_id, data, deleted as i32, Utc::now().to_rfc3339()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Id of the active (non-deleted) row for a key, ignoring `exclude_id`.
    pub fn find_active_metadata_id(
        &self,
        account_id: i64,
        backup_id: &str,
        exclude_id: Option<i64>,
    ) -> Result<Option<i64>, DbError> {
        let id = self
            .conn
            .query_row(
                "SELECT _id FROM metadata_sync
                 WHERE account_id = ?1 AND raw_contact_backup_id = ?2 AND deleted = 0
                   AND _id IS NOT ?3",
                params![account_id, backup_id, exclude_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    pub fn get_metadata_row(&self, id: i64) -> Result<Option<DbMetadataSync>, DbError> {
        let row = self
            .conn
            .query_row(
                &format!(
                    "SELECT m._id, m.account_id, a.account_name, a.account_type, a.data_set,
                            m.raw_contact_backup_id, m.data, m.deleted, m.last_modified
                     FROM {METADATA_FROM} WHERE m._id = ?1"
                ),
                params![id],
                Self::map_metadata_row,
            )
            .optional()?;
        Ok(row)
    }

    /// All metadata rows matching a compiled filter, oldest first.
    pub fn select_metadata_rows(&self, filter: &WhereClause) -> Result<Vec<DbMetadataSync>, DbError> {
        let sql = format!(
            "SELECT m._id, m.account_id, a.account_name, a.account_type, a.data_set,
                    m.raw_contact_backup_id, m.data, m.deleted, m.last_modified
             FROM {METADATA_FROM} WHERE {} ORDER BY m._id",
            filter.sql
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mapped = stmt.query_map(params_from_iter(filter.params.iter()), Self::map_metadata_row)?;
        let mut rows = Vec::new();
        for row in mapped {
            rows.push(row?);
        }
        Ok(rows)
    }

    /// Replace the document and deleted flag of one row.
    pub fn update_metadata_row(&self, id: i64, data: &str, deleted: bool) -> Result<usize, DbError> {
        let changed = self.conn.execute(
            "UPDATE metadata_sync SET data = ?1, deleted = ?2, last_modified = ?3 WHERE _id = ?4",
            params![data, deleted as i32, Utc::now().to_rfc3339(), id],
        )?;
        Ok(changed)
    }

    /// Physically remove every row matching a compiled filter.
    pub fn delete_metadata_rows(&self, filter: &WhereClause) -> Result<usize, DbError> {
        let sql = format!(
            "DELETE FROM metadata_sync WHERE _id IN (SELECT m._id FROM {METADATA_FROM} WHERE {})",
            filter.sql
        );
        let removed = self.conn.execute(&sql, params_from_iter(filter.params.iter()))?;
        Ok(removed)
    }

    fn map_metadata_row(row: &Row) -> rusqlite::Result<DbMetadataSync> {
        Ok(DbMetadataSync {
            id: row.get(0)?,
            account_id: row.get(1)?,
            account: AccountIdentity {
                account_name: row.get(2)?,
                account_type: row.get(3)?,
                data_set: row.get(4)?,
            },
            backup_id: row.get(5)?,
            data: row.get(6)?,
            deleted: row.get::<_, i32>(7)? != 0,
            last_modified: row.get(8)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::test_db;
    use super::*;
    use crate::filter::Filter;

    fn seeded() -> (ContactsDb, i64) {
        let db = test_db();
        let account_id = db
            .create_account(&AccountIdentity::new("n", "t", Some("plus")))
            .unwrap();
        (db, account_id)
    }

    #[test]
    fn test_active_lookup_skips_deleted_and_excluded_rows() {
        let (db, account_id) = seeded();
        db.insert_metadata_row(account_id, "b1", "{}", true).unwrap();
        assert_eq!(db.find_active_metadata_id(account_id, "b1", None).unwrap(), None);

        let active = db.insert_metadata_row(account_id, "b1", "{}", false).unwrap();
        assert_eq!(
            db.find_active_metadata_id(account_id, "b1", None).unwrap(),
            Some(active)
        );
        assert_eq!(
            db.find_active_metadata_id(account_id, "b1", Some(active)).unwrap(),
            None
        );
    }

    #[test]
    fn test_duplicate_active_insert_is_unique_violation() {
        let (db, account_id) = seeded();
        db.insert_metadata_row(account_id, "b1", "{}", false).unwrap();
        let err = db
            .insert_metadata_row(account_id, "b1", "{}", false)
            .unwrap_err();
        assert!(err.is_unique_violation(), "unexpected error: {err}");
    }

    #[test]
    fn test_select_and_delete_by_account_columns() {
        let (db, account_id) = seeded();
        let other = db.create_account(&AccountIdentity::new("o", "t", None)).unwrap();
        db.insert_metadata_row(account_id, "b1", "{}", false).unwrap();
        db.insert_metadata_row(account_id, "b2", "{}", false).unwrap();
        db.insert_metadata_row(other, "b1", "{}", false).unwrap();

        let spec = metadata_table();
        let filter = Filter::all()
            .eq_text("account_name", Some("o"))
            .eq_text("data_set", None);
        let clause = spec.compile_where(&filter, 1).unwrap();

        let rows = db.select_metadata_rows(&clause).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].account, AccountIdentity::new("o", "t", None));

        assert_eq!(db.delete_metadata_rows(&clause).unwrap(), 1);
        let all = spec.compile_where(&Filter::all(), 1).unwrap();
        assert_eq!(db.select_metadata_rows(&all).unwrap().len(), 2);
    }

    #[test]
    fn test_update_row_replaces_data_and_flag() {
        let (db, account_id) = seeded();
        let id = db.insert_metadata_row(account_id, "b1", "{\"v\":1}", false).unwrap();
        assert_eq!(db.update_metadata_row(id, "{\"v\":2}", true).unwrap(), 1);

        let row = db.get_metadata_row(id).unwrap().expect("row");
        assert_eq!(row.data, "{\"v\":2}");
        assert!(row.deleted);
        assert_eq!(row.backup_id, "b1");
    }
}
