use rusqlite::{params, OptionalExtension, Row};

use super::*;

impl ContactsDb {
    // =========================================================================
    // Raw contacts
    // =========================================================================

    /// Insert a raw contact for an account. Returns the new local id.
    pub fn insert_raw_contact(
        &self,
        account_id: i64,
        backup_id: Option<&str>,
    ) -> Result<i64, DbError> {
        self.conn.execute(
            "INSERT INTO raw_contacts (account_id, backup_id) VALUES (?1, ?2)",
            params![account_id, backup_id],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Assign (or clear) the backup id of an existing raw contact.
    pub fn set_raw_contact_backup_id(
        &self,
        raw_contact_id: i64,
        backup_id: Option<&str>,
    ) -> Result<bool, DbError> {
        let changed = self.conn.execute(
            "UPDATE raw_contacts SET backup_id = ?1 WHERE _id = ?2",
            params![backup_id, raw_contact_id],
        )?;
        Ok(changed > 0)
    }

    pub fn get_raw_contact(&self, raw_contact_id: i64) -> Result<Option<DbRawContact>, DbError> {
        let contact = self
            .conn
            .query_row(
                "SELECT _id, account_id, backup_id, send_to_voicemail, starred, pinned
                 FROM raw_contacts WHERE _id = ?1",
                params![raw_contact_id],
                Self::map_raw_contact_row,
            )
            .optional()?;
        Ok(contact)
    }

    /// Find the raw contact carrying `backup_id` under the given account.
    ///
    /// Exact match only. When several rows share the backup id the oldest one wins.
    pub fn find_raw_contact_by_backup_id(
        &self,
        account_id: i64,
        backup_id: &str,
    ) -> Result<Option<i64>, DbError> {
        let id = self
            .conn
            .query_row(
                "SELECT _id FROM raw_contacts
                 WHERE account_id = ?1 AND backup_id = ?2
                 ORDER BY _id LIMIT 1",
                params![account_id, backup_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// Overwrite the three synced preference columns of a raw contact.
    /// Returns the number of rows changed (0 if the contact no longer exists).
    pub fn update_raw_contact_preferences(
        &self,
        raw_contact_id: i64,
        prefs: &ContactPreferences,
    ) -> Result<usize, DbError> {
        let changed = self.conn.execute(
            "UPDATE raw_contacts
             SET send_to_voicemail = ?1, starred = ?2, pinned = ?3
             WHERE _id = ?4",
            params![
                prefs.send_to_voicemail as i32,
                prefs.starred as i32,
                prefs.pinned,
                raw_contact_id
            ],
        )?;
        Ok(changed)
    }

    fn map_raw_contact_row(row: &Row) -> rusqlite::Result<DbRawContact> {
        Ok(DbRawContact {
            id: row.get(0)?,
            account_id: row.get(1)?,
            backup_id: row.get(2)?,
            send_to_voicemail: row.get::<_, i32>(3)? != 0,
            starred: row.get::<_, i32>(4)? != 0,
            pinned: row.get(5)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::test_db;
    use super::*;

    fn seeded() -> (ContactsDb, i64) {
        let db = test_db();
        let account_id = db
            .create_account(&AccountIdentity::new("a", "t", Some("plus")))
            .unwrap();
        (db, account_id)
    }

    #[test]
    fn test_new_raw_contact_has_default_preferences() {
        let (db, account_id) = seeded();
        let id = db.insert_raw_contact(account_id, None).unwrap();
        let contact = db.get_raw_contact(id).unwrap().expect("raw contact");
        assert_eq!(contact.account_id, account_id);
        assert!(!contact.send_to_voicemail);
        assert!(!contact.starred);
        assert_eq!(contact.pinned, 0);
    }

    #[test]
    fn test_find_by_backup_id_is_exact() {
        let (db, account_id) = seeded();
        let id = db.insert_raw_contact(account_id, None).unwrap();
        assert!(db.set_raw_contact_backup_id(id, Some("bk-1")).unwrap());

        assert_eq!(
            db.find_raw_contact_by_backup_id(account_id, "bk-1").unwrap(),
            Some(id)
        );
        assert_eq!(db.find_raw_contact_by_backup_id(account_id, "bk").unwrap(), None);
        assert_eq!(
            db.find_raw_contact_by_backup_id(account_id, &id.to_string()).unwrap(),
            None,
            "local ids are never used as a fallback"
        );
    }

    #[test]
    fn test_update_preferences_overwrites_all_three() {
        let (db, account_id) = seeded();
        let id = db.insert_raw_contact(account_id, Some("bk")).unwrap();
        let prefs = ContactPreferences {
            send_to_voicemail: true,
            starred: true,
            pinned: 3,
        };
        assert_eq!(db.update_raw_contact_preferences(id, &prefs).unwrap(), 1);

        let cleared = ContactPreferences {
            send_to_voicemail: false,
            starred: false,
            pinned: 0,
        };
        db.update_raw_contact_preferences(id, &cleared).unwrap();
        let contact = db.get_raw_contact(id).unwrap().unwrap();
        assert!(!contact.send_to_voicemail);
        assert!(!contact.starred);
        assert_eq!(contact.pinned, 0);
    }
}
