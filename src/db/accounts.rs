use rusqlite::{params, OptionalExtension};

use super::*;

impl ContactsDb {
    // =========================================================================
    // Accounts
    // =========================================================================

    /// Look up the internal id of an account. `None` when the account is unknown.
    pub fn find_account_id(&self, account: &AccountIdentity) -> Result<Option<i64>, DbError> {
        let id = self
            .conn
            .query_row(
                "SELECT _id FROM accounts
                 WHERE account_name = ?1 AND account_type = ?2 AND data_set IS ?3",
                params![account.account_name, account.account_type, account.data_set],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// Get-or-create an account row. Returns its internal id.
    pub fn create_account(&self, account: &AccountIdentity) -> Result<i64, DbError> {
        if let Some(id) = self.find_account_id(account)? {
            return Ok(id);
        }
        self.conn.execute(
            "INSERT INTO accounts (account_name, account_type, data_set) VALUES (?1, ?2, ?3)",
            params![account.account_name, account.account_type, account.data_set],
        )?;
        Ok(self.conn.last_insert_rowid())
    }
}
