use rusqlite::params;
use sha2::{Digest, Sha256};

use super::*;
use crate::usage::UsageType;

/// Stable content hash for a data row, independent of its local id.
fn data_hash_id(row: &NewDataRow) -> String {
    let mut hasher = Sha256::new();
    hasher.update(row.mimetype.as_bytes());
    for value in [&row.data1, &row.data2, &row.data3] {
        hasher.update([0u8]);
        if let Some(v) = value {
            hasher.update(v.as_bytes());
        }
    }
    hex::encode(hasher.finalize())
}

impl ContactsDb {
    // =========================================================================
    // Data rows + usage counters
    // =========================================================================

    /// Insert a data row under a raw contact. Returns the new data id.
    pub fn insert_data(&self, row: &NewDataRow) -> Result<i64, DbError> {
        self.conn.execute(
            "INSERT INTO data (raw_contact_id, mimetype, hash_id, is_primary, is_super_primary,
                               data1, data2, data3)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                row.raw_contact_id,
                row.mimetype,
                data_hash_id(row),
                row.is_primary as i32,
                row.is_super_primary as i32,
                row.data1,
                row.data2,
                row.data3,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Bump the usage counter of one data row for one usage type.
    ///
    /// Returns false (and writes nothing) when the data row does not exist.
    pub fn record_data_usage(
        &self,
        data_id: i64,
        usage_type: UsageType,
        now_millis: i64,
    ) -> Result<bool, DbError> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM data WHERE _id = ?1)",
            params![data_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Ok(false);
        }

        self.conn.execute(
            "INSERT INTO data_usage_stat (data_id, usage_type, times_used, last_time_used)
             VALUES (?1, ?2, 1, ?3)
             ON CONFLICT(data_id, usage_type) DO UPDATE SET
                times_used = data_usage_stat.times_used + 1,
                last_time_used = MAX(data_usage_stat.last_time_used, excluded.last_time_used)",
            params![data_id, usage_type.as_i32(), now_millis],
        )?;
        Ok(true)
    }

    /// `(times_used, last_time_used)` for a data row and usage type, zeros if never used.
    pub fn get_data_usage(&self, data_id: i64, usage_type: UsageType) -> Result<(i64, i64), DbError> {
        let usage = self.conn.query_row(
            "SELECT COALESCE(MAX(times_used), 0), COALESCE(MAX(last_time_used), 0)
             FROM data_usage_stat WHERE data_id = ?1 AND usage_type = ?2",
            params![data_id, usage_type.as_i32()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(usage)
    }
}
