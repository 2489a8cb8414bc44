//! Usage feedback: per-data-row "times used / last used" counters.

use serde::{Deserialize, Serialize};

use crate::db::{ContactsDb, DbError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageType {
    Call,
    LongText,
    ShortText,
}

impl UsageType {
    pub fn as_i32(self) -> i32 {
        match self {
            UsageType::Call => 0,
            UsageType::LongText => 1,
            UsageType::ShortText => 2,
        }
    }

    /// Parse the query-parameter spelling (`call`, `long_text`, `short_text`).
    pub fn from_param(value: &str) -> Option<Self> {
        match value {
            "call" => Some(UsageType::Call),
            "long_text" => Some(UsageType::LongText),
            "short_text" => Some(UsageType::ShortText),
            _ => None,
        }
    }
}

/// Record one use of each listed data row. Returns how many rows were updated;
/// ids that do not exist are skipped.
pub fn update_usage_stats(
    db: &ContactsDb,
    data_ids: &[i64],
    usage_type: UsageType,
    now_millis: i64,
) -> Result<usize, DbError> {
    db.with_transaction(|tx| {
        let mut updated = 0;
        for &data_id in data_ids {
            if tx.record_data_usage(data_id, usage_type, now_millis)? {
                updated += 1;
            }
        }
        log::debug!(
            "Usage feedback ({:?}): {} of {} data row(s) updated",
            usage_type,
            updated,
            data_ids.len()
        );
        Ok(updated)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::test_db;
    use crate::db::{AccountIdentity, NewDataRow};

    #[test]
    fn test_param_spellings() {
        assert_eq!(UsageType::from_param("call"), Some(UsageType::Call));
        assert_eq!(UsageType::from_param("long_text"), Some(UsageType::LongText));
        assert_eq!(UsageType::from_param("short_text"), Some(UsageType::ShortText));
        assert_eq!(UsageType::from_param("CALL"), None);
    }

    #[test]
    fn test_update_usage_stats_counts_existing_rows() {
        let db = test_db();
        let account_id = db.create_account(&AccountIdentity::new("a", "t", None)).unwrap();
        let raw_id = db.insert_raw_contact(account_id, None).unwrap();
        let d1 = db
            .insert_data(&NewDataRow {
                raw_contact_id: raw_id,
                mimetype: "vnd.android.cursor.item/email_v2".to_string(),
                data1: Some("a@b.c".to_string()),
                ..Default::default()
            })
            .unwrap();

        let updated = update_usage_stats(&db, &[d1, d1 + 50], UsageType::LongText, 42).unwrap();
        assert_eq!(updated, 1);
        assert_eq!(db.get_data_usage(d1, UsageType::LongText).unwrap(), (1, 42));
        assert_eq!(db.get_data_usage(d1, UsageType::Call).unwrap(), (0, 0));
    }
}
