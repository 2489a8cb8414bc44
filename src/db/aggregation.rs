use rusqlite::params;

use super::*;

/// How two raw contacts must be aggregated, overriding the automatic rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationExceptionType {
    /// No override; removes any stored exception for the pair.
    Automatic,
    KeepTogether,
    KeepSeparate,
}

impl AggregationExceptionType {
    pub fn as_i32(self) -> i32 {
        match self {
            AggregationExceptionType::Automatic => 0,
            AggregationExceptionType::KeepTogether => 1,
            AggregationExceptionType::KeepSeparate => 2,
        }
    }
}

impl ContactsDb {
    /// Store an aggregation exception for a pair of raw contacts.
    ///
    /// The pair is unordered: `(a, b)` and `(b, a)` address the same row.
    pub fn set_aggregation_exception(
        &self,
        exception_type: AggregationExceptionType,
        raw_contact_id1: i64,
        raw_contact_id2: i64,
    ) -> Result<(), DbError> {
        let (low, high) = if raw_contact_id1 <= raw_contact_id2 {
            (raw_contact_id1, raw_contact_id2)
        } else {
            (raw_contact_id2, raw_contact_id1)
        };

        if exception_type == AggregationExceptionType::Automatic {
            self.conn.execute(
                "DELETE FROM aggregation_exceptions WHERE raw_contact_id1 = ?1 AND raw_contact_id2 = ?2",
                params![low, high],
            )?;
            return Ok(());
        }

        self.conn.execute(
            "INSERT INTO aggregation_exceptions (type, raw_contact_id1, raw_contact_id2)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(raw_contact_id1, raw_contact_id2) DO UPDATE SET type = excluded.type",
            params![exception_type.as_i32(), low, high],
        )?;
        Ok(())
    }
}
