//! Atomic batches of metadata writes.
//!
//! Operations run in list order inside one transaction, so each sees the
//! effects of the ones before it. The first failure rolls everything back
//! and is reported as `BatchAborted` with the failing operation's index.

use serde::{Deserialize, Serialize};

use super::store::{MetadataStore, MetadataValues, Target};
use crate::error::ProviderError;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum MetadataOperation {
    Insert { values: MetadataValues },
    Update { target: Target, values: MetadataValues },
    Delete { target: Target },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum OperationResult {
    Inserted { id: i64 },
    Updated { count: usize },
    Deleted { count: usize },
}

impl OperationResult {
    /// Row id if this was an insert.
    pub fn inserted_id(&self) -> Option<i64> {
        match self {
            OperationResult::Inserted { id } => Some(*id),
            _ => None,
        }
    }
}

impl MetadataStore<'_> {
    /// Apply `operations` all-or-nothing. Returns one result per operation.
    pub fn apply_batch(
        &self,
        operations: &[MetadataOperation],
    ) -> Result<Vec<OperationResult>, ProviderError> {
        let results = self.db().with_transaction(|_| {
            let mut results: Vec<OperationResult> = Vec::with_capacity(operations.len());
            for (index, operation) in operations.iter().enumerate() {
                let result = self
                    .apply_one(index, operation, &results)
                    .map_err(|e| ProviderError::BatchAborted {
                        index,
                        source: Box::new(e),
                    })?;
                results.push(result);
            }
            Ok::<_, ProviderError>(results)
        })?;

        log::info!("Committed metadata batch of {} operation(s)", results.len());
        Ok(results)
    }

    fn apply_one(
        &self,
        index: usize,
        operation: &MetadataOperation,
        earlier: &[OperationResult],
    ) -> Result<OperationResult, ProviderError> {
        match operation {
            MetadataOperation::Insert { values } => Ok(OperationResult::Inserted {
                id: self.insert_in_tx(values)?,
            }),
            MetadataOperation::Update { target, values } => {
                let target = resolve_back_reference(index, target, earlier)?;
                Ok(OperationResult::Updated {
                    count: self.update_in_tx(&target, values)?,
                })
            }
            MetadataOperation::Delete { target } => {
                let target = resolve_back_reference(index, target, earlier)?;
                Ok(OperationResult::Deleted {
                    count: self.delete_in_tx(&target)?,
                })
            }
        }
    }
}

/// Swap an `InsertedBy` target for the row id that insert produced.
fn resolve_back_reference(
    index: usize,
    target: &Target,
    earlier: &[OperationResult],
) -> Result<Target, ProviderError> {
    match target {
        Target::InsertedBy(referenced) => earlier
            .get(*referenced)
            .and_then(OperationResult::inserted_id)
            .map(Target::Row)
            .ok_or(ProviderError::InvalidBackReference {
                index,
                target: *referenced,
            }),
        other => Ok(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::super::parser::test_docs::document;
    use super::*;
    use crate::columns::metadata_sync;
    use crate::db::test_utils::test_db;
    use crate::db::{AccountIdentity, ContactsDb};
    use crate::filter::Filter;
    use crate::metadata::projection::test_stores::RejectingStore;

    const TYPE1: &str = "test_account_type1";
    const NAME1: &str = "test_account_name1";
    const TYPE2: &str = "test_account_type2";
    const NAME2: &str = "test_account_name2";

    fn account1() -> AccountIdentity {
        AccountIdentity::new(NAME1, TYPE1, Some("plus"))
    }

    fn account2() -> AccountIdentity {
        AccountIdentity::new(NAME2, TYPE2, None)
    }

    fn by_account(account: &AccountIdentity) -> Filter {
        Filter::all()
            .eq_text(metadata_sync::ACCOUNT_NAME, Some(&account.account_name))
            .eq_text(metadata_sync::ACCOUNT_TYPE, Some(&account.account_type))
            .eq_text(metadata_sync::DATA_SET, account.data_set.as_deref())
    }

    /// One active document per account, as a fresh sync would leave them.
    fn setup() -> ContactsDb {
        let db = test_db();
        db.create_account(&account1()).unwrap();
        db.create_account(&account2()).unwrap();
        let store = MetadataStore::new(&db);
        store
            .insert(&MetadataValues::new(
                &account1(),
                "1001",
                &document(TYPE1, NAME1, "1001", true, true, 2),
            ))
            .unwrap();
        store
            .insert(&MetadataValues::new(
                &account2(),
                "1002",
                &document(TYPE2, NAME2, "1002", true, true, 2),
            ))
            .unwrap();
        db
    }

    fn data_values(rs: &crate::db::ResultSet) -> Vec<String> {
        let mut values: Vec<String> = (0..rs.len())
            .filter_map(|i| rs.get_str(i, metadata_sync::DATA).map(str::to_string))
            .collect();
        values.sort();
        values
    }

    #[test]
    fn test_update_insert_delete_batch() {
        let db = setup();
        let store = MetadataStore::new(&db);
        let updated = document(TYPE1, NAME1, "1001", true, false, 5);
        let inserted = document(TYPE1, NAME1, "2222", true, false, 5);

        let ops = vec![
            MetadataOperation::Update {
                target: Target::Matching(by_account(&account1())),
                values: MetadataValues::new(&account1(), "1001", &updated),
            },
            MetadataOperation::Insert {
                values: MetadataValues::new(&account1(), "2222", &inserted),
            },
            MetadataOperation::Delete {
                target: Target::Matching(by_account(&account2())),
            },
        ];
        let results = store.apply_batch(&ops).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0], OperationResult::Updated { count: 1 });
        assert!(results[1].inserted_id().is_some());
        assert_eq!(results[2], OperationResult::Deleted { count: 1 });

        let rows = store.query(&by_account(&account1()), None).unwrap();
        let mut expected = vec![updated, inserted];
        expected.sort();
        assert_eq!(data_values(&rows), expected);
        assert!(store.query(&by_account(&account2()), None).unwrap().is_empty());
    }

    #[test]
    fn test_delete_matching_nothing_is_not_a_failure() {
        let db = setup();
        let store = MetadataStore::new(&db);
        let ghost = Filter::all().eq_text(metadata_sync::ACCOUNT_NAME, Some("nobody"));

        let ops = vec![
            MetadataOperation::Update {
                target: Target::Matching(by_account(&account1())),
                values: MetadataValues::document(&document(TYPE1, NAME1, "1001", false, false, 1)),
            },
            MetadataOperation::Insert {
                values: MetadataValues::new(
                    &account1(),
                    "3333",
                    &document(TYPE1, NAME1, "3333", false, false, 1),
                ),
            },
            MetadataOperation::Delete {
                target: Target::Matching(ghost),
            },
        ];
        let results = store.apply_batch(&ops).unwrap();
        assert_eq!(results[2], OperationResult::Deleted { count: 0 });
        assert_eq!(store.query(&by_account(&account1()), None).unwrap().len(), 2);
    }

    #[test]
    fn test_malformed_update_rolls_back_whole_batch() {
        let db = setup();
        let store = MetadataStore::new(&db);
        let before = data_values(&store.query(&Filter::all(), None).unwrap());

        let ops = vec![
            MetadataOperation::Insert {
                values: MetadataValues::new(
                    &account1(),
                    "4444",
                    &document(TYPE1, NAME1, "4444", true, true, 1),
                ),
            },
            MetadataOperation::Update {
                target: Target::Matching(by_account(&account1())),
                values: MetadataValues::document("{not json"),
            },
            MetadataOperation::Delete {
                target: Target::Matching(by_account(&account2())),
            },
        ];
        let err = store.apply_batch(&ops).unwrap_err();
        match err {
            ProviderError::BatchAborted { index, source } => {
                assert_eq!(index, 1);
                assert!(matches!(*source, ProviderError::InvalidDocument(_)));
            }
            other => panic!("expected BatchAborted, got {other:?}"),
        }

        assert_eq!(data_values(&store.query(&Filter::all(), None).unwrap()), before);
    }

    #[test]
    fn test_later_operations_see_earlier_ones() {
        let db = setup();
        let store = MetadataStore::new(&db);
        let doc = document(TYPE1, NAME1, "5555", true, true, 1);

        let ops = vec![
            MetadataOperation::Insert {
                values: MetadataValues::new(&account1(), "5555", &doc),
            },
            MetadataOperation::Update {
                target: Target::InsertedBy(0),
                values: MetadataValues::document(&doc).with_deleted(true),
            },
            MetadataOperation::Insert {
                values: MetadataValues::new(&account1(), "5555", &doc),
            },
            MetadataOperation::Delete {
                target: Target::Matching(
                    Filter::all().eq_text(metadata_sync::RAW_CONTACT_BACKUP_ID, Some("5555")),
                ),
            },
        ];
        let results = store.apply_batch(&ops).unwrap();
        assert_eq!(results[1], OperationResult::Updated { count: 1 });
        assert_eq!(results[3], OperationResult::Deleted { count: 2 });
    }

    #[test]
    fn test_bad_back_reference_aborts() {
        let db = setup();
        let store = MetadataStore::new(&db);
        let ops = vec![
            MetadataOperation::Delete {
                target: Target::Matching(by_account(&account2())),
            },
            MetadataOperation::Delete {
                target: Target::InsertedBy(0),
            },
        ];
        let err = store.apply_batch(&ops).unwrap_err();
        assert!(matches!(
            err.root(),
            ProviderError::InvalidBackReference { index: 1, target: 0 }
        ));
        assert_eq!(store.query(&by_account(&account2()), None).unwrap().len(), 1);
    }

    #[test]
    fn test_operations_deserialize_from_json() {
        let json = r#"[
            {"op": "insert", "values": {"account_name": "n", "account_type": "t",
                                         "raw_contact_backup_id": "b", "data": "{}"}},
            {"op": "update", "target": {"insertedBy": 0}, "values": {"data": "{}", "deleted": true}},
            {"op": "delete", "target": {"matching": {"account_name": "n", "data_set": null}}},
            {"op": "delete", "target": {"row": 7}}
        ]"#;
        let ops: Vec<MetadataOperation> = serde_json::from_str(json).unwrap();
        assert_eq!(ops.len(), 4);
        assert!(matches!(
            &ops[0],
            MetadataOperation::Insert { values } if values.backup_id.as_deref() == Some("b")
        ));
        assert!(matches!(
            &ops[1],
            MetadataOperation::Update { target: Target::InsertedBy(0), values } if values.deleted == Some(true)
        ));
        assert!(matches!(&ops[3], MetadataOperation::Delete { target: Target::Row(7) }));
    }

    #[test]
    fn test_projection_failure_rolls_back_whole_batch() {
        let db = setup();
        let rejecting = RejectingStore;
        let store = MetadataStore::with_collaborators(&db, &rejecting, &db);
        let before = data_values(&MetadataStore::new(&db).query(&Filter::all(), None).unwrap());

        let ops = vec![
            MetadataOperation::Delete {
                target: Target::Matching(by_account(&account2())),
            },
            MetadataOperation::Insert {
                values: MetadataValues::new(
                    &account1(),
                    "6666",
                    &document(TYPE1, NAME1, "6666", true, true, 1),
                ),
            },
        ];
        let err = store.apply_batch(&ops).unwrap_err();
        assert!(matches!(err, ProviderError::BatchAborted { index: 1, .. }));
        assert!(matches!(err.root(), ProviderError::Db(_)));

        let after = data_values(&MetadataStore::new(&db).query(&Filter::all(), None).unwrap());
        assert_eq!(after, before);
    }
}
