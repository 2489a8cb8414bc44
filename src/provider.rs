//! Front door: routes resource URIs to the metadata engine, the read-only
//! contact-store passthrough, or the usage feedback counters.
//!
//! Resources live under `content://contacts.metadata/`:
//! - `metadata_sync`, `metadata_sync/<id>`
//! - `raw_contacts`, `data[?usage_type=<type>]`, `aggregation_exceptions` (read-only)
//! - `data/usagefeedback/<id>[,<id>...]?type=<type>` (update-only)

use parking_lot::Mutex;
use url::Url;

use crate::columns::metadata_sync;
use crate::config::Config;
use crate::db::query::TableSpec;
use crate::db::{ContactsDb, DbError, ResultSet};
use crate::error::ProviderError;
use crate::filter::Filter;
use crate::metadata::{MetadataOperation, MetadataStore, MetadataValues, OperationResult, Target};
use crate::usage::{update_usage_stats, UsageType};

pub const AUTHORITY: &str = "contacts.metadata";

#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    MetadataSync,
    MetadataSyncId(i64),
    RawContacts,
    Data { usage_type: Option<UsageType> },
    AggregationExceptions,
    UsageFeedback { data_ids: Vec<i64>, usage_type: UsageType },
}

fn unsupported(what: impl Into<String>) -> ProviderError {
    ProviderError::UnsupportedResource(what.into())
}

impl Resource {
    pub fn parse(uri: &str) -> Result<Self, ProviderError> {
        let url = Url::parse(uri).map_err(|e| unsupported(format!("{uri}: {e}")))?;
        if url.scheme() != "content" || url.host_str() != Some(AUTHORITY) {
            return Err(unsupported(uri));
        }

        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();
        let param = |name: &str| {
            url.query_pairs()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.into_owned())
        };
        let usage_param = |name: &str| -> Result<Option<UsageType>, ProviderError> {
            match param(name) {
                None => Ok(None),
                Some(v) => UsageType::from_param(&v)
                    .map(Some)
                    .ok_or_else(|| unsupported(format!("unknown usage type '{v}'"))),
            }
        };

        match segments.as_slice() {
            ["metadata_sync"] => Ok(Resource::MetadataSync),
            ["metadata_sync", id] => id
                .parse()
                .map(Resource::MetadataSyncId)
                .map_err(|_| unsupported(uri)),
            ["raw_contacts"] => Ok(Resource::RawContacts),
            ["data"] => Ok(Resource::Data {
                usage_type: usage_param("usage_type")?,
            }),
            ["aggregation_exceptions"] => Ok(Resource::AggregationExceptions),
            ["data", "usagefeedback", ids] => {
                let data_ids = ids
                    .split(',')
                    .map(|id| id.trim().parse::<i64>())
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|_| unsupported(uri))?;
                let usage_type = usage_param("type")?
                    .ok_or_else(|| unsupported("usage feedback requires a type parameter"))?;
                Ok(Resource::UsageFeedback {
                    data_ids,
                    usage_type,
                })
            }
            _ => Err(unsupported(uri)),
        }
    }
}

const RAW_CONTACT_COLUMNS: &[(&str, &str)] = &[
    ("_id", "r._id"),
    ("account_name", "a.account_name"),
    ("account_type", "a.account_type"),
    ("data_set", "a.data_set"),
    ("backup_id", "r.backup_id"),
    ("send_to_voicemail", "r.send_to_voicemail"),
    ("starred", "r.starred"),
    ("pinned", "r.pinned"),
];

const DATA_COLUMNS: &[(&str, &str)] = &[
    ("_id", "d._id"),
    ("raw_contact_id", "d.raw_contact_id"),
    ("mimetype", "d.mimetype"),
    ("hash_id", "d.hash_id"),
    ("is_primary", "d.is_primary"),
    ("is_super_primary", "d.is_super_primary"),
    ("data1", "d.data1"),
    ("data2", "d.data2"),
    ("data3", "d.data3"),
    ("times_used", "COALESCE(u.times_used, 0)"),
    ("last_time_used", "COALESCE(u.last_time_used, 0)"),
];

const AGGREGATION_EXCEPTION_COLUMNS: &[(&str, &str)] = &[
    ("type", "x.type"),
    ("raw_contact_id1", "x.raw_contact_id1"),
    ("raw_contact_id2", "x.raw_contact_id2"),
];

fn passthrough_table(resource: &Resource) -> Option<TableSpec> {
    match resource {
        Resource::RawContacts => Some(TableSpec {
            name: "raw_contacts",
            from: "raw_contacts r JOIN accounts a ON a._id = r.account_id".to_string(),
            columns: RAW_CONTACT_COLUMNS,
            order_by: "r._id",
        }),
        Resource::Data { usage_type } => {
            let usage_filter = usage_type
                .map(|t| format!("WHERE usage_type = {}", t.as_i32()))
                .unwrap_or_default();
            Some(TableSpec {
                name: "data",
                from: format!(
                    "data d LEFT JOIN (
                        SELECT data_id, SUM(times_used) AS times_used,
                               MAX(last_time_used) AS last_time_used
                        FROM data_usage_stat {usage_filter} GROUP BY data_id
                     ) u ON u.data_id = d._id"
                ),
                columns: DATA_COLUMNS,
                order_by: "d._id",
            })
        }
        Resource::AggregationExceptions => Some(TableSpec {
            name: "aggregation_exceptions",
            from: "aggregation_exceptions x".to_string(),
            columns: AGGREGATION_EXCEPTION_COLUMNS,
            order_by: "x._id",
        }),
        _ => None,
    }
}

/// Single entry point for every resource. Calls are serialized on one
/// connection, so a batch is never observed half-applied.
pub struct ContactMetadataProvider {
    db: Mutex<ContactsDb>,
}

impl ContactMetadataProvider {
    pub fn new(db: ContactsDb) -> Self {
        Self { db: Mutex::new(db) }
    }

    pub fn open(config: &Config) -> Result<Self, DbError> {
        Ok(Self::new(ContactsDb::open(config)?))
    }

    /// Run `f` against the contact store directly, e.g. to create accounts
    /// or raw contacts.
    pub fn with_db<T>(&self, f: impl FnOnce(&ContactsDb) -> T) -> T {
        let db = self.db.lock();
        f(&db)
    }

    pub fn insert(&self, uri: &str, values: &MetadataValues) -> Result<i64, ProviderError> {
        match Resource::parse(uri)? {
            Resource::MetadataSync => {
                let db = self.db.lock();
                MetadataStore::new(&db).insert(values)
            }
            _ => Err(unsupported(format!("insert on {uri}"))),
        }
    }

    pub fn update(
        &self,
        uri: &str,
        filter: &Filter,
        values: &MetadataValues,
    ) -> Result<usize, ProviderError> {
        let resource = Resource::parse(uri)?;
        let db = self.db.lock();
        match resource {
            Resource::MetadataSync => {
                MetadataStore::new(&db).update(&Target::Matching(filter.clone()), values)
            }
            Resource::MetadataSyncId(id) => MetadataStore::new(&db).update(
                &Target::Matching(filter.clone().eq(metadata_sync::ID, id)),
                values,
            ),
            Resource::UsageFeedback {
                data_ids,
                usage_type,
            } => {
                let now = chrono::Utc::now().timestamp_millis();
                Ok(update_usage_stats(&db, &data_ids, usage_type, now)?)
            }
            _ => Err(unsupported(format!("update on {uri}"))),
        }
    }

    pub fn delete(&self, uri: &str, filter: &Filter) -> Result<usize, ProviderError> {
        let resource = Resource::parse(uri)?;
        let db = self.db.lock();
        match resource {
            Resource::MetadataSync => {
                MetadataStore::new(&db).delete(&Target::Matching(filter.clone()))
            }
            Resource::MetadataSyncId(id) => MetadataStore::new(&db)
                .delete(&Target::Matching(filter.clone().eq(metadata_sync::ID, id))),
            _ => Err(unsupported(format!("delete on {uri}"))),
        }
    }

    pub fn bulk_insert(&self, uri: &str, values: &[MetadataValues]) -> Result<usize, ProviderError> {
        match Resource::parse(uri)? {
            Resource::MetadataSync => {
                let db = self.db.lock();
                MetadataStore::new(&db).bulk_insert(values)
            }
            _ => Err(unsupported(format!("bulk insert on {uri}"))),
        }
    }

    /// Batches always target the metadata table.
    pub fn apply_batch(
        &self,
        operations: &[MetadataOperation],
    ) -> Result<Vec<OperationResult>, ProviderError> {
        let db = self.db.lock();
        MetadataStore::new(&db).apply_batch(operations)
    }

    pub fn query(
        &self,
        uri: &str,
        filter: &Filter,
        columns: Option<&[String]>,
    ) -> Result<ResultSet, ProviderError> {
        let resource = Resource::parse(uri)?;
        let db = self.db.lock();
        match &resource {
            Resource::MetadataSync => MetadataStore::new(&db).query(filter, columns),
            Resource::MetadataSyncId(id) => {
                MetadataStore::new(&db).query(&filter.clone().eq(metadata_sync::ID, *id), columns)
            }
            Resource::UsageFeedback { .. } => Err(unsupported(format!("query on {uri}"))),
            other => {
                let spec = passthrough_table(other)
                    .ok_or_else(|| unsupported(format!("query on {uri}")))?;
                let projection = spec.compile_projection(columns)?;
                let clause = spec.compile_where(filter, 1)?;
                Ok(db.query_table(&spec, &projection, &clause)?)
            }
        }
    }
}
