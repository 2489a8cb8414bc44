//! Column names callers use in filters and projections.

/// `metadata_sync` resource.
pub mod metadata_sync {
    pub const ID: &str = "_id";
    pub const ACCOUNT_NAME: &str = "account_name";
    pub const ACCOUNT_TYPE: &str = "account_type";
    pub const DATA_SET: &str = "data_set";
    pub const RAW_CONTACT_BACKUP_ID: &str = "raw_contact_backup_id";
    pub const DATA: &str = "data";
    pub const DELETED: &str = "deleted";
    /// Internal account id, derived at write time.
    pub const ACCOUNT_ID: &str = "account_id";
}

/// `raw_contacts` resource.
pub mod raw_contacts {
    pub const ID: &str = "_id";
    pub const ACCOUNT_NAME: &str = "account_name";
    pub const ACCOUNT_TYPE: &str = "account_type";
    pub const DATA_SET: &str = "data_set";
    pub const BACKUP_ID: &str = "backup_id";
    pub const SEND_TO_VOICEMAIL: &str = "send_to_voicemail";
    pub const STARRED: &str = "starred";
    pub const PINNED: &str = "pinned";
}

/// `data` resource.
pub mod data {
    pub const ID: &str = "_id";
    pub const RAW_CONTACT_ID: &str = "raw_contact_id";
    pub const MIMETYPE: &str = "mimetype";
    pub const HASH_ID: &str = "hash_id";
    pub const IS_PRIMARY: &str = "is_primary";
    pub const IS_SUPER_PRIMARY: &str = "is_super_primary";
    pub const DATA1: &str = "data1";
    pub const DATA2: &str = "data2";
    pub const DATA3: &str = "data3";
    pub const TIMES_USED: &str = "times_used";
    pub const LAST_TIME_USED: &str = "last_time_used";
}

/// `aggregation_exceptions` resource.
pub mod aggregation_exceptions {
    pub const TYPE: &str = "type";
    pub const RAW_CONTACT_ID1: &str = "raw_contact_id1";
    pub const RAW_CONTACT_ID2: &str = "raw_contact_id2";
}
