//! Metadata reconciliation engine.
//!
//! Synced documents land in `metadata_sync`; the preference section of each
//! active document is projected onto the raw contact with the same account
//! and backup id, when one exists locally.

pub mod batch;
pub mod parser;
pub mod projection;
pub mod store;

pub use batch::{MetadataOperation, OperationResult};
pub use parser::{parse_metadata_entry, MetadataEntry};
pub use projection::{AccountLookup, LocalContactStore};
pub use store::{MetadataStore, MetadataValues, Target};
