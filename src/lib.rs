pub mod columns;
pub mod config;
pub mod db;
pub mod error;
pub mod filter;
pub mod metadata;
mod migrations;
pub mod provider;
pub mod usage;

pub use error::{ErrorReport, ProviderError};
pub use filter::Filter;
pub use metadata::{MetadataOperation, MetadataStore, MetadataValues, OperationResult, Target};
pub use provider::{ContactMetadataProvider, Resource};
