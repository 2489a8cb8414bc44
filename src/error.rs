//! Error types for metadata sync operations
//!
//! Errors are classified by who can fix them:
//! - Caller: bad document, key collision, unknown account, bad filter or resource
//! - Storage: SQLite or filesystem failures

use thiserror::Error;

use crate::db::query::QueryError;
use crate::db::DbError;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Invalid metadata document: {0}")]
    InvalidDocument(String),

    #[error("An active metadata row already exists for {account} backup id '{backup_id}'")]
    ConstraintViolation { account: String, backup_id: String },

    #[error("Account not found: {0}")]
    InvalidAccount(String),

    #[error("Batch operation {index} failed: {source}")]
    BatchAborted {
        index: usize,
        #[source]
        source: Box<ProviderError>,
    },

    #[error("Unsupported resource or operation: {0}")]
    UnsupportedResource(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(#[from] QueryError),

    #[error("Operation {index} refers to operation {target}, which is not an earlier insert")]
    InvalidBackReference { index: usize, target: usize },

    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<rusqlite::Error> for ProviderError {
    fn from(err: rusqlite::Error) -> Self {
        ProviderError::Db(DbError::Sqlite(err))
    }
}

impl ProviderError {
    /// Returns true if the caller can fix this by changing the request.
    pub fn is_caller_error(&self) -> bool {
        match self {
            ProviderError::Db(_) => false,
            ProviderError::BatchAborted { source, .. } => source.is_caller_error(),
            _ => true,
        }
    }

    /// The error that actually stopped the operation, looking through batch wrappers.
    pub fn root(&self) -> &ProviderError {
        match self {
            ProviderError::BatchAborted { source, .. } => source.root(),
            other => other,
        }
    }

    fn kind(&self) -> &'static str {
        match self.root() {
            ProviderError::InvalidDocument(_) => "invalidDocument",
            ProviderError::ConstraintViolation { .. } => "constraintViolation",
            ProviderError::InvalidAccount(_) => "invalidAccount",
            ProviderError::UnsupportedResource(_) => "unsupportedResource",
            ProviderError::InvalidFilter(_) => "invalidFilter",
            ProviderError::InvalidBackReference { .. } => "invalidBackReference",
            ProviderError::Db(_) => "storage",
            ProviderError::BatchAborted { .. } => "batchAborted",
        }
    }
}

/// Serializable error representation for the command-line front end.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub message: String,
    pub error_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_operation: Option<usize>,
    pub caller_error: bool,
}

impl From<&ProviderError> for ErrorReport {
    fn from(err: &ProviderError) -> Self {
        let failed_operation = match err {
            ProviderError::BatchAborted { index, .. } => Some(*index),
            _ => None,
        };
        ErrorReport {
            message: err.to_string(),
            error_type: err.kind(),
            failed_operation,
            caller_error: err.is_caller_error(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_abort_reports_inner_kind() {
        let err = ProviderError::BatchAborted {
            index: 2,
            source: Box::new(ProviderError::InvalidDocument("bad".to_string())),
        };
        assert!(err.is_caller_error());
        assert!(matches!(err.root(), ProviderError::InvalidDocument(_)));

        let report = ErrorReport::from(&err);
        assert_eq!(report.error_type, "invalidDocument");
        assert_eq!(report.failed_operation, Some(2));
        assert!(report.message.contains("Batch operation 2 failed"));
    }

    #[test]
    fn test_storage_errors_are_not_caller_errors() {
        let err = ProviderError::Db(DbError::HomeDirNotFound);
        assert!(!err.is_caller_error());
        assert_eq!(ErrorReport::from(&err).error_type, "storage");
    }
}
