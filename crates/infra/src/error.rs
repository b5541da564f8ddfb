//! Infrastructure and workflow-boundary errors.

use thiserror::Error;

use stockledger_core::{DomainError, ErrorKind};

/// Storage operation error.
///
/// These are infrastructure errors (contention, availability, encoding) as
/// opposed to domain errors (validation, invariants).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Optimistic concurrency check failed or a key already exists.
    #[error("write conflict: {0}")]
    Conflict(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("document encoding failed: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        StoreError::Serialization(value.to_string())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Failure returned by every workflow operation.
///
/// Business-rule failures stay typed as `DomainError`; store conflicts are
/// folded into `DomainError::Conflict` so callers match one variant for
/// "retry the whole operation". Anything else is an opaque internal error.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(msg) => ServiceError::Domain(DomainError::Conflict(msg)),
            other => ServiceError::Store(other),
        }
    }
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Domain(e) => e.kind(),
            ServiceError::Store(_) => ErrorKind::Internal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Domain(DomainError::Conflict(_)))
    }

    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            ServiceError::Domain(e) => Some(e),
            ServiceError::Store(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_conflicts_surface_as_retryable_domain_conflicts() {
        let err = ServiceError::from(StoreError::Conflict("stale".to_string()));
        assert!(err.is_retryable());
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(matches!(err.domain(), Some(DomainError::Conflict(_))));
    }

    #[test]
    fn other_store_errors_are_internal() {
        let err = ServiceError::from(StoreError::Unavailable("lock poisoned".to_string()));
        assert!(!err.is_retryable());
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
