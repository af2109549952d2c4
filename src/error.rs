//! Error types for entity resolution.
//!
//! Errors are strongly typed using thiserror so callers can match on the
//! specific failure. Standardization never fails; everything here comes from
//! request validation, configuration, persistence or orchestration.

use thiserror::Error;

use crate::config::ConfigError;
use crate::entity::EntityId;
use crate::resolver::{JobId, JobStatus};
use crate::storage::StorageError;

/// Validation errors raised before any work is done.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The entity type tag was blank.
    #[error("Entity type cannot be empty")]
    EmptyEntityType,

    /// A confidence score fell outside `[0, 1]`.
    #[error("Confidence value {value} is out of range [0.0, 1.0]")]
    ConfidenceOutOfRange {
        /// The rejected value.
        value: f64,
    },

    /// A configured threshold fell outside `[0, 1]`.
    #[error("Threshold '{name}' = {value} is out of range [0.0, 1.0]")]
    ThresholdOutOfRange {
        /// Setting name.
        name: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// A required field was blank.
    #[error("Required field '{field}' is missing")]
    MissingField {
        /// Field name.
        field: String,
    },

    /// A count setting that must be positive was zero.
    #[error("Setting '{name}' must be greater than zero")]
    ZeroSetting {
        /// Setting name.
        name: &'static str,
    },

    /// A job status change not allowed by the lifecycle.
    #[error("Invalid job status transition: {from} -> {to}")]
    InvalidStatusTransition {
        /// Current status.
        from: JobStatus,
        /// Requested status.
        to: JobStatus,
    },

    /// A link from an entity to itself.
    #[error("Cannot link entity {id} to itself")]
    SelfLink {
        /// The entity.
        id: EntityId,
    },
}

/// Errors that occur while a resolution is executing.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// No entity with this ID.
    #[error("Entity not found: {id}")]
    EntityNotFound {
        /// Requested ID.
        id: EntityId,
    },

    /// No job with this ID.
    #[error("Resolution job not found: {id}")]
    JobNotFound {
        /// Requested ID.
        id: JobId,
    },

    /// The store rejected an entity write.
    #[error("Failed to persist entity {id}: {source}")]
    Persistence {
        /// Entity being written.
        id: EntityId,
        /// Store failure.
        #[source]
        source: StorageError,
    },

    /// A batch stopped at a chunk boundary after cancellation.
    #[error("Batch {job_id} cancelled after {processed} of {total} requests")]
    Cancelled {
        /// Cancelled job.
        job_id: JobId,
        /// Requests resolved before stopping.
        processed: usize,
        /// Requests in the batch.
        total: usize,
    },

    /// A background worker could not be started or has stopped.
    #[error("Worker unavailable: {message}")]
    WorkerUnavailable {
        /// What went wrong.
        message: String,
    },
}

/// Top-level error type for the crate.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Invalid input or configuration.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Failure while resolving or running a batch.
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// Store failure outside an entity write.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ResolveError {
    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns true if this is a storage error.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(
            self,
            Self::Storage(_) | Self::Execution(ExecutionError::Persistence { .. })
        )
    }

    /// Returns true if an outer adapter could reasonably retry the request.
    ///
    /// The core never retries on its own.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Storage(e) | Self::Execution(ExecutionError::Persistence { source: e, .. }) => {
                matches!(e, StorageError::ConnectionError(_) | StorageError::BackendError(_))
            }
            Self::Execution(ExecutionError::WorkerUnavailable { .. }) => true,
            _ => false,
        }
    }
}

/// Result type alias for resolution operations.
pub type ResolveResult<T> = Result<T, ResolveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_confidence() {
        let err = ValidationError::ConfidenceOutOfRange { value: 1.5 };
        let msg = format!("{err}");
        assert!(msg.contains("1.5"));
        assert!(msg.contains("out of range"));
    }

    #[test]
    fn test_validation_error_threshold() {
        let err = ValidationError::ThresholdOutOfRange {
            name: "auto_merge_threshold",
            value: -0.1,
        };
        assert!(err.to_string().contains("auto_merge_threshold"));
    }

    #[test]
    fn test_execution_error_entity_not_found() {
        let err = ExecutionError::EntityNotFound { id: EntityId::new() };
        assert!(err.to_string().contains("Entity not found"));
    }

    #[test]
    fn test_execution_error_cancelled() {
        let err = ExecutionError::Cancelled {
            job_id: JobId::new(),
            processed: 200,
            total: 500,
        };
        let msg = err.to_string();
        assert!(msg.contains("200"));
        assert!(msg.contains("500"));
    }

    #[test]
    fn test_resolve_error_from_validation() {
        let err: ResolveError = ValidationError::EmptyEntityType.into();
        assert!(err.is_validation());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_persistence_failure_is_storage_and_retryable() {
        let err: ResolveError = ExecutionError::Persistence {
            id: EntityId::new(),
            source: StorageError::ConnectionError("refused".to_string()),
        }
        .into();
        assert!(err.is_execution());
        assert!(err.is_storage());
        assert!(err.is_retryable());
    }

    #[test]
    fn test_duplicate_key_not_retryable() {
        let err: ResolveError = StorageError::DuplicateKey("x".to_string()).into();
        assert!(err.is_storage());
        assert!(!err.is_retryable());
    }
}
