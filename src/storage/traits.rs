//! Abstract storage traits for entity resolution.
//!
//! These traits define the contract a system-of-record backend must
//! implement. The resolver only ever talks to `dyn CandidateStore` and
//! `dyn JobStore`, so the in-memory backends and a database adapter are
//! interchangeable.

use thiserror::Error;

use crate::entity::{Entity, EntityId, EntityLink, EntityType};
use crate::resolver::{BatchResolutionJob, JobId};

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Entity not found.
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// Batch job not found.
    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    /// Key already exists.
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// Backend error.
    #[error("Storage backend error: {0}")]
    BackendError(String),

    /// Serialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Connection failed.
    #[error("Connection error: {0}")]
    ConnectionError(String),
}

/// System of record for entities and entity links.
///
/// # Concurrency contract
///
/// The resolver serializes conflicting requests within one process with
/// key locks. A backend shared by several processes must additionally
/// reject a second `create` for the same primary identifier (a unique
/// constraint), otherwise two processes can both create the same identity.
pub trait CandidateStore: Send + Sync {
    /// Entities of `entity_type` whose identifier `key` equals `value`
    /// (trimmed, case-insensitive).
    fn find_by_identifier(
        &self,
        entity_type: &EntityType,
        key: &str,
        value: &str,
    ) -> Result<Vec<Entity>, StorageError>;

    /// Entities of `entity_type` whose standardized name is at least
    /// `threshold` similar to `standardized_name`.
    fn find_by_fuzzy_name(
        &self,
        entity_type: &EntityType,
        standardized_name: &str,
        threshold: f64,
    ) -> Result<Vec<Entity>, StorageError>;

    /// Insert a new entity. Returns error if the ID already exists.
    fn create(&self, entity: Entity) -> Result<(), StorageError>;

    /// Get an entity by ID; `Ok(None)` when absent.
    fn get(&self, id: EntityId) -> Result<Option<Entity>, StorageError>;

    /// Replace an existing entity. The version must increase.
    fn update(&self, entity: Entity) -> Result<(), StorageError>;

    /// Persist a link. Both endpoints must exist.
    fn create_link(&self, link: EntityLink) -> Result<(), StorageError>;

    /// Links where `id` is the source or the target.
    fn links_for(&self, id: EntityId) -> Result<Vec<EntityLink>, StorageError>;
}

/// Persistence for batch job snapshots.
pub trait JobStore: Send + Sync {
    /// Insert a new job. Returns error if the ID already exists.
    fn create_job(&self, job: &BatchResolutionJob) -> Result<(), StorageError>;

    /// Overwrite an existing job snapshot.
    fn update_job(&self, job: &BatchResolutionJob) -> Result<(), StorageError>;

    /// Get a job by ID; `Ok(None)` when absent.
    fn get_job(&self, id: JobId) -> Result<Option<BatchResolutionJob>, StorageError>;
}
