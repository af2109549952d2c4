//! In-memory storage backend.
//!
//! Thread-safe implementations of the storage traits for embedded use,
//! tests and the CLI. They also serve as the reference for what a
//! database adapter must do.

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use crate::entity::{Entity, EntityId, EntityLink, EntityType, LinkId};
use crate::resolver::{BatchResolutionJob, JobId};
use crate::storage::traits::{CandidateStore, JobStore, StorageError};

fn lock_err(context: &'static str) -> StorageError {
    StorageError::BackendError(format!("poisoned lock: {context}"))
}

fn normalize_key(s: &str) -> String {
    s.trim().to_ascii_lowercase()
}

type IdentifierKey = (String, String);

fn identifier_keys(entity: &Entity) -> impl Iterator<Item = IdentifierKey> + '_ {
    entity.identifiers.iter().filter_map(|(key, value)| {
        let text = value.as_identifier_text()?;
        Some((normalize_key(key), normalize_key(&text)))
    })
}

#[derive(Debug, Default)]
struct CandidateState {
    by_id: HashMap<EntityId, Entity>,
    by_identifier: HashMap<IdentifierKey, BTreeSet<EntityId>>,
    links: HashMap<LinkId, EntityLink>,
}

impl CandidateState {
    fn index(&mut self, entity: &Entity) {
        for key in identifier_keys(entity) {
            self.by_identifier.entry(key).or_default().insert(entity.id);
        }
    }

    fn unindex(&mut self, entity: &Entity) {
        for key in identifier_keys(entity) {
            if let Some(set) = self.by_identifier.get_mut(&key) {
                set.remove(&entity.id);
                if set.is_empty() {
                    self.by_identifier.remove(&key);
                }
            }
        }
    }
}

/// In-memory [`CandidateStore`].
#[derive(Debug, Default)]
pub struct InMemoryCandidateStore {
    state: RwLock<CandidateState>,
}

impl InMemoryCandidateStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entities.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the lock is poisoned.
    pub fn len(&self) -> Result<usize, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("entity.len"))?;
        Ok(state.by_id.len())
    }

    /// Returns true when no entity is stored.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }

    /// Snapshot of every stored entity, ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the lock is poisoned.
    pub fn all(&self) -> Result<Vec<Entity>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("entity.all"))?;
        let mut out: Vec<Entity> = state.by_id.values().cloned().collect();
        out.sort_by_key(|e| e.id);
        Ok(out)
    }
}

impl CandidateStore for InMemoryCandidateStore {
    fn find_by_identifier(
        &self,
        entity_type: &EntityType,
        key: &str,
        value: &str,
    ) -> Result<Vec<Entity>, StorageError> {
        let state = self
            .state
            .read()
            .map_err(|_| lock_err("entity.find_by_identifier"))?;

        let lookup = (normalize_key(key), normalize_key(value));
        let Some(ids) = state.by_identifier.get(&lookup) else {
            return Ok(Vec::new());
        };

        Ok(ids
            .iter()
            .filter_map(|id| state.by_id.get(id))
            .filter(|e| &e.entity_type == entity_type)
            .cloned()
            .collect())
    }

    fn find_by_fuzzy_name(
        &self,
        entity_type: &EntityType,
        standardized_name: &str,
        threshold: f64,
    ) -> Result<Vec<Entity>, StorageError> {
        let state = self
            .state
            .read()
            .map_err(|_| lock_err("entity.find_by_fuzzy_name"))?;

        let query = normalize_key(standardized_name);
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits: Vec<(f64, &Entity)> = state
            .by_id
            .values()
            .filter(|e| &e.entity_type == entity_type)
            .map(|e| {
                let name = normalize_key(&e.standardized_name);
                (strsim::normalized_levenshtein(&query, &name), e)
            })
            .filter(|(score, _)| *score >= threshold)
            .collect();

        hits.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.id.cmp(&b.1.id)));
        Ok(hits.into_iter().map(|(_, e)| e.clone()).collect())
    }

    fn create(&self, entity: Entity) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("entity.create"))?;
        if state.by_id.contains_key(&entity.id) {
            return Err(StorageError::DuplicateKey(entity.id.to_string()));
        }

        state.index(&entity);
        state.by_id.insert(entity.id, entity);
        Ok(())
    }

    fn get(&self, id: EntityId) -> Result<Option<Entity>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("entity.get"))?;
        Ok(state.by_id.get(&id).cloned())
    }

    fn update(&self, entity: Entity) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("entity.update"))?;
        let prev = state
            .by_id
            .get(&entity.id)
            .cloned()
            .ok_or(StorageError::EntityNotFound(entity.id))?;

        if entity.version <= prev.version {
            return Err(StorageError::BackendError(format!(
                "entity version must increase on update: id={} prev={} new={}",
                entity.id, prev.version, entity.version
            )));
        }

        state.unindex(&prev);
        state.index(&entity);
        state.by_id.insert(entity.id, entity);
        Ok(())
    }

    fn create_link(&self, link: EntityLink) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("link.create"))?;
        for endpoint in [link.source, link.target] {
            if !state.by_id.contains_key(&endpoint) {
                return Err(StorageError::EntityNotFound(endpoint));
            }
        }
        if state.links.contains_key(&link.id) {
            return Err(StorageError::DuplicateKey(link.id.to_string()));
        }

        state.links.insert(link.id, link);
        Ok(())
    }

    fn links_for(&self, id: EntityId) -> Result<Vec<EntityLink>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("link.links_for"))?;
        let mut out: Vec<EntityLink> = state
            .links
            .values()
            .filter(|l| l.touches(id))
            .cloned()
            .collect();
        out.sort_by_key(|l| l.created_at);
        Ok(out)
    }
}

/// In-memory [`JobStore`].
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, BatchResolutionJob>>,
}

impl InMemoryJobStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobStore for InMemoryJobStore {
    fn create_job(&self, job: &BatchResolutionJob) -> Result<(), StorageError> {
        let mut jobs = self.jobs.write().map_err(|_| lock_err("job.create"))?;
        if jobs.contains_key(&job.id) {
            return Err(StorageError::DuplicateKey(job.id.to_string()));
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    fn update_job(&self, job: &BatchResolutionJob) -> Result<(), StorageError> {
        let mut jobs = self.jobs.write().map_err(|_| lock_err("job.update"))?;
        let slot = jobs.get_mut(&job.id).ok_or(StorageError::JobNotFound(job.id))?;
        *slot = job.clone();
        Ok(())
    }

    fn get_job(&self, id: JobId) -> Result<Option<BatchResolutionJob>, StorageError> {
        let jobs = self.jobs.read().map_err(|_| lock_err("job.get"))?;
        Ok(jobs.get(&id).cloned())
    }
}
