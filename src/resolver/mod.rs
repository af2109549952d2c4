//! Resolution orchestration.
//!
//! One request moves through `standardizing -> candidate-search -> scoring
//! -> deciding -> persisting -> done`. Candidate search, the decision and
//! the write run under the request's key locks, so two observations of
//! the same new identity cannot both create it within this process.
//! A merge also takes the target entity's lock and re-reads the entity
//! under it, so merges reaching one entity through different keys apply
//! one after another. Entity locks are only ever taken while key locks
//! are held, never the other way round.
//! Graph and event writes happen afterwards on the side-effect worker and
//! never undo a committed entity write.

mod batch;
mod decision;
mod dispatch;
mod locks;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{check_threshold, Config, ResolutionConfig};
use crate::entity::{Entity, EntityId, EntityLink, EntityType, LinkId};
use crate::error::{ExecutionError, ResolveError, ResolveResult, ValidationError};
use crate::events::Event;
use crate::matching::{rank, CandidateRecord, MatchCandidate, MatchInput, Matcher};
use crate::sinks::{
    EntityEdge, EntityNode, EventPublisher, GraphMirror, LoggingEventPublisher, LoggingGraphMirror,
};
use crate::standardize::NormalizedRecord;
use crate::storage::{CandidateStore, InMemoryCandidateStore, InMemoryJobStore, JobStore, StorageError};
use crate::value::{Value, ValueMap};

pub use batch::{BatchResolutionJob, CancellationToken, JobId, JobStatus};
pub use decision::{decide, mark_recommendations, Decision, AMBIGUOUS_CONFIDENCE, NEW_ENTITY_CONFIDENCE};
pub use dispatch::{SideEffect, SideEffectDispatcher};
pub use locks::{KeyGuard, KeyLocks};

/// One raw observation to resolve.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolutionRequest {
    /// Entity type tag, such as `person` or `organization`.
    pub entity_type: String,
    /// Raw display name.
    #[serde(default)]
    pub name: String,
    /// Identifier fields; strings and integers are matched exactly.
    #[serde(default)]
    pub identifiers: ValueMap,
    /// Descriptive fields.
    #[serde(default)]
    pub attributes: ValueMap,
    /// Tag of the system that produced the observation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
}

impl ResolutionRequest {
    /// Creates a request with no identifiers or attributes.
    #[must_use]
    pub fn new(entity_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Adds an identifier field.
    #[must_use]
    pub fn with_identifier(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.identifiers.insert(key.into(), value.into());
        self
    }

    /// Adds an attribute field.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Tags the request with its source system.
    #[must_use]
    pub fn with_source(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    fn validate(&self) -> Result<EntityType, ValidationError> {
        let entity_type =
            EntityType::parse(&self.entity_type).ok_or(ValidationError::EmptyEntityType)?;
        if self.name.trim().is_empty() && self.identifiers.is_empty() {
            return Err(ValidationError::MissingField {
                field: "name".to_string(),
            });
        }
        Ok(entity_type)
    }
}

/// Outcome of one resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionResult {
    /// The entity the observation resolved to.
    pub entity_id: EntityId,
    /// False when the observation merged into an existing entity.
    pub is_new_entity: bool,
    /// Ranked candidates considered for the decision.
    #[serde(default)]
    pub matched_entities: Vec<MatchCandidate>,
    /// 1.0 for a clean create, 0.5 in the ambiguous band, else the best score.
    pub confidence_score: f64,
    /// Standardized name and contact fields.
    pub standardized: NormalizedRecord,
    /// Identifiers as stored.
    #[serde(default)]
    pub standardized_identifiers: ValueMap,
    /// Links created by this resolution.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub created_links: Vec<LinkId>,
}

/// External systems a [`Resolver`] works against.
#[derive(Clone)]
pub struct Collaborators {
    /// System of record for entities.
    pub store: Arc<dyn CandidateStore>,
    /// Batch job snapshots.
    pub jobs: Arc<dyn JobStore>,
    /// Best-effort graph mirror.
    pub graph: Arc<dyn GraphMirror>,
    /// Best-effort event bus.
    pub events: Arc<dyn EventPublisher>,
}

impl Collaborators {
    /// In-memory stores with logging sinks.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(InMemoryCandidateStore::new()),
            jobs: Arc::new(InMemoryJobStore::new()),
            graph: Arc::new(LoggingGraphMirror),
            events: Arc::new(LoggingEventPublisher),
        }
    }
}

/// A request after standardization.
struct Prepared {
    entity_type: EntityType,
    name: String,
    identifiers: ValueMap,
    attributes: ValueMap,
    input: MatchInput,
}

/// Resolves observations into canonical entities.
///
/// # Examples
///
/// ```
/// use entity_resolution::config::Config;
/// use entity_resolution::resolver::{Collaborators, ResolutionRequest, Resolver};
///
/// let resolver = Resolver::new(&Config::default(), Collaborators::in_memory()).unwrap();
///
/// let first = resolver
///     .resolve(&ResolutionRequest::new("person", "Jane Doe").with_identifier("ssn", "123-45-6789"))
///     .unwrap();
/// assert!(first.is_new_entity);
///
/// let again = resolver
///     .resolve(&ResolutionRequest::new("person", "J. Doe").with_identifier("ssn", "123-45-6789"))
///     .unwrap();
/// assert!(!again.is_new_entity);
/// assert_eq!(again.entity_id, first.entity_id);
/// ```
pub struct Resolver {
    config: ResolutionConfig,
    matcher: Matcher,
    store: Arc<dyn CandidateStore>,
    jobs: Arc<dyn JobStore>,
    dispatcher: SideEffectDispatcher,
    locks: KeyLocks,
    entity_locks: KeyLocks,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("config", &self.config)
            .field("matcher", &self.matcher)
            .field("locks", &self.locks.stripe_count())
            .finish_non_exhaustive()
    }
}

impl Resolver {
    /// Builds a resolver and starts its side-effect worker.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `config` is out of range.
    pub fn new(config: &Config, collaborators: Collaborators) -> ResolveResult<Self> {
        config.validate()?;

        let Collaborators {
            store,
            jobs,
            graph,
            events,
        } = collaborators;

        Ok(Self {
            config: config.resolution.clone(),
            matcher: Matcher::new(config.matching.clone()),
            store,
            jobs,
            dispatcher: SideEffectDispatcher::new(
                config.resolution.side_effect_queue_capacity,
                graph,
                events,
            ),
            locks: KeyLocks::new(config.resolution.lock_stripes),
            entity_locks: KeyLocks::new(config.resolution.lock_stripes),
        })
    }

    /// The matcher, including its blocking index.
    #[must_use]
    pub const fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Merge and batching settings.
    #[must_use]
    pub const fn config(&self) -> &ResolutionConfig {
        &self.config
    }

    /// Adds entities that already exist in the store to the blocking index.
    pub fn index_existing<'a>(&self, entities: impl IntoIterator<Item = &'a Entity>) -> usize {
        let standardizer = self.matcher.standardizer();
        let mut count = 0;
        for entity in entities {
            let record = standardizer.record(&entity.name, &entity.identifiers, &entity.attributes);
            self.matcher.index_entity(entity.id, &record);
            count += 1;
        }
        count
    }

    /// Resolves one observation to an existing or new entity.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank entity type or an empty
    /// request, and an execution error if the entity write fails. Store
    /// failures during candidate search only narrow the search.
    pub fn resolve(&self, request: &ResolutionRequest) -> ResolveResult<ResolutionResult> {
        let started = Instant::now();
        let entity_type = request.validate()?;
        info!(entity_type = %entity_type, name = %request.name, "starting entity resolution");

        let prepared = self.prepare(entity_type, &request.name, &request.identifiers, &request.attributes);

        let guard = self.locks.acquire(self.lock_keys(&prepared));
        let candidates = self.search(&prepared);
        let decision = decide(&candidates, self.config.auto_merge_threshold);

        if let Decision::Create {
            ambiguous: true,
            best_score: Some(best_score),
            ..
        } = decision
        {
            info!(
                ambiguous = true,
                best_score,
                candidates = candidates.len(),
                "no candidate cleared the auto-merge threshold; creating new entity"
            );
        }

        let entity = self.persist(&prepared, decision)?;
        drop(guard);

        let is_new_entity = !decision.is_merge();
        self.mirror(&entity, is_new_entity, decision.confidence(), &candidates);

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            entity_id = %entity.id,
            is_new_entity,
            confidence_score = decision.confidence(),
            elapsed_ms,
            "entity resolution completed"
        );

        Ok(ResolutionResult {
            entity_id: entity.id,
            is_new_entity,
            matched_entities: candidates,
            confidence_score: decision.confidence(),
            standardized: prepared.input.record,
            standardized_identifiers: prepared.identifiers,
            created_links: Vec::new(),
        })
    }

    /// Candidates for an existing entity, excluding itself, scoring at
    /// least `threshold`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a threshold outside `[0, 1]` and
    /// `EntityNotFound` for an unknown ID.
    pub fn find_similar_entities(
        &self,
        entity_id: EntityId,
        threshold: f64,
    ) -> ResolveResult<Vec<MatchCandidate>> {
        check_threshold("threshold", threshold)?;
        let entity = self.entity(entity_id)?;

        let prepared = self.prepare(
            entity.entity_type.clone(),
            &entity.name,
            &entity.identifiers,
            &entity.attributes,
        );

        Ok(self
            .search(&prepared)
            .into_iter()
            .filter(|c| c.entity_id != entity_id && c.overall_score >= threshold)
            .collect())
    }

    /// Persists a typed link between two entities and mirrors it as a
    /// graph edge.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a self link, a blank type or a
    /// confidence outside `[0, 1]`, and `EntityNotFound` if an endpoint
    /// does not exist.
    pub fn create_entity_link(
        &self,
        source: EntityId,
        target: EntityId,
        link_type: &str,
        properties: ValueMap,
        confidence: f64,
    ) -> ResolveResult<EntityLink> {
        if source == target {
            return Err(ValidationError::SelfLink { id: source }.into());
        }
        if link_type.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "link_type".to_string(),
            }
            .into());
        }
        if !(0.0..=1.0).contains(&confidence) {
            return Err(ValidationError::ConfidenceOutOfRange { value: confidence }.into());
        }

        let link = EntityLink::new(source, target, link_type, confidence).with_properties(properties);
        self.store.create_link(link.clone()).map_err(|e| match e {
            StorageError::EntityNotFound(id) => ResolveError::from(ExecutionError::EntityNotFound { id }),
            other => ResolveError::from(other),
        })?;

        self.dispatcher.submit(SideEffect::Edge(EntityEdge::from(&link)));
        info!(
            link_id = %link.id,
            source = %source,
            target = %target,
            link_type = %link.link_type,
            "entity link created"
        );
        Ok(link)
    }

    /// Reads an entity from the store.
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound` for an unknown ID, or the store's error.
    pub fn entity(&self, id: EntityId) -> ResolveResult<Entity> {
        self.store
            .get(id)?
            .ok_or_else(|| ExecutionError::EntityNotFound { id }.into())
    }

    /// Blocks until queued graph and event writes have been applied.
    ///
    /// # Errors
    ///
    /// Returns `WorkerUnavailable` if the worker has stopped.
    pub fn flush_side_effects(&self) -> ResolveResult<()> {
        self.dispatcher.flush()
    }

    /// Side-effect writes dropped because the queue was full.
    #[must_use]
    pub fn dropped_side_effects(&self) -> u64 {
        self.dispatcher.dropped()
    }

    /// Side-effect writes a sink rejected.
    #[must_use]
    pub fn failed_side_effects(&self) -> u64 {
        self.dispatcher.failed()
    }

    fn prepare(
        &self,
        entity_type: EntityType,
        name: &str,
        identifiers: &ValueMap,
        attributes: &ValueMap,
    ) -> Prepared {
        let standardizer = self.matcher.standardizer();
        let std_identifiers = standardizer.identifiers(identifiers);
        let record = standardizer.record(name, identifiers, attributes);

        Prepared {
            entity_type,
            name: name.to_string(),
            input: MatchInput::new(record, &std_identifiers),
            attributes: standardizer.identifiers(attributes),
            identifiers: std_identifiers,
        }
    }

    /// The blocking key plus every `key=value` identifier, scoped by type.
    fn lock_keys(&self, prepared: &Prepared) -> Vec<String> {
        let entity_type = &prepared.entity_type;
        let mut keys = vec![format!(
            "block:{entity_type}:{}",
            self.matcher.blocking_key(&prepared.input.record)
        )];
        keys.extend(prepared.identifiers.iter().filter_map(|(key, value)| {
            let text = value.as_identifier_text()?;
            Some(format!(
                "id:{entity_type}:{}={}",
                key.trim().to_lowercase(),
                text.trim().to_lowercase()
            ))
        }));
        keys
    }

    /// Exact identifier hits and fuzzy matches, merged by entity ID and
    /// ranked.
    fn search(&self, prepared: &Prepared) -> Vec<MatchCandidate> {
        let cfg = self.matcher.config();
        let mut merged: BTreeMap<EntityId, MatchCandidate> = BTreeMap::new();

        for candidate in self
            .matcher
            .find_matches(&prepared.input, self.fuzzy_pool(prepared))
        {
            if candidate
                .scores
                .name
                .is_some_and(|s| s < cfg.name_similarity_threshold)
            {
                continue;
            }
            merged.insert(candidate.entity_id, candidate);
        }

        for (key, value) in &prepared.identifiers {
            let Some(text) = value.as_identifier_text() else {
                continue;
            };
            match self
                .store
                .find_by_identifier(&prepared.entity_type, key, &text)
            {
                Ok(hits) => {
                    for hit in hits {
                        let candidate = match merged.remove(&hit.id) {
                            Some(fuzzy) => fuzzy.into_identifier_match(key),
                            None => MatchCandidate::exact_identifier(hit.id, key),
                        };
                        merged.insert(hit.id, candidate);
                    }
                }
                Err(error) => warn!(key = %key, %error, "identifier lookup failed"),
            }
        }

        let mut candidates: Vec<MatchCandidate> = merged.into_values().collect();
        mark_recommendations(&mut candidates, self.config.auto_merge_threshold);
        rank(&mut candidates, cfg.max_candidates);
        debug!(candidates = candidates.len(), "candidate search finished");
        candidates
    }

    /// Entities reachable through the blocking index or the store's fuzzy
    /// name search.
    fn fuzzy_pool(&self, prepared: &Prepared) -> Vec<CandidateRecord> {
        let record = &prepared.input.record;
        let mut entities: BTreeMap<EntityId, Entity> = BTreeMap::new();

        for id in self.matcher.candidates_by_index(record) {
            match self.store.get(id) {
                Ok(Some(entity)) if entity.entity_type == prepared.entity_type => {
                    entities.insert(id, entity);
                }
                Ok(_) => {}
                Err(error) => warn!(entity_id = %id, %error, "indexed candidate lookup failed"),
            }
        }

        if !record.name.is_empty() {
            match self.store.find_by_fuzzy_name(
                &prepared.entity_type,
                &record.name.standardized,
                self.matcher.config().name_similarity_threshold,
            ) {
                Ok(hits) => entities.extend(hits.into_iter().map(|e| (e.id, e))),
                Err(error) => warn!(%error, "fuzzy name lookup failed"),
            }
        }

        let standardizer = self.matcher.standardizer();
        entities
            .values()
            .map(|e| CandidateRecord::from_entity(e, standardizer))
            .collect()
    }

    fn persist(&self, prepared: &Prepared, decision: Decision) -> ResolveResult<Entity> {
        let entity = match decision {
            Decision::Create { confidence, .. } => {
                let mut entity = Entity::new(
                    prepared.name.clone(),
                    prepared.input.record.name.standardized.clone(),
                    prepared.entity_type.clone(),
                );
                entity.identifiers = prepared.identifiers.clone();
                entity.attributes = prepared.attributes.clone();
                entity.confidence_score = confidence;

                self.store
                    .create(entity.clone())
                    .map_err(|source| ExecutionError::Persistence {
                        id: entity.id,
                        source,
                    })?;
                entity
            }
            Decision::Merge { target, .. } => {
                let _entity_guard = self.entity_locks.acquire([format!("entity:{target}")]);
                let mut entity = self
                    .store
                    .get(target)
                    .map_err(|source| ExecutionError::Persistence { id: target, source })?
                    .ok_or(ExecutionError::EntityNotFound { id: target })?;

                entity.absorb(&prepared.identifiers, &prepared.attributes);
                self.store
                    .update(entity.clone())
                    .map_err(|source| ExecutionError::Persistence { id: target, source })?;
                entity
            }
        };

        let record = self.matcher.standardizer().record(
            &entity.name,
            &entity.identifiers,
            &entity.attributes,
        );
        self.matcher.index_entity(entity.id, &record);
        Ok(entity)
    }

    fn mirror(&self, entity: &Entity, is_new: bool, confidence: f64, candidates: &[MatchCandidate]) {
        self.dispatcher.submit(SideEffect::Node(EntityNode::from(entity)));

        let change = if is_new {
            Event::entity_created(entity)
        } else {
            Event::entity_updated(entity)
        };
        self.dispatcher.submit(SideEffect::Event(Box::new(change)));

        let matched = candidates.iter().map(|c| c.entity_id).collect();
        self.dispatcher.submit(SideEffect::Event(Box::new(Event::entity_resolved(
            entity, is_new, confidence, matched,
        ))));
    }
}
