//! Resolution events published to the event bus.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::{Entity, EntityId, EntityType};
use crate::resolver::{BatchResolutionJob, JobId, JobStatus};
use crate::value::ValueMap;

/// Event topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// A new entity was created.
    #[serde(rename = "entity.created")]
    EntityCreated,
    /// An existing entity absorbed an observation.
    #[serde(rename = "entity.updated")]
    EntityUpdated,
    /// One resolution finished.
    #[serde(rename = "entity.resolved")]
    EntityResolved,
    /// A batch job changed status.
    #[serde(rename = "batch.job.status")]
    BatchJobStatus,
}

impl EventType {
    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EntityCreated => "entity.created",
            Self::EntityUpdated => "entity.updated",
            Self::EntityResolved => "entity.resolved",
            Self::BatchJobStatus => "batch.job.status",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job snapshot carried by `batch.job.status` events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatusPayload {
    /// Job the status belongs to.
    pub job_id: JobId,
    /// Status after the change.
    pub status: JobStatus,
    /// Requests processed so far.
    pub progress: usize,
    /// Requests in the batch.
    pub total: usize,
    /// Failed requests so far.
    pub error_count: usize,
}

/// One message on the event bus.
///
/// Entity fields are absent on job status events; `job` is absent on
/// entity events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique per event.
    pub event_id: Uuid,
    /// Kind of event.
    pub event_type: EventType,
    /// Subject entity; absent on job events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<EntityId>,
    /// Type of the subject entity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<EntityType>,
    /// Display name of the entity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Standardized identifiers of the entity.
    #[serde(default, skip_serializing_if = "ValueMap::is_empty")]
    pub identifiers: ValueMap,
    /// Confidence of the entity or resolution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,
    /// Set on `entity.resolved` events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_new_entity: Option<bool>,
    /// Candidates considered by the resolution.
    #[serde(default)]
    pub matched_entities: Vec<EntityId>,
    /// Set on `batch.job.status` events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<JobStatusPayload>,
    /// Creation time, RFC 3339 on the wire.
    pub timestamp: DateTime<Utc>,
}

impl Event {
    fn for_entity(event_type: EventType, entity: &Entity) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type,
            entity_id: Some(entity.id),
            entity_type: Some(entity.entity_type.clone()),
            name: Some(entity.name.clone()),
            identifiers: entity.identifiers.clone(),
            confidence_score: Some(entity.confidence_score),
            is_new_entity: None,
            matched_entities: Vec::new(),
            job: None,
            timestamp: Utc::now(),
        }
    }

    /// `entity.created` for a freshly written entity.
    #[must_use]
    pub fn entity_created(entity: &Entity) -> Self {
        let mut event = Self::for_entity(EventType::EntityCreated, entity);
        event.is_new_entity = Some(true);
        event
    }

    /// `entity.updated` after a merge.
    #[must_use]
    pub fn entity_updated(entity: &Entity) -> Self {
        let mut event = Self::for_entity(EventType::EntityUpdated, entity);
        event.is_new_entity = Some(false);
        event
    }

    /// Outcome of one resolution. `confidence` is the decision confidence,
    /// which differs from the stored entity's score after a merge.
    #[must_use]
    pub fn entity_resolved(
        entity: &Entity,
        is_new_entity: bool,
        confidence: f64,
        matched_entities: Vec<EntityId>,
    ) -> Self {
        let mut event = Self::for_entity(EventType::EntityResolved, entity);
        event.is_new_entity = Some(is_new_entity);
        event.confidence_score = Some(confidence);
        event.matched_entities = matched_entities;
        event
    }

    /// `batch.job.status` snapshot of a job.
    #[must_use]
    pub fn batch_status(job: &BatchResolutionJob) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type: EventType::BatchJobStatus,
            entity_id: None,
            entity_type: None,
            name: None,
            identifiers: ValueMap::new(),
            confidence_score: None,
            is_new_entity: None,
            matched_entities: Vec::new(),
            job: Some(JobStatusPayload {
                job_id: job.id,
                status: job.status,
                progress: job.progress,
                total: job.total,
                error_count: job.errors.len(),
            }),
            timestamp: Utc::now(),
        }
    }
}
