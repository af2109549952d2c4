//! Secondary write targets: the graph mirror and the event bus.
//!
//! Both are best-effort. The resolver hands them work through a background
//! dispatcher and only logs their failures; the entity store stays the
//! source of truth.

mod logging;
mod recording;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entity::{Entity, EntityId, EntityLink, EntityType, LinkId};
use crate::events::Event;
use crate::value::ValueMap;

pub use logging::{LoggingEventPublisher, LoggingGraphMirror};
pub use recording::{RecordingEventPublisher, RecordingGraphMirror};

/// Errors reported by a sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The downstream system could not be reached.
    #[error("Sink unavailable: {0}")]
    Unavailable(String),

    /// The downstream system refused the write.
    #[error("Sink rejected write: {0}")]
    Rejected(String),
}

/// Graph-side projection of an [`Entity`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityNode {
    /// Node key.
    pub entity_id: EntityId,
    /// Node label.
    pub entity_type: EntityType,
    /// Display name.
    pub name: String,
    /// Standardized name.
    pub standardized_name: String,
    /// Identifier properties.
    pub identifiers: ValueMap,
    /// Attribute properties.
    pub attributes: ValueMap,
    /// Entity confidence.
    pub confidence_score: f64,
    /// Entity version; later versions replace earlier ones.
    pub version: u64,
    /// Entity creation time.
    pub created_at: DateTime<Utc>,
    /// Entity last-update time.
    pub updated_at: DateTime<Utc>,
}

impl From<&Entity> for EntityNode {
    fn from(entity: &Entity) -> Self {
        Self {
            entity_id: entity.id,
            entity_type: entity.entity_type.clone(),
            name: entity.name.clone(),
            standardized_name: entity.standardized_name.clone(),
            identifiers: entity.identifiers.clone(),
            attributes: entity.attributes.clone(),
            confidence_score: entity.confidence_score,
            version: entity.version,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

/// Graph-side projection of an [`EntityLink`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityEdge {
    /// Edge key.
    pub link_id: LinkId,
    /// Start node.
    pub source: EntityId,
    /// End node.
    pub target: EntityId,
    /// Relationship type.
    pub link_type: String,
    /// Relationship properties.
    pub properties: ValueMap,
    /// Link confidence.
    pub confidence: f64,
    /// Link creation time.
    pub created_at: DateTime<Utc>,
}

impl From<&EntityLink> for EntityEdge {
    fn from(link: &EntityLink) -> Self {
        Self {
            link_id: link.id,
            source: link.source,
            target: link.target,
            link_type: link.link_type.clone(),
            properties: link.properties.clone(),
            confidence: link.confidence,
            created_at: link.created_at,
        }
    }
}

/// Mirror of entities and links in a graph store.
pub trait GraphMirror: Send + Sync {
    /// Create or replace the node for an entity.
    fn upsert_node(&self, node: &EntityNode) -> Result<(), SinkError>;

    /// Create or replace a relationship between two nodes.
    fn upsert_edge(&self, edge: &EntityEdge) -> Result<(), SinkError>;
}

/// Publisher of resolution events.
pub trait EventPublisher: Send + Sync {
    /// Publish one event.
    fn publish(&self, event: &Event) -> Result<(), SinkError>;
}
