//! Sinks that only write to the tracing log.

use tracing::{debug, info};

use super::{EntityEdge, EntityNode, EventPublisher, GraphMirror, SinkError};
use crate::events::Event;

/// A [`GraphMirror`] that logs every write.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingGraphMirror;

impl GraphMirror for LoggingGraphMirror {
    fn upsert_node(&self, node: &EntityNode) -> Result<(), SinkError> {
        debug!(
            entity_id = %node.entity_id,
            entity_type = %node.entity_type,
            version = node.version,
            "graph node upserted"
        );
        Ok(())
    }

    fn upsert_edge(&self, edge: &EntityEdge) -> Result<(), SinkError> {
        debug!(
            link_id = %edge.link_id,
            source = %edge.source,
            target = %edge.target,
            link_type = %edge.link_type,
            "graph edge upserted"
        );
        Ok(())
    }
}

/// An [`EventPublisher`] that logs each event as one JSON line.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingEventPublisher;

impl EventPublisher for LoggingEventPublisher {
    fn publish(&self, event: &Event) -> Result<(), SinkError> {
        let payload =
            serde_json::to_string(event).map_err(|e| SinkError::Rejected(e.to_string()))?;
        info!(event_type = %event.event_type, %payload, "event published");
        Ok(())
    }
}
