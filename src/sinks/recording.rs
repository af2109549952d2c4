//! Sinks that keep every write in memory, for tests and embedding.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use super::{EntityEdge, EntityNode, EventPublisher, GraphMirror, SinkError};
use crate::events::{Event, EventType};

/// A [`GraphMirror`] that records writes and can be switched to fail.
#[derive(Debug, Default)]
pub struct RecordingGraphMirror {
    nodes: Mutex<Vec<EntityNode>>,
    edges: Mutex<Vec<EntityEdge>>,
    failing: AtomicBool,
}

impl RecordingGraphMirror {
    /// Creates an empty mirror.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later write return [`SinkError::Unavailable`].
    pub fn fail_writes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Nodes written so far.
    #[must_use]
    pub fn nodes(&self) -> Vec<EntityNode> {
        self.nodes.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Edges written so far.
    #[must_use]
    pub fn edges(&self) -> Vec<EntityEdge> {
        self.edges.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn check(&self) -> Result<(), SinkError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SinkError::Unavailable("graph mirror offline".to_string()));
        }
        Ok(())
    }
}

impl GraphMirror for RecordingGraphMirror {
    fn upsert_node(&self, node: &EntityNode) -> Result<(), SinkError> {
        self.check()?;
        let mut nodes = self.nodes.lock().unwrap_or_else(PoisonError::into_inner);
        nodes.retain(|n| n.entity_id != node.entity_id);
        nodes.push(node.clone());
        Ok(())
    }

    fn upsert_edge(&self, edge: &EntityEdge) -> Result<(), SinkError> {
        self.check()?;
        let mut edges = self.edges.lock().unwrap_or_else(PoisonError::into_inner);
        edges.retain(|e| e.link_id != edge.link_id);
        edges.push(edge.clone());
        Ok(())
    }
}

/// An [`EventPublisher`] that records every published event in order.
#[derive(Debug, Default)]
pub struct RecordingEventPublisher {
    events: Mutex<Vec<Event>>,
}

impl RecordingEventPublisher {
    /// Creates an empty publisher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Events published so far, in order.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Recorded events of one type.
    #[must_use]
    pub fn of_type(&self, event_type: EventType) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }
}

impl EventPublisher for RecordingEventPublisher {
    fn publish(&self, event: &Event) -> Result<(), SinkError> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        Ok(())
    }
}
