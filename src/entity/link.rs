//! Typed relationships between two entities.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::EntityId;
use crate::value::ValueMap;

/// Unique identifier for an entity link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(Uuid);

impl LinkId {
    /// Creates a new random link ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for LinkId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A directed, typed relationship from `source` to `target`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityLink {
    /// Unique link identifier.
    pub id: LinkId,
    /// Entity the link starts at.
    pub source: EntityId,
    /// Entity the link points to.
    pub target: EntityId,
    /// Relationship label, upper-cased (e.g. `SAME_AS`, `OWNS`).
    pub link_type: String,
    /// Free-form link properties.
    #[serde(default)]
    pub properties: ValueMap,
    /// Confidence in the relationship, in `[0, 1]`.
    pub confidence: f64,
    /// When the link was created.
    pub created_at: DateTime<Utc>,
}

impl EntityLink {
    /// Creates a link with a fresh ID. The label is trimmed and upper-cased.
    #[must_use]
    pub fn new(source: EntityId, target: EntityId, link_type: &str, confidence: f64) -> Self {
        Self {
            id: LinkId::new(),
            source,
            target,
            link_type: link_type.trim().to_ascii_uppercase(),
            properties: ValueMap::new(),
            confidence,
            created_at: Utc::now(),
        }
    }

    /// Builder-style properties setter.
    #[must_use]
    pub fn with_properties(mut self, properties: ValueMap) -> Self {
        self.properties = properties;
        self
    }

    /// Returns true when `id` is either endpoint of the link.
    #[must_use]
    pub fn touches(&self, id: EntityId) -> bool {
        self.source == id || self.target == id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_type_normalized() {
        let link = EntityLink::new(EntityId::new(), EntityId::new(), " same_as ", 0.9);
        assert_eq!(link.link_type, "SAME_AS");
    }

    #[test]
    fn test_touches_both_endpoints() {
        let a = EntityId::new();
        let b = EntityId::new();
        let link = EntityLink::new(a, b, "OWNS", 1.0);
        assert!(link.touches(a));
        assert!(link.touches(b));
        assert!(!link.touches(EntityId::new()));
    }
}
