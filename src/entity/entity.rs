//! Entity types and identity management.
//!
//! An entity is the canonical record that observations resolve into. Its ID
//! never changes; merges only overlay identifiers/attributes and bump the
//! version and `updated_at`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value::{merge_values, ValueMap};

/// Globally unique, stable entity identifier.
///
/// # Examples
///
/// ```
/// use entity_resolution::EntityId;
///
/// let id = EntityId::new();
/// assert!(!id.is_nil());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Creates a new random entity ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an entity ID from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Returns true if this is a nil (all zeros) UUID.
    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Creates a nil entity ID (for testing or sentinel values).
    #[must_use]
    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for EntityId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Classification of entity types.
///
/// Unknown tags are kept verbatim as [`EntityType::Custom`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EntityType {
    /// A natural person
    Person,
    /// A company, institution, or group
    Organization,
    /// A financial or service account
    Account,
    /// Any other tag supplied by the source system
    Custom(String),
}

impl TryFrom<String> for EntityType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| "entity type cannot be empty".to_string())
    }
}

impl EntityType {
    /// Parses a type tag, returning `None` for a blank tag.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }

        Some(if value.eq_ignore_ascii_case("person") {
            Self::Person
        } else if value.eq_ignore_ascii_case("organization") {
            Self::Organization
        } else if value.eq_ignore_ascii_case("account") {
            Self::Account
        } else {
            Self::Custom(value.to_ascii_lowercase())
        })
    }

    /// Returns the wire tag.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Person => "person",
            Self::Organization => "organization",
            Self::Account => "account",
            Self::Custom(name) => name,
        }
    }
}

impl From<EntityType> for String {
    fn from(value: EntityType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityStatus {
    /// Live entity that can receive merges.
    #[default]
    Active,
    /// Retired entity.
    Inactive,
}

/// The canonical record observations resolve into.
///
/// # Examples
///
/// ```
/// use entity_resolution::{Entity, EntityType};
///
/// let entity = Entity::new("Acme Corporation", "acme corp", EntityType::Organization);
/// assert_eq!(entity.version, 1);
/// assert_eq!(entity.standardized_name, "acme corp");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    /// Globally unique identifier.
    pub id: EntityId,

    /// The type tag of the entity.
    pub entity_type: EntityType,

    /// Name as first observed.
    pub name: String,

    /// Standardized form of `name`.
    pub standardized_name: String,

    /// External identifiers (ssn, account number, email, ...). Keys are unique.
    #[serde(default)]
    pub identifiers: ValueMap,

    /// Free-form attributes.
    #[serde(default)]
    pub attributes: ValueMap,

    /// Confidence of the decision that created this entity, in [0, 1].
    pub confidence_score: f64,

    /// Lifecycle status.
    #[serde(default)]
    pub status: EntityStatus,

    /// When the entity was first created.
    pub created_at: DateTime<Utc>,

    /// When the entity was last modified.
    pub updated_at: DateTime<Utc>,

    /// Version number (incremented on every merge).
    pub version: u64,
}

impl Entity {
    /// Creates a new active entity with a fresh ID and confidence 1.0.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        standardized_name: impl Into<String>,
        entity_type: EntityType,
    ) -> Self {
        Self::with_id(EntityId::new(), name, standardized_name, entity_type)
    }

    /// Creates a new entity with a specific ID.
    #[must_use]
    pub fn with_id(
        id: EntityId,
        name: impl Into<String>,
        standardized_name: impl Into<String>,
        entity_type: EntityType,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            entity_type,
            name: name.into(),
            standardized_name: standardized_name.into(),
            identifiers: ValueMap::new(),
            attributes: ValueMap::new(),
            confidence_score: 1.0,
            status: EntityStatus::Active,
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    /// Builder-style identifier setter.
    #[must_use]
    pub fn with_identifier(mut self, key: impl Into<String>, value: impl Into<crate::Value>) -> Self {
        self.identifiers.insert(key.into(), value.into());
        self
    }

    /// Builder-style attribute setter.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<crate::Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Overlays an observation onto this entity.
    ///
    /// Incoming values overwrite existing ones on key collision. Always bumps
    /// the version and `updated_at`, even when nothing changed, so every merge
    /// decision is visible in the record.
    pub fn absorb(&mut self, identifiers: &ValueMap, attributes: &ValueMap) {
        merge_values(&mut self.identifiers, identifiers);
        merge_values(&mut self.attributes, attributes);
        self.touch();
    }

    /// Updates the `updated_at` timestamp and increments the version.
    fn touch(&mut self) {
        self.updated_at = Utc::now();
        self.version += 1;
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Entity {}

impl std::hash::Hash for Entity {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Value;

    #[test]
    fn test_entity_id_creation() {
        let id1 = EntityId::new();
        let id2 = EntityId::new();
        assert_ne!(id1, id2);
        assert!(!id1.is_nil());
        assert!(EntityId::nil().is_nil());
    }

    #[test]
    fn test_entity_id_display() {
        let id = EntityId::new();
        assert!(id.to_string().contains('-'));
    }

    #[test]
    fn test_entity_type_parse() {
        assert_eq!(EntityType::parse("Person"), Some(EntityType::Person));
        assert_eq!(EntityType::parse(" organization "), Some(EntityType::Organization));
        assert_eq!(
            EntityType::parse("Merchant"),
            Some(EntityType::Custom("merchant".to_string()))
        );
        assert_eq!(EntityType::parse("   "), None);
    }

    #[test]
    fn test_entity_type_serde() {
        let json = serde_json::to_string(&EntityType::Account).unwrap();
        assert_eq!(json, "\"account\"");
        let parsed: EntityType = serde_json::from_str("\"vendor\"").unwrap();
        assert_eq!(parsed, EntityType::Custom("vendor".to_string()));
        assert!(serde_json::from_str::<EntityType>("\"\"").is_err());
    }

    #[test]
    fn test_entity_creation() {
        let entity = Entity::new("Jane Doe", "jane doe", EntityType::Person);
        assert_eq!(entity.version, 1);
        assert_eq!(entity.status, EntityStatus::Active);
        assert!((entity.confidence_score - 1.0).abs() < f64::EPSILON);
        assert_eq!(entity.created_at, entity.updated_at);
    }

    #[test]
    fn test_absorb_overwrites_and_touches() {
        let mut entity = Entity::new("Jane Doe", "jane doe", EntityType::Person)
            .with_identifier("ssn", "111")
            .with_attribute("city", "Springfield");
        let before = entity.updated_at;

        let mut ids = ValueMap::new();
        ids.insert("ssn".into(), Value::from("222"));
        ids.insert("email".into(), Value::from("jane@example.com"));
        let mut attrs = ValueMap::new();
        attrs.insert("age".into(), Value::Int(40));

        entity.absorb(&ids, &attrs);
        assert_eq!(entity.version, 2);
        assert!(entity.updated_at >= before);
        assert_eq!(entity.identifiers["ssn"], Value::from("222"));
        assert_eq!(entity.identifiers["email"], Value::from("jane@example.com"));
        assert_eq!(entity.attributes["city"], Value::from("Springfield"));
        assert_eq!(entity.attributes["age"], Value::Int(40));
    }

    #[test]
    fn test_entity_equality_by_id() {
        let a = Entity::new("A", "a", EntityType::Person);
        let mut b = a.clone();
        b.name = "B".to_string();
        assert_eq!(a, b);
    }
}
