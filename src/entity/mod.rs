//! Entity layer modules.
//!
//! This module groups the canonical entity record and entity links.

pub mod entity;
pub mod link;

pub use entity::{Entity, EntityId, EntityStatus, EntityType};
pub use link::{EntityLink, LinkId};
