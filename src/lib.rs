//! # entity-resolution
//!
//! Resolves raw identity observations (names, addresses, phones, emails and
//! external identifiers) into a deduplicated set of canonical entities.
//!
//! ## Pipeline
//!
//! - **Standardizer**: total, idempotent normalization of each field
//! - **Matcher**: per-field similarity, weighted overall score, blocking
//! - **Resolver**: candidate search, merge-or-create decision, persistence,
//!   batch jobs and best-effort graph/event mirroring
//!
//! ## Usage
//!
//! ```rust
//! use entity_resolution::config::Config;
//! use entity_resolution::resolver::{Collaborators, ResolutionRequest, Resolver};
//!
//! let resolver = Resolver::new(&Config::default(), Collaborators::in_memory())?;
//! let result = resolver.resolve(
//!     &ResolutionRequest::new("organization", "Acme Incorporated")
//!         .with_identifier("duns", "15-048-3782"),
//! )?;
//! assert!(result.is_new_entity);
//! assert_eq!(result.standardized.name.standardized, "acme inc");
//! # Ok::<(), entity_resolution::ResolveError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod entity;
pub mod error;
pub mod events;
pub mod matching;
pub mod resolver;
pub mod sinks;
pub mod standardize;
pub mod storage;
pub mod value;

// Re-export primary types at crate root for convenience
pub use config::{Config, ConfigError, LogFormat, LoggingConfig, MatchingConfig, ResolutionConfig};
pub use entity::{Entity, EntityId, EntityLink, EntityStatus, EntityType, LinkId};
pub use error::{ExecutionError, ResolveError, ResolveResult, ValidationError};
pub use events::{Event, EventType};
pub use matching::{MatchCandidate, MatchSource, Matcher};
pub use resolver::{
    BatchResolutionJob, CancellationToken, Collaborators, JobId, JobStatus, ResolutionRequest,
    ResolutionResult, Resolver,
};
pub use sinks::{EventPublisher, GraphMirror, SinkError};
pub use standardize::{NormalizedRecord, Standardizer};
pub use storage::{CandidateStore, InMemoryCandidateStore, InMemoryJobStore, JobStore, StorageError};
pub use value::{Value, ValueMap};
