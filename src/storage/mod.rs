//! Storage traits and in-memory backends.
//!
//! The resolver depends only on the traits; any system of record that can
//! answer identifier and fuzzy-name lookups can back it.

mod memory;
mod traits;

pub use memory::{InMemoryCandidateStore, InMemoryJobStore};
pub use traits::{CandidateStore, JobStore, StorageError};
