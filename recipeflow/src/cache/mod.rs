//! Testing-context artifact cache.
//!
//! This module provides:
//! - The per-tag `TestingContextMapping` (full and individual indexes)
//! - The `ArtifactBackend` protocol with in-memory and JSON-file backends
//! - `TestingContextCache`, which merges overlapping artifacts per context

mod backend;
mod context_cache;
mod file;
mod mapping;

use std::collections::BTreeSet;

pub use backend::{ArtifactBackend, InMemoryArtifactStore};
pub use context_cache::{
    ContextArtifacts, StoreDisposition, StoreOutcome, TestingContextCache, WriteToken,
};
pub use file::FileArtifactStore;
pub use mapping::{ArtifactId, TestingContextMapping};

/// A set of labels describing the partial scope (e.g. sub-services) an
/// artifact was produced for.
pub type TestingContext = BTreeSet<String>;
