//! Per-tag index from testing contexts to stored artifacts.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::TestingContext;
use crate::utils::generate_uuid_v7;

/// Identifier of one stored artifact bundle.
///
/// Generated ids are UUIDv7 strings, so lexical order follows creation order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(String);

impl ArtifactId {
    /// Wraps an existing id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh, time-ordered id.
    #[must_use]
    pub fn generate() -> Self {
        Self(generate_uuid_v7().to_string())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The mapping document of one tag.
///
/// - `full`: exact context label set → ids stored under it
/// - `individual`: single label → every context set containing it
/// - `applied_tokens`: write token → id the write resolved to
///
/// Context sets are not valid JSON object keys, so the context-keyed maps are
/// serialized as lists of `[context, value]` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestingContextMapping {
    #[serde(default, with = "context_keyed")]
    full: BTreeMap<TestingContext, BTreeSet<ArtifactId>>,
    #[serde(default)]
    individual: BTreeMap<String, BTreeSet<TestingContext>>,
    #[serde(default)]
    applied_tokens: BTreeMap<String, ArtifactId>,
}

impl TestingContextMapping {
    /// Creates an empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the ids stored under exactly `context`, in ascending order.
    #[must_use]
    pub fn exact(&self, context: &TestingContext) -> Option<&BTreeSet<ArtifactId>> {
        self.full.get(context)
    }

    /// Returns every stored context set containing `label`.
    #[must_use]
    pub fn contexts_with_label(&self, label: &str) -> Option<&BTreeSet<TestingContext>> {
        self.individual.get(label)
    }

    /// Records `id` under `context` and indexes every label of `context`.
    pub fn record(&mut self, context: &TestingContext, id: ArtifactId) {
        self.full.entry(context.clone()).or_default().insert(id);
        for label in context {
            self.individual
                .entry(label.clone())
                .or_default()
                .insert(context.clone());
        }
    }

    /// Returns the id a write token already resolved to.
    #[must_use]
    pub fn applied(&self, token: &str) -> Option<&ArtifactId> {
        self.applied_tokens.get(token)
    }

    /// Remembers that a write token resolved to `id`.
    pub fn mark_applied(&mut self, token: impl Into<String>, id: ArtifactId) {
        self.applied_tokens.insert(token.into(), id);
    }

    /// Returns the number of distinct context sets.
    #[must_use]
    pub fn context_count(&self) -> usize {
        self.full.len()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.full.is_empty()
    }
}

mod context_keyed {
    use super::{ArtifactId, TestingContext};
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::{BTreeMap, BTreeSet};

    type Map = BTreeMap<TestingContext, BTreeSet<ArtifactId>>;

    pub fn serialize<S: Serializer>(map: &Map, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(map.len()))?;
        for entry in map {
            seq.serialize_element(&entry)?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Map, D::Error> {
        let pairs = Vec::<(TestingContext, BTreeSet<ArtifactId>)>::deserialize(deserializer)?;
        let mut map = Map::new();
        for (context, ids) in pairs {
            map.entry(context).or_default().extend(ids);
        }
        Ok(map)
    }
}
