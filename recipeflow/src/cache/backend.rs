//! Storage backends for the testing-context cache.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use super::mapping::{ArtifactId, TestingContextMapping};
use crate::core::LinkBundle;
use crate::errors::CacheError;

/// Protocol for the two tag-scoped stores backing the cache: an artifact
/// (blob) store and a mapping-document store.
#[async_trait]
pub trait ArtifactBackend: Send + Sync {
    /// Reads one artifact.
    async fn get_artifact(&self, tag: &str, id: &ArtifactId) -> Result<Option<LinkBundle>, CacheError>;

    /// Writes one artifact, overwriting any previous value.
    async fn put_artifact(&self, tag: &str, id: &ArtifactId, artifact: &LinkBundle) -> Result<(), CacheError>;

    /// Reads the mapping document of a tag; an unknown tag yields an empty
    /// mapping.
    async fn load_mapping(&self, tag: &str) -> Result<TestingContextMapping, CacheError>;

    /// Replaces the mapping document of a tag.
    async fn save_mapping(&self, tag: &str, mapping: &TestingContextMapping) -> Result<(), CacheError>;
}

/// Rejects tags that cannot safely be used as storage keys.
pub(crate) fn validate_tag(tag: &str) -> Result<(), CacheError> {
    let invalid = tag.is_empty()
        || tag == "."
        || tag == ".."
        || tag.chars().any(|c| matches!(c, '/' | '\\' | '\0'));
    if invalid {
        Err(CacheError::InvalidTag(tag.to_string()))
    } else {
        Ok(())
    }
}

/// In-memory backend.
///
/// Useful for tests and for single-process deployments that accept losing
/// the cache on restart.
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    artifacts: RwLock<HashMap<(String, ArtifactId), LinkBundle>>,
    mappings: RwLock<HashMap<String, TestingContextMapping>>,
}

impl InMemoryArtifactStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored artifacts across all tags.
    #[must_use]
    pub fn artifact_count(&self) -> usize {
        self.artifacts.read().len()
    }
}

#[async_trait]
impl ArtifactBackend for InMemoryArtifactStore {
    async fn get_artifact(&self, tag: &str, id: &ArtifactId) -> Result<Option<LinkBundle>, CacheError> {
        validate_tag(tag)?;
        Ok(self
            .artifacts
            .read()
            .get(&(tag.to_string(), id.clone()))
            .cloned())
    }

    async fn put_artifact(&self, tag: &str, id: &ArtifactId, artifact: &LinkBundle) -> Result<(), CacheError> {
        validate_tag(tag)?;
        self.artifacts
            .write()
            .insert((tag.to_string(), id.clone()), artifact.clone());
        Ok(())
    }

    async fn load_mapping(&self, tag: &str) -> Result<TestingContextMapping, CacheError> {
        validate_tag(tag)?;
        Ok(self.mappings.read().get(tag).cloned().unwrap_or_default())
    }

    async fn save_mapping(&self, tag: &str, mapping: &TestingContextMapping) -> Result<(), CacheError> {
        validate_tag(tag)?;
        self.mappings.write().insert(tag.to_string(), mapping.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LinkField;

    #[test]
    fn test_validate_tag() {
        assert!(validate_tag("shop").is_ok());
        assert!(validate_tag("shop-v2.1").is_ok());
        assert!(validate_tag("").is_err());
        assert!(validate_tag("..").is_err());
        assert!(validate_tag("a/b").is_err());
        assert!(validate_tag("a\\b").is_err());
    }

    #[tokio::test]
    async fn test_in_memory_round_trip() {
        let store = InMemoryArtifactStore::new();
        let id = ArtifactId::new("a-1");
        let bundle = LinkBundle::new().with(LinkField::SessionLogs, "s/1");

        assert!(store.get_artifact("shop", &id).await.unwrap().is_none());
        store.put_artifact("shop", &id, &bundle).await.unwrap();
        assert_eq!(store.get_artifact("shop", &id).await.unwrap(), Some(bundle));

        // artifacts are tag-scoped
        assert!(store.get_artifact("other", &id).await.unwrap().is_none());
        assert_eq!(store.artifact_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_tag_has_empty_mapping() {
        let store = InMemoryArtifactStore::new();
        assert!(store.load_mapping("shop").await.unwrap().is_empty());
        assert!(store.load_mapping("../etc").await.is_err());
    }
}
