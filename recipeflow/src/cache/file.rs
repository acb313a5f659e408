//! JSON-file backend that survives process restarts.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::trace;

use super::backend::{validate_tag, ArtifactBackend};
use super::mapping::{ArtifactId, TestingContextMapping};
use crate::core::LinkBundle;
use crate::errors::CacheError;

/// Stores one JSON document per artifact and one per tag mapping:
///
/// ```text
/// <root>/artifacts/<tag>/<id>.json
/// <root>/mappings/<tag>.json
/// ```
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// crash never leaves a half-written document behind.
#[derive(Debug, Clone)]
pub struct FileArtifactStore {
    root: PathBuf,
}

impl FileArtifactStore {
    /// Creates a store rooted at `root`. Directories are created lazily.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn artifact_path(&self, tag: &str, id: &ArtifactId) -> PathBuf {
        self.root
            .join("artifacts")
            .join(tag)
            .join(format!("{id}.json"))
    }

    fn mapping_path(&self, tag: &str) -> PathBuf {
        self.root.join("mappings").join(format!("{tag}.json"))
    }

    async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, CacheError> {
        let shown = path.display().to_string();
        match tokio::fs::read(path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| CacheError::serialization(shown, e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::io(shown, e)),
        }
    }

    async fn write_json<T: Serialize + Sync>(path: &Path, value: &T) -> Result<(), CacheError> {
        let shown = path.display().to_string();
        let bytes =
            serde_json::to_vec_pretty(value).map_err(|e| CacheError::serialization(&shown, e))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CacheError::io(parent.display().to_string(), e))?;
        }

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| CacheError::io(tmp.display().to_string(), e))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| CacheError::io(&shown, e))?;

        trace!(path = %shown, "Wrote cache document");
        Ok(())
    }
}

#[async_trait]
impl ArtifactBackend for FileArtifactStore {
    async fn get_artifact(&self, tag: &str, id: &ArtifactId) -> Result<Option<LinkBundle>, CacheError> {
        validate_tag(tag)?;
        validate_tag(id.as_str())?;
        Self::read_json(&self.artifact_path(tag, id)).await
    }

    async fn put_artifact(&self, tag: &str, id: &ArtifactId, artifact: &LinkBundle) -> Result<(), CacheError> {
        validate_tag(tag)?;
        validate_tag(id.as_str())?;
        Self::write_json(&self.artifact_path(tag, id), artifact).await
    }

    async fn load_mapping(&self, tag: &str) -> Result<TestingContextMapping, CacheError> {
        validate_tag(tag)?;
        Ok(Self::read_json(&self.mapping_path(tag))
            .await?
            .unwrap_or_default())
    }

    async fn save_mapping(&self, tag: &str, mapping: &TestingContextMapping) -> Result<(), CacheError> {
        validate_tag(tag)?;
        Self::write_json(&self.mapping_path(tag), mapping).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TestingContext;
    use crate::core::LinkField;

    #[tokio::test]
    async fn test_layout_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileArtifactStore::new(dir.path());
        let id = ArtifactId::new("a-1");

        store
            .put_artifact("shop", &id, &LinkBundle::new().with(LinkField::LoadTest, "lt"))
            .await
            .unwrap();
        let mut mapping = TestingContextMapping::new();
        mapping.record(&TestingContext::from(["cart".to_string()]), id.clone());
        store.save_mapping("shop", &mapping).await.unwrap();

        assert!(dir.path().join("artifacts/shop/a-1.json").is_file());
        assert!(dir.path().join("mappings/shop.json").is_file());
        assert!(!dir.path().join("mappings/shop.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let id = ArtifactId::new("a-1");
        let bundle = LinkBundle::new().with(LinkField::SessionLogs, "s/1");

        {
            let store = FileArtifactStore::new(dir.path());
            store.put_artifact("shop", &id, &bundle).await.unwrap();
        }

        let reopened = FileArtifactStore::new(dir.path());
        assert_eq!(reopened.get_artifact("shop", &id).await.unwrap(), Some(bundle));
        assert!(reopened.load_mapping("shop").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_document_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("mappings")).unwrap();
        std::fs::write(dir.path().join("mappings/shop.json"), b"not json").unwrap();

        let store = FileArtifactStore::new(dir.path());
        let err = store.load_mapping("shop").await.unwrap_err();
        assert!(matches!(err, CacheError::Serialization { .. }));
    }

    #[tokio::test]
    async fn test_rejects_path_like_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileArtifactStore::new(dir.path());
        let err = store
            .get_artifact("shop", &ArtifactId::new("../../x"))
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::InvalidTag(_)));
    }
}
