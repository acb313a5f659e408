//! Context-aware artifact cache.
//!
//! Artifacts produced for the same testing context are merged when they are
//! believed to describe the same computation (they share a primary link), so
//! equivalent work is looked up instead of repeated.

use dashmap::DashMap;
use futures::future::try_join_all;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use super::backend::ArtifactBackend;
use super::mapping::ArtifactId;
use super::TestingContext;
use crate::core::LinkBundle;
use crate::errors::CacheError;

/// Idempotency key of one cache write.
///
/// A write carrying a token that was already applied for the tag returns the
/// earlier result without touching the stores, so redelivered writes cannot
/// double-merge or create duplicate ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WriteToken(String);

impl WriteToken {
    /// Wraps an explicit token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Derives a token from components, e.g. an order id and its tag.
    #[must_use]
    pub fn derive(components: &[&str]) -> Self {
        let combined = components.join(":");
        let mut hasher = Sha256::new();
        hasher.update(combined.as_bytes());
        let result = hasher.finalize();
        Self(format!("write:{}", hex::encode(&result[..16])))
    }

    /// Returns the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// How a write was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreDisposition {
    /// No overlapping artifact existed; a new id was assigned.
    Created,
    /// The bundle was merged into an overlapping artifact.
    Merged,
    /// The write token had already been applied; nothing was written.
    Replayed,
}

/// Result of [`TestingContextCache::store`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOutcome {
    /// The id the bundle is stored under.
    pub id: ArtifactId,
    /// How the write was resolved.
    pub disposition: StoreDisposition,
}

/// Artifacts found for one context set, keyed by id in ascending order.
pub type ContextArtifacts = BTreeMap<ArtifactId, LinkBundle>;

/// Two-tier artifact cache keyed by application tag and testing context.
pub struct TestingContextCache {
    backend: Arc<dyn ArtifactBackend>,
    tag_locks: DashMap<String, Arc<AsyncMutex<()>>>,
}

impl std::fmt::Debug for TestingContextCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestingContextCache")
            .field("locked_tags", &self.tag_locks.len())
            .finish()
    }
}

impl TestingContextCache {
    /// Creates a cache over a backend.
    #[must_use]
    pub fn new(backend: Arc<dyn ArtifactBackend>) -> Self {
        Self {
            backend,
            tag_locks: DashMap::new(),
        }
    }

    fn tag_lock(&self, tag: &str) -> Arc<AsyncMutex<()>> {
        Arc::clone(
            self.tag_locks
                .entry(tag.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .value(),
        )
    }

    /// Stores a fresh artifact under a new id.
    pub async fn put(&self, tag: &str, artifact: &LinkBundle) -> Result<ArtifactId, CacheError> {
        let id = ArtifactId::generate();
        self.backend.put_artifact(tag, &id, artifact).await?;
        Ok(id)
    }

    /// Overwrites the artifact stored under `id`.
    pub async fn put_at(&self, tag: &str, id: &ArtifactId, artifact: &LinkBundle) -> Result<(), CacheError> {
        self.backend.put_artifact(tag, id, artifact).await
    }

    /// Reads one artifact.
    pub async fn get_artifact(&self, tag: &str, id: &ArtifactId) -> Result<Option<LinkBundle>, CacheError> {
        self.backend.get_artifact(tag, id).await
    }

    /// Stores `artifact` as produced for `context`.
    ///
    /// Only artifacts recorded under exactly `context` are merge candidates.
    /// Candidates are tried in ascending id order; the first one overlapping
    /// `artifact` absorbs it (existing fields win) and keeps its id.
    /// Otherwise the artifact gets a fresh id. Either way the mapping records
    /// the id under `context` and indexes every label of `context`.
    ///
    /// Writes to one tag are serialized within this process. Separate
    /// processes sharing a backend still race on the mapping document.
    pub async fn store(
        &self,
        tag: &str,
        context: &TestingContext,
        artifact: &LinkBundle,
        token: Option<&WriteToken>,
    ) -> Result<StoreOutcome, CacheError> {
        let lock = self.tag_lock(tag);
        let _guard = lock.lock().await;

        let mut mapping = self.backend.load_mapping(tag).await?;

        if let Some(token) = token {
            if let Some(id) = mapping.applied(token.as_str()) {
                debug!(tag = %tag, token = %token.as_str(), id = %id, "Cache write already applied");
                return Ok(StoreOutcome {
                    id: id.clone(),
                    disposition: StoreDisposition::Replayed,
                });
            }
        }

        let candidates: Vec<ArtifactId> = mapping
            .exact(context)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default();

        let mut merged_into = None;
        for id in candidates {
            match self.backend.get_artifact(tag, &id).await? {
                Some(existing) if existing.overlaps(artifact) => {
                    let merged = existing.merged(artifact);
                    self.backend.put_artifact(tag, &id, &merged).await?;
                    merged_into = Some(id);
                    break;
                }
                Some(_) => {}
                None => {
                    warn!(tag = %tag, id = %id, "Mapping references a missing artifact");
                }
            }
        }

        let outcome = match merged_into {
            Some(id) => StoreOutcome {
                id,
                disposition: StoreDisposition::Merged,
            },
            None => StoreOutcome {
                id: self.put(tag, artifact).await?,
                disposition: StoreDisposition::Created,
            },
        };

        mapping.record(context, outcome.id.clone());
        if let Some(token) = token {
            mapping.mark_applied(token.as_str(), outcome.id.clone());
        }
        self.backend.save_mapping(tag, &mapping).await?;

        info!(
            tag = %tag,
            context = ?context,
            id = %outcome.id,
            disposition = ?outcome.disposition,
            "Stored artifact"
        );
        Ok(outcome)
    }

    /// Looks up the artifacts stored for `context`.
    ///
    /// Without `include_partial` only the exact context set is consulted and
    /// the result has at most one entry. With it, every stored context set
    /// sharing at least one label with `context` is returned under its own
    /// key; an artifact recorded under several such sets appears under each
    /// of them.
    pub async fn get(
        &self,
        tag: &str,
        context: &TestingContext,
        include_partial: bool,
    ) -> Result<BTreeMap<TestingContext, ContextArtifacts>, CacheError> {
        let mapping = self.backend.load_mapping(tag).await?;
        let mut result = BTreeMap::new();

        let contexts: Vec<TestingContext> = if include_partial {
            context
                .iter()
                .filter_map(|label| mapping.contexts_with_label(label))
                .flatten()
                .cloned()
                .collect()
        } else if mapping.exact(context).is_some() {
            vec![context.clone()]
        } else {
            Vec::new()
        };

        for ctx in contexts {
            if result.contains_key(&ctx) {
                continue;
            }
            let ids: Vec<&ArtifactId> = mapping.exact(&ctx).into_iter().flatten().collect();
            let bundles = try_join_all(ids.iter().map(|id| self.backend.get_artifact(tag, id))).await?;
            let artifacts: ContextArtifacts = ids
                .into_iter()
                .zip(bundles)
                .filter_map(|(id, bundle)| bundle.map(|b| (id.clone(), b)))
                .collect();
            result.insert(ctx, artifacts);
        }

        debug!(
            tag = %tag,
            context = ?context,
            include_partial,
            found = result.len(),
            "Cache lookup"
        );
        Ok(result)
    }

    /// Finds the artifact stored for exactly `context` that was built from
    /// the same work as `inputs`, i.e. shares a primary link with it.
    ///
    /// Candidates are tried in ascending id order and the first overlapping
    /// one is returned whole. Artifacts are never combined.
    pub async fn find_matching(
        &self,
        tag: &str,
        context: &TestingContext,
        inputs: &LinkBundle,
    ) -> Result<Option<(ArtifactId, LinkBundle)>, CacheError> {
        let mut found = self.get(tag, context, false).await?;
        let matched = found
            .remove(context)
            .and_then(|artifacts| artifacts.into_iter().find(|(_, bundle)| bundle.overlaps(inputs)));

        debug!(
            tag = %tag,
            context = ?context,
            matched = ?matched.as_ref().map(|(id, _)| id.as_str()),
            "Cache match lookup"
        );
        Ok(matched)
    }
}
