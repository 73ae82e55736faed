//! In-memory [`KnowledgeStore`] backend.
//!
//! Created once at process start and shared as `Arc<dyn KnowledgeStore>`.
//! Entities, relationships, classifications and embeddings can be written
//! to a JSON snapshot on shutdown and loaded again at start; the result
//! cache is deliberately not persisted.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use scout_vector::{DistanceMetric, FlatIndex};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::cache::{CacheConfig, CacheStats, ResultCache};
use super::graph::{EntityGraph, GraphView};
use super::{KnowledgeStore, Neighbor};
use crate::types::{
    AppError, Entity, EntityType, Relationship, RelationshipType, Result, ResultSet,
    TrlClassification,
};

type ClassificationKey = (EntityType, String);

/// Process-wide store backed by hash maps behind `parking_lot` locks.
pub struct InMemoryKnowledgeStore {
    cache: ResultCache,
    graph: RwLock<EntityGraph>,
    index: FlatIndex,
    classifications: RwLock<HashMap<ClassificationKey, Vec<TrlClassification>>>,
}

/// Serializable copy of everything except the cache.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
    /// Full history, oldest first per entity.
    pub classifications: Vec<TrlClassification>,
    #[serde(default)]
    pub embeddings: Vec<(String, Vec<f32>)>,
}

impl Default for InMemoryKnowledgeStore {
    fn default() -> Self {
        Self::new(CacheConfig::default(), DistanceMetric::Cosine)
    }
}

impl InMemoryKnowledgeStore {
    pub fn new(cache: CacheConfig, metric: DistanceMetric) -> Self {
        Self {
            cache: ResultCache::new(cache),
            graph: RwLock::new(EntityGraph::new()),
            index: FlatIndex::new(metric),
            classifications: RwLock::new(HashMap::new()),
        }
    }

    pub fn entity_count(&self) -> usize {
        self.graph.read().entity_count()
    }

    pub fn relationship_count(&self) -> usize {
        self.graph.read().relationship_count()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let graph = self.graph.read();
        let mut classifications: Vec<TrlClassification> = self
            .classifications
            .read()
            .values()
            .flatten()
            .cloned()
            .collect();
        classifications.sort_by(|a, b| {
            (a.entity_type, &a.entity_id, a.version).cmp(&(b.entity_type, &b.entity_id, b.version))
        });

        StoreSnapshot {
            entities: graph.entities().cloned().collect(),
            relationships: graph.relationships().cloned().collect(),
            classifications,
            embeddings: self.index.entries(),
        }
    }

    /// Merge a snapshot into this store.
    pub fn restore(&self, snapshot: StoreSnapshot) -> Result<()> {
        {
            let mut graph = self.graph.write();
            for entity in &snapshot.entities {
                graph.upsert_entity(entity);
            }
            for relationship in snapshot.relationships {
                graph.restore_relationship(relationship)?;
            }
        }

        {
            let mut classifications = self.classifications.write();
            for classification in snapshot.classifications {
                classifications
                    .entry((classification.entity_type, classification.entity_id.clone()))
                    .or_default()
                    .push(classification);
            }
        }

        for (key, vector) in snapshot.embeddings {
            self.index.upsert(&key, vector)?;
        }
        Ok(())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let snapshot = self.snapshot();
        let json = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| AppError::Internal(format!("snapshot serialization failed: {}", e)))?;
        std::fs::write(path, json).map_err(|e| {
            AppError::StoreUnavailable(format!("cannot write {}: {}", path.display(), e))
        })?;
        info!(
            path = %path.display(),
            entities = snapshot.entities.len(),
            relationships = snapshot.relationships.len(),
            "Knowledge store snapshot written"
        );
        Ok(())
    }

    /// Load a snapshot into this store; a missing file is not an error.
    pub fn load_from(&self, path: &Path) -> Result<bool> {
        if !path.exists() {
            debug!(path = %path.display(), "No knowledge store snapshot to load");
            return Ok(false);
        }
        let json = std::fs::read_to_string(path).map_err(|e| {
            AppError::StoreUnavailable(format!("cannot read {}: {}", path.display(), e))
        })?;
        let snapshot: StoreSnapshot = serde_json::from_str(&json).map_err(|e| {
            AppError::StoreUnavailable(format!("corrupt snapshot {}: {}", path.display(), e))
        })?;
        self.restore(snapshot)?;
        info!(path = %path.display(), entities = self.entity_count(), "Knowledge store snapshot loaded");
        Ok(true)
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryKnowledgeStore {
    async fn get_cache(&self, fingerprint: &str) -> Result<Option<ResultSet>> {
        Ok(self.cache.get(fingerprint))
    }

    async fn put_cache(&self, fingerprint: &str, results: &ResultSet, ttl: Duration) -> Result<()> {
        self.cache.put(fingerprint, results.clone(), Some(ttl));
        Ok(())
    }

    async fn invalidate_cache(&self, fingerprint: &str) -> Result<()> {
        self.cache.invalidate(fingerprint);
        Ok(())
    }

    async fn upsert_entity(&self, entity: &Entity) -> Result<Entity> {
        Ok(self.graph.write().upsert_entity(entity))
    }

    async fn get_entity(&self, natural_key: &str) -> Result<Option<Entity>> {
        Ok(self.graph.read().get(natural_key).cloned())
    }

    async fn upsert_relationship(
        &self,
        from: &str,
        to: &str,
        kind: RelationshipType,
    ) -> Result<Relationship> {
        self.graph.write().upsert_relationship(from, to, kind)
    }

    async fn neighborhood(&self, natural_key: &str, hops: usize) -> Result<GraphView> {
        Ok(self.graph.read().neighborhood(natural_key, hops))
    }

    async fn put_embedding(&self, natural_key: &str, vector: &[f32]) -> Result<()> {
        self.index.upsert(natural_key, vector.to_vec())?;
        Ok(())
    }

    async fn nearest_by_embedding(&self, vector: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if self.index.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.index.search(vector, k)?)
    }

    async fn get_classification(
        &self,
        entity_type: EntityType,
        entity_id: &str,
    ) -> Result<Option<TrlClassification>> {
        Ok(self
            .classifications
            .read()
            .get(&(entity_type, entity_id.to_string()))
            .and_then(|history| history.last().cloned()))
    }

    async fn put_classification(
        &self,
        classification: &TrlClassification,
    ) -> Result<TrlClassification> {
        let mut classifications = self.classifications.write();
        let history = classifications
            .entry((classification.entity_type, classification.entity_id.clone()))
            .or_default();

        let mut stored = classification.clone();
        stored.trl = stored.trl.clamp(1, 9);
        stored.version = history.last().map(|c| c.version + 1).unwrap_or(1);
        history.push(stored.clone());
        Ok(stored)
    }

    async fn classification_history(
        &self,
        entity_type: EntityType,
        entity_id: &str,
    ) -> Result<Vec<TrlClassification>> {
        Ok(self
            .classifications
            .read()
            .get(&(entity_type, entity_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn classification(key: &str, trl: u8) -> TrlClassification {
        TrlClassification {
            entity_type: EntityType::Component,
            entity_id: key.to_string(),
            trl,
            confidence: 0.5,
            evidence: vec![],
            justification: String::new(),
            version: 0,
            classified_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_reclassification_keeps_history() {
        let store = InMemoryKnowledgeStore::default();

        let first = store
            .put_classification(&classification("component:A", 4))
            .await
            .unwrap();
        let second = store
            .put_classification(&classification("component:A", 8))
            .await
            .unwrap();

        assert_eq!(first.version, 1);
        assert_eq!(second.version, 2);

        let current = store
            .get_classification(EntityType::Component, "component:A")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(current.trl, 8);

        let history = store
            .classification_history(EntityType::Component, "component:A")
            .await
            .unwrap();
        assert_eq!(history.iter().map(|c| c.trl).collect::<Vec<_>>(), vec![4, 8]);
    }

    #[tokio::test]
    async fn test_nearest_by_embedding() {
        let store = InMemoryKnowledgeStore::default();
        assert!(store.nearest_by_embedding(&[1.0, 0.0], 3).await.unwrap().is_empty());

        store.put_embedding("component:A", &[1.0, 0.0]).await.unwrap();
        store.put_embedding("component:B", &[0.0, 1.0]).await.unwrap();

        let hits = store.nearest_by_embedding(&[0.9, 0.1], 1).await.unwrap();
        assert_eq!(hits[0].id, "component:A");

        let err = store.put_embedding("component:C", &[1.0]).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_snapshot_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.snapshot.json");

        let store = InMemoryKnowledgeStore::default();
        store
            .upsert_entity(&Entity::anchor("component:A".into(), EntityType::Component, "A"))
            .await
            .unwrap();
        store
            .upsert_entity(&Entity::anchor("technology:gan".into(), EntityType::Technology, "GaN"))
            .await
            .unwrap();
        store
            .upsert_relationship("component:A", "technology:gan", RelationshipType::Implements)
            .await
            .unwrap();
        store
            .upsert_relationship("component:A", "technology:gan", RelationshipType::Implements)
            .await
            .unwrap();
        store.put_classification(&classification("component:A", 8)).await.unwrap();
        store.save_to(&path).unwrap();

        let restored = InMemoryKnowledgeStore::default();
        assert!(restored.load_from(&path).unwrap());
        assert_eq!(restored.entity_count(), 2);

        let view = restored.neighborhood("component:A", 1).await.unwrap();
        assert_eq!(view.relationships.len(), 1);
        assert_eq!(view.relationships[0].occurrences, 2);

        let current = restored
            .get_classification(EntityType::Component, "component:A")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(current.version, 1);
    }

    #[tokio::test]
    async fn test_missing_snapshot_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryKnowledgeStore::default();
        assert!(!store.load_from(&dir.path().join("absent.json")).unwrap());
    }
}
