//! Knowledge Store
//!
//! The only shared mutable state in the engine: a fingerprint-keyed result
//! cache, an entity registry with a typed relationship graph, an embedding
//! similarity index and the readiness classification history.
//!
//! Everything above this module talks to storage exclusively through the
//! [`KnowledgeStore`] trait, so the backing engine can be swapped. The crate
//! ships [`InMemoryKnowledgeStore`], which can persist itself as a JSON
//! snapshot between runs.
//!
//! # Concurrency
//!
//! Concurrent writers upsert by natural key. Field conflicts are resolved by
//! relevance (see [`Entity::absorb`](crate::types::Entity::absorb)), so the
//! stored entity converges to the same value regardless of write order.

/// Fingerprint-keyed result cache.
pub mod cache;
/// Entity registry and relationship graph.
pub mod graph;
/// In-memory store and JSON snapshots.
pub mod memory;

use async_trait::async_trait;
use std::time::Duration;

use crate::types::{
    Entity, EntityType, Relationship, RelationshipType, Result, ResultSet, TrlClassification,
};

pub use cache::{CacheConfig, CacheStats, ResultCache};
pub use graph::{EntityGraph, GraphView};
pub use memory::{InMemoryKnowledgeStore, StoreSnapshot};
pub use scout_vector::SearchResult as Neighbor;

/// Narrow storage contract used by executors, the aggregator and the
/// orchestrator.
///
/// Implementations report an unreachable backend as
/// [`AppError::StoreUnavailable`](crate::types::AppError::StoreUnavailable);
/// callers treat that as a cache miss rather than a task failure.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Fresh cached result set for a fingerprint, if any.
    async fn get_cache(&self, fingerprint: &str) -> Result<Option<ResultSet>>;

    /// Cache a result set for `ttl`.
    async fn put_cache(&self, fingerprint: &str, results: &ResultSet, ttl: Duration) -> Result<()>;

    /// Drop a cached result set.
    async fn invalidate_cache(&self, fingerprint: &str) -> Result<()>;

    /// Insert or merge an entity under its natural key; returns the stored
    /// (merged) entity.
    async fn upsert_entity(&self, entity: &Entity) -> Result<Entity>;

    async fn get_entity(&self, natural_key: &str) -> Result<Option<Entity>>;

    /// Add an edge or bump its occurrence count. Both endpoints must exist.
    async fn upsert_relationship(
        &self,
        from: &str,
        to: &str,
        kind: RelationshipType,
    ) -> Result<Relationship>;

    /// Entities and edges within `hops` of an entity.
    async fn neighborhood(&self, natural_key: &str, hops: usize) -> Result<GraphView>;

    /// Store or replace the embedding of an entity.
    async fn put_embedding(&self, natural_key: &str, vector: &[f32]) -> Result<()>;

    /// The `k` entities whose embeddings are closest to `vector`.
    async fn nearest_by_embedding(&self, vector: &[f32], k: usize) -> Result<Vec<Neighbor>>;

    /// Current classification for an entity.
    async fn get_classification(
        &self,
        entity_type: EntityType,
        entity_id: &str,
    ) -> Result<Option<TrlClassification>>;

    /// Record a new classification, superseding (not deleting) the current
    /// one. Returns the stored copy with its version set.
    async fn put_classification(
        &self,
        classification: &TrlClassification,
    ) -> Result<TrlClassification>;

    /// Every classification ever recorded for an entity, oldest first.
    async fn classification_history(
        &self,
        entity_type: EntityType,
        entity_id: &str,
    ) -> Result<Vec<TrlClassification>>;

    /// Cache counters.
    fn cache_stats(&self) -> CacheStats;
}
