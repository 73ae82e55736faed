//! Source Executors
//!
//! One [`SourceExecutor`] per leaf category, selected through the
//! [`ExecutorRegistry`] dispatch table. Running a task:
//!
//! 1. fingerprint the task and consult the store's result cache
//! 2. on a miss, fetch raw candidates from the category's collaborator
//! 3. normalize them into [`ResultRecord`]s with a natural key, a
//!    provisional relevance score, a region tag and a provisional TRL
//! 4. drop records outside the task's region allow-list
//! 5. upsert entities and embeddings, then cache the result set
//!
//! An unreachable store degrades to "no cache"; it never fails the task.

/// Task fingerprints.
pub mod fingerprint;
/// Natural key derivation.
pub mod keys;
/// Manufacturer region table.
pub mod region;
/// Lexical relevance.
pub mod scoring;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::classifier::ReadinessClassifier;
use crate::sources::{RawCandidate, SourceCollaborator};
use crate::store::KnowledgeStore;
use crate::types::{
    AppError, Entity, Region, RegionFilter, Result, ResultRecord, ResultSet, Task, TaskCategory,
};

pub use fingerprint::{fingerprint, normalize_fragment};
pub use keys::natural_key;

/// What one executor run produced.
#[derive(Debug, Clone)]
pub struct ExecutorOutput {
    pub results: ResultSet,
    pub fingerprint: String,
    /// Served from the cache without contacting the collaborator.
    pub cache_hit: bool,
}

/// Resolves leaf tasks of one category.
pub struct SourceExecutor {
    category: TaskCategory,
    source: Arc<dyn SourceCollaborator>,
    store: Arc<dyn KnowledgeStore>,
    classifier: ReadinessClassifier,
    cache_ttl: Duration,
}

impl SourceExecutor {
    pub fn new(
        category: TaskCategory,
        source: Arc<dyn SourceCollaborator>,
        store: Arc<dyn KnowledgeStore>,
        classifier: ReadinessClassifier,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            category,
            source,
            store,
            classifier,
            cache_ttl,
        }
    }

    pub fn category(&self) -> TaskCategory {
        self.category
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Run a leaf task. Same task and same cache state give the same result.
    pub async fn run(&self, task: &Task) -> Result<ExecutorOutput> {
        if task.category != self.category {
            return Err(AppError::MalformedTask(format!(
                "task {} is {} but was sent to the {} executor",
                task.id, task.category, self.category
            )));
        }

        let fragment = normalize_fragment(&task.query_fragment);
        if fragment.is_empty() {
            return Err(AppError::MalformedTask(format!(
                "task {} has an empty query fragment",
                task.id
            )));
        }

        let filter = task.region_filter.as_ref().filter(|f| !f.is_empty());
        let fp = fingerprint(self.category, &fragment, filter);

        let mut cache_writable = true;
        match self.store.get_cache(&fp).await {
            Ok(Some(cached)) => {
                debug!(task_id = %task.id, category = %self.category, fingerprint = %fp, "Cache hit");
                let records = cached
                    .records
                    .iter()
                    .map(|r| r.with_provenance(task.id, task.thread))
                    .collect();
                return Ok(ExecutorOutput {
                    results: ResultSet::from_records(records),
                    fingerprint: fp,
                    cache_hit: true,
                });
            }
            Ok(None) => {
                debug!(task_id = %task.id, category = %self.category, fingerprint = %fp, "Cache miss");
            }
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "Knowledge store unavailable, executing without cache");
                cache_writable = false;
            }
        }

        let candidates = self.source.fetch(&fragment, filter).await?;
        let fetched = candidates.len();

        // One record per natural key; the best-matching candidate wins.
        let mut records: BTreeMap<String, (ResultRecord, Option<Vec<f32>>)> = BTreeMap::new();
        for candidate in candidates {
            let Some((record, embedding)) = self.normalize(task, &fragment, candidate, filter)
            else {
                continue;
            };
            let replace = records
                .get(&record.entity_id)
                .is_none_or(|(existing, _)| record.relevance_score > existing.relevance_score);
            if replace {
                records.insert(record.entity_id.clone(), (record, embedding));
            }
        }

        debug!(
            task_id = %task.id,
            category = %self.category,
            fetched,
            kept = records.len(),
            "Candidates normalized"
        );

        let mut results = Vec::with_capacity(records.len());
        for (key, (record, embedding)) in records {
            if cache_writable {
                if let Err(e) = self.store.upsert_entity(&Entity::from_record(&record)).await {
                    warn!(entity = %key, error = %e, "Failed to upsert entity");
                }
                if let Some(vector) = embedding {
                    if let Err(e) = self.store.put_embedding(&key, &vector).await {
                        warn!(entity = %key, error = %e, "Failed to store embedding");
                    }
                }
            }
            results.push(record);
        }

        let results = ResultSet::from_records(results);
        if cache_writable {
            if let Err(e) = self.store.put_cache(&fp, &results, self.cache_ttl).await {
                warn!(fingerprint = %fp, error = %e, "Failed to cache result set");
            }
        }

        Ok(ExecutorOutput {
            results,
            fingerprint: fp,
            cache_hit: false,
        })
    }

    fn normalize(
        &self,
        task: &Task,
        fragment: &str,
        candidate: RawCandidate,
        filter: Option<&RegionFilter>,
    ) -> Option<(ResultRecord, Option<Vec<f32>>)> {
        let key = natural_key(self.category, &candidate)?;

        let region = region::resolve_region(
            self.category,
            candidate.region,
            candidate.manufacturer.as_deref(),
        );
        let region = match (region, filter) {
            (Some(region), Some(filter)) if filter.allows(region) => region,
            (_, Some(_)) => return None,
            (Some(region), None) => region,
            (None, None) => Region::Global,
        };

        let relevance = scoring::relevance(
            fragment,
            &candidate.search_text(),
            candidate.natural_key.as_deref(),
        );

        let mut payload = candidate.fields;
        if let Some(summary) = candidate.summary {
            payload.insert("summary".to_string(), Value::String(summary));
        }
        if let Some(manufacturer) = candidate.manufacturer {
            payload.insert("manufacturer".to_string(), Value::String(manufacturer));
        }

        let record = ResultRecord {
            record_id: ResultRecord::make_record_id(task.id, &key),
            entity_id: key,
            entity_type: self.category.entity_type(),
            source_category: self.category,
            title: candidate.title,
            payload,
            relevance_score: relevance,
            trl: None,
            provenance_task_id: task.id,
            thread: task.thread,
            region,
            source: self.source.name().to_string(),
            published: candidate.published,
        };

        Some((self.classifier.annotate(&record), candidate.embedding))
    }
}

/// Dispatch table from leaf category to executor.
#[derive(Default, Clone)]
pub struct ExecutorRegistry {
    executors: HashMap<TaskCategory, Arc<SourceExecutor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One executor per configured collaborator, sharing a store.
    pub fn from_sources(
        sources: impl IntoIterator<Item = (TaskCategory, Arc<dyn SourceCollaborator>)>,
        store: Arc<dyn KnowledgeStore>,
        classifier: ReadinessClassifier,
        cache_ttl: Duration,
    ) -> Self {
        let mut registry = Self::new();
        for (category, source) in sources {
            registry.register(SourceExecutor::new(
                category,
                source,
                store.clone(),
                classifier.clone(),
                cache_ttl,
            ));
        }
        registry
    }

    /// Register (or replace) the executor for its category.
    pub fn register(&mut self, executor: SourceExecutor) {
        self.executors
            .insert(executor.category(), Arc::new(executor));
    }

    pub fn get(&self, category: TaskCategory) -> Option<Arc<SourceExecutor>> {
        self.executors.get(&category).cloned()
    }

    pub fn has(&self, category: TaskCategory) -> bool {
        self.executors.contains_key(&category)
    }

    /// Registered categories in declaration order.
    pub fn categories(&self) -> Vec<TaskCategory> {
        let mut categories: Vec<_> = self.executors.keys().copied().collect();
        categories.sort();
        categories
    }

    /// Route a leaf to its executor.
    pub async fn dispatch(&self, task: &Task) -> Result<ExecutorOutput> {
        match self.executors.get(&task.category) {
            Some(executor) => executor.run(task).await,
            None => Err(AppError::MalformedTask(format!(
                "no executor registered for category {}",
                task.category
            ))),
        }
    }
}
