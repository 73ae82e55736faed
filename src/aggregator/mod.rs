//! Aggregator
//!
//! Folds child result sets into one: records are deduplicated into
//! entities by natural key, every entity is (re)classified from its own
//! evidence, relationships implied by the tree's thread structure are
//! inferred, and the entities are ranked.
//!
//! The output depends only on the union of input records, never on the
//! order children finished in.
//!
//! Ranking key: relevance desc, TRL desc, publication date desc, then
//! natural key asc as a final tiebreak.

/// Relationship inference.
pub mod relations;

use std::cmp::Ordering;
use std::collections::BTreeMap;

use uuid::Uuid;

use crate::classifier::ReadinessClassifier;
use crate::types::{
    Entity, EntityType, FailureReport, FinalResult, ResultRecord, ResultSet, ResultStats,
    Strategy, TaskCategory, TaskTree, TrlBand,
};

pub use relations::{application_key, technology_key};

/// What the aggregator needs to know about the tree it folds.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeContext {
    pub query: String,
    pub strategy: Strategy,
    /// Topic anchor; only set for decomposed (composite) trees.
    pub topic: Option<String>,
    pub applications: Vec<String>,
}

impl MergeContext {
    pub fn from_tree(tree: &TaskTree) -> Self {
        let composite = tree
            .get(tree.root())
            .is_some_and(|root| !root.is_leaf());
        Self {
            query: tree.query.clone(),
            strategy: tree.strategy,
            topic: composite.then(|| tree.topic.clone()),
            applications: tree.applications.clone(),
        }
    }
}

/// Run bookkeeping the orchestrator hands to [`Aggregator::finalize`].
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub failures: Vec<FailureReport>,
    pub tasks_total: usize,
    pub tasks_done: usize,
    pub tasks_failed: usize,
    pub cache_hits: usize,
    pub duration_ms: u64,
    /// The root itself ended `failed`.
    pub root_failed: bool,
}

pub struct Aggregator {
    classifier: ReadinessClassifier,
    context: MergeContext,
}

impl Aggregator {
    pub fn new(classifier: ReadinessClassifier, context: MergeContext) -> Self {
        Self {
            classifier,
            context,
        }
    }

    pub fn for_tree(classifier: ReadinessClassifier, tree: &TaskTree) -> Self {
        Self::new(classifier, MergeContext::from_tree(tree))
    }

    pub fn context(&self) -> &MergeContext {
        &self.context
    }

    /// Merge sibling result sets.
    pub fn merge(&self, children: &[ResultSet]) -> ResultSet {
        let mut by_id: BTreeMap<&str, &ResultRecord> = BTreeMap::new();
        for set in children {
            for record in &set.records {
                by_id.entry(record.record_id.as_str()).or_insert(record);
            }
        }
        let records: Vec<ResultRecord> = by_id.into_values().cloned().collect();

        let mut evidence: BTreeMap<String, Vec<ResultRecord>> = BTreeMap::new();
        for record in &records {
            evidence
                .entry(record.entity_id.clone())
                .or_default()
                .push(record.clone());
        }

        let mut entities: BTreeMap<String, Entity> = BTreeMap::new();
        let mut classifications = Vec::with_capacity(evidence.len() + 1);
        for (key, own) in &evidence {
            let mut entity = Entity::from_record(&own[0]);
            for record in &own[1..] {
                entity.absorb(record);
            }
            let classification = self.classifier.classify(entity.entity_type, key, own);
            entity.trl = Some(classification.trl);
            classifications.push(classification);
            entities.insert(key.clone(), entity);
        }

        let technology = match (&self.context.topic, records.is_empty()) {
            (Some(topic), false) => {
                let key = technology_key(topic);
                if !entities.contains_key(&key) {
                    let mut anchor = Entity::anchor(key.clone(), EntityType::Technology, topic);
                    let classification =
                        self.classifier
                            .classify(EntityType::Technology, &key, &records);
                    anchor.trl = Some(classification.trl);
                    classifications.push(classification);
                    entities.insert(key.clone(), anchor);
                }
                Some(key)
            }
            _ => None,
        };

        let (relationships, anchors) = relations::infer(
            &records,
            &entities,
            technology.as_deref(),
            &self.context.applications,
        );
        for anchor in anchors {
            entities.entry(anchor.natural_key.clone()).or_insert(anchor);
        }

        ResultSet {
            records,
            entities: rank(entities.into_values().collect()),
            relationships,
            classifications,
        }
    }

    /// Group the root's ranked entities into report sections and attach
    /// run statistics.
    pub fn finalize(&self, root: ResultSet, summary: RunSummary) -> FinalResult {
        let primary = primary_categories(&root.records);

        let mut sections: BTreeMap<TaskCategory, Vec<String>> = BTreeMap::new();
        let mut per_trl_band: BTreeMap<TrlBand, usize> = BTreeMap::new();
        for entity in &root.entities {
            if let Some(category) = primary.get(entity.natural_key.as_str()) {
                sections
                    .entry(*category)
                    .or_default()
                    .push(entity.natural_key.clone());
            }
            if let Some(trl) = entity.trl {
                *per_trl_band.entry(TrlBand::of(trl)).or_default() += 1;
            }
        }

        let mut failures_per_category: BTreeMap<TaskCategory, usize> = BTreeMap::new();
        for failure in &summary.failures {
            *failures_per_category.entry(failure.category).or_default() += 1;
        }

        let stats = ResultStats {
            per_category: sections.iter().map(|(c, keys)| (*c, keys.len())).collect(),
            per_trl_band,
            failures_per_category,
            tasks_total: summary.tasks_total,
            tasks_done: summary.tasks_done,
            tasks_failed: summary.tasks_failed,
            cache_hits: summary.cache_hits,
            duration_ms: summary.duration_ms,
        };

        FinalResult {
            run_id: summary.run_id,
            query: self.context.query.clone(),
            strategy: self.context.strategy,
            degraded: summary.root_failed || !summary.failures.is_empty(),
            ranked: root.entities,
            sections,
            relationships: root.relationships,
            classifications: root.classifications,
            failures: summary.failures,
            stats,
        }
    }
}

/// Sort entities into report order.
pub fn rank(mut entities: Vec<Entity>) -> Vec<Entity> {
    entities.sort_by(compare_rank);
    entities
}

fn compare_rank(a: &Entity, b: &Entity) -> Ordering {
    b.relevance_score
        .total_cmp(&a.relevance_score)
        .then_with(|| b.trl.unwrap_or(0).cmp(&a.trl.unwrap_or(0)))
        // None sorts below any date
        .then_with(|| b.published.cmp(&a.published))
        .then_with(|| a.natural_key.cmp(&b.natural_key))
}

/// Section of each entity: the category of its most relevant record.
fn primary_categories(records: &[ResultRecord]) -> BTreeMap<&str, TaskCategory> {
    let mut best: BTreeMap<&str, (f64, TaskCategory)> = BTreeMap::new();
    for record in records {
        let candidate = (record.relevance_score, record.source_category);
        best.entry(record.entity_id.as_str())
            .and_modify(|current| {
                let better = candidate.0 > current.0
                    || (candidate.0 == current.0 && candidate.1 < current.1);
                if better {
                    *current = candidate;
                }
            })
            .or_insert(candidate);
    }
    best.into_iter().map(|(k, (_, c))| (k, c)).collect()
}
