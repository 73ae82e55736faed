//! Orchestrator
//!
//! Executes a [`TaskTree`]: every leaf is dispatched to its executor
//! concurrently (bounded by a semaphore), and each composite node is
//! aggregated exactly once, after its last child reached a terminal state.
//!
//! A composite is `done` when at least one child is `done`; it is `failed`
//! only when every child failed. A failed leaf therefore never fails the
//! run on its own. The run ends with a `degraded` [`FinalResult`] listing
//! what went missing.
//!
//! # Budgets
//!
//! - per task: covers every attempt of one leaf, backoff included
//! - whole tree: when it expires, outstanding leaves are aborted and
//!   marked `failed` with a timeout, and their parents are aggregated
//!   from whatever finished in time
//!
//! Transient executor errors are retried per [`RetryPolicy`].

/// Retry with exponential backoff.
pub mod retry;

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::aggregator::{Aggregator, RunSummary};
use crate::classifier::ReadinessClassifier;
use crate::executors::{ExecutorOutput, ExecutorRegistry};
use crate::store::KnowledgeStore;
use crate::types::{
    AppError, FailureKind, FailureReport, FinalResult, Result, ResultSet, Task, TaskFailure,
    TaskId, TaskStatus, TaskTree,
};

pub use retry::RetryPolicy;

fn default_max_concurrent_tasks() -> usize {
    8
}

fn default_task_timeout_secs() -> u64 {
    30
}

fn default_tree_timeout_secs() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    2
}

fn default_initial_backoff_ms() -> u64 {
    100
}

fn default_max_backoff_ms() -> u64 {
    2000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

/// Scheduling knobs, the `[orchestrator]` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,

    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,

    #[serde(default = "default_tree_timeout_secs")]
    pub tree_timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: default_max_concurrent_tasks(),
            task_timeout_secs: default_task_timeout_secs(),
            tree_timeout_secs: default_tree_timeout_secs(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl OrchestratorConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            backoff_multiplier: self.backoff_multiplier,
        }
    }

    /// Budget for one run. A request budget can shorten the configured tree
    /// timeout but never extend it.
    pub fn budget(&self, requested_secs: Option<u64>) -> Budget {
        let whole_tree = requested_secs
            .map_or(self.tree_timeout_secs, |secs| secs.min(self.tree_timeout_secs));
        Budget::new(
            Duration::from_secs(self.task_timeout_secs),
            Duration::from_secs(whole_tree),
        )
    }
}

/// Time limits for one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    pub per_task: Duration,
    pub whole_tree: Duration,
}

impl Budget {
    /// A task never gets more time than the whole tree.
    pub fn new(per_task: Duration, whole_tree: Duration) -> Self {
        Self {
            per_task: per_task.min(whole_tree),
            whole_tree,
        }
    }
}

/// Stand-in for "no deadline" when the budget does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

fn deadline_after(budget: Duration) -> tokio::time::Instant {
    let now = tokio::time::Instant::now();
    now.checked_add(budget)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// Outcome of one leaf, as reported by its spawned task.
struct LeafOutcome {
    id: TaskId,
    result: Result<ExecutorOutput>,
    attempts: u32,
}

/// Mutable bookkeeping for a single run.
struct RunState {
    tree: TaskTree,
    results: Vec<Option<ResultSet>>,
    /// Composite id -> children not yet terminal.
    waiting: HashMap<TaskId, BTreeSet<TaskId>>,
    cache_hits: usize,
}

impl RunState {
    fn new(tree: TaskTree) -> Self {
        let waiting = tree
            .tasks
            .iter()
            .filter(|t| !t.is_leaf())
            .map(|t| (t.id, t.children.iter().copied().collect()))
            .collect();
        let results = vec![None; tree.len()];
        Self {
            tree,
            results,
            waiting,
            cache_hits: 0,
        }
    }

    fn task_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        self.tree.get_mut(id)
    }

    fn mark_running(&mut self, id: TaskId) {
        if let Some(task) = self.task_mut(id) {
            task.status = TaskStatus::Running;
        }
    }

    /// Record a leaf outcome and settle any ancestors it unblocks.
    fn finish_leaf(&mut self, outcome: LeafOutcome, aggregator: &Aggregator) {
        let LeafOutcome {
            id,
            result,
            attempts,
        } = outcome;

        let Some(task) = self.tree.get_mut(id) else {
            return;
        };
        if task.status.is_terminal() {
            return;
        }

        match result {
            Ok(output) => {
                debug!(
                    task_id = %id,
                    category = %task.category,
                    records = output.results.records.len(),
                    cache_hit = output.cache_hit,
                    attempts,
                    "Leaf done"
                );
                task.status = TaskStatus::Done;
                task.result_set_ref = Some(output.fingerprint);
                if output.cache_hit {
                    self.cache_hits += 1;
                }
                self.results[id.index()] = Some(output.results);
            }
            Err(e) => {
                warn!(
                    task_id = %id,
                    category = %task.category,
                    attempts,
                    error = %e,
                    "Leaf failed"
                );
                task.status = TaskStatus::Failed;
                task.failure = Some(TaskFailure {
                    kind: e.failure_kind(),
                    message: e.to_string(),
                    attempts,
                });
            }
        }

        let parent = task.parent_id;
        self.settle_parent(parent, id, aggregator);
    }

    /// Remove `child` from its parent's wait set; aggregate the parent when
    /// the set empties, then walk up.
    fn settle_parent(&mut self, mut parent: Option<TaskId>, mut child: TaskId, aggregator: &Aggregator) {
        while let Some(pid) = parent {
            let remaining = match self.waiting.get_mut(&pid) {
                Some(set) => {
                    set.remove(&child);
                    set.len()
                }
                None => return,
            };
            if remaining > 0 {
                return;
            }
            self.waiting.remove(&pid);
            self.aggregate(pid, aggregator);

            child = pid;
            parent = self.tree.get(pid).and_then(|t| t.parent_id);
        }
    }

    fn aggregate(&mut self, id: TaskId, aggregator: &Aggregator) {
        let Some(task) = self.tree.get(id) else {
            return;
        };
        let done: Vec<ResultSet> = task
            .children
            .iter()
            .filter(|c| {
                self.tree
                    .get(**c)
                    .is_some_and(|t| t.status == TaskStatus::Done)
            })
            .filter_map(|c| self.results[c.index()].clone())
            .collect();
        let total = task.children.len();

        let Some(task) = self.tree.get_mut(id) else {
            return;
        };
        if done.is_empty() {
            warn!(task_id = %id, children = total, "Composite failed, every child failed");
            task.status = TaskStatus::Failed;
            task.failure = Some(TaskFailure {
                kind: FailureKind::ChildrenFailed,
                message: format!("all {} children failed", total),
                attempts: 0,
            });
            return;
        }

        let merged = aggregator.merge(&done);
        debug!(
            task_id = %id,
            children_done = done.len(),
            children = total,
            entities = merged.entities.len(),
            "Composite aggregated"
        );
        task.status = TaskStatus::Done;
        task.result_set_ref = Some(format!("merged:{}", id));
        self.results[id.index()] = Some(merged);
    }

    /// Fail every leaf that has not finished yet.
    fn expire_outstanding(&mut self, budget: Duration, aggregator: &Aggregator) {
        let outstanding: Vec<TaskId> = self
            .tree
            .leaves()
            .filter(|t| !t.status.is_terminal())
            .map(|t| t.id)
            .collect();
        for id in outstanding {
            self.finish_leaf(
                LeafOutcome {
                    id,
                    result: Err(AppError::Timeout(format!(
                        "tree budget of {}s exhausted",
                        budget.as_secs_f64()
                    ))),
                    attempts: 0,
                },
                aggregator,
            );
        }
    }

    fn failures(&self) -> Vec<FailureReport> {
        self.tree
            .leaves()
            .filter_map(|t| {
                t.failure.as_ref().map(|failure| FailureReport {
                    task_id: t.id,
                    category: t.category,
                    query_fragment: t.query_fragment.clone(),
                    failure: failure.clone(),
                })
            })
            .collect()
    }

    fn count(&self, status: TaskStatus) -> usize {
        self.tree.tasks.iter().filter(|t| t.status == status).count()
    }
}

/// Runs task trees against the executor registry.
pub struct Orchestrator {
    executors: Arc<ExecutorRegistry>,
    store: Arc<dyn KnowledgeStore>,
    classifier: ReadinessClassifier,
    max_concurrent: usize,
    retry: RetryPolicy,
}

impl Orchestrator {
    pub fn new(
        executors: ExecutorRegistry,
        store: Arc<dyn KnowledgeStore>,
        classifier: ReadinessClassifier,
        config: &OrchestratorConfig,
    ) -> Self {
        Self {
            executors: Arc::new(executors),
            store,
            classifier,
            max_concurrent: config.max_concurrent_tasks.max(1),
            retry: config.retry_policy(),
        }
    }

    pub fn executors(&self) -> &ExecutorRegistry {
        &self.executors
    }

    /// Execute a tree to completion (or budget exhaustion).
    ///
    /// Only a structurally invalid tree is an error. Leaf failures and
    /// timeouts end up in the result's `failures` list instead.
    pub async fn execute(&self, tree: TaskTree, budget: Budget) -> Result<FinalResult> {
        validate(&tree)?;

        let started = Instant::now();
        let deadline = deadline_after(budget.whole_tree);
        let run_id = Uuid::new_v4();
        let aggregator = Aggregator::for_tree(self.classifier.clone(), &tree);

        info!(
            run_id = %run_id,
            tasks = tree.len(),
            leaves = tree.leaves().count(),
            depth = tree.depth(),
            per_task_secs = budget.per_task.as_secs_f64(),
            tree_secs = budget.whole_tree.as_secs_f64(),
            "Executing task tree"
        );

        let leaves: Vec<Task> = tree.leaves().cloned().collect();
        let mut state = RunState::new(tree);
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut set = JoinSet::new();
        let mut spawned: HashMap<tokio::task::Id, TaskId> = HashMap::new();

        for task in leaves {
            state.mark_running(task.id);
            let id = task.id;
            let handle = set.spawn(run_leaf(
                self.executors.clone(),
                semaphore.clone(),
                task,
                self.retry.clone(),
                budget.per_task,
            ));
            spawned.insert(handle.id(), id);
        }

        loop {
            match tokio::time::timeout_at(deadline, set.join_next_with_id()).await {
                Ok(Some(Ok((_, outcome)))) => state.finish_leaf(outcome, &aggregator),
                Ok(Some(Err(join_error))) => {
                    let Some(id) = spawned.get(&join_error.id()).copied() else {
                        continue;
                    };
                    error!(task_id = %id, error = %join_error, "Leaf task panicked");
                    state.finish_leaf(
                        LeafOutcome {
                            id,
                            result: Err(AppError::Internal(join_error.to_string())),
                            attempts: 1,
                        },
                        &aggregator,
                    );
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        run_id = %run_id,
                        outstanding = set.len(),
                        "Tree budget exhausted, aborting outstanding leaves"
                    );
                    set.abort_all();
                    state.expire_outstanding(budget.whole_tree, &aggregator);
                    break;
                }
            }
        }

        let root_id = state.tree.root();
        let root_task = state.tree.get(root_id).cloned();
        let root_failed = root_task
            .as_ref()
            .is_none_or(|t| t.status != TaskStatus::Done);

        let root_set = match (&root_task, state.results[root_id.index()].take()) {
            (Some(task), Some(set)) if task.is_leaf() => aggregator.merge(&[set]),
            (_, Some(set)) => set,
            (_, None) => ResultSet::default(),
        };
        let root_set = self.persist(root_set).await;

        let summary = RunSummary {
            run_id,
            failures: state.failures(),
            tasks_total: state.tree.len(),
            tasks_done: state.count(TaskStatus::Done),
            tasks_failed: state.count(TaskStatus::Failed),
            cache_hits: state.cache_hits,
            duration_ms: started.elapsed().as_millis() as u64,
            root_failed,
        };
        let result = aggregator.finalize(root_set, summary);

        if result.degraded {
            warn!(
                run_id = %run_id,
                failures = result.failures.len(),
                entities = result.ranked.len(),
                duration_ms = result.stats.duration_ms,
                "Research finished degraded"
            );
        } else {
            info!(
                run_id = %run_id,
                entities = result.ranked.len(),
                relationships = result.relationships.len(),
                cache_hits = result.stats.cache_hits,
                duration_ms = result.stats.duration_ms,
                "Research finished"
            );
        }
        Ok(result)
    }

    /// Write the root's entities, edges and classifications to the store.
    ///
    /// Store errors are logged and skipped; the returned set carries the
    /// versioned classifications for every write that succeeded.
    async fn persist(&self, mut set: ResultSet) -> ResultSet {
        let store = &self.store;

        let writes = join_all(set.entities.iter().map(|e| store.upsert_entity(e))).await;
        for (entity, outcome) in set.entities.iter().zip(writes) {
            if let Err(e) = outcome {
                warn!(entity = %entity.natural_key, error = %e, "Failed to persist entity");
            }
        }

        for rel in &set.relationships {
            if let Err(e) = store.upsert_relationship(&rel.from, &rel.to, rel.kind).await {
                warn!(from = %rel.from, to = %rel.to, kind = %rel.kind, error = %e, "Failed to persist relationship");
            }
        }

        let stored = join_all(set.classifications.iter().map(|c| store.put_classification(c))).await;
        for (classification, outcome) in set.classifications.iter_mut().zip(stored) {
            match outcome {
                Ok(versioned) => *classification = versioned,
                Err(e) => {
                    warn!(entity = %classification.entity_id, error = %e, "Failed to persist classification")
                }
            }
        }

        set
    }
}

async fn run_leaf(
    executors: Arc<ExecutorRegistry>,
    semaphore: Arc<Semaphore>,
    task: Task,
    policy: RetryPolicy,
    per_task: Duration,
) -> LeafOutcome {
    let id = task.id;
    let _permit = match semaphore.acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => {
            return LeafOutcome {
                id,
                result: Err(AppError::Internal("scheduler closed".to_string())),
                attempts: 0,
            }
        }
    };

    let attempts = AtomicU32::new(0);
    let executors = &executors;
    let task_ref = &task;
    let counter = &attempts;
    let run = retry::retry(&policy, move |attempt| async move {
        counter.fetch_add(1, Ordering::Relaxed);
        debug!(task_id = %task_ref.id, category = %task_ref.category, attempt, "Dispatching leaf");
        executors.dispatch(task_ref).await
    });

    match tokio::time::timeout(per_task, run).await {
        Ok((result, attempts)) => LeafOutcome {
            id,
            result,
            attempts,
        },
        Err(_) => LeafOutcome {
            id,
            result: Err(AppError::Timeout(format!(
                "task {} exceeded its {}s budget",
                id,
                per_task.as_secs_f64()
            ))),
            attempts: attempts.load(Ordering::Relaxed),
        },
    }
}

/// Structural checks on a tree handed to [`Orchestrator::execute`].
fn validate(tree: &TaskTree) -> Result<()> {
    if tree.is_empty() {
        return Err(AppError::MalformedTask("task tree is empty".to_string()));
    }
    for (index, task) in tree.tasks.iter().enumerate() {
        if task.id.index() != index {
            return Err(AppError::MalformedTask(format!(
                "task {} stored at position {}",
                task.id, index
            )));
        }
        if task.is_leaf() != task.children.is_empty() {
            return Err(AppError::MalformedTask(format!(
                "task {} has category {} but {} children",
                task.id,
                task.category,
                task.children.len()
            )));
        }
        for child in &task.children {
            let consistent = tree
                .get(*child)
                .is_some_and(|c| c.parent_id == Some(task.id) && c.depth == task.depth + 1);
            if !consistent {
                return Err(AppError::MalformedTask(format!(
                    "task {} lists inconsistent child {}",
                    task.id, child
                )));
            }
        }
    }
    if tree.tasks[0].parent_id.is_some() {
        return Err(AppError::MalformedTask("root task has a parent".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::Planner;
    use crate::sources::{RawCandidate, SourceCollaborator};
    use crate::store::InMemoryKnowledgeStore;
    use crate::types::{RegionFilter, TaskCategory};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    #[derive(Clone, Copy)]
    enum Behavior {
        Ok,
        Transient,
        Permanent,
        Hang,
        /// Fail with a transient error on the first call only.
        Flaky,
    }

    struct ScriptedSource {
        behavior: Behavior,
        candidates: Vec<RawCandidate>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(behavior: Behavior, candidates: Vec<RawCandidate>) -> Arc<Self> {
            Arc::new(Self {
                behavior,
                candidates,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl SourceCollaborator for ScriptedSource {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn fetch(&self, _: &str, _: Option<&RegionFilter>) -> Result<Vec<RawCandidate>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Ok => Ok(self.candidates.clone()),
                Behavior::Transient => Err(AppError::SourceUnavailable("503".into())),
                Behavior::Permanent => Err(AppError::MalformedTask("400".into())),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(vec![])
                }
                Behavior::Flaky if call == 0 => Err(AppError::SourceUnavailable("blip".into())),
                Behavior::Flaky => Ok(self.candidates.clone()),
            }
        }
    }

    fn config() -> OrchestratorConfig {
        OrchestratorConfig {
            max_retries: 2,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
            ..OrchestratorConfig::default()
        }
    }

    fn candidates(category: TaskCategory) -> Vec<RawCandidate> {
        match category {
            TaskCategory::Literature => vec![RawCandidate::new("GaN power ICs 48V automotive trends")
                .with_field("doi", serde_json::json!("10.1109/gan.2024.1"))],
            TaskCategory::Patent => vec![RawCandidate::new("GaN power ICs 48V automotive patents")
                .with_field("patent_number", serde_json::json!("US11355410B2"))],
            _ => vec![RawCandidate {
                manufacturer: Some("Infineon".into()),
                ..RawCandidate::new("GaN power ICs 48V automotive components").with_key("IGT60R070D1")
            }],
        }
    }

    fn orchestrator(
        behavior: impl Fn(TaskCategory) -> Behavior,
        store: Arc<InMemoryKnowledgeStore>,
    ) -> (Orchestrator, HashMap<TaskCategory, Arc<ScriptedSource>>) {
        let mut sources = HashMap::new();
        for category in TaskCategory::LEAVES {
            sources.insert(category, ScriptedSource::new(behavior(category), candidates(category)));
        }
        let registry = ExecutorRegistry::from_sources(
            sources
                .iter()
                .map(|(c, s)| (*c, s.clone() as Arc<dyn SourceCollaborator>)),
            store.clone(),
            ReadinessClassifier::default(),
            Duration::from_secs(60),
        );
        let orchestrator =
            Orchestrator::new(registry, store, ReadinessClassifier::default(), &config());
        (orchestrator, sources)
    }

    fn tree() -> TaskTree {
        Planner::new()
            .decompose("GaN power ICs, 48V automotive", 2, 4)
            .unwrap()
    }

    fn budget() -> Budget {
        Budget::new(Duration::from_secs(5), Duration::from_secs(10))
    }

    #[tokio::test]
    async fn test_all_leaves_succeed() {
        let store = Arc::new(InMemoryKnowledgeStore::default());
        let (orch, _) = orchestrator(|_| Behavior::Ok, store.clone());
        let result = orch.execute(tree(), budget()).await.unwrap();

        assert!(!result.degraded);
        assert!(result.failures.is_empty());
        assert_eq!(result.stats.tasks_total, result.stats.tasks_done);
        assert!(result.ranked.iter().any(|e| e.natural_key == "component:IGT60R070D1"));
        assert!(store.get_entity("component:IGT60R070D1").await.unwrap().is_some());
        assert!(result.classifications.iter().all(|c| c.version >= 1));
    }

    #[tokio::test]
    async fn test_failed_leaf_degrades_but_keeps_siblings() {
        let store = Arc::new(InMemoryKnowledgeStore::default());
        let (orch, sources) = orchestrator(
            |c| {
                if c == TaskCategory::Patent {
                    Behavior::Transient
                } else {
                    Behavior::Ok
                }
            },
            store,
        );
        let result = orch.execute(tree(), budget()).await.unwrap();

        assert!(result.degraded);
        assert_eq!(result.failures.len(), 1);
        let failure = &result.failures[0];
        assert_eq!(failure.category, TaskCategory::Patent);
        assert_eq!(failure.failure.kind, FailureKind::SourceUnavailable);
        assert_eq!(failure.failure.attempts, 3);
        assert_eq!(sources[&TaskCategory::Patent].calls.load(Ordering::SeqCst), 3);
        assert!(!result.ranked.is_empty());
        assert!(!result.ranked.iter().any(|e| e.natural_key.starts_with("patent:")));
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let store = Arc::new(InMemoryKnowledgeStore::default());
        let (orch, sources) = orchestrator(
            |c| {
                if c == TaskCategory::Datasheet {
                    Behavior::Permanent
                } else {
                    Behavior::Ok
                }
            },
            store,
        );
        let result = orch.execute(tree(), budget()).await.unwrap();
        assert_eq!(sources[&TaskCategory::Datasheet].calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.failures[0].failure.kind, FailureKind::MalformedTask);
    }

    #[tokio::test]
    async fn test_flaky_source_recovers() {
        let store = Arc::new(InMemoryKnowledgeStore::default());
        let (orch, _) = orchestrator(|_| Behavior::Flaky, store);
        let result = orch.execute(tree(), budget()).await.unwrap();
        assert!(!result.degraded);
    }

    #[tokio::test]
    async fn test_everything_failing_yields_empty_degraded_result() {
        let store = Arc::new(InMemoryKnowledgeStore::default());
        let (orch, _) = orchestrator(|_| Behavior::Permanent, store);
        let t = tree();
        let leaves = t.leaves().count();
        let result = orch.execute(t, budget()).await.unwrap();

        assert!(result.degraded);
        assert!(result.ranked.is_empty());
        assert_eq!(result.failures.len(), leaves);
        assert_eq!(result.stats.tasks_failed, result.stats.tasks_total);
    }

    #[tokio::test]
    async fn test_tree_budget_expires_hanging_leaves() {
        let store = Arc::new(InMemoryKnowledgeStore::default());
        let (orch, _) = orchestrator(
            |c| {
                if c == TaskCategory::SupplyChain {
                    Behavior::Hang
                } else {
                    Behavior::Ok
                }
            },
            store,
        );
        let started = Instant::now();
        let result = orch
            .execute(tree(), Budget::new(Duration::from_secs(60), Duration::from_millis(300)))
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(result.degraded);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].category, TaskCategory::SupplyChain);
        assert_eq!(result.failures[0].failure.kind, FailureKind::Timeout);
        assert!(!result.ranked.is_empty());
    }

    #[tokio::test]
    async fn test_per_task_budget_times_out_a_leaf() {
        let store = Arc::new(InMemoryKnowledgeStore::default());
        let (orch, _) = orchestrator(
            |c| {
                if c == TaskCategory::Literature {
                    Behavior::Hang
                } else {
                    Behavior::Ok
                }
            },
            store,
        );
        let result = orch
            .execute(tree(), Budget::new(Duration::from_millis(200), Duration::from_secs(10)))
            .await
            .unwrap();

        let timeouts: Vec<_> = result
            .failures
            .iter()
            .filter(|f| f.failure.kind == FailureKind::Timeout)
            .collect();
        assert!(!timeouts.is_empty());
        assert!(timeouts.iter().all(|f| f.category == TaskCategory::Literature));
        assert!(result.ranked.iter().any(|e| e.natural_key.starts_with("patent:")));
    }

    #[tokio::test]
    async fn test_single_leaf_tree() {
        let store = Arc::new(InMemoryKnowledgeStore::default());
        let (orch, _) = orchestrator(|_| Behavior::Ok, store);
        let tree = Planner::new().decompose("IGT60R070D1", 2, 4).unwrap();
        assert_eq!(tree.len(), 1);

        let result = orch.execute(tree, budget()).await.unwrap();
        assert!(!result.degraded);
        assert_eq!(result.ranked.len(), 1);
        assert_eq!(result.stats.tasks_done, 1);
    }

    #[tokio::test]
    async fn test_rejects_malformed_tree() {
        let store = Arc::new(InMemoryKnowledgeStore::default());
        let (orch, _) = orchestrator(|_| Behavior::Ok, store);
        let mut t = tree();
        t.tasks[1].children.clear();
        assert!(matches!(
            orch.execute(t, budget()).await,
            Err(AppError::MalformedTask(_))
        ));
    }

    #[test]
    fn test_budget_caps_task_at_tree() {
        let b = OrchestratorConfig::default().budget(Some(10));
        assert_eq!(b.whole_tree, Duration::from_secs(10));
        assert_eq!(b.per_task, Duration::from_secs(10));
        let b = OrchestratorConfig::default().budget(None);
        assert_eq!(b.per_task, Duration::from_secs(30));
        assert_eq!(b.whole_tree, Duration::from_secs(120));
    }

    #[test]
    fn test_request_budget_never_exceeds_tree_timeout() {
        let b = OrchestratorConfig::default().budget(Some(u64::MAX));
        assert_eq!(b.whole_tree, Duration::from_secs(120));
        assert_eq!(b.per_task, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_deadline_saturates_on_huge_budget() {
        let now = tokio::time::Instant::now();
        let deadline = deadline_after(Duration::MAX);
        assert!(deadline > now + Duration::from_secs(86_400));
        let bounded = deadline_after(Duration::from_secs(5));
        assert!(bounded <= tokio::time::Instant::now() + Duration::from_secs(5));
    }
}
