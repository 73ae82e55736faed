//! Planner
//!
//! Turns a query into a [`TaskTree`] with bounded depth and fan-out.
//!
//! Decomposition is keyword driven and fully deterministic:
//!
//! - A query naming exactly one part or standard with at most one intent is
//!   **atomic** and becomes a single leaf.
//! - Anything else is **composite**. The root splits into research threads
//!   (the list depends on the [`Strategy`] picked from the query keywords),
//!   and a thread that needs several source categories becomes a composite
//!   node with one leaf per category.
//! - A composite node at `max_depth` is downgraded to its best-matching leaf
//!   category, so planning always terminates.
//!
//! Task ids are assigned in pre-order, so identical input yields an
//! identical tree.

/// Query analysis (topic, identifiers, intents, strategy).
pub mod analysis;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::types::{
    AppError, RegionFilter, ResearchThread, Result, Strategy, Task, TaskCategory, TaskId,
    TaskStatus, TaskTree,
};

pub use analysis::{analyze, QueryAnalysis};

/// Depth and fan-out defaults and hard caps (`[planner]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerConfig {
    #[serde(default = "default_max_depth")]
    pub default_max_depth: usize,
    #[serde(default = "default_max_fanout")]
    pub default_max_fanout: usize,
    /// Requests asking for more are clamped.
    #[serde(default = "default_max_depth_limit")]
    pub max_depth_limit: usize,
    #[serde(default = "default_max_fanout_limit")]
    pub max_fanout_limit: usize,
}

fn default_max_depth() -> usize {
    2
}

fn default_max_fanout() -> usize {
    4
}

fn default_max_depth_limit() -> usize {
    4
}

fn default_max_fanout_limit() -> usize {
    8
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            default_max_depth: default_max_depth(),
            default_max_fanout: default_max_fanout(),
            max_depth_limit: default_max_depth_limit(),
            max_fanout_limit: default_max_fanout_limit(),
        }
    }
}

impl PlannerConfig {
    /// Fill in defaults and clamp to the configured caps.
    pub fn resolve(&self, max_depth: Option<usize>, max_fanout: Option<usize>) -> (usize, usize) {
        let depth = max_depth.unwrap_or(self.default_max_depth);
        let fanout = max_fanout.unwrap_or(self.default_max_fanout);

        if depth > self.max_depth_limit {
            warn!(requested = depth, limit = self.max_depth_limit, "maxDepth clamped");
        }
        if fanout > self.max_fanout_limit {
            warn!(requested = fanout, limit = self.max_fanout_limit, "maxFanout clamped");
        }

        (
            depth.min(self.max_depth_limit),
            fanout.min(self.max_fanout_limit),
        )
    }
}

/// Threads of a strategy in priority order.
pub fn threads_for(strategy: Strategy) -> &'static [ResearchThread] {
    match strategy {
        Strategy::General => &[
            ResearchThread::TechnologyTrend,
            ResearchThread::Standards,
            ResearchThread::ComponentSearch,
            ResearchThread::SupplyChain,
        ],
        Strategy::Maturity => &[
            ResearchThread::AcademicResearch,
            ResearchThread::PatentLandscape,
            ResearchThread::CommercialProducts,
            ResearchThread::SupplyChain,
        ],
    }
}

/// Source categories a thread draws on, best match first.
pub fn thread_categories(thread: ResearchThread) -> &'static [TaskCategory] {
    match thread {
        ResearchThread::TechnologyTrend => &[TaskCategory::Literature, TaskCategory::Patent],
        ResearchThread::Standards => &[TaskCategory::Literature],
        ResearchThread::ComponentSearch => &[TaskCategory::Component, TaskCategory::Datasheet],
        ResearchThread::SupplyChain => &[TaskCategory::SupplyChain],
        ResearchThread::AcademicResearch => &[TaskCategory::Literature],
        ResearchThread::PatentLandscape => &[TaskCategory::Patent],
        ResearchThread::CommercialProducts => &[TaskCategory::Datasheet, TaskCategory::Component],
    }
}

fn thread_suffix(thread: ResearchThread) -> &'static str {
    match thread {
        ResearchThread::TechnologyTrend => "trends",
        ResearchThread::Standards => "standards",
        ResearchThread::ComponentSearch => "components",
        ResearchThread::SupplyChain => "availability",
        ResearchThread::AcademicResearch => "research",
        ResearchThread::PatentLandscape => "patents",
        ResearchThread::CommercialProducts => "products",
    }
}

fn thread_fragment(analysis: &QueryAnalysis, thread: ResearchThread) -> String {
    let mut parts: Vec<&str> = vec![analysis.topic.as_str()];
    parts.extend(analysis.applications.iter().map(String::as_str));
    if thread == ResearchThread::Standards {
        parts.extend(analysis.standards.iter().map(String::as_str));
    }
    parts.push(thread_suffix(thread));
    parts.join(" ")
}

/// Stateless query decomposer.
#[derive(Debug, Clone, Default)]
pub struct Planner;

impl Planner {
    pub fn new() -> Self {
        Self
    }

    /// Decompose a query, taking the region filter from the query text.
    pub fn decompose(&self, query: &str, max_depth: usize, max_fanout: usize) -> Result<TaskTree> {
        self.decompose_with_regions(query, max_depth, max_fanout, None)
    }

    /// Decompose a query. An explicit, non-empty region filter wins over
    /// region words in the query.
    pub fn decompose_with_regions(
        &self,
        query: &str,
        max_depth: usize,
        max_fanout: usize,
        regions: Option<RegionFilter>,
    ) -> Result<TaskTree> {
        let analysis = analyze(query);
        if analysis.normalized.is_empty() {
            return Err(AppError::InvalidQuery("query is empty".to_string()));
        }
        if !analysis.normalized.chars().any(char::is_alphanumeric) {
            return Err(AppError::InvalidQuery(format!(
                "query '{}' has no searchable terms",
                analysis.normalized
            )));
        }
        if max_fanout == 0 {
            return Err(AppError::InvalidInput(
                "maxFanout must be at least 1".to_string(),
            ));
        }

        let region_filter = regions.filter(|f| !f.is_empty()).or_else(|| {
            (!analysis.regions.is_empty())
                .then(|| RegionFilter::new(analysis.regions.iter().copied()))
        });

        let mut builder = TreeBuilder {
            tasks: Vec::new(),
            region_filter: region_filter.clone(),
        };

        if analysis.is_atomic() || max_depth == 0 {
            builder.push(None, &analysis.normalized, analysis.best_category(), 0, None);
        } else {
            let root = builder.push(None, &analysis.normalized, TaskCategory::Composite, 0, None);
            for thread in threads_for(analysis.strategy).iter().take(max_fanout) {
                let fragment = thread_fragment(&analysis, *thread);
                builder.expand(
                    root,
                    *thread,
                    &fragment,
                    thread_categories(*thread),
                    1,
                    max_depth,
                    max_fanout,
                );
            }
        }

        let tree = TaskTree {
            query: analysis.normalized,
            topic: analysis.topic,
            strategy: analysis.strategy,
            max_depth,
            max_fanout,
            region_filter,
            applications: analysis.applications,
            tasks: builder.tasks,
        };

        info!(
            tasks = tree.len(),
            leaves = tree.leaves().count(),
            depth = tree.depth(),
            strategy = ?tree.strategy,
            "Task tree planned"
        );
        Ok(tree)
    }
}

struct TreeBuilder {
    tasks: Vec<Task>,
    region_filter: Option<RegionFilter>,
}

impl TreeBuilder {
    fn push(
        &mut self,
        parent: Option<TaskId>,
        fragment: &str,
        category: TaskCategory,
        depth: usize,
        thread: Option<ResearchThread>,
    ) -> TaskId {
        let id = TaskId(self.tasks.len() as u32);
        self.tasks.push(Task {
            id,
            parent_id: parent,
            query_fragment: fragment.to_string(),
            category,
            depth,
            status: TaskStatus::Pending,
            result_set_ref: None,
            thread,
            region_filter: self.region_filter.clone(),
            children: Vec::new(),
            failure: None,
        });
        if let Some(parent) = parent {
            self.tasks[parent.index()].children.push(id);
        }
        id
    }

    /// Add a node drawing on `categories` under `parent`; recurses one level
    /// per category until each node is atomic or the depth budget is spent.
    #[allow(clippy::too_many_arguments)]
    fn expand(
        &mut self,
        parent: TaskId,
        thread: ResearchThread,
        fragment: &str,
        categories: &[TaskCategory],
        depth: usize,
        max_depth: usize,
        max_fanout: usize,
    ) {
        let categories = &categories[..categories.len().min(max_fanout)];
        match categories {
            [] => {}
            [only] => {
                self.push(Some(parent), fragment, *only, depth, Some(thread));
            }
            [best, ..] if depth >= max_depth => {
                self.push(Some(parent), fragment, *best, depth, Some(thread));
            }
            _ => {
                let node = self.push(
                    Some(parent),
                    fragment,
                    TaskCategory::Composite,
                    depth,
                    Some(thread),
                );
                for category in categories {
                    self.expand(
                        node,
                        thread,
                        fragment,
                        std::slice::from_ref(category),
                        depth + 1,
                        max_depth,
                        max_fanout,
                    );
                }
            }
        }
    }
}
