//! Research engine
//!
//! The entry point shared by the CLI and the HTTP API: takes a
//! [`ResearchRequest`], plans a task tree, runs it through the
//! [`Orchestrator`] and returns the ranked [`FinalResult`].
//!
//! Request defaults (depth, fan-out, budgets) are read from the live
//! configuration on every call, so a hot reload takes effect without a
//! restart.
//!
//! # Usage
//!
//! ```ignore
//! use scout::research::ResearchEngine;
//! use scout::types::ResearchRequest;
//!
//! let engine = ResearchEngine::from_config(config_manager, store)?;
//! let result = engine
//!     .research(ResearchRequest::new("GaN power ICs, 48V automotive, EU"))
//!     .await?;
//!
//! for entity in &result.ranked {
//!     println!("{} TRL {:?}", entity.natural_key, entity.trl);
//! }
//! ```

use std::sync::Arc;

use tracing::info;

use crate::classifier::ReadinessClassifier;
use crate::executors::ExecutorRegistry;
use crate::orchestrator::Orchestrator;
use crate::planner::Planner;
use crate::sources::build_source;
use crate::store::KnowledgeStore;
use crate::types::{AppError, FinalResult, RegionFilter, ResearchRequest, Result, TaskTree};
use crate::utils::toml_config::ScoutConfigManager;

/// Plans and executes research requests against a shared knowledge store.
#[derive(Clone)]
pub struct ResearchEngine {
    config: Arc<ScoutConfigManager>,
    store: Arc<dyn KnowledgeStore>,
    executors: ExecutorRegistry,
    planner: Planner,
}

impl ResearchEngine {
    pub fn new(
        config: Arc<ScoutConfigManager>,
        store: Arc<dyn KnowledgeStore>,
        executors: ExecutorRegistry,
    ) -> Self {
        Self {
            config,
            store,
            executors,
            planner: Planner::new(),
        }
    }

    /// Build one executor per `[sources.*]` table of the current config.
    pub fn from_config(
        config: Arc<ScoutConfigManager>,
        store: Arc<dyn KnowledgeStore>,
    ) -> Result<Self> {
        let current = config.config();
        let mut sources = Vec::new();
        for (category, source) in current.source_entries() {
            sources.push((category, build_source(category, source)?));
        }
        info!(
            sources = sources.len(),
            categories = ?sources.iter().map(|(c, _)| c.as_str()).collect::<Vec<_>>(),
            "Source collaborators configured"
        );

        let executors = ExecutorRegistry::from_sources(
            sources,
            store.clone(),
            ReadinessClassifier::new(current.classifier.clone()),
            current.cache.ttl(),
        );
        Ok(Self::new(config, store, executors))
    }

    pub fn store(&self) -> &Arc<dyn KnowledgeStore> {
        &self.store
    }

    pub fn executors(&self) -> &ExecutorRegistry {
        &self.executors
    }

    /// Plan a request without executing it.
    pub fn plan(&self, request: &ResearchRequest) -> Result<TaskTree> {
        if request.time_budget_seconds == Some(0) {
            return Err(AppError::InvalidInput(
                "timeBudgetSeconds must be positive".to_string(),
            ));
        }

        let config = self.config.config();
        let (depth, fanout) = config
            .planner
            .resolve(request.max_depth, request.max_fanout);
        let regions = request
            .region_filter
            .as_ref()
            .map(|regions| RegionFilter::new(regions.iter().copied()));

        self.planner
            .decompose_with_regions(&request.query_text, depth, fanout, regions)
    }

    /// Plan and execute a request.
    pub async fn research(&self, request: ResearchRequest) -> Result<FinalResult> {
        let tree = self.plan(&request)?;
        let config = self.config.config();
        let budget = config.orchestrator.budget(request.time_budget_seconds);

        let orchestrator = Orchestrator::new(
            self.executors.clone(),
            self.store.clone(),
            ReadinessClassifier::new(config.classifier.clone()),
            &config.orchestrator,
        );
        orchestrator.execute(tree, budget).await
    }
}
