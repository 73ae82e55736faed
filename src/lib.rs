//! # ee-scout
//!
//! A recursive task-decomposition engine for electrical-engineering
//! research. A natural-language query is planned into a tree of subtasks,
//! leaves are dispatched in parallel to category-specific source
//! executors, and results are merged bottom-up into a deduplicated,
//! ranked set of entities annotated with Technology Readiness Levels.
//!
//! ## Overview
//!
//! ee-scout can be used in two ways:
//!
//! 1. **As a CLI / server** - Run the `ee-scout` binary
//! 2. **As a library** - Build a [`ResearchEngine`] in your own project
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,ignore
//! use scout::{InMemoryKnowledgeStore, ResearchEngine, ScoutConfigManager};
//! use scout::types::ResearchRequest;
//! use std::sync::Arc;
//!
//! let config = Arc::new(ScoutConfigManager::new("scout.toml")?);
//! let store = Arc::new(InMemoryKnowledgeStore::default());
//! let engine = ResearchEngine::from_config(config, store)?;
//!
//! let result = engine
//!     .research(ResearchRequest::new("GaN power ICs, 48V automotive, EU"))
//!     .await?;
//! println!("{} entities", result.ranked.len());
//! ```
//!
//! ## Pipeline
//!
//! - [`planner`] - query analysis and task-tree construction
//! - [`orchestrator`] - parallel leaf execution, budgets, retries, join barriers
//! - [`executors`] - per-category fetch, normalize, cache and persist
//! - [`classifier`] - evidence-based TRL classification
//! - [`aggregator`] - deduplication, relationship inference and ranking
//! - [`store`] - result cache, entity graph, similarity index, TRL history
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `http-sources` | JSON-over-HTTP source collaborators (default) |

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

/// Result merging, relationship inference and ranking.
pub mod aggregator;
/// HTTP API handlers and routes.
pub mod api;
/// Technology Readiness Level classification.
pub mod classifier;
/// Command-line interface.
pub mod cli;
/// Source executors and their dispatch table.
pub mod executors;
/// Task-tree execution.
pub mod orchestrator;
/// Query decomposition.
pub mod planner;
/// Engine facade shared by the CLI and the API.
pub mod research;
/// Bundled source collaborators.
pub mod sources;
/// Knowledge store: cache, graph, embeddings, classifications.
pub mod store;
/// Core types (tasks, records, entities, errors).
pub mod types;
/// Configuration utilities (TOML).
pub mod utils;

// Re-export commonly used types
pub use executors::ExecutorRegistry;
pub use orchestrator::{Budget, Orchestrator};
pub use planner::Planner;
pub use research::ResearchEngine;
pub use store::{InMemoryKnowledgeStore, KnowledgeStore};
pub use types::{AppError, Result};
pub use utils::toml_config::{ScoutConfig, ScoutConfigManager};

use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// TOML configuration with hot-reload support
    pub config_manager: Arc<ScoutConfigManager>,
    /// Planner + orchestrator facade
    pub engine: Arc<ResearchEngine>,
    /// The process-wide knowledge store
    pub store: Arc<dyn KnowledgeStore>,
}
