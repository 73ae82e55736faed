//! TOML-based configuration for ee-scout
//!
//! Everything the engine can be tuned with lives in one file
//! (`scout.toml`): server settings, planner bounds, orchestrator budgets,
//! cache, classifier threshold, store options and the source collaborator
//! bound to each leaf category. Every field has a default, so an empty
//! file is a valid configuration.
//!
//! # Hot Reloading
//!
//! Changes to the file are picked up at runtime. Use [`ScoutConfigManager`]
//! for lock-free access to the current configuration; request defaults are
//! read from it on every request.

use arc_swap::ArcSwap;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use scout_vector::DistanceMetric;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::classifier::ClassifierConfig;
use crate::orchestrator::OrchestratorConfig;
use crate::planner::PlannerConfig;
use crate::store::CacheConfig;
use crate::types::TaskCategory;

/// Root configuration structure loaded from scout.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoutConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub planner: PlannerConfig,

    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub classifier: ClassifierConfig,

    #[serde(default)]
    pub store: StoreConfig,

    /// Source collaborator per leaf category, keyed by category name
    #[serde(default)]
    pub sources: BTreeMap<String, SourceConfig>,
}

// ============= Server Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

// ============= Store Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// JSON snapshot loaded at startup and written on shutdown
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,

    /// Similarity metric for the embedding index
    #[serde(default = "default_embedding_metric")]
    pub embedding_metric: String,
}

fn default_embedding_metric() -> String {
    "cosine".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            snapshot_path: None,
            embedding_metric: default_embedding_metric(),
        }
    }
}

impl StoreConfig {
    pub fn metric(&self) -> Result<DistanceMetric, ConfigError> {
        self.embedding_metric
            .parse()
            .map_err(|e: scout_vector::Error| ConfigError::ValidationError(e.to_string()))
    }
}

// ============= Source Configuration =============

/// Collaborator bound to one leaf category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceConfig {
    /// JSON candidate list on disk
    Catalog { path: PathBuf },
    /// Remote JSON endpoint
    Http {
        endpoint: String,
        #[serde(default = "default_source_timeout")]
        timeout_secs: u64,
    },
}

fn default_source_timeout() -> u64 {
    10
}

// ============= Configuration Loading & Validation =============

/// Configuration warnings that don't prevent operation but may indicate issues
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub kind: ConfigWarningKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigWarningKind {
    /// A leaf category has no collaborator; its tasks will fail
    MissingSource,
    /// Caching is off, so repeated queries always hit the sources
    CacheDisabled,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Watch error: {0}")]
    WatchError(#[from] notify::Error),
}

impl From<ConfigError> for crate::types::AppError {
    fn from(err: ConfigError) -> Self {
        crate::types::AppError::Configuration(err.to_string())
    }
}

impl ScoutConfig {
    /// Load configuration from a TOML file.
    ///
    /// Relative catalog and snapshot paths are resolved against the
    /// directory holding the file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let mut config = Self::parse(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }

        config.validate()?;

        Ok(config)
    }

    /// Parse without touching the filesystem or validating.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    fn resolve_paths(&mut self, base: &Path) {
        for source in self.sources.values_mut() {
            if let SourceConfig::Catalog { path } = source {
                if path.is_relative() {
                    *path = base.join(&*path);
                }
            }
        }
        if let Some(snapshot) = self.store.snapshot_path.as_mut() {
            if snapshot.is_relative() {
                *snapshot = base.join(&*snapshot);
            }
        }
    }

    /// Validate the configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        let planner = &self.planner;
        if planner.default_max_fanout == 0 || planner.max_fanout_limit == 0 {
            return Err(ConfigError::ValidationError(
                "planner fan-out must be at least 1".to_string(),
            ));
        }
        if planner.default_max_depth > planner.max_depth_limit {
            return Err(ConfigError::ValidationError(format!(
                "planner.default_max_depth ({}) exceeds max_depth_limit ({})",
                planner.default_max_depth, planner.max_depth_limit
            )));
        }
        if planner.default_max_fanout > planner.max_fanout_limit {
            return Err(ConfigError::ValidationError(format!(
                "planner.default_max_fanout ({}) exceeds max_fanout_limit ({})",
                planner.default_max_fanout, planner.max_fanout_limit
            )));
        }

        let orch = &self.orchestrator;
        if orch.max_concurrent_tasks == 0 {
            return Err(ConfigError::ValidationError(
                "orchestrator.max_concurrent_tasks must be at least 1".to_string(),
            ));
        }
        if orch.task_timeout_secs == 0 || orch.tree_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "orchestrator timeouts must be positive".to_string(),
            ));
        }
        if orch.backoff_multiplier < 1.0 {
            return Err(ConfigError::ValidationError(format!(
                "orchestrator.backoff_multiplier ({}) must be >= 1.0",
                orch.backoff_multiplier
            )));
        }

        self.store.metric()?;

        for (key, source) in &self.sources {
            let category: TaskCategory = key.parse().map_err(|_| {
                ConfigError::ValidationError(format!("unknown source category '{}'", key))
            })?;
            if !category.is_leaf() {
                return Err(ConfigError::ValidationError(format!(
                    "sources.{} is not a leaf category",
                    key
                )));
            }
            match source {
                SourceConfig::Catalog { path } if !path.exists() => {
                    return Err(ConfigError::ValidationError(format!(
                        "catalog for sources.{} not found: {}",
                        key,
                        path.display()
                    )));
                }
                SourceConfig::Http {
                    endpoint,
                    timeout_secs,
                } => {
                    if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                        return Err(ConfigError::ValidationError(format!(
                            "sources.{}.endpoint must be an http(s) URL",
                            key
                        )));
                    }
                    if *timeout_secs == 0 {
                        return Err(ConfigError::ValidationError(format!(
                            "sources.{}.timeout_secs must be positive",
                            key
                        )));
                    }
                }
                SourceConfig::Catalog { .. } => {}
            }
        }

        Ok(())
    }

    /// Validate configuration and report non-fatal issues
    pub fn validate_with_warnings(&self) -> Result<Vec<ConfigWarning>, ConfigError> {
        self.validate()?;

        let configured: Vec<TaskCategory> = self
            .source_entries()
            .into_iter()
            .map(|(category, _)| category)
            .collect();

        let mut warnings: Vec<ConfigWarning> = TaskCategory::LEAVES
            .iter()
            .filter(|c| !configured.contains(c))
            .map(|c| ConfigWarning {
                kind: ConfigWarningKind::MissingSource,
                message: format!("No source configured for '{}'; its tasks will fail", c),
            })
            .collect();

        if !self.cache.enabled {
            warnings.push(ConfigWarning {
                kind: ConfigWarningKind::CacheDisabled,
                message: "Result cache is disabled".to_string(),
            });
        }

        Ok(warnings)
    }

    /// Source tables with their parsed category; unknown keys are skipped.
    pub fn source_entries(&self) -> Vec<(TaskCategory, &SourceConfig)> {
        self.sources
            .iter()
            .filter_map(|(key, source)| key.parse().ok().map(|c| (c, source)))
            .collect()
    }
}

// ============= Hot Reloading Configuration Manager =============

/// Thread-safe configuration manager with hot reloading support
pub struct ScoutConfigManager {
    config: Arc<ArcSwap<ScoutConfig>>,
    config_path: PathBuf,
    watcher: RwLock<Option<RecommendedWatcher>>,
}

impl ScoutConfigManager {
    /// Create a new configuration manager and load the initial config
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        // Absolute path for reliable file watching
        let path = path.as_ref();
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(ConfigError::ReadError)?
                .join(path)
        };

        let config = ScoutConfig::load(&path)?;

        Ok(Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path: path,
            watcher: RwLock::new(None),
        })
    }

    /// Create a config manager directly from a config (useful for testing).
    /// This won't have file watching capabilities.
    pub fn from_config(config: ScoutConfig) -> Self {
        Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path: PathBuf::from("scout.toml"),
            watcher: RwLock::new(None),
        }
    }

    /// Get the current configuration (lockless read)
    pub fn config(&self) -> Arc<ScoutConfig> {
        self.config.load_full()
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Manually reload the configuration from disk
    pub fn reload(&self) -> Result<(), ConfigError> {
        info!(path = %self.config_path.display(), "Reloading configuration");

        let new_config = ScoutConfig::load(&self.config_path)?;
        self.config.store(Arc::new(new_config));

        info!("Configuration reloaded successfully");
        Ok(())
    }

    /// Start watching for configuration file changes
    pub fn start_watching(&mut self) -> Result<(), ConfigError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();

        let config_path = self.config_path.clone();
        let config_arc = Arc::clone(&self.config);

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        // Debounced in the receiver
                        let _ = tx.send(());
                    }
                }
                Err(e) => {
                    error!(error = %e, "Config watcher error");
                }
            }
        })?;

        if let Some(parent) = self.config_path.parent() {
            watcher.watch(parent, RecursiveMode::NonRecursive)?;
        }

        *self.watcher.write() = Some(watcher);

        tokio::spawn(async move {
            let mut last_reload: Option<std::time::Instant> = None;
            let debounce = Duration::from_millis(500);

            while rx.recv().await.is_some() {
                if last_reload.is_some_and(|at| at.elapsed() < debounce) {
                    continue;
                }

                // Let the writer finish
                tokio::time::sleep(Duration::from_millis(100)).await;

                match ScoutConfig::load(&config_path) {
                    Ok(new_config) => {
                        config_arc.store(Arc::new(new_config));
                        info!("Configuration hot-reloaded successfully");
                        last_reload = Some(std::time::Instant::now());
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to hot-reload config, keeping previous config");
                    }
                }
            }
        });

        info!("Configuration hot-reload watcher started");
        Ok(())
    }

    /// Stop watching for configuration changes
    pub fn stop_watching(&self) {
        *self.watcher.write() = None;
        info!("Configuration hot-reload watcher stopped");
    }
}

impl Clone for ScoutConfigManager {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            config_path: self.config_path.clone(),
            watcher: RwLock::new(None), // Watcher is not cloned
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_empty_file_is_all_defaults() {
        let config = ScoutConfig::parse("").unwrap();
        config.validate().unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.planner.default_max_depth, 2);
        assert_eq!(config.planner.default_max_fanout, 4);
        assert_eq!(config.orchestrator.max_concurrent_tasks, 8);
        assert_eq!(config.orchestrator.tree_timeout_secs, 120);
        assert_eq!(config.cache.ttl_secs, 3600);
        assert_eq!(config.classifier.min_evidence, 1);
        assert_eq!(config.store.metric().unwrap(), DistanceMetric::Cosine);
        assert!(config.sources.is_empty());
    }

    #[test]
    fn test_sources_are_tagged_tables() {
        let config = ScoutConfig::parse(
            r#"
[sources.supply-chain]
type = "http"
endpoint = "http://localhost:9000/stock"

[sources.literature]
type = "catalog"
path = "catalogs/literature.json"
"#,
        )
        .unwrap();

        assert_eq!(
            config.sources["supply-chain"],
            SourceConfig::Http {
                endpoint: "http://localhost:9000/stock".to_string(),
                timeout_secs: 10
            }
        );
        let categories: Vec<_> = config.source_entries().into_iter().map(|(c, _)| c).collect();
        assert_eq!(categories, vec![TaskCategory::Literature, TaskCategory::SupplyChain]);
    }

    #[rstest]
    #[case("[orchestrator]\nmax_concurrent_tasks = 0")]
    #[case("[orchestrator]\ntask_timeout_secs = 0")]
    #[case("[orchestrator]\nbackoff_multiplier = 0.5")]
    #[case("[planner]\ndefault_max_fanout = 0")]
    #[case("[planner]\ndefault_max_depth = 9")]
    #[case("[store]\nembedding_metric = \"manhattan\"")]
    #[case("[sources.widgets]\ntype = \"http\"\nendpoint = \"http://x\"")]
    #[case("[sources.composite]\ntype = \"http\"\nendpoint = \"http://x\"")]
    #[case("[sources.patent]\ntype = \"http\"\nendpoint = \"ftp://x\"")]
    #[case("[sources.patent]\ntype = \"catalog\"\npath = \"/definitely/not/here.json\"")]
    fn test_validation_rejects(#[case] toml: &str) {
        let config = ScoutConfig::parse(toml).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_load_resolves_catalog_paths_relative_to_file() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("catalogs")).unwrap();
        write(&dir, "catalogs/patents.json", "[]");
        let path = write(
            &dir,
            "scout.toml",
            "[sources.patent]\ntype = \"catalog\"\npath = \"catalogs/patents.json\"\n",
        );

        let config = ScoutConfig::load(&path).unwrap();
        match &config.sources["patent"] {
            SourceConfig::Catalog { path } => assert!(path.is_absolute() && path.exists()),
            other => panic!("unexpected source {other:?}"),
        }
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            ScoutConfig::load("/no/such/scout.toml"),
            Err(ConfigError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_warnings_for_missing_sources() {
        let config = ScoutConfig::parse("[cache]\nenabled = false").unwrap();
        let warnings = config.validate_with_warnings().unwrap();
        let missing = warnings
            .iter()
            .filter(|w| w.kind == ConfigWarningKind::MissingSource)
            .count();
        assert_eq!(missing, TaskCategory::LEAVES.len());
        assert!(warnings
            .iter()
            .any(|w| w.kind == ConfigWarningKind::CacheDisabled));
    }

    #[test]
    fn test_manager_reload_picks_up_changes() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "scout.toml", "[planner]\ndefault_max_depth = 1\n");
        let manager = ScoutConfigManager::new(&path).unwrap();
        assert_eq!(manager.config().planner.default_max_depth, 1);

        write(&dir, "scout.toml", "[planner]\ndefault_max_depth = 3\n");
        manager.reload().unwrap();
        assert_eq!(manager.config().planner.default_max_depth, 3);

        // A broken file keeps the previous config
        write(&dir, "scout.toml", "[planner\n");
        assert!(manager.reload().is_err());
        assert_eq!(manager.config().planner.default_max_depth, 3);
    }

    #[tokio::test]
    async fn test_watched_clone_shares_config() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "scout.toml", "[planner]\ndefault_max_fanout = 2\n");
        let mut manager = ScoutConfigManager::new(&path).unwrap();
        manager.start_watching().unwrap();
        let clone = manager.clone();

        write(&dir, "scout.toml", "[planner]\ndefault_max_fanout = 3\n");
        manager.reload().unwrap();
        assert_eq!(clone.config().planner.default_max_fanout, 3);

        manager.stop_watching();
    }
}
