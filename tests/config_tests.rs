//! Workspace and configuration tests: `init` scaffolding, catalog sources
//! wired through `scout.toml`, and hot reload of planner defaults.

use std::fs;
use std::sync::Arc;

use scout::cli::init::{self, InitConfig, InitResult};
use scout::cli::output::Output;
use scout::types::{AppError, ResearchRequest, TaskCategory};
use scout::{InMemoryKnowledgeStore, KnowledgeStore, ResearchEngine, ScoutConfigManager};
use tempfile::TempDir;

fn scaffold() -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let result = init::run(
        InitConfig {
            path: dir.path().to_path_buf(),
            force: false,
            no_examples: false,
            host: "127.0.0.1".to_string(),
            port: 3000,
        },
        &Output::no_color(),
    );
    assert!(matches!(result, InitResult::Success));
    dir
}

fn store() -> Arc<dyn KnowledgeStore> {
    Arc::new(InMemoryKnowledgeStore::default())
}

#[tokio::test]
async fn test_scaffolded_workspace_answers_queries() {
    let dir = scaffold();
    let manager = ScoutConfigManager::new(dir.path().join("scout.toml")).unwrap();
    let engine = ResearchEngine::from_config(Arc::new(manager), store()).unwrap();

    assert_eq!(engine.executors().categories(), TaskCategory::LEAVES.to_vec());

    let result = engine
        .research(ResearchRequest::new("GaN power ICs, 48V automotive, EU"))
        .await
        .unwrap();

    assert!(!result.degraded, "failures: {:?}", result.failures);
    let keys: Vec<&str> = result.ranked.iter().map(|e| e.natural_key.as_str()).collect();
    assert!(keys.contains(&"component:IGT60R070D1"));
    assert!(!keys.contains(&"component:LMG3422R030"));
}

#[tokio::test]
async fn test_reload_changes_planner_defaults() {
    let dir = scaffold();
    let path = dir.path().join("scout.toml");
    let manager = Arc::new(ScoutConfigManager::new(&path).unwrap());
    let engine = ResearchEngine::from_config(manager.clone(), store()).unwrap();

    let request = ResearchRequest::new("SiC MOSFET gate drivers");
    assert_eq!(engine.plan(&request).unwrap().max_fanout, 4);

    let content = fs::read_to_string(&path)
        .unwrap()
        .replace("default_max_fanout = 4", "default_max_fanout = 1");
    fs::write(&path, content).unwrap();
    manager.reload().unwrap();

    let tree = engine.plan(&request).unwrap();
    assert_eq!(tree.max_fanout, 1);
    assert_eq!(tree.widest_fanout(), 1);
}

#[test]
fn test_unknown_source_category_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scout.toml");
    fs::write(
        &path,
        "[sources.weather]\ntype = \"catalog\"\npath = \"weather.json\"\n",
    )
    .unwrap();

    assert!(ScoutConfigManager::new(&path).is_err());
}

#[test]
fn test_missing_catalog_fails_at_startup() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scout.toml");
    fs::write(
        &path,
        "[sources.patent]\ntype = \"catalog\"\npath = \"catalogs/missing.json\"\n",
    )
    .unwrap();

    let result = ScoutConfigManager::new(&path)
        .map_err(AppError::from)
        .and_then(|manager| ResearchEngine::from_config(Arc::new(manager), store()));
    assert!(result.is_err());
}

#[test]
fn test_missing_config_file() {
    let dir = TempDir::new().unwrap();
    assert!(ScoutConfigManager::new(dir.path().join("scout.toml")).is_err());
}
