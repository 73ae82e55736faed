//! HTTP API tests using axum-test.

mod common;

use std::sync::Arc;

use axum::Router;
use axum_test::TestServer;
use serde_json::{Value, json};

use common::{GAN_QUERY, Sources, engine};
use scout::api::routes::create_router;
use scout::{AppState, KnowledgeStore, ScoutConfig, ScoutConfigManager};

fn create_test_server(sources: &Sources) -> TestServer {
    let (engine, store) = engine(sources, ScoutConfig::default());
    let store: Arc<dyn KnowledgeStore> = store;
    let state = AppState {
        config_manager: Arc::new(ScoutConfigManager::from_config(ScoutConfig::default())),
        engine: Arc::new(engine),
        store,
    };
    let app = Router::new().nest("/api", create_router()).with_state(state);
    TestServer::new(app).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let server = create_test_server(&Sources::gan());

    let response = server.get("/api/health").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["sources"].as_array().unwrap().len(), 5);
    assert_eq!(body["cache"]["hits"], 0);
}

#[tokio::test]
async fn test_plan_endpoint() {
    let server = create_test_server(&Sources::gan());

    let response = server
        .post("/api/plan")
        .json(&json!({ "queryText": GAN_QUERY, "maxFanout": 2 }))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    let tasks = body["tasks"].as_array().unwrap();
    assert!(tasks.len() > 1);
    assert_eq!(body["max_fanout"], 2);
    assert!(tasks.iter().all(|t| t["status"] == "pending"));
}

#[tokio::test]
async fn test_research_then_entity_lookup() {
    let sources = Sources::gan();
    let server = create_test_server(&sources);

    let response = server
        .post("/api/research")
        .json(&json!({ "queryText": GAN_QUERY, "regionFilter": ["EU"] }))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["degraded"], false);
    let ranked: Vec<&str> = body["ranked"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["natural_key"].as_str())
        .collect();
    assert!(ranked.contains(&"component:IGT60R070D1"));

    let response = server.get("/api/entities/component:IGT60R070D1").await;
    response.assert_status_ok();
    let detail: Value = response.json();
    assert_eq!(detail["entity"]["natural_key"], "component:IGT60R070D1");
    assert!(!detail["relationships"].as_array().unwrap().is_empty());
    assert!(!detail["classifications"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_entity_is_not_found() {
    let server = create_test_server(&Sources::gan());

    let response = server.get("/api/entities/component:NOPE123").await;
    response.assert_status_not_found();
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("component:NOPE123"));
}

#[tokio::test]
async fn test_invalid_requests_are_rejected() {
    let server = create_test_server(&Sources::gan());

    server
        .post("/api/research")
        .json(&json!({ "queryText": "   " }))
        .await
        .assert_status_bad_request();

    server
        .post("/api/plan")
        .json(&json!({ "queryText": GAN_QUERY, "timeBudgetSeconds": 0 }))
        .await
        .assert_status_bad_request();
}
