use crate::{AppState, store::CacheStats, types::TaskCategory};
use axum::{Json, extract::State};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Leaf categories with a configured source collaborator
    pub sources: Vec<TaskCategory>,
    pub cache: CacheStats,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        sources: state.engine.executors().categories(),
        cache: state.store.cache_stats(),
    })
}
