use crate::{
    AppState,
    types::{FinalResult, ResearchRequest, Result, TaskTree},
};
use axum::{Json, extract::State};
use tracing::info;

/// Plan and execute a research query
pub async fn research(
    State(state): State<AppState>,
    Json(payload): Json<ResearchRequest>,
) -> Result<Json<FinalResult>> {
    info!(query = %payload.query_text, "Research request received");
    let result = state.engine.research(payload).await?;
    Ok(Json(result))
}

/// Plan a query without executing it
pub async fn plan(
    State(state): State<AppState>,
    Json(payload): Json<ResearchRequest>,
) -> Result<Json<TaskTree>> {
    Ok(Json(state.engine.plan(&payload)?))
}
