use crate::{
    AppState,
    types::{AppError, Entity, Relationship, Result, TrlClassification},
};
use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;

/// A stored entity with its graph context and readiness history.
#[derive(Debug, Serialize)]
pub struct EntityDetail {
    pub entity: Entity,
    /// Edges touching the entity, either direction
    pub relationships: Vec<Relationship>,
    /// Every classification recorded for the entity, oldest first
    pub classifications: Vec<TrlClassification>,
}

pub async fn get_entity(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<EntityDetail>> {
    let entity = state
        .store
        .get_entity(&key)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("entity '{}'", key)))?;

    let relationships = state.store.neighborhood(&key, 1).await?.relationships;
    let classifications = state
        .store
        .classification_history(entity.entity_type, &key)
        .await?;

    Ok(Json(EntityDetail {
        entity,
        relationships,
        classifications,
    }))
}
