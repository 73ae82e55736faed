use crate::AppState;
use axum::{
    Router,
    routing::{get, post},
};

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(crate::api::handlers::health::health))
        .route("/research", post(crate::api::handlers::research::research))
        .route("/plan", post(crate::api::handlers::research::plan))
        .route(
            "/entities/{key}",
            get(crate::api::handlers::entities::get_entity),
        )
}
