use axum::{
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;

use crate::{controllers, health_with_pool, ws, AppState};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(|Extension(state): Extension<Arc<AppState>>| async move {
            health_with_pool(&state.pool).await
        }))
        .route("/api/register", post(controllers::register))
        .route("/api/login", post(controllers::login))
        .route("/api/groups", get(controllers::list_groups).post(controllers::create_group))
        .route("/api/groups/:group_id", get(controllers::get_group).delete(controllers::delete_group))
        .route("/api/groups/:group_id/join", post(controllers::join_group))
        .route(
            "/api/groups/:group_id/messages",
            get(controllers::list_messages).post(controllers::post_message),
        )
        .route("/ws", get(ws::ws_handler))
        .layer(Extension(state))
}
