pub mod debug;
pub mod static_map;

use axum::{routing::get, Router};
use std::sync::Arc;

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/staticmap", get(static_map::get_static_map))
        .route("/debug/health", get(debug::health_check))
        .with_state(state)
}
