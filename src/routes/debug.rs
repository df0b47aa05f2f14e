use crate::AppState;
use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

/// GET /debug/health - Report configured sources and cache tiers
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    let config = state.service.config();
    let mut status = json!({
        "status": "ok",
        "checks": {}
    });

    status["checks"]["map_sources"] = json!(config
        .map_sources
        .iter()
        .map(|source| source.name.as_str())
        .collect::<Vec<_>>());

    status["checks"]["cache"] = json!({
        "http": config.cache.use_http_cache,
        "tiles": config.cache.use_tile_cache.then(|| config.cache.tile_cache_dir.display().to_string()),
        "maps": config.cache.use_map_cache.then(|| config.cache.map_cache_dir.display().to_string()),
        "expire_days": config.cache.expire_days,
    });

    // Missing icons degrade to a drawn pin, so this is informational only
    let marker_dir = &config.render.marker_dir;
    match tokio::fs::metadata(marker_dir).await {
        Ok(meta) if meta.is_dir() => {
            status["checks"]["marker_dir"] = json!("ok");
        }
        _ => {
            status["checks"]["marker_dir"] =
                json!({"missing": marker_dir.display().to_string()});
        }
    }

    status["checks"]["formats"] = json!(config.render.allowed_formats);
    status["checks"]["scales"] = json!(config.render.allowed_scales);

    status["checks"]["autozoom"] = match config.render.autozoom_bounds() {
        Some((min, max)) => json!({"min_zoom": min, "max_zoom": max}),
        None => json!("off"),
    };

    Json(status)
}
