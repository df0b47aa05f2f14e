use axum::Router;
use staticmap::config::Config;
use staticmap::services::StaticMapService;
use staticmap::AppState;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "staticmap=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env().map_err(|e| format!("Failed to load configuration: {}", e))?;

    tracing::info!("Starting static map server");
    tracing::info!(
        "Map sources: {}",
        config
            .map_sources
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    tracing::info!(
        http = config.cache.use_http_cache,
        tiles = config.cache.use_tile_cache,
        maps = config.cache.use_map_cache,
        "Cache tiers configured"
    );

    let addr = config.server_address();

    // Without an HTTP client or a map source nothing can render, so fail here
    let service = StaticMapService::new(config)
        .map_err(|e| format!("Failed to initialize renderer: {}", e))?;
    let state = Arc::new(AppState { service });

    // Build router with CORS and tracing
    let app = Router::new()
        .merge(staticmap::routes::create_router(state))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    // Start server
    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
