use axum::{extract::Path, http::StatusCode, response::IntoResponse, routing::get, Router};
use staticmap::cache::{tile_cache_key, BlobStore, ConditionalHeaders, DiskStore};
use staticmap::config::FetchConfig;
use staticmap::models::{MapQuery, RenderRequest, TileCoord};
use staticmap::services::compositor::PLACEHOLDER_FILL;
use staticmap::services::projection::CenterCoords;
use staticmap::services::tile_source::tile_url;
use staticmap::services::{HttpTileSource, MapResponse, StaticMapService, TileSource};
use std::sync::Arc;
use std::time::{Duration, Instant};

mod common;
use common::{pairs, png_bytes, TILE_COLOR};

/// Tile x index the `/slow` route stalls on.
const SLOW_X: i64 = 4824;

async fn ok_tile() -> impl IntoResponse {
    ([("content-type", "image/png")], png_bytes(256, 256, TILE_COLOR))
}

async fn slow_tile(Path((_z, x, _y)): Path<(u8, i64, i64)>) -> impl IntoResponse {
    if x == SLOW_X {
        tokio::time::sleep(Duration::from_secs(5)).await;
    }
    ([("content-type", "image/png")], png_bytes(256, 256, TILE_COLOR))
}

async fn html_page() -> impl IntoResponse {
    ([("content-type", "text/html")], "<html>rate limited</html>")
}

/// Start a throwaway tile server and return its base URL.
async fn spawn_tile_server() -> String {
    let app = Router::new()
        .route("/ok/{z}/{x}/{y}", get(ok_tile))
        .route("/slow/{z}/{x}/{y}", get(slow_tile))
        .route("/html/{z}/{x}/{y}", get(html_page))
        .route("/missing/{z}/{x}/{y}", get(|| async { StatusCode::NOT_FOUND }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn fast_fetch() -> FetchConfig {
    FetchConfig {
        connect_timeout_secs: 1,
        timeout_secs: 1,
        ..FetchConfig::default()
    }
}

#[tokio::test]
async fn fetched_tile_is_persisted_to_tile_cache() {
    let base = spawn_tile_server().await;
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(DiskStore::new(dir.path()));
    let source = HttpTileSource::new(&fast_fetch(), Some(store.clone() as Arc<dyn BlobStore>)).unwrap();

    let template = format!("{}/ok/{{Z}}/{{X}}/{{Y}}", base);
    let tile = TileCoord::new(3, 2, 4);
    let bytes = source.fetch_tile(&template, tile).await.unwrap();
    assert_eq!(image::guess_format(&bytes).unwrap(), image::ImageFormat::Png);

    let key = tile_cache_key(&tile_url(&template, tile));
    assert!(key.ends_with("/ok/4/3/2"));
    assert!(store.exists(&key).await);
    assert_eq!(store.read(&key).await.unwrap(), bytes);
}

#[tokio::test]
async fn non_image_response_is_rejected_and_not_cached() {
    let base = spawn_tile_server().await;
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(DiskStore::new(dir.path()));
    let source = HttpTileSource::new(&fast_fetch(), Some(store.clone() as Arc<dyn BlobStore>)).unwrap();

    let template = format!("{}/html/{{Z}}/{{X}}/{{Y}}", base);
    let tile = TileCoord::new(1, 1, 2);
    assert!(source.fetch_tile(&template, tile).await.is_err());
    assert!(!store.exists(&tile_cache_key(&tile_url(&template, tile))).await);
}

#[tokio::test]
async fn http_error_status_is_a_failure() {
    let base = spawn_tile_server().await;
    let source = HttpTileSource::new(&fast_fetch(), None).unwrap();
    let template = format!("{}/missing/{{Z}}/{{X}}/{{Y}}", base);
    assert!(source.fetch_tile(&template, TileCoord::new(0, 0, 0)).await.is_err());
}

#[tokio::test]
async fn slow_tile_times_out() {
    let base = spawn_tile_server().await;
    let source = HttpTileSource::new(&fast_fetch(), None).unwrap();
    let template = format!("{}/slow/{{Z}}/{{X}}/{{Y}}", base);

    let started = Instant::now();
    let result = source.fetch_tile(&template, TileCoord::new(SLOW_X, 6159, 14)).await;
    assert!(result.is_err());
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn timed_out_tile_degrades_to_placeholder_in_full_render() {
    let base = spawn_tile_server().await;
    let dir = tempfile::tempdir().unwrap();
    let mut config = common::test_config(dir.path());
    config.map_sources[0].url_template = format!("{}/slow/{{Z}}/{{X}}/{{Y}}", base);
    config.cache.use_tile_cache = false;
    config.cache.use_map_cache = false;
    config.fetch = fast_fetch();

    let items = [
        ("center", "40.714728,-73.998672"),
        ("zoom", "14"),
        ("size", "512x512"),
    ];
    let query = MapQuery::from_pairs(pairs(&items));
    let request = RenderRequest::resolve(&query, &config);
    let center = CenterCoords::of(&request.viewport);
    assert_eq!(center.x.floor() as i64, SLOW_X);

    let service = StaticMapService::new(config).unwrap();
    let response = service
        .handle(&query, &ConditionalHeaders::default())
        .await
        .unwrap();

    let MapResponse::Image { body, .. } = response else {
        panic!("expected an image");
    };
    let image = image::load_from_memory(&body).unwrap().to_rgba8();
    assert_eq!(image.dimensions(), (512, 512));

    // Column SLOW_X holds the center; its tiles are placeholders, the rest real.
    let x = (256 + center.offset_x + 20) as u32;
    assert_eq!(*image.get_pixel(x, 256), PLACEHOLDER_FILL);
    assert_eq!(*image.get_pixel(511, 256), TILE_COLOR);
}
