use crate::cache::ConditionalHeaders;
use crate::error::Result;
use crate::models::MapQuery;
use crate::services::MapResponse;
use crate::AppState;
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use time::OffsetDateTime;

/// GET /staticmap
/// Render a map image from `center`, `zoom`, `size`, `scale`, `format`,
/// `maptype` and any number of `markers` parameters.
pub async fn get_static_map(
    State(state): State<Arc<AppState>>,
    Query(pairs): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Result<Response> {
    let query = MapQuery::from_pairs(pairs);
    let conditional = ConditionalHeaders::from_headers(&headers);
    let policy = state.service.cache_policy();

    let response = match state.service.handle(&query, &conditional).await? {
        MapResponse::NotModified { key } => {
            let mut response = StatusCode::NOT_MODIFIED.into_response();
            if let Ok(etag) = HeaderValue::from_str(&format!("\"{}\"", key)) {
                response.headers_mut().insert(header::ETAG, etag);
            }
            response
        }
        MapResponse::Image {
            key,
            format,
            body,
            last_modified,
            from_cache,
        } => {
            tracing::debug!(from_cache, bytes = body.len(), "Serving {} map {}", format, key);
            let mut response = ([(header::CONTENT_TYPE, format.content_type())], body).into_response();
            for (name, value) in policy.headers(&key, last_modified, OffsetDateTime::now_utc()) {
                response.headers_mut().insert(name, value);
            }
            response
        }
    };

    Ok(response)
}
