use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::infra::cache::page_key;
use crate::AppState;

/// Serves GET responses from the page cache and stores fresh `200 OK` bodies.
/// The key varies on the cookie header, so each session gets its own copy.
pub async fn cache_page_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if request.method() != Method::GET {
        return next.run(request).await;
    }

    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let cookie = request
        .headers()
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok());
    let key = page_key(&path_and_query, cookie);

    match state.cache.get(&key).await {
        Ok(Some(body)) => {
            tracing::debug!(path = %path_and_query, "page cache hit");
            return (
                [(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("text/html; charset=utf-8"),
                )],
                body,
            )
                .into_response();
        }
        Ok(None) => {}
        Err(err) => tracing::warn!(error = ?err, "failed to read page cache"),
    }

    let response = next.run(request).await;
    if response.status() != StatusCode::OK {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::error!(error = ?err, "failed to buffer response for page cache");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if let Err(err) = state
        .cache
        .set(&key, bytes.clone(), state.index_cache_ttl)
        .await
    {
        tracing::warn!(error = ?err, "failed to write page cache");
    }

    Response::from_parts(parts, Body::from(bytes))
}
