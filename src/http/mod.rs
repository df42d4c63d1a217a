use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;

use crate::AppState;

pub mod auth;
mod error;
pub mod forms;
mod handlers;
pub mod middleware;
mod routes;

pub use auth::AuthUser;
pub use error::AppError;

pub fn router(state: AppState) -> Router {
    let media = ServeDir::new(state.storage.root());
    let body_limit = state.upload_max_bytes;

    Router::new()
        .merge(routes::health())
        .merge(routes::listings(&state))
        .merge(routes::posts())
        .merge(routes::social())
        .merge(routes::about())
        .merge(routes::auth())
        .nest_service("/media", media)
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .with_state(state)
}
