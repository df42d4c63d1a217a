use axum::{middleware, routing::get, routing::post, Router};

use crate::http::handlers;
use crate::http::middleware::cache_page_middleware;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

/// Public listings. Only the front page goes through the page cache.
pub fn listings(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::index).route_layer(middleware::from_fn_with_state(
                state.clone(),
                cache_page_middleware,
            )),
        )
        .route("/group/:slug/", get(handlers::group_posts))
        .route("/profile/:username/", get(handlers::profile))
        .route("/posts/:post_id/", get(handlers::post_detail))
}

pub fn posts() -> Router<AppState> {
    Router::new()
        .route(
            "/create/",
            get(handlers::post_create_form).post(handlers::post_create),
        )
        .route(
            "/posts/:post_id/edit/",
            get(handlers::post_edit_form).post(handlers::post_edit),
        )
        .route("/posts/:post_id/delete/", post(handlers::post_delete))
        .route(
            "/posts/:post_id/comment/",
            get(handlers::add_comment_redirect).post(handlers::add_comment),
        )
}

pub fn social() -> Router<AppState> {
    Router::new()
        .route("/follow/", get(handlers::follow_index))
        .route(
            "/profile/:username/follow/",
            get(handlers::profile_follow),
        )
        .route(
            "/profile/:username/unfollow/",
            get(handlers::profile_unfollow),
        )
}

pub fn about() -> Router<AppState> {
    Router::new()
        .route("/about/author/", get(handlers::about_author))
        .route("/about/tech/", get(handlers::about_tech))
}

pub fn auth() -> Router<AppState> {
    Router::new()
        .route(
            "/auth/signup/",
            get(handlers::signup_form).post(handlers::signup),
        )
        .route(
            "/auth/login/",
            get(handlers::login_form).post(handlers::login),
        )
        .route(
            "/auth/logout/",
            get(handlers::logout).post(handlers::logout),
        )
}
