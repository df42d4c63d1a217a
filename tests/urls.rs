//! URL Tests
//!
//! Which pages answer whom: public pages, members-only pages, author-only
//! pages and unknown addresses.

mod common;

use axum::http::StatusCode;
use common::app;

// ===========================================================================
// Public pages
// ===========================================================================

#[tokio::test]
async fn public_pages_open_for_anonymous_visitors() {
    let app = app().await;
    let author = app.create_user("auth").await;
    let group = app.create_group("Test group", "test-slug").await;
    let post = app.create_post(&author, "Test post text", Some(&group)).await;

    for path in [
        "/".to_string(),
        "/group/test-slug/".to_string(),
        "/profile/auth/".to_string(),
        format!("/posts/{}/", post.id),
        "/about/author/".to_string(),
        "/about/tech/".to_string(),
        "/auth/signup/".to_string(),
        "/auth/login/".to_string(),
    ] {
        let resp = app.get(&path, None).await;
        assert_eq!(resp.status, StatusCode::OK, "GET {}", path);
    }
}

#[tokio::test]
async fn unknown_page_renders_custom_404() {
    let app = app().await;

    let resp = app.get("/unexisting_page/", None).await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert!(resp.text().contains("Custom 404"));
    assert!(resp.text().contains("unexisting_page"));
}

#[tokio::test]
async fn missing_objects_are_404() {
    let app = app().await;

    for path in [
        "/group/no-such-group/",
        "/profile/nobody/",
        "/posts/999/",
        "/posts/not-a-number/",
    ] {
        let resp = app.get(path, None).await;
        assert_eq!(resp.status, StatusCode::NOT_FOUND, "GET {}", path);
        assert!(resp.text().contains("Custom 404"));
    }
}

#[tokio::test]
async fn health_reports_ok() {
    let app = app().await;

    let resp = app.get("/health", None).await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["status"], "ok");
}

// ===========================================================================
// Members-only pages
// ===========================================================================

#[tokio::test]
async fn members_pages_redirect_anonymous_to_login() {
    let app = app().await;
    let author = app.create_user("auth").await;
    let post = app.create_post(&author, "Test post text", None).await;

    for path in [
        "/create/".to_string(),
        "/follow/".to_string(),
        format!("/posts/{}/edit/", post.id),
        format!("/posts/{}/comment/", post.id),
        "/profile/auth/follow/".to_string(),
        "/profile/auth/unfollow/".to_string(),
    ] {
        let resp = app.get(&path, None).await;
        resp.assert_redirect(&format!("/auth/login/?next={}", path));
    }
}

#[tokio::test]
async fn members_pages_open_for_signed_in_users() {
    let app = app().await;
    let user = app.create_user("reader").await;

    for path in ["/create/", "/follow/"] {
        let resp = app.get(path, Some(&user)).await;
        assert_eq!(resp.status, StatusCode::OK, "GET {}", path);
    }
}

#[tokio::test]
async fn stale_session_cookie_counts_as_anonymous() {
    let app = app().await;
    let ghost = common::TestUser {
        id: 0,
        username: "ghost".to_string(),
        cookie: "sessionid=not-a-real-token".to_string(),
    };

    let resp = app.get("/create/", Some(&ghost)).await;

    resp.assert_redirect("/auth/login/?next=/create/");
}

// ===========================================================================
// Author-only pages
// ===========================================================================

#[tokio::test]
async fn edit_page_opens_for_the_author() {
    let app = app().await;
    let author = app.create_user("auth").await;
    let post = app.create_post(&author, "Test post text", None).await;

    let resp = app
        .get(&format!("/posts/{}/edit/", post.id), Some(&author))
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.text().contains("Test post text"));
}

#[tokio::test]
async fn create_and_edit_pages_render_the_post_form() {
    let app = app().await;
    let author = app.create_user("auth").await;
    let post = app.create_post(&author, "Test post text", None).await;

    let create = app.get("/create/", Some(&author)).await.text();
    let edit = app
        .get(&format!("/posts/{}/edit/", post.id), Some(&author))
        .await
        .text();

    for html in [&create, &edit] {
        assert!(html.contains("name=\"text\""));
        assert!(html.contains("name=\"group\""));
        assert!(html.contains("name=\"image\""));
    }
    assert!(edit.contains("Edit post"));
    assert!(!create.contains("Edit post"));
}

#[tokio::test]
async fn edit_page_sends_other_users_to_the_post() {
    let app = app().await;
    let author = app.create_user("auth").await;
    let other = app.create_user("other").await;
    let post = app.create_post(&author, "Test post text", None).await;

    let resp = app
        .get(&format!("/posts/{}/edit/", post.id), Some(&other))
        .await;

    resp.assert_redirect(&format!("/posts/{}/", post.id));
}

#[tokio::test]
async fn comment_get_returns_to_the_post() {
    let app = app().await;
    let author = app.create_user("auth").await;
    let post = app.create_post(&author, "Test post text", None).await;

    let resp = app
        .get(&format!("/posts/{}/comment/", post.id), Some(&author))
        .await;

    resp.assert_redirect(&format!("/posts/{}/", post.id));
}
