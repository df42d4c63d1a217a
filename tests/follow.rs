//! Follow Tests
//!
//! Following and unfollowing authors, and the feed built from it.

mod common;

use axum::http::StatusCode;
use common::{app, post_cards};

use yatube::app::social::SocialService;

#[tokio::test]
async fn follow_then_unfollow() {
    let app = app().await;
    let author = app.create_user("auth").await;
    let reader = app.create_user("reader").await;

    let resp = app.get("/profile/auth/follow/", Some(&reader)).await;
    resp.assert_redirect("/profile/auth/");
    assert_eq!(app.follow_count().await, 1);

    let social = SocialService::new(app.state.db.clone());
    assert!(social.is_following(reader.id, author.id).await.unwrap());

    let resp = app.get("/profile/auth/unfollow/", Some(&reader)).await;
    resp.assert_redirect("/profile/auth/");
    assert_eq!(app.follow_count().await, 0);
}

#[tokio::test]
async fn following_twice_keeps_one_row() {
    let app = app().await;
    app.create_user("auth").await;
    let reader = app.create_user("reader").await;

    app.get("/profile/auth/follow/", Some(&reader)).await;
    app.get("/profile/auth/follow/", Some(&reader)).await;

    assert_eq!(app.follow_count().await, 1);
}

#[tokio::test]
async fn users_cannot_follow_themselves() {
    let app = app().await;
    let author = app.create_user("auth").await;

    let resp = app.get("/profile/auth/follow/", Some(&author)).await;

    resp.assert_redirect("/profile/auth/");
    assert_eq!(app.follow_count().await, 0);
}

#[tokio::test]
async fn unfollowing_a_stranger_is_harmless() {
    let app = app().await;
    app.create_user("auth").await;
    let reader = app.create_user("reader").await;

    let resp = app.get("/profile/auth/unfollow/", Some(&reader)).await;

    resp.assert_redirect("/profile/auth/");
    assert_eq!(app.follow_count().await, 0);
}

#[tokio::test]
async fn following_missing_author_is_404() {
    let app = app().await;
    let reader = app.create_user("reader").await;

    let resp = app.get("/profile/nobody/follow/", Some(&reader)).await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn feed_shows_only_followed_authors() {
    let app = app().await;
    let author = app.create_user("auth").await;
    let stranger = app.create_user("stranger").await;
    let reader = app.create_user("reader").await;
    let lurker = app.create_user("lurker").await;
    app.create_post(&author, "Post by followed author", None).await;
    app.create_post(&stranger, "Post by stranger", None).await;

    app.get("/profile/auth/follow/", Some(&reader))
        .await
        .assert_redirect("/profile/auth/");

    let feed = app.get("/follow/", Some(&reader)).await;
    assert_eq!(feed.status, StatusCode::OK);
    assert!(feed.text().contains("Post by followed author"));
    assert!(!feed.text().contains("Post by stranger"));

    let empty = app.get("/follow/", Some(&lurker)).await;
    assert_eq!(post_cards(&empty.text()), 0);
    assert!(empty.text().contains("empty-feed"));
}

#[tokio::test]
async fn profile_shows_follow_button_state() {
    let app = app().await;
    app.create_user("auth").await;
    let reader = app.create_user("reader").await;

    let before = app.get("/profile/auth/", Some(&reader)).await;
    assert!(before.text().contains("btn follow"));

    app.get("/profile/auth/follow/", Some(&reader)).await;

    let after = app.get("/profile/auth/", Some(&reader)).await;
    assert!(after.text().contains("btn unfollow"));
    assert!(after.text().contains("Followers: 1"));
}

#[tokio::test]
async fn author_deletion_cascades_follows() {
    let app = app().await;
    let author = app.create_user("auth").await;
    let reader = app.create_user("reader").await;
    app.get("/profile/auth/follow/", Some(&reader)).await;

    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(author.id)
        .execute(app.state.db.pool())
        .await
        .unwrap();

    assert_eq!(app.follow_count().await, 0);
}
