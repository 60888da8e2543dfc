//! Artist profile and follow integration tests.
//!
//! Run with: `cargo test -p streamhub-api --test artist_test`
//! Requires Docker for testcontainers (Postgres).

mod helpers;

use helpers::auth::{register_test_user, TestUser};
use helpers::fixtures::insert_ready_media;
use helpers::{api_path, setup_test_app, TestApp};
use serde_json::{json, Value};

async fn create_artist(app: &TestApp, user: &TestUser, name: &str) -> Value {
    let response = app
        .client()
        .post(&api_path("/artist"))
        .add_header("Authorization", user.bearer())
        .json(&json!({
            "name": name,
            "bio": "Synth duo",
            "social_links": { "instagram": "https://instagram.com/duo" },
            "genres": ["electronic"]
        }))
        .await;
    assert_eq!(response.status_code(), 201, "{}", response.text());
    let body: Value = response.json();
    body["data"].clone()
}

async fn role_of(app: &TestApp, user: &TestUser) -> String {
    sqlx::query_scalar("SELECT role::text FROM users WHERE id = $1")
        .bind(user.user_id)
        .fetch_one(app.pool())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_create_artist_promotes_role() {
    let app = setup_test_app().await;
    let user = register_test_user(&app, None).await;

    let artist = create_artist(&app, &user, "Night Drive").await;

    assert_eq!(artist["social_links"]["instagram"], "https://instagram.com/duo");
    assert_eq!(role_of(&app, &user).await, "artist");

    // Artists cannot open a second profile.
    let response = app
        .client()
        .post(&api_path("/artist"))
        .add_header("Authorization", user.bearer())
        .json(&json!({ "name": "Side Project" }))
        .await;
    assert_eq!(response.status_code(), 403);
}

#[tokio::test]
async fn test_artist_names_are_unique_case_insensitively() {
    let app = setup_test_app().await;
    let first = register_test_user(&app, None).await;
    let second = register_test_user(&app, None).await;
    create_artist(&app, &first, "Night Drive").await;

    let response = app
        .client()
        .post(&api_path("/artist"))
        .add_header("Authorization", second.bearer())
        .json(&json!({ "name": "night drive" }))
        .await;

    assert_eq!(response.status_code(), 409);
    assert_eq!(role_of(&app, &second).await, "user");
}

#[tokio::test]
async fn test_follow_twice_conflicts() {
    let app = setup_test_app().await;
    let artist_user = register_test_user(&app, None).await;
    let fan = register_test_user(&app, None).await;
    let artist = create_artist(&app, &artist_user, "Night Drive").await;
    let id = artist["id"].as_str().unwrap();

    let follow = api_path(&format!("/artist/{}/follow", id));
    let response = app
        .client()
        .post(&follow)
        .add_header("Authorization", fan.bearer())
        .await;
    assert_eq!(response.status_code(), 200);

    let response = app
        .client()
        .post(&follow)
        .add_header("Authorization", fan.bearer())
        .await;
    assert_eq!(response.status_code(), 409);
    let body: Value = response.json();
    assert_eq!(body["message"], "You are already following this artist");

    let response = app
        .client()
        .get(&api_path(&format!("/artist/{}", id)))
        .add_header("Authorization", fan.bearer())
        .await;
    let body: Value = response.json();
    assert_eq!(body["data"]["follower_count"], 1);
    assert_eq!(body["data"]["is_followed"], true);
}

#[tokio::test]
async fn test_concurrent_first_follows_admit_only_one() {
    let app = setup_test_app().await;
    let artist_user = register_test_user(&app, None).await;
    let fan = register_test_user(&app, None).await;
    let artist = create_artist(&app, &artist_user, "Night Drive").await;
    let follow = api_path(&format!("/artist/{}/follow", artist["id"].as_str().unwrap()));

    let (first, second) = tokio::join!(
        async {
            app.client()
                .post(&follow)
                .add_header("Authorization", fan.bearer())
                .await
                .status_code()
                .as_u16()
        },
        async {
            app.client()
                .post(&follow)
                .add_header("Authorization", fan.bearer())
                .await
                .status_code()
                .as_u16()
        },
    );

    let mut statuses = vec![first, second];
    statuses.sort_unstable();
    assert_eq!(statuses, vec![200, 409]);
    let rows: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM artist_follows WHERE user_id = $1 AND is_active",
    )
    .bind(fan.user_id)
    .fetch_one(app.pool())
    .await
    .unwrap();
    assert_eq!(rows, 1);
}

#[tokio::test]
async fn test_unfollow_then_refollow() {
    let app = setup_test_app().await;
    let artist_user = register_test_user(&app, None).await;
    let fan = register_test_user(&app, None).await;
    let artist = create_artist(&app, &artist_user, "Night Drive").await;
    let id = artist["id"].as_str().unwrap();

    let unfollow = api_path(&format!("/artist/{}/unfollow", id));
    let response = app
        .client()
        .post(&unfollow)
        .add_header("Authorization", fan.bearer())
        .await;
    assert_eq!(response.status_code(), 409);

    for path in [
        format!("/artist/{}/follow", id),
        format!("/artist/{}/unfollow", id),
        format!("/artist/{}/follow", id),
    ] {
        let response = app
            .client()
            .post(&api_path(&path))
            .add_header("Authorization", fan.bearer())
            .await;
        assert_eq!(response.status_code(), 200, "{}", path);
    }
}

#[tokio::test]
async fn test_followed_artists_list_first() {
    let app = setup_test_app().await;
    let a = register_test_user(&app, None).await;
    let b = register_test_user(&app, None).await;
    let fan = register_test_user(&app, None).await;
    create_artist(&app, &a, "Aurora Lane").await;
    let zed = create_artist(&app, &b, "Zed Theory").await;

    app.client()
        .post(&api_path(&format!(
            "/artist/{}/follow",
            zed["id"].as_str().unwrap()
        )))
        .add_header("Authorization", fan.bearer())
        .await;

    let body: Value = app
        .client()
        .get(&api_path("/artist"))
        .add_header("Authorization", fan.bearer())
        .await
        .json();
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Zed Theory", "Aurora Lane"]);
}

#[tokio::test]
async fn test_delete_artist_hides_uploads_and_reverts_role() {
    let app = setup_test_app().await;
    let user = register_test_user(&app, None).await;
    let artist = create_artist(&app, &user, "Night Drive").await;
    let media_id = insert_ready_media(app.pool(), user.user_id, "public").await;

    let response = app
        .client()
        .delete(&api_path(&format!(
            "/artist/{}",
            artist["id"].as_str().unwrap()
        )))
        .add_header("Authorization", user.bearer())
        .await;
    assert_eq!(response.status_code(), 200);

    assert_eq!(role_of(&app, &user).await, "user");
    let active: bool = sqlx::query_scalar("SELECT is_active FROM media WHERE id = $1")
        .bind(media_id)
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert!(!active);

    // The name is free again once the profile is retired.
    create_artist(&app, &user, "Night Drive").await;
}

#[tokio::test]
async fn test_update_artist_of_someone_else_is_not_found() {
    let app = setup_test_app().await;
    let owner = register_test_user(&app, None).await;
    let other = register_test_user(&app, None).await;
    let artist = create_artist(&app, &owner, "Night Drive").await;

    let response = app
        .client()
        .put(&api_path(&format!(
            "/artist/{}",
            artist["id"].as_str().unwrap()
        )))
        .add_header("Authorization", other.bearer())
        .json(&json!({ "bio": "Hijacked" }))
        .await;

    assert_eq!(response.status_code(), 404);
}
