//! Media upload and catalog integration tests.
//!
//! Run with: `cargo test -p streamhub-api --test media_test`
//! Requires Docker for testcontainers (Postgres).

mod helpers;

use helpers::auth::{register_test_user, TestUser};
use helpers::fakes::BUCKET_URL;
use helpers::{api_path, setup_test_app, TestApp};
use serde_json::{json, Value};
use streamhub_services::JobStatus;
use uuid::Uuid;

async fn initiate(app: &TestApp, user: &TestUser, filename: &str) -> (String, String) {
    let response = app
        .client()
        .post(&api_path("/media/initiate-upload"))
        .add_header("Authorization", user.bearer())
        .json(&json!({ "filename": filename, "content_type": "video/mp4" }))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    (
        body["data"]["upload_id"].as_str().unwrap().to_string(),
        body["data"]["key"].as_str().unwrap().to_string(),
    )
}

async fn upload_media(app: &TestApp, user: &TestUser, visibility: &str) -> Value {
    let (upload_id, key) = initiate(app, user, "launch trailer.mp4").await;
    let response = app
        .client()
        .post(&api_path("/media/complete-upload"))
        .add_header("Authorization", user.bearer())
        .json(&json!({
            "upload_id": upload_id,
            "key": key,
            "parts": [
                { "part_number": 2, "etag": "\"b\"" },
                { "part_number": 1, "etag": "\"a\"" }
            ],
            "title": "Launch trailer",
            "type": "movie",
            "visibility": visibility,
            "genres": "action,drama"
        }))
        .await;
    assert_eq!(response.status_code(), 201, "{}", response.text());
    let body: Value = response.json();
    body["data"].clone()
}

async fn variant_count(app: &TestApp, media: &Value) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM media_variants WHERE media_id = $1::uuid")
        .bind(media["id"].as_str().unwrap())
        .fetch_one(app.pool())
        .await
        .unwrap()
}

async fn request_access_url(app: &TestApp, user: &TestUser, body: Value) -> axum_test::TestResponse {
    app.client()
        .post(&api_path("/media/media-access-url"))
        .add_header("Authorization", user.bearer())
        .json(&body)
        .await
}

#[tokio::test]
async fn test_initiate_upload_keys_under_owner_prefix() {
    let app = setup_test_app().await;
    let user = register_test_user(&app, None).await;

    let (_, key) = initiate(&app, &user, "../../etc/clip.mp4").await;

    assert!(key.starts_with(&format!("uploads/{}/", user.user_id)));
    assert!(key.ends_with("/clip.mp4"));
}

#[tokio::test]
async fn test_presigned_urls_cover_every_part() {
    let app = setup_test_app().await;
    let user = register_test_user(&app, None).await;
    let (upload_id, key) = initiate(&app, &user, "clip.mp4").await;

    let response = app
        .client()
        .post(&api_path("/media/presigned-urls"))
        .add_header("Authorization", user.bearer())
        .json(&json!({ "upload_id": upload_id, "key": key, "parts": 3 }))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    let parts: Vec<i64> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["part_number"].as_i64().unwrap())
        .collect();
    assert_eq!(parts, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_complete_upload_submits_one_transcode_job() {
    let app = setup_test_app().await;
    let user = register_test_user(&app, None).await;

    let media = upload_media(&app, &user, "public").await;

    assert_eq!(media["transcoding_status"], "processing");
    assert_eq!(media["uploader_type"], "artist");
    assert_eq!(media["genres"], json!(["action", "drama"]));
    assert!(media["media_url"].is_null());
    assert_eq!(app.transcoder.submitted(), 1);
    assert_eq!(app.storage.completed_keys().len(), 1);
}

#[tokio::test]
async fn test_get_media_reconciles_completed_job_once() {
    let app = setup_test_app().await;
    let user = register_test_user(&app, None).await;
    let media = upload_media(&app, &user, "public").await;
    let path = api_path(&format!("/media/{}", media["id"].as_str().unwrap()));

    let response = app
        .client()
        .get(&path)
        .add_header("Authorization", user.bearer())
        .await;
    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["success"], false);

    // A job still in progress leaves the record untouched.
    let (status, media_url): (String, Option<String>) = sqlx::query_as(
        "SELECT transcoding_status::text, media_url FROM media WHERE id = $1::uuid",
    )
    .bind(media["id"].as_str().unwrap())
    .fetch_one(app.pool())
    .await
    .unwrap();
    assert_eq!(status, "processing");
    assert!(media_url.is_none());
    assert_eq!(variant_count(&app, &media).await, 0);

    app.transcoder.set_status(JobStatus::Complete);
    let response = app
        .client()
        .get(&path)
        .add_header("Authorization", user.bearer())
        .await;
    assert_eq!(response.status_code(), 200);
    let first: Value = response.json();
    assert_eq!(first["data"]["media"]["transcoding_status"], "completed");
    let master = first["data"]["media"]["media_url"].as_str().unwrap();
    assert!(master.ends_with("/launch trailer.m3u8"));
    let variants = first["data"]["variants"].as_array().unwrap().len();
    assert_eq!(variants, 6);

    // Completed records are served without asking the transcoder again.
    let polled = app.transcoder.polled();
    let response = app
        .client()
        .get(&path)
        .add_header("Authorization", user.bearer())
        .await;
    assert_eq!(response.status_code(), 200);
    let second: Value = response.json();
    assert_eq!(second["data"]["variants"].as_array().unwrap().len(), variants);
    assert_eq!(app.transcoder.polled(), polled);
}

#[tokio::test]
async fn test_failed_job_marks_media_failed() {
    let app = setup_test_app().await;
    let user = register_test_user(&app, None).await;
    let media = upload_media(&app, &user, "public").await;
    let id = media["id"].as_str().unwrap();

    app.transcoder.set_status(JobStatus::Error);
    let response = app
        .client()
        .get(&api_path(&format!("/media/{}", id)))
        .add_header("Authorization", user.bearer())
        .await;
    assert_eq!(response.status_code(), 422);

    let status: String = sqlx::query_scalar(
        "SELECT transcoding_status::text FROM media WHERE id = $1::uuid",
    )
    .bind(id)
    .fetch_one(app.pool())
    .await
    .unwrap();
    assert_eq!(status, "failed");
}

#[tokio::test]
async fn test_transcoder_rejection_removes_object_and_record() {
    let app = setup_test_app().await;
    let user = register_test_user(&app, None).await;
    let (upload_id, key) = initiate(&app, &user, "clip.mp4").await;
    app.transcoder.reject_submissions();

    let response = app
        .client()
        .post(&api_path("/media/complete-upload"))
        .add_header("Authorization", user.bearer())
        .json(&json!({
            "upload_id": upload_id,
            "key": key,
            "parts": [{ "part_number": 1, "etag": "\"a\"" }],
            "title": "Clip",
            "type": "music"
        }))
        .await;

    assert_eq!(response.status_code(), 500);
    assert_eq!(app.storage.deleted_keys(), vec![key.clone()]);
    let active: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM media WHERE s3_key_original = $1 AND is_active",
    )
    .bind(&key)
    .fetch_one(app.pool())
    .await
    .unwrap();
    assert_eq!(active, 0);
}

#[tokio::test]
async fn test_aborted_upload_cannot_be_completed() {
    let app = setup_test_app().await;
    let user = register_test_user(&app, None).await;
    let (upload_id, key) = initiate(&app, &user, "clip.mp4").await;

    let response = app
        .client()
        .post(&api_path("/media/abort-upload"))
        .add_header("Authorization", user.bearer())
        .json(&json!({ "upload_id": upload_id, "key": key }))
        .await;
    assert_eq!(response.status_code(), 200);

    let response = app
        .client()
        .post(&api_path("/media/complete-upload"))
        .add_header("Authorization", user.bearer())
        .json(&json!({
            "upload_id": upload_id,
            "key": key,
            "parts": [{ "part_number": 1, "etag": "\"a\"" }],
            "title": "Clip",
            "type": "movie"
        }))
        .await;
    assert_eq!(response.status_code(), 404);
    assert_eq!(app.transcoder.submitted(), 0);
}

#[tokio::test]
async fn test_upload_of_another_user_is_not_found() {
    let app = setup_test_app().await;
    let owner = register_test_user(&app, None).await;
    let intruder = register_test_user(&app, None).await;
    let (upload_id, key) = initiate(&app, &owner, "clip.mp4").await;

    let response = app
        .client()
        .post(&api_path("/media/abort-upload"))
        .add_header("Authorization", intruder.bearer())
        .json(&json!({ "upload_id": upload_id, "key": key }))
        .await;

    assert_eq!(response.status_code(), 404);
}

#[tokio::test]
async fn test_private_media_hidden_from_other_users() {
    let app = setup_test_app().await;
    let owner = register_test_user(&app, None).await;
    let viewer = register_test_user(&app, None).await;
    let media = upload_media(&app, &owner, "private").await;
    let id = media["id"].as_str().unwrap();
    app.transcoder.set_status(JobStatus::Complete);

    let response = app
        .client()
        .get(&api_path(&format!("/media/{}", id)))
        .add_header("Authorization", viewer.bearer())
        .await;
    assert_eq!(response.status_code(), 404);

    let response = app
        .client()
        .get(&api_path("/media/all"))
        .add_header("Authorization", viewer.bearer())
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert!(body["data"]
        .as_array()
        .unwrap()
        .iter()
        .all(|m| m["id"] != media["id"]));

    let response = app
        .client()
        .get(&api_path(&format!("/media/{}", id)))
        .add_header("Authorization", owner.bearer())
        .await;
    assert_eq!(response.status_code(), 200);
}

#[tokio::test]
async fn test_delete_media_requires_ownership() {
    let app = setup_test_app().await;
    let owner = register_test_user(&app, None).await;
    let other = register_test_user(&app, None).await;
    let media = upload_media(&app, &owner, "public").await;
    let path = api_path(&format!("/media/{}", media["id"].as_str().unwrap()));

    let response = app
        .client()
        .delete(&path)
        .add_header("Authorization", other.bearer())
        .await;
    assert_eq!(response.status_code(), 404);

    let response = app
        .client()
        .delete(&path)
        .add_header("Authorization", owner.bearer())
        .await;
    assert_eq!(response.status_code(), 200);
}

#[tokio::test]
async fn test_media_routes_require_token() {
    let app = setup_test_app().await;

    let response = app.client().get(&api_path("/media/all")).await;

    assert_eq!(response.status_code(), 401);
}

#[tokio::test]
async fn test_access_url_for_private_media_looks_like_missing_media() {
    let app = setup_test_app().await;
    let owner = register_test_user(&app, None).await;
    let viewer = register_test_user(&app, None).await;
    let media = upload_media(&app, &owner, "private").await;

    let hidden = request_access_url(&app, &viewer, json!({ "media_id": media["id"] })).await;
    let missing = request_access_url(&app, &viewer, json!({ "media_id": Uuid::new_v4() })).await;

    assert_eq!(hidden.status_code(), 404);
    assert_eq!(missing.status_code(), 404);
    let hidden: Value = hidden.json();
    let missing: Value = missing.json();
    assert_eq!(hidden["message"], "Media not found or unauthorized");
    assert_eq!(hidden["message"], missing["message"]);
    assert_eq!(hidden["error_code"], missing["error_code"]);
    assert!(app.storage.signed_keys().is_empty());
}

#[tokio::test]
async fn test_access_url_signs_original_and_rendition_keys() {
    let app = setup_test_app().await;
    let owner = register_test_user(&app, None).await;
    let media = upload_media(&app, &owner, "private").await;
    let id = media["id"].as_str().unwrap();

    let response = request_access_url(&app, &owner, json!({ "media_id": id })).await;
    assert_eq!(response.status_code(), 200, "{}", response.text());
    let body: Value = response.json();
    assert_eq!(body["data"]["expires_in"], 3600);
    let original = media["s3_key_original"].as_str().unwrap();
    assert_eq!(app.storage.signed_keys(), vec![original.to_string()]);

    // No renditions exist until the job has been reconciled.
    let response =
        request_access_url(&app, &owner, json!({ "media_id": id, "resolution": "720p" })).await;
    assert_eq!(response.status_code(), 404);

    app.transcoder.set_status(JobStatus::Complete);
    let response = app
        .client()
        .get(&api_path(&format!("/media/{}", id)))
        .add_header("Authorization", owner.bearer())
        .await;
    assert_eq!(response.status_code(), 200);
    let reconciled: Value = response.json();
    let stream_url = reconciled["data"]["variants"]
        .as_array()
        .unwrap()
        .iter()
        .find(|v| v["resolution"] == "720p")
        .and_then(|v| v["stream_url"].as_str())
        .unwrap()
        .to_string();

    let response =
        request_access_url(&app, &owner, json!({ "media_id": id, "resolution": "720p" })).await;
    assert_eq!(response.status_code(), 200);
    let expected_key = stream_url
        .strip_prefix(&format!("{}/", BUCKET_URL))
        .unwrap()
        .to_string();
    assert_eq!(expected_key, format!("transcoded/{}/launch trailer_720p.m3u8", id));
    assert_eq!(app.storage.signed_keys().last(), Some(&expected_key));
}
