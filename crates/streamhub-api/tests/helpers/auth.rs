use super::{api_path, TestApp};
use serde_json::json;
use uuid::Uuid;

pub const TEST_PASSWORD: &str = "TestPassword123!";

/// A verified account and a bearer token for it.
pub struct TestUser {
    pub email: String,
    pub password: String,
    pub user_id: Uuid,
    pub token: String,
}

impl TestUser {
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

/// Register through the API, read the emailed code back and verify it.
pub async fn register_test_user(app: &TestApp, email: Option<&str>) -> TestUser {
    let email = email
        .map(str::to_string)
        .unwrap_or_else(|| format!("viewer-{}@example.com", Uuid::new_v4().simple()));

    let response = app
        .client()
        .post(&api_path("/auth/register"))
        .json(&json!({ "email": email, "password": TEST_PASSWORD }))
        .await;
    assert_eq!(response.status_code(), 201, "register failed: {}", response.text());
    let body: serde_json::Value = response.json();
    let user_id: Uuid = body["data"]["user_id"]
        .as_str()
        .and_then(|s| s.parse().ok())
        .expect("register returns the user id");

    // Accounts are keyed by the lowercased address.
    let email = email.trim().to_lowercase();
    let otp = app
        .notifier
        .latest_email_code(&email)
        .expect("verification code was emailed");
    let response = app
        .client()
        .post(&api_path("/auth/verify-email"))
        .json(&json!({ "user_id": user_id, "otp": otp }))
        .await;
    assert_eq!(response.status_code(), 200, "verify failed: {}", response.text());
    let body: serde_json::Value = response.json();
    let token = body["data"]["token"]
        .as_str()
        .expect("verification returns a token")
        .to_string();

    TestUser {
        email,
        password: TEST_PASSWORD.to_string(),
        user_id,
        token,
    }
}

/// Promote an account in the database. The auth middleware reads the role
/// from the user row, so existing tokens pick it up immediately.
pub async fn promote(pool: &sqlx::PgPool, user_id: Uuid, role: &str) {
    sqlx::query("UPDATE users SET role = $2::user_role WHERE id = $1")
        .bind(user_id)
        .bind(role)
        .execute(pool)
        .await
        .expect("Failed to update role");
}

pub async fn register_admin(app: &TestApp) -> TestUser {
    let admin = register_test_user(app, None).await;
    promote(app.pool(), admin.user_id, "admin").await;
    admin
}
