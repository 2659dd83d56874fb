use super::{api_path, TestApp};
use serde_json::{json, Value};
use veda_core::password::hash_password;
use veda_core::{NewUser, User, UserRole, UserStatus};

/// Password meeting the strength rules, used for every test account.
pub const TEST_PASSWORD: &str = "Hari-b0l!2024";

/// Logged-in test account.
pub struct TestUser {
    pub user: User,
    pub token: String,
}

/// Register through the API; the account stays pending.
pub async fn register(app: &TestApp, username: &str) -> Value {
    let response = app
        .client()
        .post(&api_path("/auth/register"))
        .json(&json!({
            "username": username,
            "email": format!("{}@example.org", username),
            "password": TEST_PASSWORD,
            "first_name": "Test",
            "last_name": "Devotee",
        }))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);
    response.json::<Value>()
}

/// Insert an active, verified account directly.
pub async fn create_user(app: &TestApp, username: &str, role: UserRole) -> User {
    app.state
        .db
        .user_repository
        .create(NewUser {
            email: format!("{}@example.org", username),
            username: username.to_string(),
            first_name: None,
            last_name: None,
            mobile: None,
            password_hash: hash_password(TEST_PASSWORD).expect("hash password"),
            role,
            status: UserStatus::Active,
            email_verified: true,
        })
        .await
        .expect("Failed to create test user")
}

/// Log in with username and password; returns the access token.
pub async fn login(app: &TestApp, username: &str, password: &str) -> String {
    let response = app
        .client()
        .post(&api_path("/auth/token"))
        .json(&json!({ "username": username, "password": password }))
        .await;
    response.assert_status_ok();
    response.json::<Value>()["access_token"]
        .as_str()
        .expect("access_token in login response")
        .to_string()
}

/// Create an active account with `role` and log it in.
pub async fn create_logged_in_user(app: &TestApp, username: &str, role: UserRole) -> TestUser {
    let user = create_user(app, username, role).await;
    let token = login(app, username, TEST_PASSWORD).await;
    TestUser { user, token }
}
