//! User administration integration tests.
//!
//! Run with: `cargo test -p veda-api --test users_test`
//! Requires Docker for testcontainers (Postgres).

mod helpers;

use axum::http::StatusCode;
use helpers::auth::{create_logged_in_user, create_user, login, TEST_PASSWORD};
use helpers::{api_path, setup_test_app};
use serde_json::{json, Value};
use veda_api::services::ensure_initial_admin;
use veda_core::{AppError, Config, UserRole};

#[tokio::test]
async fn test_admin_creates_users() {
    let app = setup_test_app().await;
    let admin = create_logged_in_user(&app, "admin", UserRole::Admin).await;

    let response = app
        .client()
        .post(&api_path("/users"))
        .authorization_bearer(&admin.token)
        .json(&json!({
            "username": "radharani",
            "email": "radharani@example.org",
            "password": "Seva-2024!ok",
            "first_name": "Radha",
            "last_name": "Dasi",
            "role": "uploader",
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let created = response.json::<Value>();
    assert_eq!(created["role"], "uploader");
    assert_eq!(created["status"], "active");
    assert_eq!(created["email_verified"], true);
    assert_eq!(created["full_name"], "Radha Dasi");
    assert!(created.get("password_hash").is_none());

    login(&app, "radharani", "Seva-2024!ok").await;

    // Without a password one is generated and never returned.
    let response = app
        .client()
        .post(&api_path("/users"))
        .authorization_bearer(&admin.token)
        .json(&json!({
            "username": "lalita",
            "email": "lalita@example.org",
            "role": "viewer",
            "status": "pending",
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let created = response.json::<Value>();
    assert_eq!(created["status"], "pending");
    assert_eq!(created["email_verified"], false);
    assert!(created.get("password").is_none());

    let response = app
        .client()
        .post(&api_path("/users"))
        .authorization_bearer(&admin.token)
        .json(&json!({
            "username": "lalita",
            "email": "other@example.org",
            "role": "viewer",
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_user_validates_fields() {
    let app = setup_test_app().await;
    let admin = create_logged_in_user(&app, "admin", UserRole::Admin).await;

    let response = app
        .client()
        .post(&api_path("/users"))
        .authorization_bearer(&admin.token)
        .json(&json!({
            "username": "x",
            "email": "not-an-email",
            "password": TEST_PASSWORD,
            "role": "viewer",
        }))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_user_routes_require_admin() {
    let app = setup_test_app().await;
    let editor = create_logged_in_user(&app, "editor", UserRole::Editor).await;

    let response = app
        .client()
        .get(&api_path("/users"))
        .authorization_bearer(&editor.token)
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    let response = app
        .client()
        .get(&api_path(&format!("/users/{}", editor.user.id)))
        .authorization_bearer(&editor.token)
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_list_get_and_update_user() {
    let app = setup_test_app().await;
    let admin = create_logged_in_user(&app, "admin", UserRole::Admin).await;
    let viewer = create_user(&app, "sudama", UserRole::Viewer).await;
    create_user(&app, "uddhava", UserRole::Uploader).await;

    let response = app
        .client()
        .get(&api_path("/users"))
        .authorization_bearer(&admin.token)
        .await;
    response.assert_status_ok();
    let list = response.json::<Value>();
    assert_eq!(list["total"], 3);
    assert_eq!(list["items"].as_array().unwrap().len(), 3);

    let response = app
        .client()
        .get(&api_path("/users"))
        .add_query_param("q", "sudam")
        .authorization_bearer(&admin.token)
        .await;
    let list = response.json::<Value>();
    assert_eq!(list["total"], 1);
    assert_eq!(list["items"][0]["username"], "sudama");

    let response = app
        .client()
        .get(&api_path("/users"))
        .add_query_param("role", "uploader")
        .authorization_bearer(&admin.token)
        .await;
    assert_eq!(response.json::<Value>()["items"][0]["username"], "uddhava");

    let response = app
        .client()
        .get(&api_path(&format!("/users/{}", viewer.id)))
        .authorization_bearer(&admin.token)
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["email"], "sudama@example.org");

    let response = app
        .client()
        .patch(&api_path(&format!("/users/{}", viewer.id)))
        .authorization_bearer(&admin.token)
        .json(&json!({ "role": "editor", "last_name": "Vipra" }))
        .await;
    response.assert_status_ok();
    let updated = response.json::<Value>();
    assert_eq!(updated["role"], "editor");
    assert_eq!(updated["last_name"], "Vipra");
    assert_eq!(updated["status"], "active");

    let response = app
        .client()
        .get(&api_path("/users/00000000-0000-0000-0000-000000000000"))
        .authorization_bearer(&admin.token)
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["error"], "User not found");
}

#[tokio::test]
async fn test_last_admin_is_protected() {
    let app = setup_test_app().await;
    let admin = create_logged_in_user(&app, "admin", UserRole::Admin).await;

    let response = app
        .client()
        .patch(&api_path(&format!("/users/{}", admin.user.id)))
        .authorization_bearer(&admin.token)
        .json(&json!({ "role": "viewer" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<Value>()["error"],
        "Cannot demote or deactivate the last admin user"
    );

    let response = app
        .client()
        .delete(&api_path(&format!("/users/{}", admin.user.id)))
        .authorization_bearer(&admin.token)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<Value>()["error"],
        "You cannot delete your own account"
    );

    let err = app
        .state
        .db
        .user_repository
        .delete(admin.user.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}

#[tokio::test]
async fn test_delete_user() {
    let app = setup_test_app().await;
    let admin = create_logged_in_user(&app, "admin", UserRole::Admin).await;
    let second_admin = create_user(&app, "second_admin", UserRole::Admin).await;

    let response = app
        .client()
        .delete(&api_path(&format!("/users/{}", second_admin.id)))
        .authorization_bearer(&admin.token)
        .await;
    response.assert_status(StatusCode::NO_CONTENT);

    let response = app
        .client()
        .delete(&api_path(&format!("/users/{}", second_admin.id)))
        .authorization_bearer(&admin.token)
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_initial_admin_bootstrap() {
    let app = setup_test_app().await;
    let users = &app.state.db.user_repository;

    // Nothing happens without credentials.
    assert!(ensure_initial_admin(&app.state.config, users)
        .await
        .unwrap()
        .is_none());

    let mut settings = (*app.state.config.0).clone();
    settings.admin_username = "founder".to_string();
    settings.admin_email = Some("founder@example.org".to_string());
    settings.admin_password = Some(TEST_PASSWORD.to_string());
    let config = Config(Box::new(settings));

    let admin = ensure_initial_admin(&config, users)
        .await
        .unwrap()
        .expect("admin created on an empty table");
    assert_eq!(admin.role, UserRole::Admin);
    assert!(admin.email_verified);

    // Second start: accounts exist, nothing is created.
    assert!(ensure_initial_admin(&config, users).await.unwrap().is_none());
    assert_eq!(users.count_all().await.unwrap(), 1);

    login(&app, "founder", TEST_PASSWORD).await;
}
