//! Tests for profile read, update and delete

mod common;

use serde_json::{json, Value};

use common::{create_test_server, register_and_login};

/// Test: the identity view carries profile fields but never OTP state
#[tokio::test]
async fn test_me_returns_profile_without_otp_state() {
    let (server, notifier, _state) = create_test_server();

    let token = register_and_login(&server, &notifier, "alice@example.com").await;

    let response = server
        .get("/api/users/me")
        .add_cookie(cookie::Cookie::new("token", token))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["user"]["email"], "alice@example.com");
    assert_eq!(body["user"]["verified"], true);
    assert!(body["user"]["addresses"].as_array().unwrap().is_empty());
    assert!(body["user"]["sub_users"].as_array().unwrap().is_empty());
    assert!(body["user"].get("otp").is_none());
    assert!(body["user"].get("otp_code").is_none());
}

/// Test: fetching the profile greets the user and rolls the session forward
#[tokio::test]
async fn test_get_profile_refreshes_session() {
    let (server, notifier, _state) = create_test_server();

    let token = register_and_login(&server, &notifier, "alice@example.com").await;

    let response = server
        .get("/api/users/profile")
        .add_cookie(cookie::Cookie::new("token", token))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["message"], "Welcome back alice@example.com");
    assert!(!body["token"].as_str().unwrap().is_empty());

    // A fresh cookie came back with the response
    let fresh = response.maybe_cookie("token").expect("No session cookie");
    assert!(!fresh.value().is_empty());

    // The reissued token keeps working
    let response = server
        .get("/api/users/me")
        .add_cookie(cookie::Cookie::new("token", fresh.value().to_string()))
        .await;
    assert_eq!(response.status_code(), 200);
}

/// Test: profile updates apply only the fields that were sent
#[tokio::test]
async fn test_update_profile_partial_fields() {
    let (server, notifier, _state) = create_test_server();

    let token = register_and_login(&server, &notifier, "alice@example.com").await;

    let response = server
        .put("/api/users/profile")
        .add_cookie(cookie::Cookie::new("token", token.clone()))
        .json(&json!({ "name": "Alice", "number": "5551234" }))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["message"], "Profile updated successfully");
    assert_eq!(body["user"]["name"], "Alice");
    assert_eq!(body["user"]["number"], "5551234");
    assert_eq!(body["user"]["email"], "alice@example.com");

    // The greeting now uses the name
    let response = server
        .get("/api/users/profile")
        .add_cookie(cookie::Cookie::new("token", token))
        .await;
    let body: Value = response.json();
    assert_eq!(body["message"], "Welcome back Alice");
}

/// Test: a changed email is normalized before it is stored
#[tokio::test]
async fn test_update_profile_normalizes_email() {
    let (server, notifier, _state) = create_test_server();

    let token = register_and_login(&server, &notifier, "alice@example.com").await;

    let response = server
        .put("/api/users/profile")
        .add_cookie(cookie::Cookie::new("token", token))
        .json(&json!({ "email": "  New.Alice@Example.COM " }))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["user"]["email"], "new.alice@example.com");
}

/// Test: changing email to one that belongs to another account conflicts
#[tokio::test]
async fn test_update_profile_email_conflict() {
    let (server, notifier, _state) = create_test_server();

    register_and_login(&server, &notifier, "bob@example.com").await;
    let token = register_and_login(&server, &notifier, "alice@example.com").await;

    let response = server
        .put("/api/users/profile")
        .add_cookie(cookie::Cookie::new("token", token))
        .json(&json!({ "email": "bob@example.com" }))
        .await;

    assert_eq!(response.status_code(), 409);
    let body: Value = response.json();
    assert_eq!(
        body["message"],
        "Email already exists. Please use a different email."
    );
}

/// Test: deleting the profile removes the account and ends the session
#[tokio::test]
async fn test_delete_profile() {
    let (server, notifier, _state) = create_test_server();

    let token = register_and_login(&server, &notifier, "alice@example.com").await;

    let response = server
        .delete("/api/users/profile")
        .add_cookie(cookie::Cookie::new("token", token.clone()))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["message"], "User profile deleted successfully");

    // The old session no longer resolves to an account
    let response = server
        .get("/api/users/me")
        .add_cookie(cookie::Cookie::new("token", token))
        .await;
    assert_eq!(response.status_code(), 401);
    let body: Value = response.json();
    assert_eq!(body["message"], "User is not verified");

    // The email is free to register again
    let response = server
        .post("/api/users/register")
        .json(&json!({ "email": "alice@example.com" }))
        .await;
    assert_eq!(response.status_code(), 200);
}
