/// Integration tests for the user endpoints
///
/// Registration, verification, login lockout, sessions and password reset,
/// driven through the full router.

mod common;

use axum::http::StatusCode;
use common::{TestContext, JWT_SECRET, PASSWORD};
use goaltrack_shared::auth::jwt::validate_access_token;
use goaltrack_shared::models::user::{User, MAX_LOGIN_ATTEMPTS};
use serde_json::json;

#[tokio::test]
async fn test_register_returns_sanitized_user() {
    let ctx = TestContext::new();

    let response = ctx.register("ada", "Ada@Example.com", PASSWORD).await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["success"], true);

    let data = &response.body["data"];
    assert_eq!(data["username"], "ada");
    assert_eq!(data["email"], "ada@example.com");
    assert_eq!(data["account_status"], "PENDING_VERIFICATION");
    assert_eq!(data["email_verified"], false);
    assert!(data.get("password_hash").is_none());
    assert!(data.get("salt").is_none());
    assert!(data["verification_token"].is_string());
}

#[tokio::test]
async fn test_register_hides_token_unless_exposed() {
    let ctx = TestContext::with_config(|config| config.auth.expose_one_time_tokens = false);

    let response = ctx.register("ada", "ada@example.com", PASSWORD).await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert!(response.body["data"].get("verification_token").is_none());
}

#[tokio::test]
async fn test_register_rejects_weak_password() {
    let ctx = TestContext::new();

    let response = ctx.register("ada", "ada@example.com", "password").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["success"], false);
    assert_eq!(response.body["details"][0]["field"], "password");
}

#[tokio::test]
async fn test_register_rejects_invalid_fields() {
    let ctx = TestContext::new();

    let response = ctx.register("a", "not-an-email", PASSWORD).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let fields: Vec<_> = response.body["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(fields, vec!["email", "username"]);
}

#[tokio::test]
async fn test_malformed_json_uses_error_envelope() {
    let ctx = TestContext::new();

    let response = ctx
        .post("/api/users/create", json!({ "username": "ada" }), None)
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["success"], false);
    assert_eq!(response.body["error"], "bad_request");
}

#[tokio::test]
async fn test_duplicate_email_and_username_conflict() {
    let ctx = TestContext::new();
    ctx.register("ada", "ada@example.com", PASSWORD).await;

    let same_email = ctx.register("grace", "ADA@example.com", PASSWORD).await;
    assert_eq!(same_email.status, StatusCode::CONFLICT);
    assert_eq!(same_email.body["message"], "User with this email already exists");

    let same_username = ctx.register("ada", "other@example.com", PASSWORD).await;
    assert_eq!(same_username.status, StatusCode::CONFLICT);
    assert_eq!(same_username.body["message"], "Username is already taken");
}

#[tokio::test]
async fn test_unverified_user_cannot_log_in() {
    let ctx = TestContext::new();
    ctx.register("ada", "ada@example.com", PASSWORD).await;

    let response = ctx
        .post(
            "/api/users/login",
            json!({ "email": "ada@example.com", "password": PASSWORD }),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.body["error"], "email_not_verified");
}

#[tokio::test]
async fn test_verification_token_is_single_use() {
    let ctx = TestContext::new();
    let created = ctx.register("ada", "ada@example.com", PASSWORD).await;
    let token = created.body["data"]["verification_token"].as_str().unwrap().to_string();

    let first = ctx
        .post("/api/users/verify-email", json!({ "token": token }), None)
        .await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["data"]["account_status"], "ACTIVE");
    assert_eq!(first.body["data"]["email_verified"], true);

    let second = ctx
        .post("/api/users/verify-email", json!({ "token": token }), None)
        .await;
    assert_eq!(second.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_sets_session_cookies() {
    let ctx = TestContext::new();
    let session = ctx.signed_in_user("ada").await;

    assert!(session.cookie.contains("token="));
    assert!(session.cookie.contains("refreshToken="));

    let me = ctx.get("/api/users/me", Some(&session.cookie)).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["data"]["user_id"], session.user_id.to_string());
    assert!(me.body["data"]["last_login"].is_string());
}

#[tokio::test]
async fn test_bearer_token_is_accepted() {
    let ctx = TestContext::new();
    let session = ctx.signed_in_user("ada").await;
    let access = session
        .cookie
        .split("; ")
        .find_map(|pair| pair.strip_prefix("token="))
        .unwrap()
        .to_string();

    let request = axum::http::Request::builder()
        .uri("/api/users/me")
        .header("authorization", format!("Bearer {}", access))
        .body(axum::body::Body::empty())
        .unwrap();
    let response = ctx.send(request).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_me_requires_session() {
    let ctx = TestContext::new();

    let response = ctx.get("/api/users/me", None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["success"], false);

    let response = ctx.get("/api/users/me", Some("token=garbage")).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_wrong_password_is_unauthorized() {
    let ctx = TestContext::new();
    let session = ctx.signed_in_user("ada").await;

    let response = ctx
        .post(
            "/api/users/login",
            json!({ "email": session.email, "password": "Wrong#123" }),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let unknown = ctx
        .post(
            "/api/users/login",
            json!({ "email": "nobody@example.com", "password": PASSWORD }),
            None,
        )
        .await;
    assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown.body["message"], response.body["message"]);
}

#[tokio::test]
async fn test_lockout_after_failed_logins() {
    let ctx = TestContext::new();
    let session = ctx.signed_in_user("ada").await;

    for _ in 0..MAX_LOGIN_ATTEMPTS {
        let response = ctx
            .post(
                "/api/users/login",
                json!({ "email": session.email, "password": "Wrong#123" }),
                None,
            )
            .await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    }

    // Correct password, but the account is now locked
    let response = ctx
        .post(
            "/api/users/login",
            json!({ "email": session.email, "password": PASSWORD }),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.body["error"], "account_locked");
}

#[tokio::test]
async fn test_successful_login_resets_failures() {
    let ctx = TestContext::new();
    let session = ctx.signed_in_user("ada").await;

    for _ in 0..MAX_LOGIN_ATTEMPTS - 1 {
        ctx.post(
            "/api/users/login",
            json!({ "email": session.email, "password": "Wrong#123" }),
            None,
        )
        .await;
    }
    ctx.login(&session.email, PASSWORD).await;

    let user = User::find_by_id(&ctx.store, session.user_id).await.unwrap().unwrap();
    assert_eq!(user.login_attempts, 0);
}

#[tokio::test]
async fn test_password_reset_unlocks_account() {
    let ctx = TestContext::new();
    let session = ctx.signed_in_user("ada").await;

    for _ in 0..MAX_LOGIN_ATTEMPTS {
        ctx.post(
            "/api/users/login",
            json!({ "email": session.email, "password": "Wrong#123" }),
            None,
        )
        .await;
    }

    let forgot = ctx
        .post("/api/users/forgot-password", json!({ "email": session.email }), None)
        .await;
    assert_eq!(forgot.status, StatusCode::OK);
    let token = forgot.body["data"]["token"].as_str().unwrap().to_string();

    let weak = ctx
        .post(
            "/api/users/reset-password",
            json!({ "token": token, "newPassword": "short" }),
            None,
        )
        .await;
    assert_eq!(weak.status, StatusCode::BAD_REQUEST);

    let reset = ctx
        .post(
            "/api/users/reset-password",
            json!({ "token": token, "newPassword": "Brand#New456" }),
            None,
        )
        .await;
    assert_eq!(reset.status, StatusCode::OK, "{}", reset.body);

    let session = ctx.login(&session.email, "Brand#New456").await;
    assert!(!session.cookie.is_empty());

    let reused = ctx
        .post(
            "/api/users/reset-password",
            json!({ "token": token, "newPassword": "Other#Pass789" }),
            None,
        )
        .await;
    assert_eq!(reused.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_forgot_password_does_not_enumerate() {
    let ctx = TestContext::new();

    let response = ctx
        .post("/api/users/forgot-password", json!({ "email": "nobody@example.com" }), None)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["success"], true);
    assert!(response.body.get("data").is_none());
}

#[tokio::test]
async fn test_refresh_issues_new_access_cookie() {
    let ctx = TestContext::new();
    let session = ctx.signed_in_user("ada").await;

    let response = ctx
        .request(axum::http::Method::POST, "/api/users/refresh", None, Some(&session.cookie))
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.body);

    let access = response.cookie("token").unwrap();
    assert!(!access.is_empty());

    let me = ctx.get("/api/users/me", Some(&format!("token={}", access))).await;
    assert_eq!(me.status, StatusCode::OK);
}

#[tokio::test]
async fn test_refresh_uses_current_username() {
    let ctx = TestContext::new();
    let session = ctx.signed_in_user("ada").await;

    let renamed = ctx
        .put("/api/users/me", json!({ "username": "lovelace" }), Some(&session.cookie))
        .await;
    assert_eq!(renamed.status, StatusCode::OK, "{}", renamed.body);

    // Refresh token issued before the rename still carries "ada"
    let response = ctx
        .request(axum::http::Method::POST, "/api/users/refresh", None, Some(&session.cookie))
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.body);

    let access = response.cookie("token").unwrap();
    let claims = validate_access_token(&access, JWT_SECRET).unwrap();
    assert_eq!(claims.sub, session.user_id);
    assert_eq!(claims.username, "lovelace");
}

#[tokio::test]
async fn test_refresh_rejects_access_token() {
    let ctx = TestContext::new();
    let session = ctx.signed_in_user("ada").await;
    let access = session
        .cookie
        .split("; ")
        .find_map(|pair| pair.strip_prefix("token="))
        .unwrap()
        .to_string();

    let response = ctx
        .post("/api/users/refresh", json!({ "refreshToken": access }), None)
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let missing = ctx
        .request(axum::http::Method::POST, "/api/users/refresh", None, None)
        .await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_clears_cookies() {
    let ctx = TestContext::new();
    let session = ctx.signed_in_user("ada").await;

    let response = ctx
        .request(axum::http::Method::POST, "/api/users/logout", None, Some(&session.cookie))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.cookie("token").as_deref(), Some(""));
    assert_eq!(response.cookie("refreshToken").as_deref(), Some(""));

    // Logout also works without a session
    let anonymous = ctx
        .request(axum::http::Method::POST, "/api/users/logout", None, None)
        .await;
    assert_eq!(anonymous.status, StatusCode::OK);
}

#[tokio::test]
async fn test_update_me_renames_user() {
    let ctx = TestContext::new();
    let session = ctx.signed_in_user("ada").await;
    ctx.signed_in_user("grace").await;

    let taken = ctx
        .put("/api/users/me", json!({ "username": "grace" }), Some(&session.cookie))
        .await;
    assert_eq!(taken.status, StatusCode::CONFLICT);

    let response = ctx
        .put(
            "/api/users/me",
            json!({ "username": "lovelace", "profile_data": { "displayName": "Ada" } }),
            Some(&session.cookie),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.body);
    assert_eq!(response.body["data"]["username"], "lovelace");
    assert_eq!(response.body["data"]["profile_data"]["displayName"], "Ada");
    assert!(response.cookie("token").is_some());

    assert!(User::find_by_username(&ctx.store, "ada").await.unwrap().is_none());
    let renamed = User::find_by_username(&ctx.store, "lovelace").await.unwrap().unwrap();
    assert_eq!(renamed.user_id, session.user_id);
}

#[tokio::test]
async fn test_delete_me_removes_account_and_goals() {
    let ctx = TestContext::new();
    let session = ctx.signed_in_user("ada").await;

    let goal = ctx
        .post(
            "/api/goals",
            json!({ "title": "Run 5k", "category": "fitness" }),
            Some(&session.cookie),
        )
        .await;
    assert_eq!(goal.status, StatusCode::CREATED);

    let response = ctx.delete("/api/users/me", Some(&session.cookie)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.cookie("token").as_deref(), Some(""));

    assert!(User::find_by_id(&ctx.store, session.user_id).await.unwrap().is_none());
    assert!(User::find_by_email(&ctx.store, &session.email).await.unwrap().is_none());

    let goals = goaltrack_shared::models::goal::Goal::find_by_user_id(&ctx.store, session.user_id, 100)
        .await
        .unwrap();
    assert!(goals.is_empty());

    // The old access token still verifies but the account is gone
    let me = ctx.get("/api/users/me", Some(&session.cookie)).await;
    assert_eq!(me.status, StatusCode::NOT_FOUND);

    let orphan = ctx
        .post(
            "/api/goals",
            json!({ "title": "Run 10k", "category": "fitness" }),
            Some(&session.cookie),
        )
        .await;
    assert_eq!(orphan.status, StatusCode::UNAUTHORIZED, "{}", orphan.body);
    let goals = goaltrack_shared::models::goal::Goal::find_by_user_id(&ctx.store, session.user_id, 100)
        .await
        .unwrap();
    assert!(goals.is_empty());
}
