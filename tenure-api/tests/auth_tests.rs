/// Authentication and router-level integration tests
///
/// Run with: cargo test -p tenure-api --test auth_tests -- --test-threads=1

mod common;

use axum::http::{Method, StatusCode};
use common::{request, TestContext};
use serde_json::json;
use tenure_shared::models::user::UserRole;
use uuid::Uuid;

fn unique_email() -> String {
    format!("ada-{}@example.com", Uuid::new_v4())
}

#[tokio::test]
async fn test_health_reports_database() {
    let ctx = TestContext::new().await.unwrap();

    let (status, body) = ctx.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "connected");
    assert_eq!(body["migrations"]["is_up_to_date"], true);
}

#[tokio::test]
async fn test_security_headers_on_every_response() {
    use tower::Service as _;

    let ctx = TestContext::new().await.unwrap();
    let response = ctx
        .app
        .clone()
        .call(request(Method::GET, "/v1/auth/me", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
    assert_eq!(response.headers().get("cache-control").unwrap(), "no-store");
}

#[tokio::test]
async fn test_register_then_login() {
    let ctx = TestContext::new().await.unwrap();
    let email = unique_email();

    let (status, body) = ctx
        .post(
            "/v1/auth/register",
            None,
            json!({ "email": email, "password": "rotation2025", "name": "Ada" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["role"], "member");
    assert_eq!(body["token_type"], "Bearer");
    assert!(body["access_token"].is_string());
    assert!(body["refresh_token"].is_string());

    let (status, body) = ctx
        .post(
            "/v1/auth/login",
            None,
            json!({ "email": email.to_uppercase(), "password": "rotation2025" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let bearer = format!("Bearer {}", body["access_token"].as_str().unwrap());
    let (status, me) = ctx.get("/v1/auth/me", Some(&bearer)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], email.as_str());
    assert!(me.get("password_hash").is_none());
    assert!(me["last_login_at"].is_string());
}

#[tokio::test]
async fn test_register_rejects_duplicates_and_weak_input() {
    let ctx = TestContext::new().await.unwrap();
    let email = unique_email();
    let body = json!({ "email": email, "password": "rotation2025" });

    let (status, _) = ctx.post("/v1/auth/register", None, body.clone()).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, error) = ctx.post("/v1/auth/register", None, body).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["error"], "conflict");
    assert_eq!(error["message"], "Email already exists");

    let (status, error) = ctx
        .post(
            "/v1/auth/register",
            None,
            json!({ "email": unique_email(), "password": "short1" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error["details"][0]["field"], "password");

    let (status, error) = ctx
        .post(
            "/v1/auth/register",
            None,
            json!({ "email": "not-an-email", "password": "rotation2025" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error["details"][0]["field"], "email");
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let ctx = TestContext::new().await.unwrap();
    let email = unique_email();
    ctx.post(
        "/v1/auth/register",
        None,
        json!({ "email": email, "password": "rotation2025" }),
    )
    .await;

    let (wrong_status, wrong) = ctx
        .post(
            "/v1/auth/login",
            None,
            json!({ "email": email, "password": "rotation2026" }),
        )
        .await;
    let (unknown_status, unknown) = ctx
        .post(
            "/v1/auth/login",
            None,
            json!({ "email": unique_email(), "password": "rotation2025" }),
        )
        .await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong["message"], unknown["message"]);
}

#[tokio::test]
async fn test_refresh_picks_up_role_change() {
    let ctx = TestContext::new().await.unwrap();
    let email = unique_email();

    let (_, registered) = ctx
        .post(
            "/v1/auth/register",
            None,
            json!({ "email": email, "password": "rotation2025" }),
        )
        .await;
    let user_id: Uuid = registered["user_id"].as_str().unwrap().parse().unwrap();
    let refresh_token = registered["refresh_token"].as_str().unwrap().to_string();

    tenure_shared::models::user::User::set_role(&ctx.db, user_id, UserRole::Admin)
        .await
        .unwrap();

    let (status, refreshed) = ctx
        .post(
            "/v1/auth/refresh",
            None,
            json!({ "refresh_token": refresh_token }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(refreshed["role"], "admin");

    // An access token is not accepted as a refresh token
    let access_token = registered["access_token"].as_str().unwrap();
    let (status, _) = ctx
        .post(
            "/v1/auth/refresh",
            None,
            json!({ "refresh_token": access_token }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_routes_require_valid_token() {
    let ctx = TestContext::new().await.unwrap();

    let (status, body) = ctx.get("/v1/members/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = ctx.get("/v1/members/me", Some("Bearer not.a.jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = ctx.get("/v1/members/me", Some("Token abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_routes_reject_members() {
    let ctx = TestContext::new().await.unwrap();
    let member = ctx.create_user(UserRole::Member).await.unwrap();
    let admin = ctx.create_user(UserRole::Admin).await.unwrap();

    let (status, body) = ctx.get("/v1/admin/members", Some(&member.bearer())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, _) = ctx
        .get("/v1/business-rules/payout-readiness", Some(&member.bearer()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = ctx.get("/v1/admin/members?limit=5", Some(&admin.bearer())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["limit"], 5);
}
