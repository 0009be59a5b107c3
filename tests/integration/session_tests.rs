//! Session and middleware integration tests.
//!
//! Tests verify:
//! - Logout revokes every session of the user
//! - Cookies are only looked up for matched routes and well-formed tokens
//! - Store failures surface as `500 unknown-error`
//! - Request ids are attached to dispatched responses only
//! - Health reports an unreachable store

use std::sync::Arc;

use axum::http::{header, Method, StatusCode};
use serde_json::json;
use uuid::Uuid;

use collab_server::server::REQUEST_ID_HEADER;

use super::test_utils::{
    body_bytes, body_json, memory_app, new_project, register_and_login, request, send, test_app,
    CountingStore, FailingStore,
};

// =============================================================================
// Logout
// =============================================================================

#[tokio::test]
async fn test_logout_revokes_every_session() {
    let app = memory_app();
    let first = register_and_login(&app, "alice").await;

    let credentials = json!({"usernameOrEmail": "alice", "password": "correct horse"});
    let response = send(&app, request(Method::POST, "/login", Some(&credentials), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let second = super::test_utils::session_cookie_of(&response).unwrap();
    assert_ne!(first, second);

    let response = send(&app, request(Method::POST, "/logout", None, Some(&first))).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let cleared = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(cleared.contains("Max-Age=0"));

    // Both tokens stop authenticating
    for cookie in [&first, &second] {
        let payload = new_project("Tile server", &["rust"]);
        let response = send(
            &app,
            request(Method::POST, "/projects", Some(&payload), Some(cookie)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn test_logout_without_session() {
    let app = memory_app();

    let response = send(&app, request(Method::POST, "/logout", None, None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "unauthenticated-error");
}

#[tokio::test]
async fn test_unknown_token_is_unauthenticated() {
    let app = memory_app();
    let cookie = format!("sessionToken={}", Uuid::new_v4());

    let response = send(&app, request(Method::POST, "/logout", None, Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Middleware Scope
// =============================================================================

#[tokio::test]
async fn test_unmatched_path_skips_middleware() {
    let store = CountingStore::new();
    let app = test_app(Arc::new(store.clone()));
    let cookie = format!("sessionToken={}", Uuid::new_v4());

    let response = send(&app, request(Method::GET, "/nonexistent", None, Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.headers().get(&REQUEST_ID_HEADER).is_none());
    assert!(body_bytes(response).await.is_empty());
    assert_eq!(store.get_count(), 0);
}

#[tokio::test]
async fn test_unmatched_method_skips_middleware() {
    let store = CountingStore::new();
    let app = test_app(Arc::new(store.clone()));
    let cookie = format!("sessionToken={}", Uuid::new_v4());

    let response = send(&app, request(Method::DELETE, "/projects", None, Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert!(response.headers().get(&REQUEST_ID_HEADER).is_none());
    assert_eq!(store.get_count(), 0);
}

#[tokio::test]
async fn test_unmatched_method_with_failing_store() {
    let app = test_app(Arc::new(FailingStore));
    let cookie = format!("sessionToken={}", Uuid::new_v4());

    let response = send(
        &app,
        request(Method::DELETE, "/projects/1", None, Some(&cookie)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_malformed_cookie_is_not_looked_up() {
    let store = CountingStore::new();
    let app = test_app(Arc::new(store.clone()));

    let response = send(
        &app,
        request(Method::POST, "/logout", None, Some("sessionToken=not-a-token")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(store.get_count(), 0);
}

#[tokio::test]
async fn test_well_formed_cookie_is_looked_up_once() {
    let store = CountingStore::new();
    let app = test_app(Arc::new(store.clone()));
    let cookie = format!("theme=dark; sessionToken={}", Uuid::new_v4());

    let response = send(&app, request(Method::GET, "/projects", None, Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(store.get_count(), 1);
}

#[tokio::test]
async fn test_request_id_header() {
    let app = memory_app();

    let response = send(&app, request(Method::GET, "/projects", None, None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let request_id = response
        .headers()
        .get(&REQUEST_ID_HEADER)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(Uuid::parse_str(request_id).is_ok());

    // Error responses from dispatched routes carry it too
    let response = send(&app, request(Method::GET, "/projects/999", None, None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.headers().get(&REQUEST_ID_HEADER).is_some());
}

#[tokio::test]
async fn test_health_is_outside_middleware() {
    let store = CountingStore::new();
    let app = test_app(Arc::new(store.clone()));
    let cookie = format!("sessionToken={}", Uuid::new_v4());

    let response = send(&app, request(Method::GET, "/health", None, Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(&REQUEST_ID_HEADER).is_none());
    assert_eq!(store.get_count(), 0);
}

// =============================================================================
// Store Failures
// =============================================================================

#[tokio::test]
async fn test_store_failure_is_unknown_error() {
    let app = test_app(Arc::new(FailingStore));
    let cookie = format!("sessionToken={}", Uuid::new_v4());

    let response = send(&app, request(Method::GET, "/projects", None, Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = body_json(response).await;
    assert_eq!(body, json!({"code": "unknown-error", "details": {}}));
}

#[tokio::test]
async fn test_store_failure_without_cookie_is_not_consulted() {
    let app = test_app(Arc::new(FailingStore));

    let response = send(&app, request(Method::GET, "/projects", None, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_health_reports_unreachable_store() {
    let app = test_app(Arc::new(FailingStore));

    let response = send(&app, request(Method::GET, "/health", None, None)).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = body_json(response).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["store"], "unreachable");
}

#[tokio::test]
async fn test_login_with_failing_store() {
    let app = test_app(Arc::new(FailingStore));

    let response = send(
        &app,
        request(
            Method::POST,
            "/users",
            Some(&super::test_utils::new_user("alice")),
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let credentials = json!({"usernameOrEmail": "alice", "password": "correct horse"});
    let response = send(&app, request(Method::POST, "/login", Some(&credentials), None)).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
}
