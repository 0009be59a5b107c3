//! API integration tests for accounts, projects and error responses.
//!
//! Tests verify:
//! - Registration and login
//! - Project creation, lookup, listing and update
//! - Error bodies for malformed JSON, wrong types and failed validation
//! - Health endpoint

use axum::http::{header, Method, StatusCode};
use serde_json::json;

use super::test_utils::{
    body_bytes, body_json, memory_app, new_project, new_user, raw_request, register_and_login,
    request, send,
};

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = memory_app();

    let response = send(&app, request(Method::GET, "/health", None, None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["store"], "ok");
}

// =============================================================================
// Users
// =============================================================================

#[tokio::test]
async fn test_register_returns_created_without_body() {
    let app = memory_app();

    let response = send(&app, request(Method::POST, "/users", Some(&new_user("alice")), None)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(body_bytes(response).await.is_empty());
}

#[tokio::test]
async fn test_register_validation_errors() {
    let app = memory_app();
    let payload = json!({"username": "ab", "email": "nope", "password": "123"});

    let response = send(&app, request(Method::POST, "/users", Some(&payload), None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["code"], "validation-error");
    assert_eq!(body["details"]["username"], "min");
    assert_eq!(body["details"]["email"], "email");
    assert_eq!(body["details"]["password"], "min");
}

#[tokio::test]
async fn test_register_duplicate_username() {
    let app = memory_app();

    let response = send(&app, request(Method::POST, "/users", Some(&new_user("alice")), None)).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = send(&app, request(Method::POST, "/users", Some(&new_user("alice")), None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["code"], "validation-error");
    assert_eq!(body["details"]["username"], "unique");
}

#[tokio::test]
async fn test_json_type_error_names_field() {
    let app = memory_app();
    let payload = json!({"username": 123});

    let response = send(&app, request(Method::POST, "/users", Some(&payload), None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["code"], "json-type-error");
    assert_eq!(body["details"]["field"], "username");
}

#[tokio::test]
async fn test_json_syntax_error_reports_offset() {
    let app = memory_app();

    let response = send(&app, raw_request(Method::POST, "/users", "{\"username\": }")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["code"], "json-syntax-error");
    let offset: usize = body["details"]["offset"].as_str().unwrap().parse().unwrap();
    assert!(offset > 0);
}

#[tokio::test]
async fn test_login_returns_user_data_and_cookie() {
    let app = memory_app();
    send(&app, request(Method::POST, "/users", Some(&new_user("alice")), None)).await;

    // The email works as well as the username
    let credentials = json!({
        "usernameOrEmail": "alice@example.com",
        "password": "correct horse",
    });
    let response = send(&app, request(Method::POST, "/login", Some(&credentials), None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(set_cookie.starts_with("sessionToken="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains(&format!("Max-Age={}", 30 * 24 * 60 * 60)));

    let body = body_json(response).await;
    assert_eq!(body, json!({"username": "alice", "email": "alice@example.com"}));
}

#[tokio::test]
async fn test_login_wrong_password() {
    let app = memory_app();
    send(&app, request(Method::POST, "/users", Some(&new_user("alice")), None)).await;

    let credentials = json!({"usernameOrEmail": "alice", "password": "wrong horse"});
    let response = send(&app, request(Method::POST, "/login", Some(&credentials), None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get(header::SET_COOKIE).is_none());

    let body = body_json(response).await;
    assert_eq!(body["code"], "unauthenticated-error");
}

#[tokio::test]
async fn test_login_unknown_user() {
    let app = memory_app();

    let credentials = json!({"usernameOrEmail": "nobody", "password": "correct horse"});
    let response = send(&app, request(Method::POST, "/login", Some(&credentials), None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Projects
// =============================================================================

#[tokio::test]
async fn test_create_project_requires_session() {
    let app = memory_app();

    let payload = new_project("Tile server", &["rust"]);
    let response = send(&app, request(Method::POST, "/projects", Some(&payload), None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_json(response).await;
    assert_eq!(body["code"], "unauthenticated-error");
}

#[tokio::test]
async fn test_project_lifecycle() {
    let app = memory_app();
    let cookie = register_and_login(&app, "alice").await;

    // Create
    let payload = new_project("Tile server", &["rust", "imaging"]);
    let response = send(
        &app,
        request(Method::POST, "/projects", Some(&payload), Some(&cookie)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let location = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();

    let summary = body_json(response).await;
    let id = summary["id"].as_u64().unwrap();
    assert_eq!(location, format!("/projects/{id}"));
    assert_eq!(summary["name"], "Tile server");
    assert_eq!(summary["skills"], json!(["rust"]));
    assert!(summary.get("longDescription").is_none());

    // Get
    let response = send(&app, request(Method::GET, &location, None, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let details = body_json(response).await;
    assert_eq!(details["fullDescription"], "x".repeat(250));
    assert_eq!(details["githubLink"], "https://github.com/example/project");

    // Update
    let update = new_project("Tile streamer", &["rust"]);
    let response = send(
        &app,
        request(Method::POST, &location, Some(&update), Some(&cookie)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(&app, request(Method::GET, &location, None, None)).await;
    let details = body_json(response).await;
    assert_eq!(details["name"], "Tile streamer");
    assert_eq!(details["tags"], json!(["rust"]));
}

#[tokio::test]
async fn test_create_project_validation() {
    let app = memory_app();
    let cookie = register_and_login(&app, "alice").await;

    let payload = json!({
        "name": "abc",
        "tags": [],
        "shortDescription": "short",
        "longDescription": "too short",
    });
    let response = send(
        &app,
        request(Method::POST, "/projects", Some(&payload), Some(&cookie)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["code"], "validation-error");
    assert_eq!(body["details"]["name"], "min");
    assert_eq!(body["details"]["tags"], "required");
    assert_eq!(body["details"]["shortDescription"], "min");
    assert_eq!(body["details"]["longDescription"], "min");
    assert_eq!(body["details"]["githubLink"], "required");
}

#[tokio::test]
async fn test_project_id_must_be_numeric() {
    let app = memory_app();

    let response = send(&app, request(Method::GET, "/projects/abc", None, None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["code"], "validation-error");
    assert_eq!(body["details"]["projectId"], "numeric");
}

#[tokio::test]
async fn test_undecodable_project_id_is_numeric_error() {
    let app = memory_app();

    let response = send(&app, request(Method::GET, "/projects/%FF", None, None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["code"], "validation-error");
    assert_eq!(body["details"]["projectId"], "numeric");
}

#[tokio::test]
async fn test_missing_project_is_empty_404() {
    let app = memory_app();

    let response = send(&app, request(Method::GET, "/projects/999", None, None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_bytes(response).await.is_empty());
}

#[tokio::test]
async fn test_update_missing_project() {
    let app = memory_app();
    let cookie = register_and_login(&app, "alice").await;

    let update = new_project("Tile streamer", &["rust"]);
    let response = send(
        &app,
        request(Method::POST, "/projects/42", Some(&update), Some(&cookie)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_projects_paging_and_tags() {
    let app = memory_app();
    let cookie = register_and_login(&app, "alice").await;

    for (name, tag) in [("First project", "rust"), ("Second project", "go"), ("Third project", "rust")] {
        let payload = new_project(name, &[tag]);
        let response = send(
            &app,
            request(Method::POST, "/projects", Some(&payload), Some(&cookie)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    // Newest first
    let response = send(&app, request(Method::GET, "/projects", None, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_json(response).await;
    let names: Vec<&str> = page
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Third project", "Second project", "First project"]);

    // Offset counts pages
    let response = send(
        &app,
        request(Method::GET, "/projects?pageSize=2&pageOffset=1", None, None),
    )
    .await;
    let page = body_json(response).await;
    assert_eq!(page.as_array().unwrap().len(), 1);
    assert_eq!(page[0]["name"], "First project");

    // Tag filter
    let response = send(&app, request(Method::GET, "/projects?tags=go", None, None)).await;
    let page = body_json(response).await;
    assert_eq!(page.as_array().unwrap().len(), 1);
    assert_eq!(page[0]["name"], "Second project");

    // Skill filter combines with the tag filter
    let response = send(
        &app,
        request(Method::GET, "/projects?skills=rust&tags=go", None, None),
    )
    .await;
    let page = body_json(response).await;
    assert_eq!(page.as_array().unwrap().len(), 1);
    assert_eq!(page[0]["name"], "Second project");

    let response = send(&app, request(Method::GET, "/projects?skills=cobol", None, None)).await;
    assert!(body_json(response).await.as_array().unwrap().is_empty());

    // Unparseable numbers fall back to defaults
    let response = send(
        &app,
        request(Method::GET, "/projects?pageSize=lots&pageOffset=-3", None, None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 3);
}
