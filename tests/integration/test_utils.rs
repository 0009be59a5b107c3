//! Shared helpers for integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use collab_server::session::SESSION_LIFETIME;
use collab_server::{
    create_app, AppServices, KeyValueStore, MemoryStore, PageLimits, RouterConfig, StoreError,
};

// =============================================================================
// Store Doubles
// =============================================================================

/// A [`MemoryStore`] that counts reads.
///
/// Used to check that the session middleware only touches the store when it
/// has a well-formed token and a matched route.
#[derive(Clone, Default)]
pub struct CountingStore {
    inner: Arc<MemoryStore>,
    gets: Arc<AtomicUsize>,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyValueStore for CountingStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.inner.set_with_ttl(key, value, ttl).await
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.inner.set_add(key, member).await
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        self.inner.set_members(key).await
    }

    async fn delete(&self, keys: &[String]) -> Result<usize, StoreError> {
        self.inner.delete(keys).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping().await
    }
}

/// A store whose backend is always unreachable.
pub struct FailingStore;

fn unreachable_backend() -> StoreError {
    StoreError::Backend("connection refused".to_string())
}

#[async_trait]
impl KeyValueStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(unreachable_backend())
    }

    async fn set_with_ttl(&self, _: &str, _: &str, _: Duration) -> Result<(), StoreError> {
        Err(unreachable_backend())
    }

    async fn set_add(&self, _key: &str, _member: &str) -> Result<bool, StoreError> {
        Err(unreachable_backend())
    }

    async fn set_members(&self, _key: &str) -> Result<Vec<String>, StoreError> {
        Err(unreachable_backend())
    }

    async fn delete(&self, _keys: &[String]) -> Result<usize, StoreError> {
        Err(unreachable_backend())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(unreachable_backend())
    }
}

// =============================================================================
// App Construction
// =============================================================================

/// Build the application router over `store`, without the HTTP trace layer.
pub fn test_app(store: Arc<dyn KeyValueStore>) -> Router {
    let services = AppServices::in_memory(store, SESSION_LIFETIME, PageLimits::default());
    create_app(&services, RouterConfig::new().with_tracing(false)).unwrap()
}

/// Build the application router over a fresh [`MemoryStore`].
pub fn memory_app() -> Router {
    test_app(Arc::new(MemoryStore::new()))
}

// =============================================================================
// Requests and Responses
// =============================================================================

/// Build a request with an optional JSON body and session cookie.
pub fn request(method: Method, uri: &str, body: Option<&Value>, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Build a request carrying a raw body.
pub fn raw_request(method: Method, uri: &str, body: &'static str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

/// Send `request` through a clone of `app`.
pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = body_bytes(response).await;
    serde_json::from_slice(&bytes).unwrap()
}

/// Extract the `sessionToken=...` pair from a `Set-Cookie` header.
pub fn session_cookie_of(response: &Response<Body>) -> Option<String> {
    let set_cookie = response.headers().get(header::SET_COOKIE)?.to_str().ok()?;
    let pair = set_cookie.split(';').next()?.trim();
    pair.starts_with("sessionToken=").then(|| pair.to_string())
}

// =============================================================================
// Fixtures
// =============================================================================

pub fn new_user(username: &str) -> Value {
    json!({
        "username": username,
        "email": format!("{username}@example.com"),
        "password": "correct horse",
        "recaptchaToken": "ignored",
    })
}

pub fn new_project(name: &str, tags: &[&str]) -> Value {
    json!({
        "name": name,
        "tags": tags,
        "shortDescription": "A short pitch for the project",
        "longDescription": "x".repeat(250),
        "githubLink": "https://github.com/example/project",
        "skills": ["rust"],
    })
}

/// Register `username` and log in, returning the session cookie pair.
pub async fn register_and_login(app: &Router, username: &str) -> String {
    let response = send(app, request(Method::POST, "/users", Some(&new_user(username)), None)).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let credentials = json!({
        "usernameOrEmail": username,
        "password": "correct horse",
    });
    let response = send(app, request(Method::POST, "/login", Some(&credentials), None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    session_cookie_of(&response).expect("login should set the session cookie")
}
