//! Dispatcher integration tests with a custom route table.
//!
//! Tests verify:
//! - Handlers receive shared, owned and capability providers by shape
//! - Path parameters and the session reach handlers through the router
//! - Response sinks are discarded when a handler fails
//! - Oversized bodies are rejected before the handler runs

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::http::{Method, StatusCode};
use axum::Router;
use serde_json::json;

use collab_server::dispatch::{Capability, Inject, Owned};
use collab_server::{
    create_router, DispatchError, InboundRequest, MemoryStore, ProviderPool, RequestContext,
    ResponseSink, RouteError, RouteTable, RouterConfig, SessionStore,
};

use super::test_utils::{body_json, request, send};

// =============================================================================
// Fixtures
// =============================================================================

struct Counter {
    hits: AtomicUsize,
}

#[derive(Clone)]
struct Greeting {
    word: String,
}

trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

struct FixedClock(u64);

impl Clock for FixedClock {
    fn now(&self) -> u64 {
        self.0
    }
}

async fn greet(
    greeting: Owned<Greeting>,
    request: InboundRequest,
    sink: ResponseSink,
    counter: Inject<Counter>,
    clock: Capability<dyn Clock>,
) -> Result<(), RouteError> {
    let hits = counter.hits.fetch_add(1, Ordering::SeqCst) + 1;
    let name = request.param("name").unwrap_or("nobody");
    sink.json(
        StatusCode::OK,
        &json!({
            "message": format!("{} {}", greeting.word, name),
            "hits": hits,
            "now": clock.now(),
        }),
    )
}

async fn whoami(sink: ResponseSink, ctx: RequestContext) -> Result<(), RouteError> {
    let user_id = ctx.require_session()?.user_id();
    sink.json(StatusCode::OK, &json!({ "userId": user_id }))
}

async fn half_written(sink: ResponseSink) -> Result<(), RouteError> {
    sink.status(StatusCode::ACCEPTED);
    Err(RouteError::Internal("gave up".to_string()))
}

fn pool() -> ProviderPool {
    let mut pool = ProviderPool::new();
    pool.provide(Arc::new(Counter {
        hits: AtomicUsize::new(0),
    }))
    .unwrap();
    pool.provide_value(Greeting {
        word: "Hello".to_string(),
    })
    .unwrap();
    pool.provide_capability::<dyn Clock>(Arc::new(FixedClock(1_700_000_000)))
        .unwrap();
    pool
}

fn app(sessions: SessionStore) -> Router {
    let mut table = RouteTable::new(pool());
    table
        .route(Method::GET, "/greet/{name}", greet)
        .unwrap()
        .route(Method::GET, "/whoami", whoami)
        .unwrap()
        .route(Method::POST, "/half", half_written)
        .unwrap();
    create_router(table, sessions, RouterConfig::new().with_tracing(false))
}

async fn count_post(sink: ResponseSink, counter: Inject<Counter>) -> Result<(), RouteError> {
    counter.hits.fetch_add(1, Ordering::SeqCst);
    sink.status(StatusCode::NO_CONTENT);
    Ok(())
}

fn sessions() -> SessionStore {
    SessionStore::new(Arc::new(MemoryStore::new()))
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_providers_injected_by_shape() {
    let app = app(sessions());

    let response = send(&app, request(Method::GET, "/greet/ada", None, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"message": "Hello ada", "hits": 1, "now": 1_700_000_000u64})
    );

    // The shared counter is the same instance across requests
    let response = send(&app, request(Method::GET, "/greet/grace", None, None)).await;
    assert_eq!(body_json(response).await["hits"], 2);
}

#[tokio::test]
async fn test_session_reaches_handler() {
    let sessions = sessions();
    let app = app(sessions.clone());

    let token = sessions.create(&RequestContext::new(), 7).await.unwrap();
    let cookie = format!("sessionToken={token}");

    let response = send(&app, request(Method::GET, "/whoami", None, Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"userId": 7}));

    let response = send(&app, request(Method::GET, "/whoami", None, None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_failed_handler_discards_written_status() {
    let app = app(sessions());

    let response = send(&app, request(Method::POST, "/half", None, None)).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["code"], "unknown-error");
}

#[tokio::test]
async fn test_missing_provider_rejected_before_serving() {
    let mut table = RouteTable::new(ProviderPool::new());
    let err = table
        .route(Method::GET, "/greet/{name}", greet)
        .unwrap_err();
    assert!(matches!(
        err,
        DispatchError::UnresolvedParameter { index: 0, .. }
    ));
    assert!(table.routes().is_empty());
}

#[tokio::test]
async fn test_oversized_body_rejected_before_handler() {
    let counter = Arc::new(Counter {
        hits: AtomicUsize::new(0),
    });
    let mut pool = ProviderPool::new();
    pool.provide(counter.clone()).unwrap();

    let mut table = RouteTable::new(pool);
    table.route(Method::POST, "/count", count_post).unwrap();
    let app = create_router(
        table,
        sessions(),
        RouterConfig::new()
            .with_tracing(false)
            .with_max_body_bytes(16),
    );

    let small = json!({"n": 1});
    let response = send(&app, request(Method::POST, "/count", Some(&small), None)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(counter.hits.load(Ordering::SeqCst), 1);

    let large = json!({"padding": "far more than sixteen bytes"});
    let response = send(&app, request(Method::POST, "/count", Some(&large), None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "body-read-error");
    assert_eq!(counter.hits.load(Ordering::SeqCst), 1);
}
