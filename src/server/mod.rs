//! HTTP server layer.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                           HTTP Layer                             │
//! │                                                                  │
//! │  request ─► request context ─► session ─► dispatch ─► handler    │
//! │             (middleware)       (middleware) (routes)  (handlers) │
//! │                                                                  │
//! │  handler error ─► errors::classify ─► status + JSON body         │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

pub mod app;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod routes;

pub use app::{create_app, AppServices};
pub use errors::{classify, Classification, ErrorBody};
pub use handlers::{health_handler, HealthResponse};
pub use middleware::{request_context_middleware, session_middleware, REQUEST_ID_HEADER};
pub use routes::{app_routes, create_router, RouteEntry, RouteTable, RouterConfig};
