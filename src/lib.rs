//! # Collab Server
//!
//! An HTTP backend where users register, log in and publish collaborative
//! projects.
//!
//! Handlers are plain async functions whose parameters are resolved by shape
//! rather than position: the request context, the inbound request, the
//! response sink, and any service registered in a [`ProviderPool`]. Sessions
//! are opaque tokens kept in a keyed store with a 30-day expiry, and every
//! session of a user can be revoked at once.
//!
//! ## Architecture
//!
//! - [`dispatch`] - Provider pool, argument resolution and handler invocation
//! - [`session`] - Session tokens, the session directory and cookie helpers
//! - [`store`] - Keyed store abstraction and the in-memory backend
//! - [`accounts`] - Users, projects, password hashing and field validation
//! - [`server`] - Axum router, middleware, handlers and error classification
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use collab_server::{create_app, AppServices, MemoryStore, PageLimits, RouterConfig};
//! use collab_server::session::SESSION_LIFETIME;
//!
//! #[tokio::main]
//! async fn main() {
//!     let services = AppServices::in_memory(
//!         Arc::new(MemoryStore::new()),
//!         SESSION_LIFETIME,
//!         PageLimits::default(),
//!     );
//!     let router = create_app(&services, RouterConfig::default()).unwrap();
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, router).await.unwrap();
//! }
//! ```

pub mod accounts;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod server;
pub mod session;
pub mod store;

// Re-export commonly used types
pub use accounts::{
    MemoryProjects, NewProjectDto, PageLimits, Project, ProjectRepository, User, UsersService,
    Validate,
};
pub use config::Config;
pub use dispatch::{
    Capability, Handler, HandlerInvoker, InboundRequest, Inject, Owned, ProviderPool,
    RequestContext, ResponseSink, Shape,
};
pub use error::{
    DispatchError, RepositoryError, RouteError, SessionError, StoreError, ValidationErrors,
};
pub use server::{
    app_routes, classify, create_app, create_router, AppServices, ErrorBody, RouteTable,
    RouterConfig,
};
pub use session::{Session, SessionStore, SessionToken, UserId};
pub use store::{KeyValueStore, MemoryStore};
