//! Route table and router construction.
//!
//! Routes are declared as `(method, path, handler)` triples on a
//! [`RouteTable`]. Each handler's parameter list is checked against the
//! singleton pool when the route is declared, so a route that could never be
//! served fails at startup rather than on its first request.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                  - Health check (plain axum handler)
//! POST /users                   - Register
//! POST /login                   - Open a session
//! POST /logout                  - Revoke every session of the caller
//! GET  /projects                - List projects
//! POST /projects                - Create a project
//! GET  /projects/{projectId}    - Project details
//! POST /projects/{projectId}    - Update a project
//! ```
//!
//! # Example
//!
//! ```ignore
//! let mut table = RouteTable::new(pool);
//! table.route(Method::GET, "/projects", list_projects)?;
//!
//! let router = create_router(table, sessions, RouterConfig::default());
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{FromRequestParts, Path, Request};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, MethodFilter, MethodRouter};
use axum::{middleware, Router};
use http::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use super::handlers::{
    create_project, get_project, health_handler, list_projects, login, logout, register_user,
    update_project,
};
use super::middleware::{request_context_middleware, session_middleware};
use crate::dispatch::{HandlerInvoker, InboundRequest, PathParams, ProviderPool, RequestContext};
use crate::error::{DispatchError, RouteError};
use crate::session::SessionStore;

/// Default request body limit: 1 MiB.
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

// =============================================================================
// Router Configuration
// =============================================================================

/// Transport-level router settings.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Allowed CORS origins. `None` allows any origin; `Some(vec![])` allows none.
    pub cors_origins: Option<Vec<String>>,

    /// Maximum accepted request body size in bytes
    pub max_body_bytes: usize,

    /// Whether to add the HTTP tracing layer
    pub enable_tracing: bool,
}

impl RouterConfig {
    pub fn new() -> Self {
        Self {
            cors_origins: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            enable_tracing: true,
        }
    }

    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    pub fn with_max_body_bytes(mut self, bytes: usize) -> Self {
        self.max_body_bytes = bytes;
        self
    }

    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Route Table
// =============================================================================

/// A declared route.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    method: Method,
    filter: MethodFilter,
    path: String,
    invoker: HandlerInvoker,
}

impl RouteEntry {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn invoker(&self) -> &HandlerInvoker {
        &self.invoker
    }
}

/// Routes bound to one singleton pool.
#[derive(Debug)]
pub struct RouteTable {
    singletons: Arc<ProviderPool>,
    routes: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn new(singletons: ProviderPool) -> Self {
        Self {
            singletons: Arc::new(singletons),
            routes: Vec::new(),
        }
    }

    /// Declare a route.
    ///
    /// Fails if a handler parameter cannot be satisfied by the pool, if the
    /// method and path are already declared, or if the method is not
    /// routable.
    pub fn route<H, Args>(
        &mut self,
        method: Method,
        path: &str,
        handler: H,
    ) -> Result<&mut Self, DispatchError>
    where
        H: crate::dispatch::Handler<Args>,
        Args: 'static,
    {
        let filter =
            MethodFilter::try_from(method.clone()).map_err(|_| DispatchError::UnsupportedMethod {
                method: method.to_string(),
            })?;

        if self
            .routes
            .iter()
            .any(|route| route.method == method && route.path == path)
        {
            return Err(DispatchError::DuplicateRoute {
                method: method.to_string(),
                path: path.to_string(),
            });
        }

        let invoker = HandlerInvoker::new(handler);
        invoker.descriptor().check(&self.singletons)?;

        self.routes.push(RouteEntry {
            method,
            filter,
            path: path.to_string(),
            invoker,
        });
        Ok(self)
    }

    pub fn routes(&self) -> &[RouteEntry] {
        &self.routes
    }

    pub fn singletons(&self) -> &ProviderPool {
        &self.singletons
    }

    /// Log every registered provider and declared route.
    pub fn log_routes(&self) {
        for shape in self.singletons.shapes() {
            debug!("Provider: {}", shape);
        }
        for route in &self.routes {
            info!("Route: [{}] {}", route.method, route.path);
        }
    }
}

/// The application route catalogue.
pub fn app_routes(singletons: ProviderPool) -> Result<RouteTable, DispatchError> {
    let mut table = RouteTable::new(singletons);
    table
        .route(Method::POST, "/users", register_user)?
        .route(Method::POST, "/login", login)?
        .route(Method::POST, "/logout", logout)?
        .route(Method::GET, "/projects", list_projects)?
        .route(Method::POST, "/projects", create_project)?
        .route(Method::GET, "/projects/{projectId}", get_project)?
        .route(Method::POST, "/projects/{projectId}", update_project)?;
    Ok(table)
}

// =============================================================================
// Router Builder
// =============================================================================

/// Build the axum router serving `table`.
///
/// Unmatched paths get an empty `404` and unmatched methods a `405`, both
/// without running any middleware.
pub fn create_router(table: RouteTable, sessions: SessionStore, config: RouterConfig) -> Router {
    let max_body_bytes = config.max_body_bytes;
    let singletons = table.singletons;

    let mut by_path: BTreeMap<String, MethodRouter> = BTreeMap::new();
    for entry in table.routes {
        let invoker = entry.invoker;
        let singletons = Arc::clone(&singletons);
        let handler = move |request: Request| {
            let invoker = invoker.clone();
            let singletons = Arc::clone(&singletons);
            async move { dispatch(&invoker, &singletons, request, max_body_bytes).await }
        };

        let method_router = by_path
            .remove(&entry.path)
            .unwrap_or_else(MethodRouter::new)
            .on(entry.filter, handler);
        by_path.insert(entry.path, method_router);
    }

    // Layered per method router so the 405 fallback bypasses both middlewares
    let router = by_path
        .into_iter()
        .fold(Router::new(), |router, (path, method_router)| {
            let method_router = method_router
                .route_layer(middleware::from_fn_with_state(
                    sessions.clone(),
                    session_middleware,
                ))
                .route_layer(middleware::from_fn(request_context_middleware));
            router.route(&path, method_router)
        });

    let router = router
        .route("/health", get(health_handler).with_state(sessions))
        .layer(build_cors_layer(&config));

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Turn an axum request into an [`InboundRequest`] and run the handler.
async fn dispatch(
    invoker: &HandlerInvoker,
    singletons: &ProviderPool,
    request: Request,
    max_body_bytes: usize,
) -> Response {
    let (mut parts, body) = request.into_parts();

    let context = parts
        .extensions
        .remove::<RequestContext>()
        .unwrap_or_default();

    let params = match Path::<HashMap<String, String>>::from_request_parts(&mut parts, &()).await {
        Ok(Path(params)) => PathParams::from(params),
        Err(rejection) => {
            debug!(parent: context.span(), error = %rejection, "Undecodable path parameters");
            PathParams::undecodable()
        }
    };

    let body = match axum::body::to_bytes(body, max_body_bytes).await {
        Ok(body) => body,
        Err(err) => {
            return context
                .span()
                .in_scope(|| RouteError::BodyUnreadable(err.to_string()).into_response());
        }
    };

    let request = InboundRequest::new(parts.method, parts.uri, parts.headers, params, body);
    invoker.invoke(singletons, context, request).await
}

fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, COOKIE])
        .expose_headers([SET_COOKIE])
        .max_age(Duration::from_secs(86400));

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins).allow_credentials(true)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
