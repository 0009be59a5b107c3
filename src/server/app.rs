//! Application wiring: singleton services, provider pool and router.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;

use super::routes::{app_routes, create_router, RouterConfig};
use crate::accounts::{MemoryProjects, PageLimits, ProjectRepository, UsersService};
use crate::dispatch::ProviderPool;
use crate::error::DispatchError;
use crate::session::SessionStore;
use crate::store::KeyValueStore;

/// The singleton services handlers are injected with.
#[derive(Clone)]
pub struct AppServices {
    pub sessions: SessionStore,
    pub users: Arc<UsersService>,
    pub projects: Arc<dyn ProjectRepository>,
    pub page_limits: PageLimits,
}

impl AppServices {
    /// Services backed by `store` for sessions and in-memory repositories.
    pub fn in_memory(
        store: Arc<dyn KeyValueStore>,
        session_lifetime: Duration,
        page_limits: PageLimits,
    ) -> Self {
        Self {
            sessions: SessionStore::with_lifetime(store, session_lifetime),
            users: Arc::new(UsersService::new()),
            projects: Arc::new(MemoryProjects::new()),
            page_limits,
        }
    }

    /// Register every service in a fresh provider pool.
    pub fn provider_pool(&self) -> Result<ProviderPool, DispatchError> {
        let mut pool = ProviderPool::new();
        pool.provide(Arc::new(self.sessions.clone()))?;
        pool.provide(Arc::clone(&self.users))?;
        pool.provide_capability::<dyn ProjectRepository>(Arc::clone(&self.projects))?;
        pool.provide_value(self.page_limits)?;
        Ok(pool)
    }
}

/// Build the application router, logging the route table.
///
/// Fails if any route handler declares a parameter no service satisfies.
pub fn create_app(services: &AppServices, config: RouterConfig) -> Result<Router, DispatchError> {
    let table = app_routes(services.provider_pool()?)?;
    table.log_routes();
    Ok(create_router(table, services.sessions.clone(), config))
}
