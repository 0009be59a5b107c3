//! HTTP handlers for the application routes.
//!
//! Every handler except [`health_handler`] is dispatched through the
//! injection layer: parameters are bound by shape, in whatever order the
//! handler declares them, and failures are returned as [`RouteError`] for the
//! error classifier to render.

use axum::extract::State;
use axum::Json;
use http::header::{LOCATION, SET_COOKIE};
use http::{HeaderValue, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::accounts::{
    LoginDto, NewProjectDto, NewUserDto, PageLimits, ProjectDto, ProjectId, ProjectQuery,
    ProjectRepository, ProjectSummaryDto, UserDataDto, UsersService, Validate,
};
use crate::dispatch::{Capability, Inject, InboundRequest, Owned, RequestContext, ResponseSink};
use crate::error::RouteError;
use crate::session::{expired_session_cookie, session_cookie, SessionStore};

// =============================================================================
// Response Types
// =============================================================================

/// Response from the health check endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,

    /// Session store reachability
    pub store: String,
}

fn header_value(value: String) -> Result<HeaderValue, RouteError> {
    HeaderValue::try_from(value)
        .map_err(|e| RouteError::Internal(format!("Invalid header value: {e}")))
}

/// Split list query values on commas. Both `tags=a,b` and
/// `tags=a&tags=b` select the same tags.
fn parse_tags(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check.
///
/// `GET /health`. Responds `503 Service Unavailable` when the session store
/// cannot be reached.
pub async fn health_handler(
    State(sessions): State<SessionStore>,
) -> (StatusCode, Json<HealthResponse>) {
    let (code, status, store) = match sessions.ping().await {
        Ok(()) => (StatusCode::OK, "healthy", "ok"),
        Err(err) => {
            warn!(error = %err, "Session store unreachable");
            (StatusCode::SERVICE_UNAVAILABLE, "degraded", "unreachable")
        }
    };

    let response = HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: store.to_string(),
    };
    (code, Json(response))
}

/// Register a user.
///
/// `POST /users` with a [`NewUserDto`] body. Responds `201 Created` with no
/// body.
pub async fn register_user(
    ctx: RequestContext,
    request: InboundRequest,
    sink: ResponseSink,
    users: Inject<UsersService>,
) -> Result<(), RouteError> {
    let new_user: NewUserDto = request.json()?;
    new_user.validate()?;

    let user = users.create_user(new_user).await?;
    info!(parent: ctx.span(), user_id = user.id, "User registered");

    sink.status(StatusCode::CREATED);
    Ok(())
}

/// Open a session.
///
/// `POST /login` with a [`LoginDto`] body. On success sets the session
/// cookie and returns the user's public data. Unknown users and wrong
/// passwords both yield `401`.
pub async fn login(
    ctx: RequestContext,
    request: InboundRequest,
    sink: ResponseSink,
    users: Inject<UsersService>,
    sessions: Inject<SessionStore>,
) -> Result<(), RouteError> {
    let credentials: LoginDto = request.json()?;

    let user = users
        .authenticate_user(&credentials)
        .await?
        .ok_or(RouteError::Unauthenticated)?;

    let token = sessions.create(&ctx, user.id).await?;
    sink.header(
        SET_COOKIE,
        header_value(session_cookie(&token, sessions.lifetime()))?,
    );

    info!(parent: ctx.span(), user_id = user.id, "User logged in");
    sink.json(StatusCode::OK, &UserDataDto::from(&user))
}

/// Revoke every session of the calling user.
///
/// `POST /logout`. Responds `204 No Content` and clears the cookie.
pub async fn logout(
    sessions: Inject<SessionStore>,
    ctx: RequestContext,
    sink: ResponseSink,
) -> Result<(), RouteError> {
    let user_id = ctx.require_session()?.user_id();

    let revoked = sessions.invalidate_all(&ctx, user_id).await?;
    info!(parent: ctx.span(), user_id, revoked, "User logged out");

    sink.header(SET_COOKIE, header_value(expired_session_cookie())?);
    sink.status(StatusCode::NO_CONTENT);
    Ok(())
}

/// Create a project owned by the calling user.
///
/// `POST /projects`. Responds `201 Created` with a `Location` header and the
/// project summary.
pub async fn create_project(
    ctx: RequestContext,
    request: InboundRequest,
    sink: ResponseSink,
    projects: Capability<dyn ProjectRepository>,
) -> Result<(), RouteError> {
    let owner_id = ctx.require_session()?.user_id();

    let new_project: NewProjectDto = request.json()?;
    new_project.validate()?;

    let project = projects.create(owner_id, new_project).await?;

    sink.header(LOCATION, header_value(format!("/projects/{}", project.id))?);
    sink.json(StatusCode::CREATED, &ProjectSummaryDto::from(&project))
}

/// List projects, newest first.
///
/// `GET /projects?pageSize=&pageOffset=&tags=&skills=`
///
/// Unparseable numbers are treated as absent. `pageOffset` counts pages.
pub async fn list_projects(
    sink: ResponseSink,
    projects: Capability<dyn ProjectRepository>,
    limits: Owned<PageLimits>,
    request: InboundRequest,
) -> Result<(), RouteError> {
    let query = ProjectQuery {
        page_size: limits.page_size(request.query_parsed("pageSize")),
        page_offset: request
            .query_parsed::<i64>("pageOffset")
            .and_then(|offset| usize::try_from(offset).ok())
            .unwrap_or(0),
        tags: parse_tags(&request.query_values("tags")),
        skills: parse_tags(&request.query_values("skills")),
    };

    let page = projects.list(&query).await?;
    debug!(count = page.len(), "Projects listed");

    let summaries: Vec<ProjectSummaryDto> = page.iter().map(ProjectSummaryDto::from).collect();
    sink.json(StatusCode::OK, &summaries)
}

/// `GET /projects/{projectId}`
pub async fn get_project(
    request: InboundRequest,
    sink: ResponseSink,
    projects: Capability<dyn ProjectRepository>,
) -> Result<(), RouteError> {
    let id: ProjectId = request.numeric_param("projectId")?;
    let project = projects.get(id).await?;
    sink.json(StatusCode::OK, &ProjectDto::from(&project))
}

/// Replace the editable fields of a project.
///
/// `POST /projects/{projectId}`. Responds `204 No Content`.
pub async fn update_project(
    projects: Capability<dyn ProjectRepository>,
    ctx: RequestContext,
    request: InboundRequest,
    sink: ResponseSink,
) -> Result<(), RouteError> {
    let user_id = ctx.require_session()?.user_id();
    let id: ProjectId = request.numeric_param("projectId")?;

    let update: NewProjectDto = request.json()?;
    update.validate()?;

    projects.update(id, update).await?;
    debug!(parent: ctx.span(), project_id = id, user_id, "Project updated");

    sink.status(StatusCode::NO_CONTENT);
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
