//! Per-request middleware for dispatched routes.
//!
//! Both layers are installed as route layers, so they only run for requests
//! that matched a declared route:
//!
//! 1. [`request_context_middleware`] assigns the request id, opens the
//!    request span and logs the start and end of the request.
//! 2. [`session_middleware`] looks up the `sessionToken` cookie and attaches
//!    the session to the request context when it is valid.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http::{HeaderName, HeaderValue};
use tracing::{debug, error, info, Instrument};

use crate::dispatch::{cookie_value, RequestContext};
use crate::error::{RouteError, SessionError};
use crate::session::{Session, SessionStore, SessionToken, SESSION_COOKIE};

/// Response header carrying the request id.
pub static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Create the [`RequestContext`] for the request and log its lifecycle.
pub async fn request_context_middleware(mut request: Request, next: Next) -> Response {
    let context = RequestContext::for_request(request.method(), request.uri().path());
    let span = context.span().clone();
    let request_id = context.request_id();

    info!(
        parent: &span,
        "Processing {} request to {}",
        request.method(),
        request.uri()
    );

    request.extensions_mut().insert(context);
    let mut response = next.run(request).instrument(span.clone()).await;

    info!(parent: &span, status = response.status().as_u16(), "Request finished");

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response
            .headers_mut()
            .insert(REQUEST_ID_HEADER.clone(), value);
    }
    response
}

/// Attach the session named by the `sessionToken` cookie, if any.
///
/// A missing, malformed, unknown or expired token leaves the request
/// unauthenticated and lets it continue; handlers that need a session reject
/// it themselves. Only a session store failure aborts the request.
pub async fn session_middleware(
    State(sessions): State<SessionStore>,
    mut request: Request,
    next: Next,
) -> Response {
    let context = request
        .extensions()
        .get::<RequestContext>()
        .cloned()
        .unwrap_or_default();

    let presented = cookie_value(request.headers(), SESSION_COOKIE).map(SessionToken::parse);

    match presented {
        None => debug!(parent: context.span(), "No session cookie"),
        Some(None) => debug!(parent: context.span(), "Malformed session cookie, ignoring"),
        Some(Some(token)) => match sessions.authenticate(&context, &token).await {
            Ok(user_id) => {
                debug!(parent: context.span(), user_id, "Session attached");
                let context = context.with_session(Session::new(token, user_id));
                request.extensions_mut().insert(context);
            }
            Err(SessionError::InvalidSessionToken) => {
                debug!(parent: context.span(), "Invalid session token, continuing unauthenticated");
            }
            Err(err) => {
                error!(parent: context.span(), error = %err, "Failed to check session");
                return context
                    .span()
                    .in_scope(|| RouteError::from(err).into_response());
            }
        },
    }

    next.run(request).await
}
