//! Per-request values handed to handlers.
//!
//! Every dispatched request gets exactly one [`RequestContext`], one
//! [`InboundRequest`] and one [`ResponseSink`]. They are created by the
//! router, never registered as providers, and dropped when the request ends.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::body::Body;
use axum::response::Response;
use bytes::Bytes;
use http::header::{CONTENT_TYPE, COOKIE};
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::error::Category;
use tracing::Span;
use uuid::Uuid;

use crate::error::{RouteError, ValidationErrors};
use crate::session::Session;

// =============================================================================
// Request Context
// =============================================================================

/// Request-scoped context: correlation id, tracing span and the
/// authenticated session (if any).
///
/// Cloning is cheap; clones share the same span.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: Uuid,
    span: Span,
    session: Option<Session>,
}

impl RequestContext {
    /// Context with a fresh request id and a bare span.
    pub fn new() -> Self {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("request", request_id = %request_id);
        Self {
            request_id,
            span,
            session: None,
        }
    }

    /// Context for an inbound HTTP request. The span records method and path.
    pub fn for_request(method: &Method, path: &str) -> Self {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "request",
            request_id = %request_id,
            method = %method,
            path = %path,
        );
        Self {
            request_id,
            span,
            session: None,
        }
    }

    /// Attach an authenticated session.
    pub fn with_session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Span every log line of this request should be emitted under.
    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// The session, or [`RouteError::Unauthenticated`] if there is none.
    pub fn require_session(&self) -> Result<&Session, RouteError> {
        self.session.as_ref().ok_or(RouteError::Unauthenticated)
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Inbound Request
// =============================================================================

/// Path parameters captured by the route template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    values: HashMap<String, String>,
    /// The path matched but its captures could not be decoded
    undecodable: bool,
}

impl PathParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Captures of a matched path that failed to percent-decode.
    pub fn undecodable() -> Self {
        Self {
            values: HashMap::new(),
            undecodable: true,
        }
    }

    pub fn is_undecodable(&self) -> bool {
        self.undecodable
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }
}

impl From<HashMap<String, String>> for PathParams {
    fn from(values: HashMap<String, String>) -> Self {
        Self {
            values,
            undecodable: false,
        }
    }
}

/// The inbound HTTP request with its body already read.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    params: PathParams,
    body: Bytes,
}

impl InboundRequest {
    pub fn new(
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        params: PathParams,
        body: Bytes,
    ) -> Self {
        Self {
            method,
            uri,
            headers,
            params,
            body,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Raw path parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// Path parameter parsed as a number.
    ///
    /// A missing parameter is reported as `required`, an unparseable or
    /// undecodable one as `numeric`, both as validation errors keyed by the
    /// parameter name.
    pub fn numeric_param<T: FromStr>(&self, name: &str) -> Result<T, RouteError> {
        let mut errors = ValidationErrors::new();
        match self.param(name) {
            Some(raw) => match raw.parse::<T>() {
                Ok(value) => return Ok(value),
                Err(_) => errors.add(name, "numeric"),
            },
            None if self.params.is_undecodable() => errors.add(name, "numeric"),
            None => errors.add(name, "required"),
        }
        Err(RouteError::Validation(errors))
    }

    /// All values of query parameter `name`, in order of appearance.
    pub fn query_values(&self, name: &str) -> Vec<String> {
        let query = self.uri.query().unwrap_or("");
        url::form_urlencoded::parse(query.as_bytes())
            .filter(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
            .collect()
    }

    /// First value of query parameter `name` parsed as `T`.
    ///
    /// Missing and unparseable values both yield `None`.
    pub fn query_parsed<T: FromStr>(&self, name: &str) -> Option<T> {
        self.query_values(name)
            .into_iter()
            .next()
            .and_then(|value| value.trim().parse().ok())
    }

    /// Value of cookie `name`.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        cookie_value(&self.headers, name)
    }

    /// Decode the body as JSON.
    ///
    /// Malformed JSON becomes [`RouteError::JsonSyntax`] with the byte offset
    /// of the failure; well-formed JSON of the wrong shape becomes
    /// [`RouteError::JsonType`] naming the offending field path.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, RouteError> {
        decode_json(&self.body)
    }
}

/// Find cookie `name` across all `Cookie` headers.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().trim_matches('"'))
}

fn decode_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, RouteError> {
    let mut deserializer = serde_json::Deserializer::from_slice(body);

    let value = serde_path_to_error::deserialize(&mut deserializer).map_err(|err| {
        let field = err.path().to_string();
        json_error(body, field, err.into_inner())
    })?;

    // Trailing garbage after the document
    deserializer
        .end()
        .map_err(|err| json_error(body, String::new(), err))?;

    Ok(value)
}

fn json_error(body: &[u8], field: String, err: serde_json::Error) -> RouteError {
    match err.classify() {
        Category::Data => RouteError::JsonType {
            field,
            message: err.to_string(),
        },
        Category::Syntax | Category::Eof | Category::Io => RouteError::JsonSyntax {
            offset: byte_offset(body, err.line(), err.column()),
            message: err.to_string(),
        },
    }
}

/// Convert serde_json's 1-based line/column into a byte offset.
fn byte_offset(body: &[u8], line: usize, column: usize) -> usize {
    let line_start: usize = body
        .split(|byte| *byte == b'\n')
        .take(line.saturating_sub(1))
        .map(|l| l.len() + 1)
        .sum();
    (line_start + column).min(body.len())
}

// =============================================================================
// Response Sink
// =============================================================================

#[derive(Debug, Default)]
struct SinkState {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Option<Bytes>,
}

/// Writable response handle.
///
/// Handlers write status, headers and body here. Clones share the same
/// response, so the router keeps one handle and turns it into the final
/// response once the handler returns successfully.
#[derive(Debug, Clone, Default)]
pub struct ResponseSink {
    state: Arc<Mutex<SinkState>>,
}

impl ResponseSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the status code. Defaults to `200 OK`.
    pub fn status(&self, status: StatusCode) {
        self.lock().status = Some(status);
    }

    /// Set a header, replacing existing values.
    pub fn header(&self, name: HeaderName, value: HeaderValue) {
        self.lock().headers.insert(name, value);
    }

    /// Write `value` as a JSON body with `status`.
    pub fn json<T: Serialize>(&self, status: StatusCode, value: &T) -> Result<(), RouteError> {
        let body = serde_json::to_vec(value)
            .map_err(|e| RouteError::Internal(format!("Failed to encode response: {e}")))?;

        let mut state = self.lock();
        state.status = Some(status);
        state
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        state.body = Some(Bytes::from(body));
        Ok(())
    }

    /// Whether anything was written.
    pub fn is_written(&self) -> bool {
        let state = self.lock();
        state.status.is_some() || state.body.is_some() || !state.headers.is_empty()
    }

    /// Status written so far.
    pub fn written_status(&self) -> Option<StatusCode> {
        self.lock().status
    }

    /// Build the final response from whatever was written.
    pub fn into_response(self) -> Response {
        let state = std::mem::take(&mut *self.lock());

        let mut response = Response::new(Body::from(state.body.unwrap_or_default()));
        *response.status_mut() = state.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = state.headers;
        response
    }
}

// =============================================================================
// Tests
// =============================================================================
