//! Error classification.
//!
//! Handlers return [`RouteError`] values; this module decides how each one is
//! represented on the wire. Every error response except `404 Not Found`
//! carries a JSON body of the form:
//!
//! ```json
//! { "code": "validation-error", "details": { "username": "min" } }
//! ```
//!
//! | Error                         | Status | Code                    | Details                |
//! |-------------------------------|--------|-------------------------|------------------------|
//! | malformed JSON                | 400    | `json-syntax-error`     | `offset`               |
//! | JSON of the wrong shape       | 400    | `json-type-error`       | `field`                |
//! | field validation              | 400    | `validation-error`      | field to violated rule |
//! | unreadable body               | 400    | `body-read-error`       | none                   |
//! | missing or invalid session    | 401    | `unauthenticated-error` | none                   |
//! | missing resource              | 404    | (no body)               |                        |
//! | anything else                 | 500    | `unknown-error`         | none                   |

use std::collections::BTreeMap;
use std::error::Error as StdError;

use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::RouteError;

pub const CODE_JSON_SYNTAX: &str = "json-syntax-error";
pub const CODE_JSON_TYPE: &str = "json-type-error";
pub const CODE_VALIDATION: &str = "validation-error";
pub const CODE_BODY_READ: &str = "body-read-error";
pub const CODE_UNAUTHENTICATED: &str = "unauthenticated-error";
pub const CODE_UNKNOWN: &str = "unknown-error";

/// JSON error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub details: BTreeMap<String, String>,
}

impl ErrorBody {
    pub fn new(code: &str) -> Self {
        Self {
            code: code.to_string(),
            details: BTreeMap::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// Status and optional body for an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub status: StatusCode,
    pub body: Option<ErrorBody>,
}

/// Map an error to its wire representation.
pub fn classify(err: &RouteError) -> Classification {
    let (status, body) = match err {
        RouteError::JsonSyntax { offset, .. } => (
            StatusCode::BAD_REQUEST,
            Some(ErrorBody::new(CODE_JSON_SYNTAX).with_detail("offset", offset.to_string())),
        ),

        RouteError::JsonType { field, .. } => (
            StatusCode::BAD_REQUEST,
            Some(ErrorBody::new(CODE_JSON_TYPE).with_detail("field", field.clone())),
        ),

        RouteError::Validation(errors) => {
            let body = errors
                .iter()
                .fold(ErrorBody::new(CODE_VALIDATION), |body, (field, rule)| {
                    body.with_detail(field, rule)
                });
            (StatusCode::BAD_REQUEST, Some(body))
        }

        RouteError::BodyUnreadable(_) => {
            (StatusCode::BAD_REQUEST, Some(ErrorBody::new(CODE_BODY_READ)))
        }

        RouteError::Unauthenticated => (
            StatusCode::UNAUTHORIZED,
            Some(ErrorBody::new(CODE_UNAUTHENTICATED)),
        ),

        RouteError::NotFound(_) => (StatusCode::NOT_FOUND, None),

        RouteError::Dispatch(_)
        | RouteError::Session(_)
        | RouteError::Repository(_)
        | RouteError::Internal(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Some(ErrorBody::new(CODE_UNKNOWN)),
        ),
    };

    Classification { status, body }
}

/// Render an error and its sources as `outer: inner: ...`.
pub fn error_chain(err: &dyn StdError) -> String {
    let mut chain = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        chain.push_str(": ");
        chain.push_str(&cause.to_string());
        source = cause.source();
    }
    chain
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        let Classification { status, body } = classify(&self);
        let code = body.as_ref().map(|b| b.code.as_str()).unwrap_or("not-found");

        // Only server errors and unreadable bodies log above debug
        if status.is_server_error() {
            error!(
                code = code,
                status = status.as_u16(),
                error = %error_chain(&self),
                "Request failed"
            );
        } else if status == StatusCode::NOT_FOUND || status == StatusCode::UNAUTHORIZED {
            debug!(code = code, status = status.as_u16(), "Request rejected: {}", self);
        } else if matches!(self, RouteError::BodyUnreadable(_)) {
            warn!(code = code, status = status.as_u16(), "Client error: {}", self);
        } else {
            debug!(code = code, status = status.as_u16(), "Client error: {}", self);
        }

        match body {
            Some(body) => (status, Json(body)).into_response(),
            None => status.into_response(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
