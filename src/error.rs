use std::collections::BTreeMap;

use thiserror::Error;

use crate::dispatch::Shape;

/// Errors raised by the keyed store backing sessions.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The backend could not serve the request (connection, timeout, ...)
    #[error("Store backend error: {0}")]
    Backend(String),

    /// The key holds a value of a different kind (e.g. a set read as text)
    #[error("Wrong value type at key {key}")]
    WrongType { key: String },

    /// The stored value could not be interpreted
    #[error("Corrupt value at key {key}: {value:?}")]
    Corrupt { key: String, value: String },
}

/// Errors returned by the session directory.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// The token has no live forward record (never created, expired or invalidated)
    #[error("Invalid session token")]
    InvalidSessionToken,

    /// The keyed store failed while serving the request
    #[error("Session store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors returned by persistence collaborators.
///
/// Callers rely on telling a missing record apart from a storage fault.
#[derive(Debug, Clone, Error)]
pub enum RepositoryError {
    /// No record with the given identity exists
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A unique field is already taken by another record
    #[error("{entity} with this {field} already exists")]
    Conflict {
        entity: &'static str,
        field: &'static str,
    },

    /// The backing storage failed
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Dispatch configuration errors.
///
/// These are programming errors in route or provider setup. They are fatal at
/// startup and surface as a generic server error if they happen per request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// No provider in the pool satisfies the parameter at `index`
    #[error("Unresolved parameter #{index} of shape {shape}")]
    UnresolvedParameter { index: usize, shape: Shape },

    /// A singleton was registered under a shape reserved for per-request values
    #[error("Shape {shape} is reserved for per-request values")]
    ReservedShape { shape: Shape },

    /// A second provider was registered for a shape that is already provided
    #[error("Ambiguous provider: shape {shape} is already provided")]
    AmbiguousProvider { shape: Shape },

    /// The resolved argument list does not match the handler's arity
    #[error("Handler expects {expected} arguments, got {actual}")]
    ArityMismatch { expected: usize, actual: usize },

    /// A resolved argument could not be converted to the declared parameter type
    #[error("Argument #{index} does not match shape {shape}")]
    ArgumentMismatch { index: usize, shape: Shape },

    /// The same method and path were declared twice
    #[error("Route [{method}] {path} is declared more than once")]
    DuplicateRoute { method: String, path: String },

    /// The route method cannot be matched by the router
    #[error("Unsupported route method: {method}")]
    UnsupportedMethod { method: String },
}

/// Field-keyed validation failures: field name to the rule it violated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("Validation failed for {} field(s)", .0.len())]
pub struct ValidationErrors(pub BTreeMap<String, String>);

impl ValidationErrors {
    /// Create an empty error set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a rule violation. The first violation per field wins.
    pub fn add(&mut self, field: impl Into<String>, rule: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| rule.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(field, rule)` pairs in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `Ok(())` when no violation was recorded, otherwise `Err(self)`.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

/// The single error type returned by route handlers.
///
/// Handlers return errors rather than writing failure responses; the error
/// classifier in [`crate::server::errors`] decides the wire representation.
#[derive(Debug, Error)]
pub enum RouteError {
    /// The request body is not syntactically valid JSON
    #[error("Malformed JSON at byte {offset}: {message}")]
    JsonSyntax { offset: usize, message: String },

    /// The request body is valid JSON of the wrong shape
    #[error("JSON type error at field '{field}': {message}")]
    JsonType { field: String, message: String },

    /// Field validation failed
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    /// The request body could not be read (too large, aborted upload)
    #[error("Failed to read request body: {0}")]
    BodyUnreadable(String),

    /// No valid session where one is required, or bad login credentials
    #[error("Unauthenticated")]
    Unauthenticated,

    /// The addressed resource does not exist
    #[error("{0} not found")]
    NotFound(String),

    /// Route or provider misconfiguration
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// Session store failure
    #[error(transparent)]
    Session(SessionError),

    /// Persistence failure
    #[error(transparent)]
    Repository(RepositoryError),

    /// Anything else
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<SessionError> for RouteError {
    fn from(err: SessionError) -> Self {
        match err {
            // An invalid token where a session is required is an auth failure
            SessionError::InvalidSessionToken => RouteError::Unauthenticated,
            other => RouteError::Session(other),
        }
    }
}

impl From<RepositoryError> for RouteError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, .. } => RouteError::NotFound(entity.to_string()),
            RepositoryError::Conflict { field, .. } => {
                let mut errors = ValidationErrors::new();
                errors.add(field, "unique");
                RouteError::Validation(errors)
            }
            other => RouteError::Repository(other),
        }
    }
}

impl From<StoreError> for RouteError {
    fn from(err: StoreError) -> Self {
        RouteError::Session(SessionError::Store(err))
    }
}
