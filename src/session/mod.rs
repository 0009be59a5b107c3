//! Session directory.
//!
//! A session is an opaque token mapped to a user id. Two records live in the
//! keyed store per session:
//!
//! - the **forward record** `session:{token}:user.id` holding the user id,
//!   written with the session lifetime as TTL;
//! - the **membership set** `user:{userId}:session.keys` listing every token
//!   issued to the user, without expiry.
//!
//! Expiry is enforced by the store alone: once the forward record is gone the
//! token no longer authenticates. The membership set exists so that every
//! session of a user can be revoked in one operation.

mod store;

use std::fmt;
use std::time::Duration;

use uuid::Uuid;

pub use store::SessionStore;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "sessionToken";

/// Default session lifetime: 30 days.
pub const SESSION_LIFETIME: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// User identifier as stored in session records.
pub type UserId = u64;

/// Opaque session token (a hyphenated UUID v4).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    /// Generate a new random token.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().hyphenated().to_string())
    }

    /// Parse a token presented by a client.
    ///
    /// Returns `None` for values that are not UUIDs. Accepted values are
    /// normalized to the lowercase hyphenated form tokens are issued in.
    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::try_parse(raw.trim())
            .ok()
            .map(|uuid| Self(uuid.hyphenated().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An authenticated session attached to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    token: SessionToken,
    user_id: UserId,
}

impl Session {
    pub fn new(token: SessionToken, user_id: UserId) -> Self {
        Self { token, user_id }
    }

    pub fn token(&self) -> &SessionToken {
        &self.token
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}

/// Key of the forward record for `token`.
pub fn forward_key(token: &str) -> String {
    format!("session:{token}:user.id")
}

/// Key of the membership set for `user_id`.
pub fn membership_key(user_id: UserId) -> String {
    format!("user:{user_id}:session.keys")
}

/// `Set-Cookie` value issuing `token` for `lifetime`.
pub fn session_cookie(token: &SessionToken, lifetime: Duration) -> String {
    format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        lifetime.as_secs()
    )
}

/// `Set-Cookie` value that clears the session cookie.
pub fn expired_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}
