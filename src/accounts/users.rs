//! User accounts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, error};

use crate::error::{RepositoryError, ValidationErrors};
use crate::session::UserId;

use super::password::{hash_password, verify_password, PasswordError};
use super::validation::{Checker, Validate};

// =============================================================================
// Model and DTOs
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    password_hash: String,
}

/// Registration payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NewUserDto {
    pub username: String,
    pub email: String,
    pub password: String,
    /// Accepted for client compatibility, not checked
    pub recaptcha_token: String,
}

impl Validate for NewUserDto {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut checker = Checker::new();
        checker
            .text("username", &self.username, 4, 32)
            .email("email", &self.email)
            .text("password", &self.password, 6, 255);
        checker.finish()
    }
}

/// Login payload. The identifier matches either the username or the email.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoginDto {
    pub username_or_email: String,
    pub password: String,
    pub recaptcha_token: String,
}

/// Public view of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDataDto {
    pub username: String,
    pub email: String,
}

impl From<&User> for UserDataDto {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }
}

// =============================================================================
// Service
// =============================================================================

#[derive(Debug, Default)]
struct Directory {
    users: BTreeMap<UserId, User>,
    next_id: UserId,
}

/// In-memory user directory with Argon2 credentials.
#[derive(Debug, Default)]
pub struct UsersService {
    directory: RwLock<Directory>,
}

impl UsersService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user. Usernames and emails are unique.
    pub async fn create_user(&self, new_user: NewUserDto) -> Result<User, RepositoryError> {
        let password = new_user.password;
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| RepositoryError::Storage(format!("password hashing task failed: {e}")))?
            .map_err(storage_error)?;

        let mut directory = self.directory.write().await;

        if directory
            .users
            .values()
            .any(|u| u.username == new_user.username)
        {
            debug!(username = %new_user.username, "Username already taken");
            return Err(RepositoryError::Conflict {
                entity: "user",
                field: "username",
            });
        }
        if directory.users.values().any(|u| u.email == new_user.email) {
            debug!("Email already registered");
            return Err(RepositoryError::Conflict {
                entity: "user",
                field: "email",
            });
        }

        directory.next_id += 1;
        let user = User {
            id: directory.next_id,
            username: new_user.username,
            email: new_user.email,
            password_hash,
        };
        directory.users.insert(user.id, user.clone());

        debug!(user_id = user.id, "User created");
        Ok(user)
    }

    /// Check login credentials.
    ///
    /// Returns `Ok(None)` both for an unknown identifier and for a wrong
    /// password; the two cases differ only in the debug log.
    pub async fn authenticate_user(&self, login: &LoginDto) -> Result<Option<User>, RepositoryError> {
        debug!(username = %login.username_or_email, "Attempting to authenticate user");

        let user = self
            .directory
            .read()
            .await
            .users
            .values()
            .find(|u| u.username == login.username_or_email || u.email == login.username_or_email)
            .cloned();

        let Some(user) = user else {
            debug!("User not found");
            return Ok(None);
        };

        let phc = user.password_hash.clone();
        let password = login.password.clone();
        let matches = tokio::task::spawn_blocking(move || verify_password(&phc, &password))
            .await
            .map_err(|e| RepositoryError::Storage(format!("password check task failed: {e}")))?
            .map_err(|e| {
                error!(user_id = user.id, error = %e, "Error comparing passwords");
                storage_error(e)
            })?;

        if matches {
            debug!(user_id = user.id, "Passwords match, user authenticated");
            Ok(Some(user))
        } else {
            debug!(user_id = user.id, "Wrong password");
            Ok(None)
        }
    }
}

fn storage_error(err: PasswordError) -> RepositoryError {
    RepositoryError::Storage(err.to_string())
}
