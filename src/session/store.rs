use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn, Instrument};

use crate::dispatch::RequestContext;
use crate::error::{SessionError, StoreError};
use crate::store::KeyValueStore;

use super::{forward_key, membership_key, SessionToken, UserId, SESSION_LIFETIME};

/// Creates, authenticates and revokes sessions on top of a [`KeyValueStore`].
///
/// Cloning is cheap; clones share the backing store.
#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn KeyValueStore>,
    lifetime: Duration,
}

impl SessionStore {
    /// Session store with the default 30-day lifetime.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_lifetime(store, SESSION_LIFETIME)
    }

    pub fn with_lifetime(store: Arc<dyn KeyValueStore>, lifetime: Duration) -> Self {
        Self { store, lifetime }
    }

    /// Lifetime of newly created sessions.
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Issue a new session for `user_id`.
    ///
    /// The forward record is written first, then the token is added to the
    /// user's membership set. Both writes run on their own task, so a request
    /// that is cancelled while awaiting this call cannot leave the pair half
    /// written. If the membership write fails the forward record is removed
    /// again and the error is returned.
    pub async fn create(
        &self,
        ctx: &RequestContext,
        user_id: UserId,
    ) -> Result<SessionToken, SessionError> {
        let token = SessionToken::generate();

        let store = Arc::clone(&self.store);
        let forward = forward_key(token.as_str());
        let membership = membership_key(user_id);
        let member = token.as_str().to_string();
        let lifetime = self.lifetime;

        let write = tokio::spawn(
            async move {
                store
                    .set_with_ttl(&forward, &user_id.to_string(), lifetime)
                    .await?;

                if let Err(err) = store.set_add(&membership, &member).await {
                    if let Err(cleanup) = store.delete(&[forward]).await {
                        warn!(error = %cleanup, "Failed to remove orphaned session record");
                    }
                    return Err(err);
                }

                Ok::<(), StoreError>(())
            }
            .instrument(ctx.span().clone()),
        );

        match write.await {
            Ok(Ok(())) => {
                debug!(parent: ctx.span(), user_id, "Session created");
                Ok(token)
            }
            Ok(Err(err)) => {
                error!(parent: ctx.span(), user_id, error = %err, "Failed to create session");
                Err(err.into())
            }
            Err(join) => {
                error!(parent: ctx.span(), user_id, error = %join, "Session write task failed");
                Err(StoreError::Backend(format!("session write task failed: {join}")).into())
            }
        }
    }

    /// Resolve `token` to the user it was issued to.
    ///
    /// Unknown, expired and revoked tokens yield
    /// [`SessionError::InvalidSessionToken`]; store failures propagate.
    pub async fn authenticate(
        &self,
        ctx: &RequestContext,
        token: &SessionToken,
    ) -> Result<UserId, SessionError> {
        let key = forward_key(token.as_str());

        match self.store.get(&key).await {
            Ok(Some(value)) => value.trim().parse::<UserId>().map_err(|_| {
                error!(parent: ctx.span(), key = %key, "Session record is not a user id");
                SessionError::Store(StoreError::Corrupt { key, value })
            }),
            Ok(None) => {
                debug!(parent: ctx.span(), "Session does not exist");
                Err(SessionError::InvalidSessionToken)
            }
            Err(err) => {
                error!(parent: ctx.span(), error = %err, "Failed to read session");
                Err(err.into())
            }
        }
    }

    /// Tokens currently listed in the membership set of `user_id`.
    ///
    /// Tokens whose forward record already expired stay listed until the
    /// next [`invalidate_all`](Self::invalidate_all).
    pub async fn tokens_of(&self, user_id: UserId) -> Result<Vec<String>, SessionError> {
        Ok(self.store.set_members(&membership_key(user_id)).await?)
    }

    /// Revoke every session of `user_id`.
    ///
    /// All forward records listed in the membership set and the set itself
    /// are deleted in one batch. Listed tokens whose forward record already
    /// expired are skipped by the delete; the return value counts only the
    /// sessions that were still live.
    pub async fn invalidate_all(
        &self,
        ctx: &RequestContext,
        user_id: UserId,
    ) -> Result<usize, SessionError> {
        let membership = membership_key(user_id);
        let tokens = self.store.set_members(&membership).await?;

        let mut keys: Vec<String> = tokens.iter().map(|token| forward_key(token)).collect();
        keys.push(membership);

        match self.store.delete(&keys).await {
            Ok(deleted) => {
                // The membership set itself is counted when it existed
                let revoked = deleted.saturating_sub(usize::from(!tokens.is_empty()));
                debug!(
                    parent: ctx.span(),
                    user_id,
                    listed = tokens.len(),
                    revoked,
                    "Sessions invalidated"
                );
                Ok(revoked)
            }
            Err(err) => {
                error!(parent: ctx.span(), user_id, error = %err, "Failed to invalidate sessions");
                Err(err.into())
            }
        }
    }

    /// Check the backing store is reachable.
    pub async fn ping(&self) -> Result<(), SessionError> {
        Ok(self.store.ping().await?)
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
