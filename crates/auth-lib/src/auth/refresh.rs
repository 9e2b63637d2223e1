// ============================
// crates/auth-lib/src/auth/refresh.rs
// ============================
//! Refresh token lifecycle: issuance, validation, rotation and
//! ownership-checked revocation.
//!
//! Refresh tokens are opaque, high-entropy strings validated only by
//! store lookup. Expired records are garbage-collected lazily when
//! read. Rotation is mandatory on every refresh: a leaked token is
//! good for at most one use.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use metrics::counter;

use crate::auth::token_generator::generate_opaque_token;
use crate::error::{AuthError, AuthResult};
use crate::metrics::{TOKEN_ISSUED, TOKEN_REVOKED, TOKEN_ROTATED};
use authgate_common::{RefreshTokenRecord, UserId};

/// Trait for refresh token record stores
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Store a new token record
    async fn create(&self, record: RefreshTokenRecord) -> AuthResult<()>;

    /// Look up a record without consuming it
    async fn find_by_token(&self, token: &str) -> AuthResult<Option<RefreshTokenRecord>>;

    /// Delete a record, returning it. Take semantics: of two
    /// concurrent callers, at most one receives the record.
    async fn take_by_token(&self, token: &str) -> AuthResult<Option<RefreshTokenRecord>>;

    /// Delete a record only if its owner matches, as a single
    /// conditional operation, not a read followed by a delete
    async fn delete_if_owned_by(&self, token: &str, owner_id: UserId) -> AuthResult<bool>;

    /// Delete every record owned by a user ("log out everywhere"),
    /// returning how many were removed
    async fn delete_all_by_owner(&self, owner_id: UserId) -> AuthResult<usize>;
}

/// In-memory implementation of the `RefreshTokenStore` trait
#[derive(Default)]
pub struct MemoryRefreshTokenStore {
    tokens: DashMap<String, RefreshTokenRecord>,
}

impl MemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryRefreshTokenStore {
    async fn create(&self, record: RefreshTokenRecord) -> AuthResult<()> {
        self.tokens.insert(record.token.clone(), record);
        Ok(())
    }

    async fn find_by_token(&self, token: &str) -> AuthResult<Option<RefreshTokenRecord>> {
        Ok(self.tokens.get(token).map(|entry| entry.value().clone()))
    }

    async fn take_by_token(&self, token: &str) -> AuthResult<Option<RefreshTokenRecord>> {
        Ok(self.tokens.remove(token).map(|(_, record)| record))
    }

    async fn delete_if_owned_by(&self, token: &str, owner_id: UserId) -> AuthResult<bool> {
        // remove_if holds the shard lock across the predicate, so the
        // ownership check and the delete are one atomic step
        Ok(self
            .tokens
            .remove_if(token, |_, record| record.owner_id == owner_id)
            .is_some())
    }

    async fn delete_all_by_owner(&self, owner_id: UserId) -> AuthResult<usize> {
        // Count inside the predicate: a before/after length diff is
        // wrong under concurrent inserts
        let removed = AtomicUsize::new(0);
        self.tokens.retain(|_, record| {
            if record.owner_id == owner_id {
                removed.fetch_add(1, Ordering::Relaxed);
                false
            } else {
                true
            }
        });
        Ok(removed.into_inner())
    }
}

/// Issues and manages opaque refresh tokens over a token store
pub struct RefreshTokenService {
    store: Arc<dyn RefreshTokenStore>,
    ttl: Duration,
}

impl RefreshTokenService {
    pub fn new(store: Arc<dyn RefreshTokenStore>, ttl_secs: u64) -> Self {
        Self {
            store,
            ttl: Duration::seconds(ttl_secs as i64),
        }
    }

    /// Issue a fresh token for a user
    pub async fn issue(&self, user_id: UserId) -> AuthResult<String> {
        let token = generate_opaque_token();
        self.store
            .create(RefreshTokenRecord {
                token: token.clone(),
                owner_id: user_id,
                expires_at: Utc::now() + self.ttl,
            })
            .await?;
        counter!(TOKEN_ISSUED).increment(1);
        Ok(token)
    }

    /// Resolve a token to its owner. An expired record is deleted on
    /// sight and reported invalid.
    pub async fn validate(&self, token: &str) -> AuthResult<UserId> {
        let Some(record) = self.store.find_by_token(token).await? else {
            return Err(AuthError::TokenInvalid);
        };

        if record.is_expired(Utc::now()) {
            self.store.take_by_token(token).await?;
            return Err(AuthError::TokenInvalid);
        }

        Ok(record.owner_id)
    }

    /// Atomically invalidate `old_token` and issue a replacement for
    /// the same owner. Take semantics on the delete mean two
    /// concurrent rotations of one token cannot both succeed.
    pub async fn rotate(&self, old_token: &str) -> AuthResult<(UserId, String)> {
        let Some(record) = self.store.take_by_token(old_token).await? else {
            return Err(AuthError::TokenInvalid);
        };

        if record.is_expired(Utc::now()) {
            return Err(AuthError::TokenInvalid);
        }

        let new_token = self.issue(record.owner_id).await?;
        counter!(TOKEN_ROTATED).increment(1);
        Ok((record.owner_id, new_token))
    }

    /// Delete a token iff it is owned by the requesting user. Returns
    /// whether a record was actually deleted.
    pub async fn revoke(&self, token: &str, requesting_user: UserId) -> AuthResult<bool> {
        let deleted = self.store.delete_if_owned_by(token, requesting_user).await?;
        if deleted {
            counter!(TOKEN_REVOKED).increment(1);
        }
        Ok(deleted)
    }

    /// Delete every token owned by a user
    pub async fn revoke_all(&self, user_id: UserId) -> AuthResult<usize> {
        let deleted = self.store.delete_all_by_owner(user_id).await?;
        counter!(TOKEN_REVOKED).increment(deleted as u64);
        Ok(deleted)
    }
}
