// ============================
// crates/auth-lib/src/storage.rs
// ============================
//! User record store abstraction with an in-memory implementation.
//!
//! The real deployment backs this trait with a database; the core only
//! relies on the narrow interface below plus per-key read-modify-write
//! semantics for the lockout counters.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use authgate_common::{NewUser, UserId, UserRecord};

/// Trait for user record stores
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Find a user by email (exact match)
    async fn find_by_email(&self, email: &str) -> AuthResult<Option<UserRecord>>;

    /// Find a user by id
    async fn find_by_id(&self, id: UserId) -> AuthResult<Option<UserRecord>>;

    /// Create a new user record
    async fn create(&self, fields: NewUser) -> AuthResult<UserRecord>;

    /// Update the lockout bookkeeping for a user as a single
    /// read-modify-write. A missing user is not an error.
    async fn update_attempts(
        &self,
        id: UserId,
        failed_attempts: u32,
        locked_until: Option<DateTime<Utc>>,
    ) -> AuthResult<()>;

    /// Replace the credential digest for a user
    async fn update_digest(&self, id: UserId, digest: &str) -> AuthResult<()>;
}

/// In-memory implementation of the `UserStore` trait
#[derive(Default)]
pub struct MemoryUserStore {
    users: DashMap<UserId, UserRecord>,
    email_index: DashMap<String, UserId>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Snapshot of all user records, for the migration backup tooling
    pub fn all_users(&self) -> Vec<UserRecord> {
        self.users.iter().map(|entry| entry.value().clone()).collect()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> AuthResult<Option<UserRecord>> {
        let id = match self.email_index.get(email) {
            Some(id) => *id,
            None => return Ok(None),
        };
        Ok(self.users.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_by_id(&self, id: UserId) -> AuthResult<Option<UserRecord>> {
        Ok(self.users.get(&id).map(|entry| entry.value().clone()))
    }

    async fn create(&self, fields: NewUser) -> AuthResult<UserRecord> {
        let id = Uuid::new_v4();

        // Claim the email first so two concurrent registrations of the
        // same address cannot both succeed
        match self.email_index.entry(fields.email.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(AuthError::EmailAlreadyExists)
            },
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(id);
            },
        }

        let record = UserRecord {
            id,
            email: fields.email,
            password_hash: fields.password_hash,
            role: fields.role,
            failed_attempts: 0,
            locked_until: None,
            created_at: Utc::now(),
        };
        self.users.insert(id, record.clone());
        Ok(record)
    }

    async fn update_attempts(
        &self,
        id: UserId,
        failed_attempts: u32,
        locked_until: Option<DateTime<Utc>>,
    ) -> AuthResult<()> {
        if let Some(mut entry) = self.users.get_mut(&id) {
            entry.failed_attempts = failed_attempts;
            entry.locked_until = locked_until;
        }
        Ok(())
    }

    async fn update_digest(&self, id: UserId, digest: &str) -> AuthResult<()> {
        if let Some(mut entry) = self.users.get_mut(&id) {
            entry.password_hash = digest.to_string();
        }
        Ok(())
    }
}
