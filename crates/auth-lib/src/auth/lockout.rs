// ============================
// crates/auth-lib/src/auth/lockout.rs
// ============================
//! Account lockout tracking.
//!
//! A per-user state machine with two states, Open and Locked. Failed
//! verifications increment a counter; at the configured threshold the
//! account locks for a fixed window. Expiry is lazy: the lock clears
//! as a side effect of the next check, never via a background sweep.
//! A locked-out user who never retries stays marked locked in storage,
//! which is harmless.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use tracing::warn;

use crate::config::LockoutPolicy;
use crate::error::AuthResult;
use crate::metrics::ACCOUNT_LOCKED;
use crate::storage::UserStore;
use authgate_common::{UserId, UserRecord};

/// Outcome of a lockout check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockStatus {
    pub is_locked: bool,
    pub locked_until: Option<DateTime<Utc>>,
}

impl LockStatus {
    fn open() -> Self {
        Self {
            is_locked: false,
            locked_until: None,
        }
    }
}

/// Tracks failed login attempts per user through the user store.
///
/// Increments are a single read-modify-write against the store. A
/// concurrent off-by-one race merely shifts the lockout trigger by
/// one attempt, which the policy tolerates.
pub struct LockoutTracker {
    store: Arc<dyn UserStore>,
    policy: LockoutPolicy,
}

impl LockoutTracker {
    pub fn new(store: Arc<dyn UserStore>, policy: LockoutPolicy) -> Self {
        Self { store, policy }
    }

    fn lockout_duration(&self) -> Duration {
        Duration::seconds(self.policy.lockout_secs as i64)
    }

    /// Check whether an identity is locked out. Unknown identities
    /// are reported as not locked; no operation here ever errors on a
    /// missing user.
    pub async fn check_locked(&self, email: &str) -> AuthResult<LockStatus> {
        match self.store.find_by_email(email).await? {
            Some(user) => self.check_user(&user).await,
            None => Ok(LockStatus::open()),
        }
    }

    /// Check a loaded user record, clearing an expired lock in place
    pub async fn check_user(&self, user: &UserRecord) -> AuthResult<LockStatus> {
        let Some(locked_until) = user.locked_until else {
            return Ok(LockStatus::open());
        };

        if Utc::now() >= locked_until {
            // Lock window elapsed: reset as a side effect of the read
            self.store.update_attempts(user.id, 0, None).await?;
            return Ok(LockStatus::open());
        }

        Ok(LockStatus {
            is_locked: true,
            locked_until: Some(locked_until),
        })
    }

    /// Record a failed verification. Locks the account when the
    /// counter reaches the threshold; a failure during an active lock
    /// window neither shortens nor extends it.
    pub async fn record_failure(&self, user_id: UserId) -> AuthResult<()> {
        let Some(user) = self.store.find_by_id(user_id).await? else {
            return Ok(());
        };

        let now = Utc::now();
        let lock_active = user.locked_until.map(|until| now < until).unwrap_or(false);
        if lock_active {
            return Ok(());
        }

        // An expired lock means the previous streak is spent: this
        // failure starts a new count at 1
        let count = if user.locked_until.is_some() {
            1
        } else {
            user.failed_attempts + 1
        };

        let locked_until = if count >= self.policy.max_attempts {
            let until = now + self.lockout_duration();
            warn!(user_id = %user_id, until = %until, "account locked after repeated failures");
            counter!(ACCOUNT_LOCKED).increment(1);
            Some(until)
        } else {
            None
        };

        self.store.update_attempts(user_id, count, locked_until).await
    }

    /// Record a successful verification: the counter resets to zero
    /// unconditionally and any lock clears
    pub async fn record_success(&self, user_id: UserId) -> AuthResult<()> {
        self.store.update_attempts(user_id, 0, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryUserStore;
    use authgate_common::{NewUser, Role};

    const MAX_ATTEMPTS: u32 = 5;

    async fn setup() -> (Arc<MemoryUserStore>, LockoutTracker, UserRecord) {
        let store = Arc::new(MemoryUserStore::new());
        let tracker = LockoutTracker::new(
            store.clone(),
            LockoutPolicy {
                max_attempts: MAX_ATTEMPTS,
                lockout_secs: 15 * 60,
            },
        );
        let user = store
            .create(NewUser {
                email: "locked@example.com".to_string(),
                password_hash: "$argon2id$stub".to_string(),
                role: Role::User,
            })
            .await
            .unwrap();
        (store, tracker, user)
    }

    #[tokio::test]
    async fn test_unknown_identity_is_not_locked() {
        let (_store, tracker, _user) = setup().await;
        let status = tracker.check_locked("ghost@example.com").await.unwrap();
        assert!(!status.is_locked);
        assert!(status.locked_until.is_none());
    }

    #[tokio::test]
    async fn test_locks_at_exact_threshold() {
        let (store, tracker, user) = setup().await;

        for i in 1..MAX_ATTEMPTS {
            tracker.record_failure(user.id).await.unwrap();
            let status = tracker.check_locked(&user.email).await.unwrap();
            assert!(!status.is_locked, "locked after only {i} failures");
        }

        tracker.record_failure(user.id).await.unwrap();
        let status = tracker.check_locked(&user.email).await.unwrap();
        assert!(status.is_locked);
        assert!(status.locked_until.unwrap() > Utc::now());

        let stored = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.failed_attempts, MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_failure_during_lock_does_not_extend_window() {
        let (store, tracker, user) = setup().await;
        for _ in 0..MAX_ATTEMPTS {
            tracker.record_failure(user.id).await.unwrap();
        }
        let locked_until = store
            .find_by_id(user.id)
            .await
            .unwrap()
            .unwrap()
            .locked_until
            .unwrap();

        tracker.record_failure(user.id).await.unwrap();
        let after = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(after.locked_until.unwrap(), locked_until);
        assert_eq!(after.failed_attempts, MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_expired_lock_clears_on_check() {
        let (store, tracker, user) = setup().await;
        let past = Utc::now() - Duration::seconds(1);
        store
            .update_attempts(user.id, MAX_ATTEMPTS, Some(past))
            .await
            .unwrap();

        let status = tracker.check_locked(&user.email).await.unwrap();
        assert!(!status.is_locked);

        // The read reset the stored state
        let stored = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.failed_attempts, 0);
        assert!(stored.locked_until.is_none());
    }

    #[tokio::test]
    async fn test_failure_after_expiry_counts_from_one() {
        let (store, tracker, user) = setup().await;
        let past = Utc::now() - Duration::seconds(1);
        store
            .update_attempts(user.id, MAX_ATTEMPTS, Some(past))
            .await
            .unwrap();

        // No intervening check: the failure itself observes the
        // expired window and restarts the count
        tracker.record_failure(user.id).await.unwrap();
        let stored = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.failed_attempts, 1);
        assert!(stored.locked_until.is_none());
    }

    #[tokio::test]
    async fn test_success_resets_counter() {
        let (store, tracker, user) = setup().await;
        for _ in 0..3 {
            tracker.record_failure(user.id).await.unwrap();
        }
        tracker.record_success(user.id).await.unwrap();

        let stored = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.failed_attempts, 0);
        assert!(stored.locked_until.is_none());
    }

    #[tokio::test]
    async fn test_failure_for_unknown_user_is_noop() {
        let (_store, tracker, _user) = setup().await;
        tracker.record_failure(uuid::Uuid::new_v4()).await.unwrap();
        tracker.record_success(uuid::Uuid::new_v4()).await.unwrap();
    }
}
