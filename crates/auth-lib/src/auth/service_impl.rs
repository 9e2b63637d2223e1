// ============================
// crates/auth-lib/src/auth/service_impl.rs
// ============================
//! Default implementation of the `AuthService` orchestrator.
//!
//! Composes the credential hasher, lockout tracker, refresh token
//! service and access token issuer over the injected stores. Unknown
//! email and wrong password produce the same `InvalidCredentials`
//! error, and the unknown-email path still performs a digest
//! verification against a decoy so the two cannot be told apart by
//! timing.

use std::sync::Arc;
use std::sync::LazyLock;

use anyhow::Context;
use async_trait::async_trait;
use metrics::counter;
use regex::Regex;
use tracing::{debug, info};

use crate::auth::access::AccessTokenIssuer;
use crate::auth::lockout::LockoutTracker;
use crate::auth::password::CredentialHasher;
use crate::auth::refresh::{RefreshTokenService, RefreshTokenStore};
use crate::auth::service::AuthService;
use crate::auth::token_generator::generate_opaque_token;
use crate::config::Settings;
use crate::error::{AuthError, AuthResult};
use crate::metrics::{LOGIN_FAILURE, LOGIN_SUCCESS, USER_REGISTERED};
use crate::storage::UserStore;
use authgate_common::{NewUser, PublicUser, Role, SessionTokens, UserId, UserRecord};

static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap());

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321 SMTP limit

/// Default auth orchestrator
pub struct DefaultAuth {
    users: Arc<dyn UserStore>,
    hasher: CredentialHasher,
    lockout: LockoutTracker,
    refresh_tokens: RefreshTokenService,
    access_tokens: AccessTokenIssuer,
    /// Digest verified against when the email is unknown, to equalize
    /// the cost of the two `InvalidCredentials` paths
    decoy_digest: String,
}

impl DefaultAuth {
    pub fn new(
        settings: &Settings,
        users: Arc<dyn UserStore>,
        token_store: Arc<dyn RefreshTokenStore>,
    ) -> anyhow::Result<Self> {
        let secret = settings.app_secret()?;
        let hasher = CredentialHasher::new(&secret, settings.strength);
        let decoy_digest = hasher
            .hash_unchecked(&generate_opaque_token())
            .context("failed to derive decoy digest")?;

        Ok(Self {
            lockout: LockoutTracker::new(users.clone(), settings.lockout),
            refresh_tokens: RefreshTokenService::new(
                token_store,
                settings.refresh_token_ttl_secs,
            ),
            access_tokens: AccessTokenIssuer::new(&secret, settings.access_token_ttl_secs),
            decoy_digest,
            hasher,
            users,
        })
    }

    fn validate_email(email: &str) -> AuthResult<()> {
        if email.is_empty() || email.len() > MAX_EMAIL_LENGTH || !EMAIL_REGEX.is_match(email) {
            return Err(AuthError::InvalidEmail);
        }
        Ok(())
    }

    async fn session_tokens(&self, user: &UserRecord) -> AuthResult<SessionTokens> {
        Ok(SessionTokens {
            user: PublicUser::from(user),
            access_token: self.access_tokens.issue(user.id, user.role)?,
            refresh_token: self.refresh_tokens.issue(user.id).await?,
        })
    }

    /// Upgrade a digest produced under an older scheme or with stale
    /// cost parameters. Best effort: a failure here must not fail the
    /// login that just succeeded.
    async fn maybe_rehash(&self, user: &UserRecord, password: &str) {
        if !self.hasher.needs_rehash(&user.password_hash) {
            return;
        }
        match self.hasher.hash_unchecked(password) {
            Ok(digest) => {
                if let Err(err) = self.users.update_digest(user.id, &digest).await {
                    debug!(user_id = %user.id, %err, "deferred digest upgrade failed");
                } else {
                    info!(user_id = %user.id, "credential digest upgraded to current scheme");
                }
            },
            Err(err) => debug!(user_id = %user.id, %err, "deferred digest upgrade failed"),
        }
    }
}

#[async_trait]
impl AuthService for DefaultAuth {
    async fn register(&self, email: &str, password: &str) -> AuthResult<SessionTokens> {
        Self::validate_email(email)?;

        if self.users.find_by_email(email).await?.is_some() {
            return Err(AuthError::EmailAlreadyExists);
        }

        let digest = self.hasher.hash(password)?;
        let user = self
            .users
            .create(NewUser {
                email: email.to_string(),
                password_hash: digest,
                role: Role::User,
            })
            .await?;

        counter!(USER_REGISTERED).increment(1);
        info!(user_id = %user.id, "user registered");
        self.session_tokens(&user).await
    }

    async fn login(&self, email: &str, password: &str) -> AuthResult<SessionTokens> {
        let Some(user) = self.users.find_by_email(email).await? else {
            // Unknown email: burn a verification anyway
            let _ = self.hasher.verify(password, &self.decoy_digest);
            counter!(LOGIN_FAILURE).increment(1);
            return Err(AuthError::InvalidCredentials);
        };

        let status = self.lockout.check_user(&user).await?;
        if status.is_locked {
            return Err(AuthError::AccountLocked {
                locked_until: status.locked_until.unwrap_or_else(chrono::Utc::now),
            });
        }

        if !self.hasher.verify(password, &user.password_hash) {
            self.lockout.record_failure(user.id).await?;
            counter!(LOGIN_FAILURE).increment(1);
            return Err(AuthError::InvalidCredentials);
        }

        self.lockout.record_success(user.id).await?;
        self.maybe_rehash(&user, password).await;

        counter!(LOGIN_SUCCESS).increment(1);
        self.session_tokens(&user).await
    }

    async fn refresh(&self, refresh_token: &str) -> AuthResult<SessionTokens> {
        let (user_id, new_refresh) = self.refresh_tokens.rotate(refresh_token).await?;

        let Some(user) = self.users.find_by_id(user_id).await? else {
            // Owner deleted between issuance and refresh: drop the
            // replacement we just minted
            self.refresh_tokens.revoke_all(user_id).await?;
            return Err(AuthError::UserNotFound);
        };

        Ok(SessionTokens {
            user: PublicUser::from(&user),
            access_token: self.access_tokens.issue(user.id, user.role)?,
            refresh_token: new_refresh,
        })
    }

    async fn logout(&self, refresh_token: &str, user_id: UserId) -> AuthResult<bool> {
        self.refresh_tokens.revoke(refresh_token, user_id).await
    }

    async fn logout_all(&self, user_id: UserId) -> AuthResult<usize> {
        self.refresh_tokens.revoke_all(user_id).await
    }

    async fn get_profile(&self, user_id: UserId) -> AuthResult<PublicUser> {
        match self.users.find_by_id(user_id).await? {
            Some(user) => Ok(PublicUser::from(&user)),
            None => Err(AuthError::UserNotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::refresh::MemoryRefreshTokenStore;
    use crate::storage::MemoryUserStore;
    use chrono::Utc;

    const GOOD_PASSWORD: &str = "Str0ng&Secure!Pw";

    fn setup() -> (Arc<MemoryUserStore>, Arc<MemoryRefreshTokenStore>, DefaultAuth) {
        let users = Arc::new(MemoryUserStore::new());
        let tokens = Arc::new(MemoryRefreshTokenStore::new());
        let settings = Settings {
            secret: Some("service-test-secret".to_string()),
            ..Settings::default()
        };
        let auth = DefaultAuth::new(&settings, users.clone(), tokens.clone()).unwrap();
        (users, tokens, auth)
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let (_users, _tokens, auth) = setup();

        let session = auth.register("new@example.com", GOOD_PASSWORD).await.unwrap();
        assert_eq!(session.user.email, "new@example.com");
        assert_eq!(session.user.role, Role::User);
        assert!(!session.access_token.is_empty());
        assert!(!session.refresh_token.is_empty());

        let session = auth.login("new@example.com", GOOD_PASSWORD).await.unwrap();
        assert_eq!(session.user.email, "new@example.com");
    }

    #[tokio::test]
    async fn test_register_rejects_bad_input() {
        let (_users, _tokens, auth) = setup();

        assert!(matches!(
            auth.register("not-an-email", GOOD_PASSWORD).await.unwrap_err(),
            AuthError::InvalidEmail
        ));
        assert!(matches!(
            auth.register("ok@example.com", "weak").await.unwrap_err(),
            AuthError::WeakPassword { .. }
        ));

        auth.register("dup@example.com", GOOD_PASSWORD).await.unwrap();
        assert!(matches!(
            auth.register("dup@example.com", GOOD_PASSWORD).await.unwrap_err(),
            AuthError::EmailAlreadyExists
        ));
    }

    #[tokio::test]
    async fn test_login_same_error_for_unknown_email_and_wrong_password() {
        let (_users, _tokens, auth) = setup();
        auth.register("known@example.com", GOOD_PASSWORD).await.unwrap();

        let unknown = auth.login("ghost@example.com", GOOD_PASSWORD).await.unwrap_err();
        let wrong = auth.login("known@example.com", "Wr0ng&Secure!Pw").await.unwrap_err();

        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert_eq!(unknown.sanitized_message(), wrong.sanitized_message());
    }

    #[tokio::test]
    async fn test_repeated_failures_lock_the_account() {
        let (_users, _tokens, auth) = setup();
        auth.register("victim@example.com", GOOD_PASSWORD).await.unwrap();

        for _ in 0..5 {
            let err = auth
                .login("victim@example.com", "Wr0ng&Secure!Pw")
                .await
                .unwrap_err();
            assert!(matches!(err, AuthError::InvalidCredentials));
        }

        // Even the correct password is refused while locked
        let err = auth.login("victim@example.com", GOOD_PASSWORD).await.unwrap_err();
        match err {
            AuthError::AccountLocked { locked_until } => assert!(locked_until > Utc::now()),
            other => panic!("expected AccountLocked, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_successful_login_resets_failures() {
        let (users, _tokens, auth) = setup();
        let session = auth.register("reset@example.com", GOOD_PASSWORD).await.unwrap();

        for _ in 0..3 {
            let _ = auth.login("reset@example.com", "Wr0ng&Secure!Pw").await;
        }
        auth.login("reset@example.com", GOOD_PASSWORD).await.unwrap();

        let user = users.find_by_id(session.user.id).await.unwrap().unwrap();
        assert_eq!(user.failed_attempts, 0);
    }

    #[tokio::test]
    async fn test_refresh_rotates_token() {
        let (_users, _tokens, auth) = setup();
        let session = auth.register("rotate@example.com", GOOD_PASSWORD).await.unwrap();

        let renewed = auth.refresh(&session.refresh_token).await.unwrap();
        assert_ne!(renewed.refresh_token, session.refresh_token);
        assert_eq!(renewed.user.id, session.user.id);

        // The presented token died with the rotation
        assert!(matches!(
            auth.refresh(&session.refresh_token).await.unwrap_err(),
            AuthError::TokenInvalid
        ));
        // The replacement still works
        auth.refresh(&renewed.refresh_token).await.unwrap();
    }

    #[tokio::test]
    async fn test_logout_is_ownership_checked() {
        let (_users, tokens, auth) = setup();
        let session = auth.register("owner@example.com", GOOD_PASSWORD).await.unwrap();
        let stranger = auth.register("stranger@example.com", GOOD_PASSWORD).await.unwrap();

        assert!(!auth
            .logout(&session.refresh_token, stranger.user.id)
            .await
            .unwrap());
        assert!(auth
            .logout(&session.refresh_token, session.user.id)
            .await
            .unwrap());
        assert_eq!(tokens.len(), 1); // only the stranger's token remains
    }

    #[tokio::test]
    async fn test_logout_all_revokes_every_session() {
        let (_users, _tokens, auth) = setup();
        let first = auth.register("multi@example.com", GOOD_PASSWORD).await.unwrap();
        let second = auth.login("multi@example.com", GOOD_PASSWORD).await.unwrap();

        assert_eq!(auth.logout_all(first.user.id).await.unwrap(), 2);
        assert!(auth.refresh(&first.refresh_token).await.is_err());
        assert!(auth.refresh(&second.refresh_token).await.is_err());
    }

    #[tokio::test]
    async fn test_get_profile() {
        let (_users, _tokens, auth) = setup();
        let session = auth.register("profile@example.com", GOOD_PASSWORD).await.unwrap();

        let profile = auth.get_profile(session.user.id).await.unwrap();
        assert_eq!(profile, session.user);

        assert!(matches!(
            auth.get_profile(uuid::Uuid::new_v4()).await.unwrap_err(),
            AuthError::UserNotFound
        ));
    }

    #[tokio::test]
    async fn test_refresh_for_deleted_user() {
        let (_users, tokens, auth) = setup();
        // Token exists but its owner never did
        let orphan_owner = uuid::Uuid::new_v4();
        let service = RefreshTokenService::new(tokens.clone(), 3600);
        let orphan = service.issue(orphan_owner).await.unwrap();

        assert!(matches!(
            auth.refresh(&orphan).await.unwrap_err(),
            AuthError::UserNotFound
        ));
        // Nothing left behind for the vanished owner
        assert_eq!(tokens.len(), 0);
    }

    #[tokio::test]
    async fn test_legacy_digest_fails_closed() {
        let (users, _tokens, auth) = setup();
        let session = auth.register("legacy@example.com", GOOD_PASSWORD).await.unwrap();

        // Simulate a digest from a retired scheme: login must fail
        // closed rather than attempt a legacy verification
        users
            .update_digest(session.user.id, "$scrypt$ln=17,r=8,p=1$c2FsdA$aGFzaA")
            .await
            .unwrap();
        assert!(matches!(
            auth.login("legacy@example.com", GOOD_PASSWORD).await.unwrap_err(),
            AuthError::InvalidCredentials
        ));
    }
}
