// ============================
// crates/auth-lib/src/auth/service.rs
// ============================
//! Service trait the transport layer programs against.

use async_trait::async_trait;

use crate::error::AuthResult;
use authgate_common::{PublicUser, SessionTokens, UserId};

/// The operations the authentication core exposes to the transport
/// layer. Each returns a plain result or a named failure condition;
/// nothing here panics on expected outcomes.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Create an account and start a session
    async fn register(&self, email: &str, password: &str) -> AuthResult<SessionTokens>;

    /// Verify credentials and start a session
    async fn login(&self, email: &str, password: &str) -> AuthResult<SessionTokens>;

    /// Exchange a refresh token for a new session. The presented
    /// token is always rotated out.
    async fn refresh(&self, refresh_token: &str) -> AuthResult<SessionTokens>;

    /// Revoke one refresh token, ownership-checked. Returns whether a
    /// record was actually deleted.
    async fn logout(&self, refresh_token: &str, user_id: UserId) -> AuthResult<bool>;

    /// Revoke every refresh token of a user ("log out everywhere")
    async fn logout_all(&self, user_id: UserId) -> AuthResult<usize>;

    /// Fetch the public profile of a user
    async fn get_profile(&self, user_id: UserId) -> AuthResult<PublicUser>;
}
