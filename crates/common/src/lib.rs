// ================
// common/src/lib.rs
// ================
//! Common record types shared between the `Authgate` core library and
//! the migration tooling. These are plain data carriers; all behaviour
//! (hashing, lockout, token lifecycle) lives in `authgate-lib`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier type for user accounts
pub type UserId = Uuid;

/// Role assigned to a user account
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    /// Stable string form, used in signed token claims
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// A stored user account record.
///
/// `password_hash` is a scheme-tagged credential digest (PHC string);
/// consumers must treat it as opaque. `failed_attempts` and
/// `locked_until` belong to the lockout tracker and are only mutated
/// through the user store's `update_attempts`.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: UserId,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    /// Consecutive failed login attempts since the last success
    pub failed_attempts: u32,
    /// End of the active lockout window, if any
    pub locked_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Fields required to create a new user record
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// User profile as exposed to clients: never carries the digest or
/// lockout bookkeeping.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: UserId,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<&UserRecord> for PublicUser {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
            created_at: user.created_at,
        }
    }
}

/// A stored refresh token record.
///
/// The token string is opaque: consumers must never parse it, only
/// present it back for validation, rotation or revocation.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRecord {
    pub token: String,
    pub owner_id: UserId,
    pub expires_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    /// A record is live iff its expiry is in the future
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Access + refresh token pair handed out at registration, login and
/// refresh.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SessionTokens {
    pub user: PublicUser,
    /// Short-lived signed token for authorization checks
    pub access_token: String,
    /// Long-lived opaque token; only good for minting new access tokens
    pub refresh_token: String,
}
