// ============================
// crates/auth-lib/src/auth/access.rs
// ============================
//! Short-lived signed access tokens.
//!
//! Access tokens are stateless: validity is purely signature plus
//! expiry, no store lookup. The refresh token (opaque, stored) can
//! only mint these; it cannot authorize anything by itself.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use authgate_common::{Role, UserId};

/// `token_type` claim value for access tokens
pub const TOKEN_TYPE_ACCESS: &str = "access";

/// Claims carried by a signed access token
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Owning user id
    pub sub: String,
    pub role: String,
    pub token_type: String,
    pub iat: i64,
    pub exp: i64,
}

impl AccessClaims {
    pub fn user_id(&self) -> AuthResult<UserId> {
        Uuid::parse_str(&self.sub).map_err(|_| AuthError::TokenInvalid)
    }

    pub fn role(&self) -> AuthResult<Role> {
        self.role.parse().map_err(|_| AuthError::TokenInvalid)
    }
}

/// Signs and verifies access tokens with the application secret
pub struct AccessTokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl AccessTokenIssuer {
    pub fn new(secret: &str, ttl_secs: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Short-lived tokens: no expiry leeway
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl: Duration::seconds(ttl_secs as i64),
        }
    }

    /// Sign a new access token for a user
    pub fn issue(&self, user_id: UserId, role: Role) -> AuthResult<String> {
        let now = Utc::now();
        let claims = AccessClaims {
            sub: user_id.to_string(),
            role: role.as_str().to_string(),
            token_type: TOKEN_TYPE_ACCESS.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Crypto(e.to_string()))
    }

    /// Verify signature, expiry and token type
    pub fn verify(&self, token: &str) -> AuthResult<AccessClaims> {
        let data = decode::<AccessClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|_| AuthError::TokenInvalid)?;

        if data.claims.token_type != TOKEN_TYPE_ACCESS {
            return Err(AuthError::TokenInvalid);
        }

        Ok(data.claims)
    }
}
