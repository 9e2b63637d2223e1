// crates/auth-lib/src/error.rs

//! Central error type for the authentication core.
//!
//! Every expected failure of an auth operation is a named variant so
//! the transport layer can map it to a status code and a user-facing
//! message. Only genuinely unexpected conditions (store unreachable,
//! corrupt serialization outside the backup path) travel through the
//! `Store`/`Io`/`Json` passthroughs.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type for auth operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Failure taxonomy of the authentication core
#[derive(Error, Debug)]
pub enum AuthError {
    /// Wrong password or unknown email. Deliberately one variant for
    /// both cases to avoid account enumeration.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account locked until {locked_until}")]
    AccountLocked { locked_until: DateTime<Utc> },

    #[error("Password does not meet strength requirements: {}", reasons.join("; "))]
    WeakPassword { reasons: Vec<String> },

    #[error("Email already registered")]
    EmailAlreadyExists,

    #[error("Invalid email address")]
    InvalidEmail,

    /// Refresh token absent, expired, rotated or revoked
    #[error("Invalid or expired token")]
    TokenInvalid,

    #[error("User not found")]
    UserNotFound,

    #[error("Rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: i64 },

    /// Backup is encrypted and no key was supplied
    #[error("Decryption key required")]
    DecryptionKeyRequired,

    /// Backup failed authentication or its declared record count does
    /// not match the decoded payload
    #[error("Backup integrity violation")]
    IntegrityViolation,

    #[error("Cryptographic failure: {0}")]
    Crypto(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AuthError {
    /// HTTP status the transport layer should map this error to.
    /// Plain `u16` on purpose: the core does not depend on any HTTP
    /// framework.
    pub fn http_status(&self) -> u16 {
        match self {
            AuthError::InvalidCredentials | AuthError::TokenInvalid => 401,
            AuthError::AccountLocked { .. } => 423,
            AuthError::WeakPassword { .. }
            | AuthError::InvalidEmail
            | AuthError::DecryptionKeyRequired => 400,
            AuthError::EmailAlreadyExists => 409,
            AuthError::UserNotFound => 404,
            AuthError::RateLimited { .. } => 429,
            AuthError::IntegrityViolation => 422,
            _ => 500,
        }
    }

    /// Stable machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "AUTH_001",
            AuthError::AccountLocked { .. } => "AUTH_002",
            AuthError::WeakPassword { .. } => "AUTH_003",
            AuthError::EmailAlreadyExists => "AUTH_004",
            AuthError::TokenInvalid => "AUTH_005",
            AuthError::UserNotFound => "AUTH_006",
            AuthError::InvalidEmail => "AUTH_007",
            AuthError::RateLimited { .. } => "RATE_001",
            AuthError::DecryptionKeyRequired => "BACKUP_001",
            AuthError::IntegrityViolation => "BACKUP_002",
            AuthError::Crypto(_) => "CRYPTO_001",
            AuthError::Store(_) => "STORE_001",
            AuthError::Io(_) => "IO_001",
            AuthError::Json(_) => "JSON_001",
        }
    }

    /// Message safe to show to end users. Internal details stay in
    /// the `Display` form for logs.
    pub fn sanitized_message(&self) -> String {
        match self {
            AuthError::InvalidCredentials => "Invalid email or password".to_string(),
            AuthError::AccountLocked { locked_until } => {
                format!("Account temporarily locked until {locked_until}")
            },
            AuthError::WeakPassword { reasons } => {
                if reasons.is_empty() {
                    "Password is too weak".to_string()
                } else {
                    format!("Password is too weak: {}", reasons.join("; "))
                }
            },
            AuthError::EmailAlreadyExists => "Email already registered".to_string(),
            AuthError::InvalidEmail => "Invalid email address".to_string(),
            AuthError::TokenInvalid => "Invalid or expired token".to_string(),
            AuthError::UserNotFound => "User not found".to_string(),
            AuthError::RateLimited { .. } => {
                "Too many requests, please try again later".to_string()
            },
            AuthError::DecryptionKeyRequired => {
                "This backup is encrypted; a decryption key is required".to_string()
            },
            AuthError::IntegrityViolation => "Backup failed integrity checks".to_string(),
            _ => "An internal error occurred".to_string(),
        }
    }

    /// True for variants the caller should treat as an expected
    /// outcome rather than an operational fault
    pub fn is_expected(&self) -> bool {
        !matches!(
            self,
            AuthError::Crypto(_) | AuthError::Store(_) | AuthError::Io(_) | AuthError::Json(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(AuthError::InvalidCredentials.http_status(), 401);
        assert_eq!(AuthError::TokenInvalid.http_status(), 401);
        assert_eq!(
            AuthError::AccountLocked { locked_until: Utc::now() }.http_status(),
            423
        );
        assert_eq!(AuthError::EmailAlreadyExists.http_status(), 409);
        assert_eq!(
            AuthError::RateLimited { retry_after_secs: 30 }.http_status(),
            429
        );
        assert_eq!(AuthError::IntegrityViolation.http_status(), 422);
        assert_eq!(
            AuthError::Crypto("bad key length".to_string()).http_status(),
            500
        );
    }

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(AuthError::InvalidCredentials.error_code(), "AUTH_001");
        assert_eq!(AuthError::DecryptionKeyRequired.error_code(), "BACKUP_001");
        assert_eq!(AuthError::IntegrityViolation.error_code(), "BACKUP_002");
        assert_eq!(
            AuthError::RateLimited { retry_after_secs: 1 }.error_code(),
            "RATE_001"
        );
    }

    #[test]
    fn test_sanitized_message_hides_internals() {
        let err = AuthError::Store(anyhow::anyhow!("connection refused to 10.0.0.1:5432"));
        assert!(!err.sanitized_message().contains("10.0.0.1"));

        // Same user-facing message for unknown email and wrong password
        assert_eq!(
            AuthError::InvalidCredentials.sanitized_message(),
            "Invalid email or password"
        );
    }

    #[test]
    fn test_expected_vs_fault() {
        assert!(AuthError::InvalidCredentials.is_expected());
        assert!(AuthError::TokenInvalid.is_expected());
        assert!(!AuthError::Store(anyhow::anyhow!("down")).is_expected());
    }

    #[test]
    fn test_from_impls() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: AuthError = io_err.into();
        assert!(matches!(err, AuthError::Io(_)));

        let json_err: serde_json::Error =
            serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: AuthError = json_err.into();
        assert!(matches!(err, AuthError::Json(_)));
    }
}
