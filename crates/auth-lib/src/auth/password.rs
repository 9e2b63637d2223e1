// ============================
// crates/auth-lib/src/auth/password.rs
// ============================
//! Credential hashing and verification.
//!
//! Digests are PHC-format strings produced by Argon2id keyed with the
//! application secret (pepper). The PHC identifier doubles as the
//! scheme tag: verification dispatches on it, and digests under an
//! unrecognized scheme fail closed (return `false`, never panic).
//! New policy parameters coexist with old digests; `needs_rehash`
//! lets the orchestrator upgrade them lazily on successful login.

use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};
use tracing::warn;
use zeroize::Zeroize;

use crate::auth::strength::validate_strength;
use crate::config::StrengthPolicy;
use crate::error::{AuthError, AuthResult};

/// PHC identifier of the current digest scheme
pub const SCHEME_ARGON2ID: &str = "argon2id";

/// Argon2id memory cost in KiB (19 MiB)
const MEMORY_COST_KIB: u32 = 19 * 1024;
/// Argon2id time cost (iterations)
const TIME_COST: u32 = 2;
/// Argon2id lanes
const PARALLELISM: u32 = 1;

/// Peppered password hasher with strength gating
pub struct CredentialHasher {
    secret: Vec<u8>,
    policy: StrengthPolicy,
}

impl CredentialHasher {
    pub fn new(secret: &str, policy: StrengthPolicy) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            policy,
        }
    }

    fn params(&self) -> AuthResult<Params> {
        Params::new(MEMORY_COST_KIB, TIME_COST, PARALLELISM, None)
            .map_err(|e| AuthError::Crypto(e.to_string()))
    }

    fn argon2(&self) -> AuthResult<Argon2<'_>> {
        Argon2::new_with_secret(
            &self.secret,
            Algorithm::Argon2id,
            Version::V0x13,
            self.params()?,
        )
        .map_err(|e| AuthError::Crypto(e.to_string()))
    }

    /// Hash a password into a scheme-tagged digest.
    ///
    /// Fails with `WeakPassword` when the password does not meet the
    /// strength policy; the per-password salt comes from `OsRng` and
    /// the pepper is mixed in as the Argon2 keyed secret.
    pub fn hash(&self, password: &str) -> AuthResult<String> {
        let report = validate_strength(password, &self.policy);
        if !report.is_valid {
            return Err(AuthError::WeakPassword {
                reasons: report.errors,
            });
        }

        self.hash_unchecked(password)
    }

    /// Hash without the strength gate. Used for the decoy digest the
    /// orchestrator verifies against when an email is unknown, so the
    /// two failure paths cost the same.
    pub(crate) fn hash_unchecked(&self, password: &str) -> AuthResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let digest = self
            .argon2()?
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::Crypto(e.to_string()))?
            .to_string();
        Ok(digest)
    }

    /// Hash a password and zeroize the plaintext
    pub fn hash_secure(&self, password: &mut String) -> AuthResult<String> {
        let digest = self.hash(password)?;
        password.zeroize();
        Ok(digest)
    }

    /// Verify a password against a digest. Never errors: malformed
    /// digests and unrecognized scheme tags return `false`.
    pub fn verify(&self, password: &str, digest: &str) -> bool {
        let parsed = match PasswordHash::new(digest) {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!("malformed credential digest; failing closed");
                return false;
            },
        };

        match parsed.algorithm.as_str() {
            SCHEME_ARGON2ID => {
                let argon2 = match self.argon2() {
                    Ok(argon2) => argon2,
                    Err(_) => return false,
                };
                // Comparison inside the verifier is constant-time
                argon2.verify_password(password.as_bytes(), &parsed).is_ok()
            },
            scheme => {
                warn!(scheme, "unrecognized digest scheme; failing closed");
                false
            },
        }
    }

    /// True when a digest was produced under an outdated scheme or
    /// with different cost parameters, so the orchestrator can
    /// re-hash on the next successful login.
    pub fn needs_rehash(&self, digest: &str) -> bool {
        let parsed = match PasswordHash::new(digest) {
            Ok(parsed) => parsed,
            Err(_) => return true,
        };
        if parsed.algorithm.as_str() != SCHEME_ARGON2ID {
            return true;
        }
        match Params::try_from(&parsed) {
            Ok(params) => {
                params.m_cost() != MEMORY_COST_KIB || params.t_cost() != TIME_COST
            },
            Err(_) => true,
        }
    }
}
