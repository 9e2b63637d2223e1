// ============================
// crates/auth-lib/src/config.rs
// ============================
//! Configuration management.
//!
//! Settings are merged from an optional TOML file and
//! `AUTHGATE_`-prefixed environment variables. The application secret
//! (pepper and token signing key) is never hard-coded: production
//! refuses to start without one, development falls back to a random
//! ephemeral secret that does not survive restarts.

use anyhow::{bail, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use rand::{rngs::OsRng, RngCore};
use serde::Deserialize;
use tracing::warn;

/// Deployment environment. Drives the secret policy and the default
/// rate-limit backend selection.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

/// Application settings
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Settings {
    /// Deployment environment
    pub environment: Environment,
    /// Application secret: Argon2 pepper and access-token signing key.
    /// Mandatory in production.
    pub secret: Option<String>,
    /// Access token lifetime in seconds (minutes, not days)
    pub access_token_ttl_secs: u64,
    /// Refresh token lifetime in seconds
    pub refresh_token_ttl_secs: u64,
    /// Account lockout policy
    pub lockout: LockoutPolicy,
    /// Password strength policy
    pub strength: StrengthPolicy,
    /// Rate limiting settings
    pub rate_limit: RateLimitSettings,
}

/// Account lockout policy
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct LockoutPolicy {
    /// Failed attempts before the account locks
    pub max_attempts: u32,
    /// Lockout window in seconds
    pub lockout_secs: u64,
}

/// Password strength policy
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct StrengthPolicy {
    /// Minimum password length (hard error below this)
    pub min_length: usize,
    /// Maximum password length (hard error above this)
    pub max_length: usize,
    /// Minimum cumulative strength score
    pub score_floor: u32,
}

/// Per-scope fixed-window rate limit rule
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct RateLimitRule {
    /// Maximum requests per window
    pub max_requests: u64,
    /// Window length in seconds
    pub window_secs: u64,
}

/// Rate limiting settings.
///
/// Registration and login are far stricter than general traffic:
/// they are the highest-value brute-force targets.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RateLimitSettings {
    /// Redis URL for the distributed backend. When unset (or
    /// unreachable) the in-process backend is used.
    pub redis_url: Option<String>,
    /// Sweep interval for the in-process backend, in seconds
    pub sweep_interval_secs: u64,
    pub register: RateLimitRule,
    pub login: RateLimitRule,
    pub general: RateLimitRule,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            secret: None,
            access_token_ttl_secs: 15 * 60,
            refresh_token_ttl_secs: 7 * 24 * 60 * 60,
            lockout: LockoutPolicy::default(),
            strength: StrengthPolicy::default(),
            rate_limit: RateLimitSettings::default(),
        }
    }
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lockout_secs: 15 * 60,
        }
    }
}

impl Default for StrengthPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 128,
            score_floor: 5,
        }
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            redis_url: None,
            sweep_interval_secs: 60,
            register: RateLimitRule {
                max_requests: 5,
                window_secs: 60 * 60,
            },
            login: RateLimitRule {
                max_requests: 10,
                window_secs: 15 * 60,
            },
            general: RateLimitRule {
                max_requests: 100,
                window_secs: 60,
            },
        }
    }
}

impl Settings {
    /// Load settings from `authgate.toml` and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from("authgate.toml")
    }

    /// Load settings from an explicit TOML path, then environment
    pub fn load_from(path: &str) -> Result<Self> {
        let settings = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("AUTHGATE_"))
            .extract()?;

        Ok(settings)
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Resolve the application secret.
    ///
    /// Production without an explicit secret is a hard startup error:
    /// a guessable default pepper would silently weaken every stored
    /// digest. Development generates a random ephemeral secret, which
    /// is fine since it need not survive restarts.
    pub fn app_secret(&self) -> Result<String> {
        if let Some(secret) = &self.secret {
            if secret.is_empty() {
                bail!("application secret must not be empty");
            }
            return Ok(secret.clone());
        }

        if self.is_production() {
            bail!("AUTHGATE_SECRET must be configured in production");
        }

        warn!("no application secret configured; using a random ephemeral secret (development only)");
        let mut buffer = [0u8; 32];
        OsRng.fill_bytes(&mut buffer);
        Ok(URL_SAFE_NO_PAD.encode(buffer))
    }
}
