// ============================
// crates/auth-lib/src/lib.rs
// ============================
//! Core authentication functionality for `Authgate`: credential
//! hashing, account lockout, refresh/access token lifecycle, rate
//! limiting and migration backups. HTTP wiring lives elsewhere and
//! talks to this crate through [`auth::AuthService`] and
//! [`rate_limit::RateLimiter`].

pub mod auth;
pub mod backup;
pub mod config;
pub mod error;
pub mod metrics;
pub mod rate_limit;
pub mod storage;

use std::sync::Arc;

use crate::auth::{AuthService, DefaultAuth, MemoryRefreshTokenStore, RefreshTokenStore};
use crate::config::Settings;
use crate::rate_limit::RateLimiter;
use crate::storage::{MemoryUserStore, UserStore};

/// Composition root shared across all request handlers
#[derive(Clone)]
pub struct AuthCore {
    /// Authentication orchestrator
    pub auth: Arc<dyn AuthService>,
    /// Settings the core was built from
    pub settings: Arc<Settings>,
    /// Rate limiter guarding the auth endpoints
    pub rate_limiter: Arc<RateLimiter>,
}

impl AuthCore {
    /// Wire the core against the given stores. Fails when the
    /// configuration is unusable (e.g. production without a secret).
    pub async fn new(
        settings: Settings,
        users: Arc<dyn UserStore>,
        tokens: Arc<dyn RefreshTokenStore>,
    ) -> anyhow::Result<Self> {
        let auth = Arc::new(DefaultAuth::new(&settings, users, tokens)?);
        let rate_limiter = Arc::new(RateLimiter::from_settings(settings.rate_limit.clone()).await);

        Ok(Self {
            auth,
            settings: Arc::new(settings),
            rate_limiter,
        })
    }

    /// Core over in-memory stores, for tests and single-process
    /// deployments
    pub async fn new_in_memory(settings: Settings) -> anyhow::Result<Self> {
        Self::new(
            settings,
            Arc::new(MemoryUserStore::new()),
            Arc::new(MemoryRefreshTokenStore::new()),
        )
        .await
    }

    /// Stop owned background work (the local rate-limit sweep)
    pub async fn shutdown(&self) {
        self.rate_limiter.shutdown().await;
    }
}
