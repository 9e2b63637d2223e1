// ============================
// crates/auth-lib/src/rate_limit/mod.rs
// ============================
//! Fixed-window rate limiting for the authentication endpoints.
//!
//! Decisions are produced here and consumed by the transport layer
//! (`X-RateLimit-*` headers, 429 short-circuit). Backends are
//! interchangeable behind [`store::RateLimitStore`]: an in-process
//! map for single-process deployments, Redis when several server
//! processes share the limits.

pub mod distributed;
pub mod memory;
pub mod store;

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::counter;
use tracing::warn;

use crate::config::{RateLimitRule, RateLimitSettings};
use crate::error::AuthResult;
use crate::metrics::RATE_LIMITED;
pub use distributed::RedisRateLimitStore;
pub use memory::MemoryRateLimitStore;
pub use store::{HitOutcome, RateLimitStore};

/// Sentinel identity when no client address can be resolved
const UNKNOWN_CLIENT: &str = "unknown";

/// Endpoint class, used as the key namespace. Registration and login
/// get their own (much stricter) buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitScope {
    Register,
    Login,
    General,
}

impl RateLimitScope {
    pub fn namespace(self) -> &'static str {
        match self {
            RateLimitScope::Register => "register",
            RateLimitScope::Login => "login",
            RateLimitScope::General => "api",
        }
    }
}

/// Outcome of a rate limit check
#[derive(Debug, Clone, Copy)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Requests left in the current window (0 when denied, never
    /// negative)
    pub remaining: u64,
    pub reset_time: DateTime<Utc>,
}

impl RateLimitDecision {
    /// Seconds until the window rolls over, floored at zero
    pub fn retry_after_secs(&self) -> i64 {
        (self.reset_time - Utc::now()).num_seconds().max(0)
    }
}

/// Transport-agnostic view of the request needed to identify a client
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestMeta<'a> {
    /// Forwarded address chain header value, comma-separated
    pub forwarded_for: Option<&'a str>,
    /// Single-proxy real-address header value
    pub real_ip: Option<&'a str>,
    /// Transport-level peer address
    pub peer_addr: Option<IpAddr>,
}

/// Pluggable client identity extraction
pub trait ClientIdentity: Send + Sync {
    fn identity(&self, meta: &RequestMeta<'_>) -> String;
}

/// Default extractor: left-most forwarded-for entry, then the
/// real-ip header, then the peer address, then a sentinel
#[derive(Debug, Default)]
pub struct ForwardedIdentity;

impl ClientIdentity for ForwardedIdentity {
    fn identity(&self, meta: &RequestMeta<'_>) -> String {
        if let Some(chain) = meta.forwarded_for {
            if let Some(first) = chain.split(',').next() {
                let first = first.trim();
                if !first.is_empty() {
                    return first.to_string();
                }
            }
        }
        if let Some(real_ip) = meta.real_ip {
            let real_ip = real_ip.trim();
            if !real_ip.is_empty() {
                return real_ip.to_string();
            }
        }
        if let Some(peer) = meta.peer_addr {
            return peer.to_string();
        }
        UNKNOWN_CLIENT.to_string()
    }
}

/// Fixed-window rate limiter over a pluggable backend
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    settings: RateLimitSettings,
    extractor: Arc<dyn ClientIdentity>,
    /// Kept when the backend is in-process so shutdown can stop its
    /// sweep task
    local: Option<Arc<MemoryRateLimitStore>>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, settings: RateLimitSettings) -> Self {
        Self {
            store,
            settings,
            extractor: Arc::new(ForwardedIdentity),
            local: None,
        }
    }

    /// Build the limiter the deployment asks for: Redis when a URL is
    /// configured and reachable, otherwise the in-process backend.
    /// Fallback is loud, never silent: a multi-process deployment on
    /// the local backend enforces limits per process only.
    pub async fn from_settings(settings: RateLimitSettings) -> Self {
        let sweep = Duration::from_secs(settings.sweep_interval_secs);

        if let Some(url) = settings.redis_url.clone() {
            match RedisRateLimitStore::connect(&url).await {
                Ok(store) => return Self::new(Arc::new(store), settings),
                Err(err) => {
                    warn!(%err, "redis rate limit backend unreachable; falling back to in-process backend");
                },
            }
        }

        let local = Arc::new(MemoryRateLimitStore::new(sweep));
        Self {
            store: local.clone(),
            settings,
            extractor: Arc::new(ForwardedIdentity),
            local: Some(local),
        }
    }

    /// Replace the client identity extractor
    pub fn with_extractor(mut self, extractor: Arc<dyn ClientIdentity>) -> Self {
        self.extractor = extractor;
        self
    }

    fn rule(&self, scope: RateLimitScope) -> RateLimitRule {
        match scope {
            RateLimitScope::Register => self.settings.register,
            RateLimitScope::Login => self.settings.login,
            RateLimitScope::General => self.settings.general,
        }
    }

    /// Check a request key (already resolved client identity)
    pub async fn check(
        &self,
        scope: RateLimitScope,
        client: &str,
    ) -> AuthResult<RateLimitDecision> {
        let rule = self.rule(scope);
        let key = format!("{}:{}", scope.namespace(), client);
        let hit = self
            .store
            .try_hit(&key, Duration::from_secs(rule.window_secs), rule.max_requests)
            .await?;

        if !hit.allowed {
            counter!(RATE_LIMITED).increment(1);
        }

        Ok(RateLimitDecision {
            allowed: hit.allowed,
            remaining: rule.max_requests.saturating_sub(hit.count),
            reset_time: hit.reset_time,
        })
    }

    /// Resolve the client identity from request metadata and check it
    pub async fn check_request(
        &self,
        scope: RateLimitScope,
        meta: &RequestMeta<'_>,
    ) -> AuthResult<RateLimitDecision> {
        let client = self.extractor.identity(meta);
        self.check(scope, &client).await
    }

    /// Stop owned background work. A no-op for the Redis backend.
    pub async fn shutdown(&self) {
        if let Some(local) = &self.local {
            local.shutdown().await;
        }
    }
}
