// ============================
// crates/auth-lib/src/rate_limit/store.rs
// ============================
//! Backend abstraction for fixed-window rate limit counters.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::error::AuthResult;

/// Result of recording one request against a window counter
#[derive(Debug, Clone, Copy)]
pub struct HitOutcome {
    /// Whether this request fit inside the window
    pub allowed: bool,
    /// Counter value after the hit; never exceeds the window maximum
    pub count: u64,
    /// When the current window rolls over
    pub reset_time: DateTime<Utc>,
}

/// Trait for rate limit counter backends.
///
/// A counter is only valid while `now < reset_time`; backends treat an
/// expired counter as absent regardless of physical presence. Once a
/// window is full the stored count must not grow further.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Record a hit for `key` within a fixed window of `window`
    /// length, allowing at most `max` hits per window
    async fn try_hit(&self, key: &str, window: Duration, max: u64) -> AuthResult<HitOutcome>;
}
