// ============================
// crates/auth-lib/src/rate_limit/distributed.rs
// ============================
//! Redis-backed rate limit backend for multi-process deployments.
//!
//! Atomicity comes from Redis itself: `INCR` is the per-request
//! update, and native key expiry replaces the local backend's sweep.
//! No locking on this side.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use redis::{aio::ConnectionManager, AsyncCommands};
use tracing::info;

use super::store::{HitOutcome, RateLimitStore};
use crate::error::{AuthError, AuthResult};

fn store_err(err: redis::RedisError) -> AuthError {
    AuthError::Store(anyhow::Error::new(err))
}

/// Rate limit backend over a shared Redis instance
pub struct RedisRateLimitStore {
    conn: ConnectionManager,
}

impl RedisRateLimitStore {
    /// Connect and verify the server responds. Callers fall back to
    /// the in-process backend when this fails.
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;

        let mut probe = conn.clone();
        redis::cmd("PING").query_async::<()>(&mut probe).await?;
        info!(url, "connected to redis rate limit backend");

        Ok(Self { conn })
    }

    pub fn from_connection(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl RateLimitStore for RedisRateLimitStore {
    async fn try_hit(&self, key: &str, window: Duration, max: u64) -> AuthResult<HitOutcome> {
        let mut conn = self.conn.clone();
        let window_ms = window.as_millis() as i64;

        let mut count: u64 = conn.incr(key, 1u64).await.map_err(store_err)?;
        if count == 1 {
            // First hit in a window owns setting the expiry
            let _: bool = conn.pexpire(key, window_ms).await.map_err(store_err)?;
        }

        let allowed = count <= max;
        if !allowed {
            // INCR overshot a full window; compensate so the stored
            // count converges back to max
            let _: u64 = conn.decr(key, 1u64).await.map_err(store_err)?;
            count = max;
        }

        let ttl_ms: i64 = conn.pttl(key).await.map_err(store_err)?;
        let reset_time = if ttl_ms > 0 {
            Utc::now() + chrono::Duration::milliseconds(ttl_ms)
        } else {
            // Expiry lost (e.g. the key was created without one after
            // a flush race); reinstate it
            let _: bool = conn.pexpire(key, window_ms).await.map_err(store_err)?;
            Utc::now() + chrono::Duration::milliseconds(window_ms)
        };

        Ok(HitOutcome {
            allowed,
            count,
            reset_time,
        })
    }
}
