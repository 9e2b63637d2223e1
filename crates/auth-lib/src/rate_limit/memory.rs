// ============================
// crates/auth-lib/src/rate_limit/memory.rs
// ============================
//! In-process rate limit backend.
//!
//! Counters live in a `DashMap`; a background sweep evicts expired
//! entries to bound memory. The sweep is an owned resource with an
//! explicit stop: `shutdown` must be called during graceful shutdown
//! or the scheduled work would outlive the limiter.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::debug;

use super::store::{HitOutcome, RateLimitStore};
use crate::error::AuthResult;

#[derive(Debug, Clone, Copy)]
struct WindowCounter {
    count: u64,
    reset_time: DateTime<Utc>,
}

/// In-process key -> counter map with a periodic eviction sweep
pub struct MemoryRateLimitStore {
    counters: Arc<DashMap<String, WindowCounter>>,
    stop: Arc<Notify>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl MemoryRateLimitStore {
    /// Create the store and start its sweep task
    pub fn new(sweep_interval: Duration) -> Self {
        let counters: Arc<DashMap<String, WindowCounter>> = Arc::new(DashMap::new());
        let stop = Arc::new(Notify::new());

        let sweeper = {
            let counters = counters.clone();
            let stop = stop.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(sweep_interval);
                // The first tick fires immediately; skip it
                ticker.tick().await;
                loop {
                    tokio::select! {
                        _ = stop.notified() => break,
                        _ = ticker.tick() => {
                            let now = Utc::now();
                            // Count inside the predicate: a length diff
                            // races concurrent try_hit inserts
                            let evicted = AtomicUsize::new(0);
                            counters.retain(|_, counter| {
                                if now < counter.reset_time {
                                    true
                                } else {
                                    evicted.fetch_add(1, Ordering::Relaxed);
                                    false
                                }
                            });
                            let evicted = evicted.into_inner();
                            if evicted > 0 {
                                debug!(evicted, "swept expired rate limit counters");
                            }
                        },
                    }
                }
            })
        };

        Self {
            counters,
            stop,
            sweeper: Mutex::new(Some(sweeper)),
        }
    }

    /// Stop the sweep task and wait for it to finish
    pub async fn shutdown(&self) {
        let handle = self.sweeper.lock().expect("sweeper lock poisoned").take();
        if let Some(handle) = handle {
            self.stop.notify_one();
            let _ = handle.await;
        }
    }

    #[cfg(test)]
    fn live_counters(&self) -> usize {
        self.counters.len()
    }
}

impl Drop for MemoryRateLimitStore {
    fn drop(&mut self) {
        // Last-resort cleanup for callers that skipped shutdown
        if let Ok(mut sweeper) = self.sweeper.lock() {
            if let Some(handle) = sweeper.take() {
                handle.abort();
            }
        }
    }
}

#[async_trait]
impl RateLimitStore for MemoryRateLimitStore {
    async fn try_hit(&self, key: &str, window: Duration, max: u64) -> AuthResult<HitOutcome> {
        let now = Utc::now();
        let window = chrono::Duration::milliseconds(window.as_millis() as i64);

        let mut entry = self
            .counters
            .entry(key.to_string())
            .or_insert(WindowCounter {
                count: 0,
                reset_time: now + window,
            });

        // A stale counter is logically absent: roll the window over
        if now >= entry.reset_time {
            *entry = WindowCounter {
                count: 0,
                reset_time: now + window,
            };
        }

        let allowed = entry.count < max;
        if allowed {
            entry.count += 1;
        }

        Ok(HitOutcome {
            allowed,
            count: entry.count,
            reset_time: entry.reset_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_window_fills_then_rejects() {
        let store = MemoryRateLimitStore::new(Duration::from_secs(60));
        let window = Duration::from_secs(60);

        for expected in 1..=5u64 {
            let hit = store.try_hit("k", window, 5).await.unwrap();
            assert!(hit.allowed);
            assert_eq!(hit.count, expected);
        }

        // Full window: denied, and the stored count stays at max
        for _ in 0..3 {
            let hit = store.try_hit("k", window, 5).await.unwrap();
            assert!(!hit.allowed);
            assert_eq!(hit.count, 5);
        }

        store.shutdown().await;
    }

    #[tokio::test]
    async fn test_window_rollover() {
        let store = MemoryRateLimitStore::new(Duration::from_secs(60));
        let window = Duration::from_millis(80);

        for _ in 0..5 {
            store.try_hit("k", window, 5).await.unwrap();
        }
        assert!(!store.try_hit("k", window, 5).await.unwrap().allowed);

        tokio::time::sleep(Duration::from_millis(120)).await;

        let hit = store.try_hit("k", window, 5).await.unwrap();
        assert!(hit.allowed);
        assert_eq!(hit.count, 1);

        store.shutdown().await;
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let store = MemoryRateLimitStore::new(Duration::from_secs(60));
        let window = Duration::from_secs(60);

        for _ in 0..5 {
            store.try_hit("a", window, 5).await.unwrap();
        }
        assert!(!store.try_hit("a", window, 5).await.unwrap().allowed);
        assert!(store.try_hit("b", window, 5).await.unwrap().allowed);

        store.shutdown().await;
    }

    #[tokio::test]
    async fn test_sweep_evicts_expired_counters() {
        let store = MemoryRateLimitStore::new(Duration::from_millis(40));

        store
            .try_hit("ephemeral", Duration::from_millis(20), 5)
            .await
            .unwrap();
        assert_eq!(store.live_counters(), 1);

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(store.live_counters(), 0);

        store.shutdown().await;
    }

    #[tokio::test]
    async fn test_sweep_survives_concurrent_inserts() {
        let store = Arc::new(MemoryRateLimitStore::new(Duration::from_millis(20)));

        // Hammer the map with short-lived keys while sweeps run; a
        // sweeper that dies here would leave the counters behind
        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                for i in 0..500u32 {
                    store
                        .try_hit(&format!("burst:{i}"), Duration::from_millis(5), 5)
                        .await
                        .unwrap();
                }
            })
        };
        writer.await.unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(store.live_counters(), 0);

        store.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let store = MemoryRateLimitStore::new(Duration::from_millis(10));
        store.shutdown().await;
        store.shutdown().await;
    }
}
