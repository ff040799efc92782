//! Distributed mutual exclusion keyed by a business string.
//!
//! Acquisition is atomic check-and-set with a TTL; release only succeeds
//! when the caller presents the token it acquired with, so a holder whose
//! TTL expired cannot release the lock out from under a new holder. A
//! crashed holder self-heals via TTL expiry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::Result;

/// Interval between attempts in [`DistributedLock::try_lock_with_retry`].
const RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Advisory, time-bounded mutual exclusion.
///
/// Failing to acquire is not an error: callers treat `false` as "busy" and
/// decide their own retry policy. Callers must never enter a critical
/// section without the lock.
#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// Attempts to acquire `key` for `ttl`, owned by `owner_token`.
    ///
    /// Returns `true` exactly when this call took the lock.
    async fn try_lock(&self, key: &str, owner_token: &str, ttl: Duration) -> Result<bool>;

    /// Releases `key` if and only if `owner_token` is the current owner.
    ///
    /// Returns `true` when the lock was released, `false` when the token
    /// did not match (a no-op).
    async fn release(&self, key: &str, owner_token: &str) -> Result<bool>;

    /// Retries [`try_lock`](Self::try_lock) at a fixed interval for at most
    /// `wait`. Bounded by design; never blocks indefinitely.
    async fn try_lock_with_retry(
        &self,
        key: &str,
        owner_token: &str,
        ttl: Duration,
        wait: Duration,
    ) -> Result<bool> {
        let deadline = Instant::now() + wait;
        loop {
            if self.try_lock(key, owner_token, ttl).await? {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(RETRY_INTERVAL).await;
        }
    }
}

#[derive(Debug, Clone)]
struct Holder {
    token: String,
    expires_at: Instant,
}

/// In-memory lock table with the same check-and-set semantics a Redis
/// SET NX EX + owner-checked DEL script provides.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLock {
    state: Arc<Mutex<HashMap<String, Holder>>>,
}

impl InMemoryLock {
    /// Creates an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `key` is currently held and unexpired.
    pub fn is_held(&self, key: &str) -> bool {
        let state = self.state.lock().unwrap();
        state
            .get(key)
            .is_some_and(|h| h.expires_at > Instant::now())
    }
}

#[async_trait]
impl DistributedLock for InMemoryLock {
    async fn try_lock(&self, key: &str, owner_token: &str, ttl: Duration) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let now = Instant::now();

        if let Some(holder) = state.get(key) {
            if holder.expires_at > now {
                return Ok(false);
            }
        }

        state.insert(
            key.to_string(),
            Holder {
                token: owner_token.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn release(&self, key: &str, owner_token: &str) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        match state.get(key) {
            Some(holder) if holder.token == owner_token => {
                state.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_acquire_fails_while_held() {
        let lock = InMemoryLock::new();
        assert!(lock.try_lock("k", "a", Duration::from_secs(30)).await.unwrap());
        assert!(!lock.try_lock("k", "b", Duration::from_secs(30)).await.unwrap());
    }

    #[tokio::test]
    async fn release_requires_matching_token() {
        let lock = InMemoryLock::new();
        lock.try_lock("k", "a", Duration::from_secs(30)).await.unwrap();

        // Foreign token is a no-op.
        assert!(!lock.release("k", "b").await.unwrap());
        assert!(lock.is_held("k"));

        assert!(lock.release("k", "a").await.unwrap());
        assert!(!lock.is_held("k"));
    }

    #[tokio::test]
    async fn expired_lock_is_reclaimable() {
        let lock = InMemoryLock::new();
        lock.try_lock("k", "a", Duration::from_millis(10))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(lock.try_lock("k", "b", Duration::from_secs(30)).await.unwrap());
        // The stale holder can no longer release it.
        assert!(!lock.release("k", "a").await.unwrap());
        assert!(lock.is_held("k"));
    }

    #[tokio::test]
    async fn concurrent_acquire_exactly_one_wins() {
        let lock = Arc::new(InMemoryLock::new());
        let mut handles = Vec::new();
        for i in 0..8 {
            let lock = lock.clone();
            handles.push(tokio::spawn(async move {
                lock.try_lock("order:tcc:lock:42", &format!("token-{i}"), Duration::from_secs(30))
                    .await
                    .unwrap()
            }));
        }

        let mut acquired = 0;
        for handle in handles {
            if handle.await.unwrap() {
                acquired += 1;
            }
        }
        assert_eq!(acquired, 1);
    }

    #[tokio::test]
    async fn retry_acquires_after_release() {
        let lock = Arc::new(InMemoryLock::new());
        lock.try_lock("k", "a", Duration::from_secs(30)).await.unwrap();

        let waiter = {
            let lock = lock.clone();
            tokio::spawn(async move {
                lock.try_lock_with_retry(
                    "k",
                    "b",
                    Duration::from_secs(30),
                    Duration::from_secs(2),
                )
                .await
                .unwrap()
            })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        lock.release("k", "a").await.unwrap();

        assert!(waiter.await.unwrap());
    }
}
