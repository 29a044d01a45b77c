use async_trait::async_trait;
use bourse_ports::{LockError, LockLease, MatchLock};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use log::trace;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

const FAR_FUTURE: Duration = Duration::from_secs(365 * 24 * 3600);

fn after(now: Instant, delay: Duration) -> Instant {
    now.checked_add(delay).unwrap_or(now + FAR_FUTURE)
}

#[derive(Debug, Clone, Copy)]
struct Held {
    token: Uuid,
    expires_at: Instant,
}

/// Process-local named locks with a lease
///
/// Acquisition polls every `poll` until the wait runs out. An expired lease is treated
/// as free and overwritten.
pub struct InMemoryMatchLock {
    held: DashMap<String, Held>,
    poll: Duration,
}

impl InMemoryMatchLock {
    pub fn new(poll: Duration) -> Self {
        Self {
            held: DashMap::new(),
            poll: poll.max(Duration::from_millis(1)),
        }
    }

    fn try_take(&self, name: &str, lease: Duration) -> Option<LockLease> {
        let now = Instant::now();
        let held = Held {
            token: Uuid::new_v4(),
            expires_at: after(now, lease),
        };

        match self.held.entry(name.to_string()) {
            Entry::Occupied(mut entry) => {
                if entry.get().expires_at > now {
                    return None;
                }
                trace!("Lease on {} expired, taking over", name);
                entry.insert(held);
            }
            Entry::Vacant(entry) => {
                entry.insert(held);
            }
        }

        let expires_at = chrono::Duration::from_std(lease)
            .ok()
            .and_then(|d| Utc::now().checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Some(LockLease {
            name: name.to_string(),
            token: held.token,
            expires_at,
        })
    }

    pub fn is_held(&self, name: &str) -> bool {
        self.held
            .get(name)
            .is_some_and(|h| h.expires_at > Instant::now())
    }
}

impl Default for InMemoryMatchLock {
    fn default() -> Self {
        Self::new(Duration::from_millis(50))
    }
}

#[async_trait]
impl MatchLock for InMemoryMatchLock {
    async fn acquire(
        &self,
        name: &str,
        lease: Duration,
        wait: Duration,
    ) -> Result<Option<LockLease>, LockError> {
        if lease.is_zero() {
            return Err(LockError::ZeroLease(name.to_string()));
        }
        let deadline = after(Instant::now(), wait);
        loop {
            if let Some(acquired) = self.try_take(name, lease) {
                return Ok(Some(acquired));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(self.poll.min(deadline - now)).await;
        }
    }

    async fn release(&self, lease: &LockLease) -> Result<bool, LockError> {
        let now = Instant::now();
        let removed = self
            .held
            .remove_if(&lease.name, |_, h| h.token == lease.token && h.expires_at > now);
        Ok(removed.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_acquire_and_release() {
        let locks = InMemoryMatchLock::default();
        let lease = locks
            .acquire("match:BTC", Duration::from_secs(5), Duration::ZERO)
            .await
            .unwrap()
            .unwrap();
        assert!(locks.is_held("match:BTC"));
        assert!(locks.release(&lease).await.unwrap());
        assert!(!locks.is_held("match:BTC"));
    }

    #[tokio::test]
    async fn test_zero_lease_refused() {
        let locks = InMemoryMatchLock::default();
        let err = locks
            .acquire("match:BTC", Duration::ZERO, Duration::ZERO)
            .await
            .unwrap_err();
        assert_eq!(err, LockError::ZeroLease("match:BTC".to_string()));
        assert!(!locks.is_held("match:BTC"));
    }

    #[tokio::test]
    async fn test_busy_lock_times_out() {
        let locks = InMemoryMatchLock::new(Duration::from_millis(5));
        let _held = locks
            .acquire("match:BTC", Duration::from_secs(5), Duration::ZERO)
            .await
            .unwrap()
            .unwrap();

        let second = locks
            .acquire("match:BTC", Duration::from_secs(5), Duration::from_millis(20))
            .await
            .unwrap();
        assert!(second.is_none());

        // Other names are independent
        let other = locks
            .acquire("match:ETH", Duration::from_secs(5), Duration::ZERO)
            .await
            .unwrap();
        assert!(other.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_lease_can_be_taken() {
        let locks = InMemoryMatchLock::new(Duration::from_millis(10));
        let stale = locks
            .acquire("match:BTC", Duration::from_millis(100), Duration::ZERO)
            .await
            .unwrap()
            .unwrap();

        tokio::time::advance(Duration::from_millis(150)).await;

        let fresh = locks
            .acquire("match:BTC", Duration::from_secs(5), Duration::ZERO)
            .await
            .unwrap()
            .unwrap();
        assert_ne!(fresh.token, stale.token);

        // The stale holder can no longer release someone else's lease
        assert!(!locks.release(&stale).await.unwrap());
        assert!(locks.is_held("match:BTC"));
    }

    #[tokio::test]
    async fn test_waiter_gets_lock_after_release() {
        let locks = std::sync::Arc::new(InMemoryMatchLock::new(Duration::from_millis(5)));
        let lease = locks
            .acquire("match:SOL", Duration::from_secs(5), Duration::ZERO)
            .await
            .unwrap()
            .unwrap();

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                locks
                    .acquire("match:SOL", Duration::from_secs(5), Duration::from_secs(2))
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        locks.release(&lease).await.unwrap();

        let acquired = waiter.await.unwrap().unwrap();
        assert!(acquired.is_some());
    }
}
