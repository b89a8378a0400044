use crate::error::Result;
use crate::store::RecordStore;

use std::sync::Arc;
use std::time::Duration;

/// Promotion lock: a single store key holding a random opaque token with a
/// bounded time-to-live, so a crashed holder self-expires instead of
/// blocking future flushes forever.
///
/// Release is an unconditional delete without a token-ownership check;
/// holders are short-lived and single-flight per process, so the worst a
/// misfire can do is let the next flush start one TTL early.
pub struct PromotionLock<S: RecordStore> {
    store: Arc<S>,
    key: String,
    token: String,
    released: bool,
}

impl<S: RecordStore> PromotionLock<S> {
    /// Try to acquire the lock. Returns `None` both on contention and on
    /// store failure; a failed acquire is never fatal to the caller.
    pub fn acquire(store: Arc<S>, key: &str, ttl: Duration) -> Option<Self> {
        let token = uuid::Uuid::new_v4().to_string();

        match store.put_if_absent(key, &token) {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => {
                tracing::warn!(key, error = %e, "Lock acquire failed against store");
                return None;
            }
        }

        // Without a TTL a crashed holder would block flushes forever, so an
        // un-expirable lock is given back immediately.
        if let Err(e) = store.expire(key, ttl) {
            tracing::warn!(key, error = %e, "Failed to set lock TTL, releasing");
            if let Err(e) = store.delete(&[key]) {
                tracing::warn!(key, error = %e, "Failed to release un-expirable lock");
            }
            return None;
        }

        tracing::debug!(key, token = %token, "Promotion lock acquired");
        Some(Self {
            store,
            key: key.to_string(),
            token,
            released: false,
        })
    }

    /// Release the lock. Best-effort: a store failure is logged and
    /// swallowed, and the key then expires on its own after the TTL.
    pub fn release(mut self) {
        self.release_inner();
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    fn release_inner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.store.delete(&[&self.key]) {
            tracing::warn!(key = %self.key, error = %e, "Failed to release promotion lock");
        }
    }
}

impl<S: RecordStore> Drop for PromotionLock<S> {
    fn drop(&mut self) {
        self.release_inner();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const KEY: &str = "test:flush:lock";
    const TTL: Duration = Duration::from_secs(30);

    #[test]
    fn test_acquire_and_release() {
        let store = Arc::new(MemoryStore::new());

        let lock = PromotionLock::acquire(store.clone(), KEY, TTL).expect("first acquire");
        assert!(!lock.token().is_empty());

        // Contended while held
        assert!(PromotionLock::acquire(store.clone(), KEY, TTL).is_none());

        lock.release();
        assert!(PromotionLock::acquire(store, KEY, TTL).is_some());
    }

    #[test]
    fn test_drop_releases() {
        let store = Arc::new(MemoryStore::new());
        {
            let _lock = PromotionLock::acquire(store.clone(), KEY, TTL).expect("acquire");
        }
        assert!(PromotionLock::acquire(store, KEY, TTL).is_some());
    }

    #[test]
    fn test_expired_lock_can_be_reacquired() {
        let store = Arc::new(MemoryStore::new());

        let lock = PromotionLock::acquire(store.clone(), KEY, Duration::from_millis(10))
            .expect("acquire");
        std::thread::sleep(Duration::from_millis(20));

        // TTL has passed; a crashed holder no longer blocks acquisition.
        let second = PromotionLock::acquire(store, KEY, TTL);
        assert!(second.is_some());
        drop(lock);
    }
}
