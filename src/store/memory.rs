use crate::clock::Clock;
use crate::store::{SharedStore, StoreError};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone)]
struct Entry {
    value: i64,
    expires_at: DateTime<Utc>,
}

/// In-process [`SharedStore`] with per-key TTL.
///
/// Expiry is evaluated lazily against the injected [`Clock`], so tests
/// advance time instead of sleeping. Serves single-process deployments and
/// doubles as the reference semantics for network-backed implementations.
pub struct MemoryStore {
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Drop `key` if its deadline has passed. Runs under the caller's guard
    /// so check-then-act sequences stay atomic.
    fn evict_if_expired(entries: &mut HashMap<String, Entry>, key: &str, now: DateTime<Utc>) {
        if entries.get(key).is_some_and(|e| e.expires_at <= now) {
            entries.remove(key);
        }
    }

    fn deadline(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
        // TTLs in this crate are whole seconds, far below any overflow range.
        now + ChronoDuration::seconds(ttl.as_secs() as i64)
    }
}

impl SharedStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError> {
        let now = self.clock.now();
        let mut entries = self.lock();
        Self::evict_if_expired(&mut entries, key, now);
        Ok(entries.get(key).map(|e| e.value))
    }

    async fn get_many(&self, keys: &[String]) -> Result<HashMap<String, i64>, StoreError> {
        let now = self.clock.now();
        let mut entries = self.lock();
        let mut found = HashMap::new();
        for key in keys {
            Self::evict_if_expired(&mut entries, key, now);
            if let Some(entry) = entries.get(key) {
                found.insert(key.clone(), entry.value);
            }
        }
        Ok(found)
    }

    async fn set(&self, key: &str, value: i64, ttl: Duration) -> Result<(), StoreError> {
        let now = self.clock.now();
        self.lock().insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Self::deadline(now, ttl),
            },
        );
        Ok(())
    }

    async fn add(&self, key: &str, value: i64, ttl: Duration) -> Result<bool, StoreError> {
        let now = self.clock.now();
        let mut entries = self.lock();
        Self::evict_if_expired(&mut entries, key, now);
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Self::deadline(now, ttl),
            },
        );
        Ok(true)
    }

    async fn incr(&self, key: &str) -> Result<Option<i64>, StoreError> {
        let now = self.clock.now();
        let mut entries = self.lock();
        Self::evict_if_expired(&mut entries, key, now);
        match entries.get_mut(key) {
            Some(entry) => {
                entry.value += 1;
                Ok(Some(entry.value))
            }
            None => Ok(None),
        }
    }
}
