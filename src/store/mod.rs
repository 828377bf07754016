// Shared store module
pub mod memory;

// Re-export key types for easier access
pub use memory::MemoryStore;

use std::collections::HashMap;
use std::time::Duration;

/// Errors surfaced by a shared store backend.
///
/// Both variants are transient and retryable; the caller may skip the
/// current observation. Key absence is never an error — operations report
/// it through their return values.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Contract for the shared key-value cache that holds bucket counts and the
/// latch record.
///
/// Implementations must make `incr` and `add` atomic per key. No ordering
/// across keys is required. A networked backend may suspend on I/O in any
/// operation, but must not hold a lock across a suspension point.
#[allow(async_fn_in_trait)]
pub trait SharedStore: Send + Sync {
    /// Read a single key. `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError>;

    /// Batch read. The result maps only the keys that are present.
    async fn get_many(&self, keys: &[String]) -> Result<HashMap<String, i64>, StoreError>;

    /// Write `value` under `key` with the given TTL, replacing any previous
    /// value and deadline.
    async fn set(&self, key: &str, value: i64, ttl: Duration) -> Result<(), StoreError>;

    /// Write `value` under `key` only if the key is absent. Returns `true`
    /// when this call created the key.
    async fn add(&self, key: &str, value: i64, ttl: Duration) -> Result<bool, StoreError>;

    /// Atomically increment an existing key, returning the new value, or
    /// `None` when the key is absent (including the case where it expired
    /// between the caller's check and this call).
    async fn incr(&self, key: &str) -> Result<Option<i64>, StoreError>;
}
