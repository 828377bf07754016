// Bucketed throughput counter module
use crate::store::{SharedStore, StoreError};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;

const BUCKET_KEY_PREFIX: &str = "tp:";

/// Approximates events per second over a trailing window of fixed-width
/// bucket counters kept in the shared store.
///
/// Buckets are created on the first increment in their slot and die by TTL
/// expiry; a bucket's count only ever increases while it is alive.
pub struct ThroughputCounter<S> {
    store: Arc<S>,
    resolution_secs: u32,
    samples: u32,
}

impl<S: SharedStore> ThroughputCounter<S> {
    /// `resolution_secs` is the bucket width, `samples` the number of fully
    /// elapsed buckets per window. Both must be nonzero.
    pub fn new(store: Arc<S>, resolution_secs: u32, samples: u32) -> Self {
        debug_assert!(resolution_secs > 0 && samples > 0);
        Self {
            store,
            resolution_secs,
            samples,
        }
    }

    /// Floor `ts` to the enclosing bucket boundary. Idempotent.
    pub fn normalize(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let secs = ts.timestamp();
        let floored = secs - secs.rem_euclid(i64::from(self.resolution_secs));
        DateTime::from_timestamp(floored, 0).unwrap_or(ts)
    }

    /// Count one event at `ts`.
    ///
    /// `incr` can race with TTL expiry; the absent case re-seeds the bucket
    /// at 1 with the full bucket TTL. Concurrent re-seeds may drop a racing
    /// increment within one bucket width, which the estimate tolerates.
    pub async fn record(&self, ts: DateTime<Utc>) -> Result<(), StoreError> {
        let key = Self::bucket_key(self.normalize(ts));
        if self.store.incr(&key).await?.is_none() {
            self.store.set(&key, 1, self.bucket_ttl()).await?;
        }
        Ok(())
    }

    /// Events per second across the trailing window at `ts`.
    ///
    /// Missing buckets count as zero; with nothing recorded this is 0.0.
    pub async fn throughput(&self, ts: DateTime<Utc>) -> Result<f64, StoreError> {
        let keys = self.window_keys(ts);
        let counts = self.store.get_many(&keys).await?;
        let total: i64 = counts.values().sum();
        Ok(total as f64 / f64::from(self.samples * self.resolution_secs))
    }

    /// Keys for the `samples` fully elapsed buckets before `ts`'s bucket.
    ///
    /// The current partial bucket is excluded: it is still accumulating and
    /// would bias the estimate low.
    fn window_keys(&self, ts: DateTime<Utc>) -> Vec<String> {
        let end = self.normalize(ts);
        (1..=self.samples)
            .map(|i| {
                let offset = i64::from(i) * i64::from(self.resolution_secs);
                Self::bucket_key(end - ChronoDuration::seconds(offset))
            })
            .collect()
    }

    fn bucket_key(bucket: DateTime<Utc>) -> String {
        format!("{BUCKET_KEY_PREFIX}{}", bucket.format("%Y-%m-%d-%H:%M:%S"))
    }

    /// Slightly longer than the window so buckets expire naturally just
    /// after they leave it.
    fn bucket_ttl(&self) -> Duration {
        Duration::from_secs(u64::from(self.samples) * u64::from(self.resolution_secs) + 1)
    }
}
