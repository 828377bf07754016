use crate::clock::Clock;
use crate::condition::levels::Condition;
use crate::condition::notify::{LatchEngaged, NotificationSink};
use crate::config::MonitorConfig;
use crate::counter::ThroughputCounter;
use crate::store::{SharedStore, StoreError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Store key for the latch record. Holds the unix timestamp of first
/// engagement; TTL expiry is the only teardown.
const LATCH_KEY: &str = "condition:latched_at";

/// Classifies windowed event throughput into a [`Condition`] and manages
/// the latched most-severe state.
///
/// Multiple tasks may call [`record_event`](Self::record_event) and
/// [`level`](Self::level) concurrently; the only coordination is the
/// store's per-key atomicity.
pub struct ConditionMonitor<S> {
    store: Arc<S>,
    counter: ThroughputCounter<S>,
    config: MonitorConfig,
    clock: Arc<dyn Clock>,
    sinks: Vec<Box<dyn NotificationSink>>,
}

impl<S: SharedStore> ConditionMonitor<S> {
    pub fn new(config: MonitorConfig, store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        let counter =
            ThroughputCounter::new(store.clone(), config.resolution_secs, config.samples);
        Self {
            store,
            counter,
            config,
            clock,
            sinks: Vec::new(),
        }
    }

    /// Register a sink for the one-shot latch notification.
    pub fn add_sink(&mut self, sink: Box<dyn NotificationSink>) {
        self.sinks.push(sink);
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn counter(&self) -> &ThroughputCounter<S> {
        &self.counter
    }

    /// Count one event now.
    pub async fn record_event(&self) -> Result<(), StoreError> {
        self.record_event_at(self.clock.now()).await
    }

    pub async fn record_event_at(&self, ts: DateTime<Utc>) -> Result<(), StoreError> {
        self.counter.record(ts).await
    }

    /// Current condition.
    pub async fn level(&self) -> Result<Condition, StoreError> {
        self.classify_at(self.clock.now()).await
    }

    /// Condition at `ts`: the latch short-circuits, otherwise the windowed
    /// throughput is measured against the configured threshold. A computed
    /// COCKED PISTOL engages the latch before returning.
    pub async fn classify_at(&self, ts: DateTime<Utc>) -> Result<Condition, StoreError> {
        if self.is_latched().await? {
            return Ok(Condition::MOST_SEVERE);
        }

        let throughput = self.counter.throughput(ts).await?;
        let condition = self.classify_throughput(throughput);
        debug!(throughput, condition = %condition, "classified current throughput");

        if condition == Condition::MOST_SEVERE {
            self.engage_latch(ts).await?;
        }
        Ok(condition)
    }

    /// True while the latch record is alive.
    pub async fn is_latched(&self) -> Result<bool, StoreError> {
        Ok(self.store.get(LATCH_KEY).await?.is_some())
    }

    /// Timestamp of the current engagement, while latched.
    pub async fn latched_at(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        let stamped = self.store.get(LATCH_KEY).await?;
        Ok(stamped.and_then(|secs| DateTime::from_timestamp(secs, 0)))
    }

    /// Engage the latch at `ts`.
    ///
    /// First write wins: repeat calls while latched keep the original
    /// timestamp and fire nothing. Only the winning write notifies the
    /// registered sinks, so concurrent engagement resolves to exactly one
    /// notification.
    pub async fn engage_latch(&self, ts: DateTime<Utc>) -> Result<(), StoreError> {
        let cooldown = Duration::from_secs(self.config.cooldown_secs);
        let engaged = self.store.add(LATCH_KEY, ts.timestamp(), cooldown).await?;
        if engaged {
            let event = LatchEngaged {
                engaged_at: ts,
                cooldown_secs: self.config.cooldown_secs,
            };
            for sink in &self.sinks {
                sink.on_latch_engaged(&event);
            }
        }
        Ok(())
    }

    /// Snapshot for rendering collaborators.
    pub async fn report(&self) -> Result<ConditionReport, StoreError> {
        let now = self.clock.now();
        let condition = self.classify_at(now).await?;
        let throughput = self.counter.throughput(now).await?;
        Ok(ConditionReport {
            condition,
            events_per_minute: throughput * 60.0,
            latched: self.is_latched().await?,
        })
    }

    /// Threshold step function: one level per full multiple of the
    /// threshold, capped at four steps below FADE OUT. Floor division, so
    /// throughput exactly at a multiple rounds down to the less severe
    /// side. A zero threshold always classifies as FADE OUT.
    fn classify_throughput(&self, throughput: f64) -> Condition {
        let threshold = self.config.threshold();
        if threshold <= 0.0 {
            return Condition::FadeOut;
        }
        let steps = ((throughput / threshold).floor() as i64).min(4);
        Condition::from_level(5 - steps)
    }
}

/// Point-in-time view of the monitor for display purposes.
#[derive(Debug, Clone, Serialize)]
pub struct ConditionReport {
    pub condition: Condition,
    pub events_per_minute: f64,
    pub latched: bool,
}

impl ConditionReport {
    pub fn headline(&self) -> String {
        format!(
            "{} ({:.1} events/min)",
            self.condition.label(),
            self.events_per_minute
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Sink that counts how many notifications it received.
    struct CountingSink {
        count: Arc<AtomicUsize>,
    }

    impl CountingSink {
        fn new() -> (Self, Arc<AtomicUsize>) {
            let count = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    count: count.clone(),
                },
                count,
            )
        }
    }

    impl NotificationSink for CountingSink {
        fn on_latch_engaged(&self, _event: &LatchEngaged) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn setup(config: MonitorConfig) -> (Arc<ManualClock>, ConditionMonitor<MemoryStore>) {
        let start = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let store = Arc::new(MemoryStore::new(clock.clone()));
        let monitor = ConditionMonitor::new(config, store, clock.clone());
        (clock, monitor)
    }

    /// Spread `count` events evenly across the trailing window, leaving the
    /// clock one bucket past the last event so everything is fully elapsed.
    async fn fill_window(
        clock: &ManualClock,
        monitor: &ConditionMonitor<MemoryStore>,
        count: u32,
    ) {
        let window_secs = monitor.config().window_secs();
        let start = clock.now();
        for i in 0..count {
            let offset = (u64::from(i) * window_secs / u64::from(count)) as i64;
            monitor
                .record_event_at(start + chrono::Duration::seconds(offset))
                .await
                .unwrap();
        }
        clock.set(start + chrono::Duration::seconds(window_secs as i64));
    }

    #[tokio::test]
    async fn test_idle_monitor_reports_fade_out() {
        let (_clock, monitor) = setup(MonitorConfig::default());
        assert_eq!(monitor.level().await.unwrap(), Condition::FadeOut);
        assert!(!monitor.is_latched().await.unwrap());
    }

    #[tokio::test]
    async fn test_one_per_second_is_round_house() {
        // rate=30/m -> threshold 0.5/s; 60 events over the 60s window is
        // 1.0/s, two full multiples -> level 3
        let (clock, monitor) = setup(MonitorConfig::default());
        fill_window(&clock, &monitor, 60).await;

        assert_eq!(monitor.level().await.unwrap(), Condition::RoundHouse);
        assert!(!monitor.is_latched().await.unwrap());
    }

    #[tokio::test]
    async fn test_severity_never_relaxes_as_throughput_grows() {
        let (clock, monitor) = setup(MonitorConfig::default());

        let mut previous = monitor.level().await.unwrap().level();
        // Keep stacking events into the same elapsed window
        let bucket_ts = clock.now();
        clock.advance_secs(i64::from(monitor.config().resolution_secs));
        for _ in 0..40 {
            monitor.record_event_at(bucket_ts).await.unwrap();
            let current = monitor.classify_at(clock.now()).await.unwrap().level();
            assert!(current <= previous);
            previous = current;
        }
    }

    #[tokio::test]
    async fn test_burst_engages_latch_and_notifies_once() {
        let mut config = MonitorConfig::default();
        config.notify_recipients = vec!["ops@example.com".to_string()];
        let (clock, mut monitor) = setup(config);
        let (sink, notified) = CountingSink::new();
        monitor.add_sink(Box::new(sink));

        // 600 events in the window -> 10/s against a 0.5/s threshold
        fill_window(&clock, &monitor, 600).await;

        assert_eq!(monitor.level().await.unwrap(), Condition::CockedPistol);
        assert!(monitor.is_latched().await.unwrap());
        assert_eq!(notified.load(Ordering::SeqCst), 1);

        // Five seconds later the window has moved on but the latch holds,
        // and no second notification fires
        clock.advance_secs(5);
        assert_eq!(monitor.level().await.unwrap(), Condition::CockedPistol);
        assert_eq!(notified.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_latch_holds_through_quiet_window_until_cooldown() {
        let (clock, monitor) = setup(MonitorConfig::default());
        fill_window(&clock, &monitor, 600).await;
        assert_eq!(monitor.level().await.unwrap(), Condition::CockedPistol);

        // Well past the window, throughput is zero but the latch holds
        clock.advance_secs(120);
        assert_eq!(
            monitor.counter().throughput(clock.now()).await.unwrap(),
            0.0
        );
        assert_eq!(monitor.level().await.unwrap(), Condition::CockedPistol);

        // Cooldown elapses, classification reverts to live computation
        clock.advance_secs(i64::try_from(monitor.config().cooldown_secs).unwrap());
        assert!(!monitor.is_latched().await.unwrap());
        assert_eq!(monitor.level().await.unwrap(), Condition::FadeOut);
    }

    #[tokio::test]
    async fn test_engage_latch_is_idempotent() {
        let (clock, mut monitor) = setup(MonitorConfig::default());
        let (sink, notified) = CountingSink::new();
        monitor.add_sink(Box::new(sink));

        let first = clock.now();
        monitor.engage_latch(first).await.unwrap();
        assert_eq!(monitor.latched_at().await.unwrap(), Some(first));

        // A later engagement must not move the timestamp or re-notify
        clock.advance_secs(30);
        monitor.engage_latch(clock.now()).await.unwrap();
        assert_eq!(monitor.latched_at().await.unwrap(), Some(first));
        assert_eq!(notified.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_relatch_after_cooldown_notifies_again() {
        let (clock, mut monitor) = setup(MonitorConfig::default());
        let (sink, notified) = CountingSink::new();
        monitor.add_sink(Box::new(sink));

        monitor.engage_latch(clock.now()).await.unwrap();
        clock.advance_secs(i64::try_from(monitor.config().cooldown_secs).unwrap() + 1);
        monitor.engage_latch(clock.now()).await.unwrap();

        assert_eq!(notified.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_zero_rate_always_fade_out() {
        let mut config = MonitorConfig::default();
        config.rate = 0;
        let (clock, monitor) = setup(config);

        fill_window(&clock, &monitor, 600).await;
        assert_eq!(monitor.level().await.unwrap(), Condition::FadeOut);
        assert!(!monitor.is_latched().await.unwrap());
    }

    #[tokio::test]
    async fn test_exact_multiple_rounds_to_less_severe_side() {
        // threshold 0.5/s; exactly 1.0/s is two full multiples, not three
        let (clock, monitor) = setup(MonitorConfig::default());
        fill_window(&clock, &monitor, 60).await;

        let condition = monitor.level().await.unwrap();
        assert_eq!(condition, Condition::RoundHouse);
        assert_eq!(condition.level(), 3);
    }

    #[tokio::test]
    async fn test_report_headline() {
        let (clock, monitor) = setup(MonitorConfig::default());
        fill_window(&clock, &monitor, 60).await;

        let report = monitor.report().await.unwrap();
        assert_eq!(report.condition, Condition::RoundHouse);
        assert!(!report.latched);
        assert!((report.events_per_minute - 60.0).abs() < 1e-9);
        assert_eq!(report.headline(), "ROUND HOUSE (60.0 events/min)");
    }
}
