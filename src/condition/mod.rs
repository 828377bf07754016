// Condition classification module
pub mod levels;
pub mod monitor;
pub mod notify;

// Re-export key types for easier access
pub use levels::Condition;
pub use monitor::{ConditionMonitor, ConditionReport};
pub use notify::{JsonlFileSink, LatchEngaged, LogSink, NotificationSink};
