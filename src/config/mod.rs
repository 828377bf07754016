// Configuration module
pub mod settings;

// Re-export key types for easier access
pub use settings::{MonitorConfig, RatePeriod, parse_recipients};
