use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Unit the configured rate is expressed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RatePeriod {
    #[serde(rename = "s")]
    Second,
    #[serde(rename = "m")]
    Minute,
    #[serde(rename = "h")]
    Hour,
    #[serde(rename = "d")]
    Day,
}

impl RatePeriod {
    pub fn as_seconds(self) -> f64 {
        match self {
            RatePeriod::Second => 1.0,
            RatePeriod::Minute => 60.0,
            RatePeriod::Hour => 3600.0,
            RatePeriod::Day => 86400.0,
        }
    }
}

impl FromStr for RatePeriod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "s" => Ok(RatePeriod::Second),
            "m" => Ok(RatePeriod::Minute),
            "h" => Ok(RatePeriod::Hour),
            "d" => Ok(RatePeriod::Day),
            other => bail!(
                "Invalid rate period '{}'. Supported periods: s, m, h, d",
                other
            ),
        }
    }
}

/// Monitor settings. Read-only to the monitor once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Events per `period` at which severity starts stepping up.
    pub rate: u32,
    pub period: RatePeriod,
    /// Seconds the most severe condition is held once reached.
    pub cooldown_secs: u64,
    /// Bucket width in seconds.
    pub resolution_secs: u32,
    /// Fully elapsed buckets per throughput window.
    pub samples: u32,
    /// Addresses the latch notification is forwarded to by the delivery
    /// collaborator. Unused by the monitor itself.
    pub notify_recipients: Vec<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            rate: 30,
            period: RatePeriod::Minute,
            cooldown_secs: 600,
            resolution_secs: 5,
            samples: 12,
            notify_recipients: Vec::new(),
        }
    }
}

impl MonitorConfig {
    /// Threshold in events per second. Zero when the configured rate is
    /// zero; classification treats that as a defined least-severe case
    /// rather than an error.
    pub fn threshold(&self) -> f64 {
        f64::from(self.rate) / self.period.as_seconds()
    }

    /// Total window duration in seconds.
    pub fn window_secs(&self) -> u64 {
        u64::from(self.resolution_secs) * u64::from(self.samples)
    }

    pub fn validate(&self) -> Result<()> {
        if self.resolution_secs == 0 {
            bail!("resolution_secs must be greater than zero");
        }
        if self.samples == 0 {
            bail!("samples must be greater than zero");
        }
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }
}

/// Split a comma or newline separated recipient list, dropping empties.
pub fn parse_recipients(raw: &str) -> Vec<String> {
    raw.split([',', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
