use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;
use tracing::{error, warn};

/// Emitted exactly once per latch engagement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatchEngaged {
    pub engaged_at: DateTime<Utc>,
    /// Seconds the most severe condition will be held.
    pub cooldown_secs: u64,
}

/// Receives the one-shot latch notification.
///
/// Implementations own delivery (email, paging, dashboards) and must absorb
/// their own failures; nothing may propagate back into classification.
pub trait NotificationSink: Send + Sync {
    fn on_latch_engaged(&self, event: &LatchEngaged);
}

/// Logs the engagement through `tracing`.
pub struct LogSink;

impl NotificationSink for LogSink {
    fn on_latch_engaged(&self, event: &LatchEngaged) {
        warn!(
            engaged_at = %event.engaged_at,
            cooldown_secs = event.cooldown_secs,
            "most severe condition reached, latch engaged"
        );
    }
}

/// Appends each engagement as a single JSON line.
///
/// The file is opened with `append(true).create(true)` on every write, so
/// external log-rotation tools can safely rename it between engagements.
pub struct JsonlFileSink {
    path: PathBuf,
}

impl JsonlFileSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl NotificationSink for JsonlFileSink {
    fn on_latch_engaged(&self, event: &LatchEngaged) {
        let json = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(e) => {
                error!(error = %e, "failed to serialize latch notification");
                return;
            }
        };

        let result = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| writeln!(file, "{json}"));

        if let Err(e) = result {
            error!(path = %self.path.display(), error = %e, "failed to write latch notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn make_event() -> LatchEngaged {
        LatchEngaged {
            engaged_at: Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap(),
            cooldown_secs: 600,
        }
    }

    #[test]
    fn test_log_sink_does_not_panic() {
        LogSink.on_latch_engaged(&make_event());
    }

    #[test]
    fn test_jsonl_sink_appends_one_line_per_event() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("engagements.jsonl");
        let sink = JsonlFileSink::new(path.clone());

        sink.on_latch_engaged(&make_event());
        sink.on_latch_engaged(&make_event());

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        for line in lines {
            let parsed: LatchEngaged = serde_json::from_str(line).unwrap();
            assert_eq!(parsed.cooldown_secs, 600);
        }
    }

    #[test]
    fn test_jsonl_sink_swallows_write_failures() {
        let sink = JsonlFileSink::new(PathBuf::from("/nonexistent/dir/engagements.jsonl"));
        // Logs the failure, never panics or propagates
        sink.on_latch_engaged(&make_event());
    }
}
