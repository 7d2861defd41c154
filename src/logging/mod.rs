//! Logging
//!
//! Process-wide diagnostics go through `tracing`. [`ActivityLog`] additionally
//! keeps a bounded, queryable history of pipeline events for callers that want
//! to show or persist it.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Entries kept before the oldest are evicted
pub const DEFAULT_LOG_CAPACITY: usize = 500;

/// Install the global `tracing` subscriber
///
/// `RUST_LOG` wins when set; otherwise `default_filter` applies. Calling this
/// twice is harmless.
pub fn init_tracing(default_filter: &str) {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl LogEntry {
    fn matches(&self, level: Option<LogLevel>, search: Option<&str>) -> bool {
        if level.is_some_and(|l| l != self.level) {
            return false;
        }
        match search.map(str::to_lowercase) {
            None => true,
            Some(needle) => {
                self.message.to_lowercase().contains(&needle)
                    || self
                        .data
                        .as_ref()
                        .is_some_and(|d| d.to_string().to_lowercase().contains(&needle))
            }
        }
    }
}

/// Append-only, capped event history
///
/// Cloning shares the underlying buffer.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    entries: Arc<Mutex<VecDeque<LogEntry>>>,
    capacity: usize,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(
                capacity.min(DEFAULT_LOG_CAPACITY),
            ))),
            capacity: capacity.max(1),
        }
    }

    /// Record an event and mirror it to `tracing`
    pub fn log(
        &self,
        level: LogLevel,
        message: impl Into<String>,
        data: Option<serde_json::Value>,
    ) {
        let entry = LogEntry {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            data,
        };

        let data = entry.data.as_ref().map(|d| d.to_string()).unwrap_or_default();
        match level {
            LogLevel::Debug => tracing::debug!(data = %data, "{}", entry.message),
            LogLevel::Info => tracing::info!(data = %data, "{}", entry.message),
            LogLevel::Warn => tracing::warn!(data = %data, "{}", entry.message),
            LogLevel::Error => tracing::error!(data = %data, "{}", entry.message),
        }

        let mut entries = self.entries.lock();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    pub fn info(&self, message: impl Into<String>, data: Option<serde_json::Value>) {
        self.log(LogLevel::Info, message, data);
    }

    pub fn warn(&self, message: impl Into<String>, data: Option<serde_json::Value>) {
        self.log(LogLevel::Warn, message, data);
    }

    pub fn error(&self, message: impl Into<String>, data: Option<serde_json::Value>) {
        self.log(LogLevel::Error, message, data);
    }

    /// All entries, oldest first
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Entries at `level` whose message or data contains `search`, case-insensitively
    pub fn filter(&self, level: Option<LogLevel>, search: Option<&str>) -> Vec<LogEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|entry| entry.matches(level, search))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_oldest_entries_are_evicted() {
        let log = ActivityLog::with_capacity(3);
        for i in 0..5 {
            log.info(format!("event {}", i), None);
        }

        let messages: Vec<String> = log.entries().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["event 2", "event 3", "event 4"]);
    }

    #[test]
    fn test_default_capacity() {
        let log = ActivityLog::new();
        for i in 0..(DEFAULT_LOG_CAPACITY + 20) {
            log.info(format!("event {}", i), None);
        }
        assert_eq!(log.len(), DEFAULT_LOG_CAPACITY);
        assert_eq!(log.entries()[0].message, "event 20");
    }

    #[test]
    fn test_filter_by_level_and_search() {
        let log = ActivityLog::new();
        log.info("Upload started", Some(json!({"key": "legaltech/a.json"})));
        log.warn("Verification failed", None);
        log.error("Upload failed", Some(json!({"status": 403})));

        assert_eq!(log.filter(Some(LogLevel::Warn), None).len(), 1);
        assert_eq!(log.filter(None, Some("UPLOAD")).len(), 2);
        assert_eq!(log.filter(None, Some("legaltech")).len(), 1);
        assert_eq!(log.filter(Some(LogLevel::Error), Some("403")).len(), 1);
    }

    #[test]
    fn test_clones_share_history() {
        let log = ActivityLog::new();
        let other = log.clone();
        other.info("from clone", None);

        assert_eq!(log.len(), 1);
        log.clear();
        assert!(other.is_empty());
    }

    #[test]
    fn test_entry_serialization() {
        let log = ActivityLog::new();
        log.warn("careful", None);

        let json = serde_json::to_value(&log.entries()[0]).unwrap();
        assert_eq!(json["level"], "WARN");
        assert!(json.get("data").is_none());
    }
}
