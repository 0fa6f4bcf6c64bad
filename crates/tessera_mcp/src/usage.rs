//! Usage tracking
//!
//! Appends one JSON line per tool call:
//!
//! ```json
//! {"ts":"2026-01-21T10:30:00Z","tool":"query_metrics","argument_keys":["metrics","limit"],"duration_ms":812,"environment_id":42}
//! ```
//!
//! Tracking never fails a tool call; write problems are only logged.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolCalledEvent {
    pub ts: DateTime<Utc>,
    pub tool: String,
    /// Argument names only; values may hold SQL or selectors
    pub argument_keys: Vec<String>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment_id: Option<i64>,
}

impl ToolCalledEvent {
    pub fn new(tool: &str, arguments: &Value, duration: Duration, error: Option<String>) -> Self {
        let mut argument_keys: Vec<String> = arguments
            .as_object()
            .map(|args| args.keys().cloned().collect())
            .unwrap_or_default();
        argument_keys.sort();
        Self {
            ts: Utc::now(),
            tool: tool.to_string(),
            argument_keys,
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            error,
            environment_id: None,
        }
    }
}

#[derive(Debug)]
pub struct UsageTracker {
    sink: Option<Sink>,
    environment_id: Option<i64>,
}

#[derive(Debug)]
struct Sink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl UsageTracker {
    /// A tracker that drops every event
    pub fn disabled() -> Self {
        Self {
            sink: None,
            environment_id: None,
        }
    }

    /// Append to `path`, creating parent directories. Falls back to a
    /// disabled tracker when the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        match open_append(&path) {
            Ok(file) => {
                debug!("Recording tool usage to {}", path.display());
                Self {
                    sink: Some(Sink {
                        path,
                        writer: Mutex::new(BufWriter::new(file)),
                    }),
                    environment_id: None,
                }
            }
            Err(e) => {
                warn!("Usage tracking disabled, cannot open {}: {}", path.display(), e);
                Self::disabled()
            }
        }
    }

    pub fn with_environment_id(mut self, environment_id: Option<i64>) -> Self {
        self.environment_id = environment_id;
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.sink.as_ref().map(|s| s.path.as_path())
    }

    pub fn record(&self, mut event: ToolCalledEvent) {
        let Some(sink) = &self.sink else {
            return;
        };
        event.environment_id = event.environment_id.or(self.environment_id);
        if let Err(e) = sink.write(&event) {
            warn!("Failed to record usage event for {}: {}", event.tool, e);
        }
    }
}

impl Sink {
    fn write(&self, event: &ToolCalledEvent) -> std::io::Result<()> {
        let json = serde_json::to_string(event)?;
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| std::io::Error::other("usage log lock poisoned"))?;
        writeln!(writer, "{}", json)?;
        writer.flush()
    }
}

fn open_append(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_records_ndjson_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("usage.ndjson");
        let tracker = UsageTracker::open(&path).with_environment_id(Some(42));

        tracker.record(ToolCalledEvent::new(
            "query_metrics",
            &json!({"metrics": ["revenue"], "limit": 5}),
            Duration::from_millis(812),
            None,
        ));
        tracker.record(ToolCalledEvent::new(
            "get_dimensions",
            &Value::Null,
            Duration::from_millis(3),
            Some("boom".to_string()),
        ));

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<Value> = contents.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["tool"], "query_metrics");
        assert_eq!(lines[0]["argument_keys"], json!(["limit", "metrics"]));
        assert_eq!(lines[0]["duration_ms"], 812);
        assert_eq!(lines[0]["environment_id"], 42);
        assert!(lines[0].get("error").is_none());
        assert_eq!(lines[1]["error"], "boom");
        assert_eq!(lines[1]["argument_keys"], json!([]));
    }

    #[test]
    fn test_unopenable_path_disables_tracking() {
        let dir = TempDir::new().unwrap();
        // A directory cannot be opened for appending
        let tracker = UsageTracker::open(dir.path());
        assert!(tracker.path().is_none());
        tracker.record(ToolCalledEvent::new("list_metrics", &json!({}), Duration::ZERO, None));
    }
}
