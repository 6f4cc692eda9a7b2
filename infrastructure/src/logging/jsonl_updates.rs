//! JSONL file writer for tool call notifications.
//!
//! Each [`ToolCallUpdate`] is serialized as a single JSON line with a
//! `type` and `timestamp` field, appended through a buffered writer.

use conductor_application::{SessionUpdateSink, ToolCallUpdate};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// Session update log writing one JSON object per line.
///
/// Thread-safe via `Mutex<BufWriter<File>>`. Flushes on `Drop`.
pub struct JsonlSessionUpdateLog {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl JsonlSessionUpdateLog {
    /// Open (append) the log at the given path.
    ///
    /// Creates the file and parent directories if missing. Returns `None`
    /// if the file cannot be opened.
    pub fn new(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!(
                "Could not create session update log directory {}: {}",
                parent.display(),
                e
            );
            return None;
        }

        let file = match OpenOptions::new().create(true).append(true).open(path) {
            Ok(f) => f,
            Err(e) => {
                warn!(
                    "Could not open session update log {}: {}",
                    path.display(),
                    e
                );
                return None;
            }
        };

        Some(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionUpdateSink for JsonlSessionUpdateLog {
    fn notify(&self, update: ToolCallUpdate) {
        let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);

        let record = match serde_json::to_value(&update) {
            Ok(serde_json::Value::Object(mut map)) => {
                map.insert("type".to_string(), "tool_call_update".into());
                map.insert("timestamp".to_string(), timestamp.into());
                serde_json::Value::Object(map)
            }
            Ok(other) => serde_json::json!({
                "type": "tool_call_update",
                "timestamp": timestamp,
                "data": other,
            }),
            Err(e) => {
                warn!("Could not serialize session update: {}", e);
                return;
            }
        };

        let Ok(line) = serde_json::to_string(&record) else {
            return;
        };

        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{}", line);
            let _ = writer.flush();
        }
    }
}

impl Drop for JsonlSessionUpdateLog {
    fn drop(&mut self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}
