// Append-only JSONL records of model calls and finished sessions
//
// Records are handed to a background writer task over a bounded channel, so
// the improvement loop never waits on disk and never sees a write failure.
// When the writer falls behind, new records are dropped with a warning.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::config::constants::{CALL_LOG_FILE, SESSION_LOG_FILE};

/// Records queued for the writer before new ones are dropped.
const CHANNEL_CAPACITY: usize = 1024;

/// One model call attempt.
#[derive(Debug, Clone, Serialize)]
pub struct CallRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub backend: String,
    pub prompt_name: String,
    pub prompt_text: String,
    pub attempt: u32,
    /// Parsed and validated answer, when the attempt succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CallRecord {
    pub fn new(backend: &str, prompt_name: &str, prompt_text: &str, attempt: u32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            backend: backend.to_string(),
            prompt_name: prompt_name.to_string(),
            prompt_text: prompt_text.to_string(),
            attempt,
            result: None,
            raw_output: None,
            error: None,
        }
    }

    pub fn succeeded(mut self, result: Value) -> Self {
        self.result = Some(result);
        self
    }

    pub fn failed(mut self, raw_output: Option<String>, error: impl Into<String>) -> Self {
        self.raw_output = raw_output;
        self.error = Some(error.into());
        self
    }
}

/// One completed improvement session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub input: String,
    pub output: Value,
}

impl SessionRecord {
    pub fn new(input: &str, output: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            input: input.to_string(),
            output,
        }
    }
}

enum Command {
    Append { path: PathBuf, line: String },
    Flush(oneshot::Sender<()>),
}

/// Handle to the background JSONL writer. Cheap to clone.
#[derive(Clone, Debug)]
pub struct RecordLog {
    dir: Option<PathBuf>,
    tx: Option<mpsc::Sender<Command>>,
}

impl RecordLog {
    /// Start a writer that appends into `dir`. Must be called inside a
    /// tokio runtime.
    pub fn open(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        Self::open_with_capacity(dir, CHANNEL_CAPACITY)
    }

    pub(crate) fn open_with_capacity(
        dir: impl Into<PathBuf>,
        capacity: usize,
    ) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let (tx, rx) = mpsc::channel(capacity.max(1));
        tokio::spawn(write_loop(rx));

        debug!("Recording model calls under {}", dir.display());
        Ok(Self {
            dir: Some(dir),
            tx: Some(tx),
        })
    }

    /// A log that drops every record.
    pub fn disabled() -> Self {
        Self { dir: None, tx: None }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn record_call(&self, record: &CallRecord) {
        self.append(CALL_LOG_FILE, record);
    }

    pub fn record_session(&self, record: &SessionRecord) {
        self.append(SESSION_LOG_FILE, record);
    }

    /// Wait until everything recorded so far has been written.
    pub async fn flush(&self) {
        let Some(tx) = &self.tx else {
            return;
        };
        let (done_tx, done_rx) = oneshot::channel();
        if tx.send(Command::Flush(done_tx)).await.is_ok() {
            let _ = done_rx.await;
        }
    }

    fn append<T: Serialize>(&self, file_name: &str, record: &T) {
        let (Some(dir), Some(tx)) = (&self.dir, &self.tx) else {
            return;
        };

        let line = match serde_json::to_string(record) {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to serialize log record: {}", e);
                return;
            }
        };

        let command = Command::Append {
            path: dir.join(file_name),
            line,
        };
        match tx.try_send(command) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Record log writer is behind; dropping {} record", file_name);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Record log writer has stopped; dropping record");
            }
        }
    }
}

async fn write_loop(mut rx: mpsc::Receiver<Command>) {
    while let Some(command) = rx.recv().await {
        match command {
            Command::Append { path, line } => {
                if let Err(e) = append_line(&path, &line).await {
                    warn!("Failed to append to {}: {}", path.display(), e);
                }
            }
            Command::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}

async fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await?;
    file.write_all(b"\n").await?;
    file.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_call_and_session_records_appended() {
        let dir = TempDir::new().unwrap();
        let log = RecordLog::open(dir.path()).unwrap();

        log.record_call(
            &CallRecord::new("mistral", "spicy", "Score the text", 1)
                .succeeded(json!({ "spicy_score": 0.2 })),
        );
        log.record_call(
            &CallRecord::new("mistral", "spicy", "Score the text", 2)
                .failed(Some("nope".into()), "invalid JSON"),
        );
        log.record_session(&SessionRecord::new("angry", json!({ "edit": "calm" })));
        log.flush().await;

        let calls = std::fs::read_to_string(dir.path().join(CALL_LOG_FILE)).unwrap();
        let lines: Vec<&str> = calls.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["backend"], "mistral");
        assert_eq!(first["result"]["spicy_score"], 0.2);
        assert!(first.get("error").is_none());
        let second: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["error"], "invalid JSON");
        assert_eq!(second["raw_output"], "nope");

        let sessions = std::fs::read_to_string(dir.path().join(SESSION_LOG_FILE)).unwrap();
        let session: Value = serde_json::from_str(sessions.trim()).unwrap();
        assert_eq!(session["input"], "angry");
        assert_eq!(session["output"]["edit"], "calm");
        assert!(session["id"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_full_queue_drops_records() {
        let dir = TempDir::new().unwrap();
        let log = RecordLog::open_with_capacity(dir.path(), 1).unwrap();

        // The writer cannot run before the first await on this runtime.
        for attempt in 1..=3 {
            log.record_call(&CallRecord::new("http", "critique", "p", attempt));
        }
        log.flush().await;

        let calls = std::fs::read_to_string(dir.path().join(CALL_LOG_FILE)).unwrap();
        assert_eq!(calls.lines().count(), 1);
        let kept: Value = serde_json::from_str(calls.trim()).unwrap();
        assert_eq!(kept["attempt"], 1);

        log.record_call(&CallRecord::new("http", "critique", "p", 4));
        log.flush().await;
        let calls = std::fs::read_to_string(dir.path().join(CALL_LOG_FILE)).unwrap();
        assert_eq!(calls.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_disabled_log_is_silent() {
        let log = RecordLog::disabled();
        log.record_session(&SessionRecord::new("x", json!({})));
        log.flush().await;
        assert!(log.dir().is_none());
    }

    #[tokio::test]
    async fn test_write_failure_is_swallowed() {
        let dir = TempDir::new().unwrap();
        let log = RecordLog::open(dir.path()).unwrap();
        // A directory where the call log file should be makes the append fail.
        std::fs::create_dir(dir.path().join(CALL_LOG_FILE)).unwrap();

        log.record_call(&CallRecord::new("http", "critique", "p", 1));
        log.flush().await;

        log.record_session(&SessionRecord::new("still works", json!({})));
        log.flush().await;
        assert!(dir.path().join(SESSION_LOG_FILE).exists());
    }
}
