// Results logging module for asynchronous event and standings logging
//
// Fire-and-forget JSONL writes keep agent events off the controller's
// critical path. Each line carries an RFC 3339 timestamp.

use log::{error, info};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::session::{format_standings, Standing};
use crate::types::AgentEvent;

#[derive(Debug, Serialize)]
#[serde(tag = "entry", rename_all = "snake_case")]
enum LogEntry<'a> {
    Event {
        timestamp: String,
        event: &'a AgentEvent,
    },
    Standings {
        timestamp: String,
        standings: &'a [Standing],
    },
}

/// Shared results logger state
/// Uses Arc<Mutex<File>> to allow concurrent async writes from multiple tasks
#[derive(Clone)]
pub struct ResultsLogger {
    file: Arc<Mutex<Option<File>>>,
    enabled: bool,
}

impl ResultsLogger {
    /// Creates a new results logger
    /// If enabled is true, initializes the log file (truncating if it exists)
    pub async fn new(enabled: bool, log_file_path: &str) -> Self {
        if !enabled {
            return Self::disabled();
        }

        match OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(log_file_path)
            .await
        {
            Ok(file) => {
                info!("Results logging enabled: {}", log_file_path);
                ResultsLogger {
                    file: Arc::new(Mutex::new(Some(file))),
                    enabled: true,
                }
            }
            Err(e) => {
                error!("Failed to create results log file '{}': {}", log_file_path, e);
                Self::disabled()
            }
        }
    }

    /// Creates a disabled results logger (no-op)
    pub fn disabled() -> Self {
        ResultsLogger {
            file: Arc::new(Mutex::new(None)),
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Logs an agent event without waiting for the write
    pub fn log_event(&self, event: AgentEvent) {
        if !self.enabled {
            return;
        }

        let file_handle = self.file.clone();
        tokio::spawn(async move {
            let entry = LogEntry::Event {
                timestamp: chrono::Utc::now().to_rfc3339(),
                event: &event,
            };
            Self::write_line(&file_handle, &entry).await;
        });
    }

    /// Writes the final standings and waits until they are flushed
    pub async fn write_standings(&self, standings: &[Standing]) {
        if !self.enabled {
            return;
        }

        let entry = LogEntry::Standings {
            timestamp: chrono::Utc::now().to_rfc3339(),
            standings,
        };
        Self::write_line(&self.file, &entry).await;
    }

    async fn write_line(file_handle: &Arc<Mutex<Option<File>>>, entry: &LogEntry<'_>) {
        let json_line = match serde_json::to_string(entry) {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to serialize results log entry: {}", e);
                return;
            }
        };

        let mut file_guard = file_handle.lock().await;
        if let Some(file) = file_guard.as_mut() {
            let line_with_newline = format!("{}\n", json_line);
            if let Err(e) = file.write_all(line_with_newline.as_bytes()).await {
                error!("Failed to write results log entry: {}", e);
            } else if let Err(e) = file.flush().await {
                error!("Failed to flush results log: {}", e);
            }
        }
    }
}

/// Writes the ranked standings to `game_<timestamp>.txt` under `directory`,
/// creating the directory if needed, and returns the file's path
pub async fn save_standings(directory: &str, standings: &[Standing]) -> Result<PathBuf, String> {
    tokio::fs::create_dir_all(directory)
        .await
        .map_err(|e| format!("Failed to create results directory '{}': {}", directory, e))?;

    let now = chrono::Local::now();
    let path = Path::new(directory).join(format!("game_{}.txt", now.format("%Y%m%d_%H%M%S_%3f")));
    let contents = format!(
        "Game finished {}\n\n{}",
        now.format("%Y-%m-%d %H:%M:%S"),
        format_standings(standings)
    );

    tokio::fs::write(&path, contents)
        .await
        .map_err(|e| format!("Failed to write results file '{}': {}", path.display(), e))?;
    info!("Standings saved to {}", path.display());
    Ok(path)
}
