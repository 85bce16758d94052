//! Real-time job progress via Server-Sent Events (SSE).
//!
//! [`JobLogListener`] turns lifecycle events into [`LogEntry`] values and
//! sends them through a broadcast channel that SSE clients subscribe to.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::JobResult;
use crate::job::{LifecycleEvent, LifecycleListener};
use crate::models::JobId;

/// Entries kept for slow subscribers before they start lagging.
const CHANNEL_CAPACITY: usize = 100;

/// Log level for frontend display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A single log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    /// Lifecycle event name, when the entry comes from one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
}

impl LogEntry {
    fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            job_id: None,
            event: None,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, message)
    }

    /// Entry describing a lifecycle event.
    pub fn from_event(event: &LifecycleEvent) -> Self {
        let entry = match event {
            LifecycleEvent::JobCreated { job_type, .. } => Self::info(format!("{} job submitted", job_type)),
            LifecycleEvent::PreparationStarted { .. } => Self::info("Preparing tasks"),
            LifecycleEvent::PreparationCompleted { task_count, .. } => {
                Self::success(format!("Prepared {} tasks", task_count))
            }
            LifecycleEvent::ResolvingStarted { .. } => Self::info("Resolving tasks"),
            LifecycleEvent::ResolvingCompleted { task_count, .. } => {
                Self::success(format!("Resolved {} tasks", task_count))
            }
            LifecycleEvent::PreparationFailed { failure, .. }
            | LifecycleEvent::ResolvingFailed { failure, .. } => {
                if failure.retryable {
                    Self::warning(format!("Temporarily failed: {}", failure.details))
                } else {
                    Self::error(format!("Failed: {}", failure.details))
                }
            }
        };
        Self {
            job_id: Some(event.job_id()),
            event: Some(event.name().to_string()),
            ..entry
        }
    }
}

/// Global log broadcaster
pub static LOG_BROADCASTER: Lazy<LogBroadcaster> = Lazy::new(LogBroadcaster::new);

/// Broadcasts log entries to all connected SSE clients
#[derive(Clone)]
pub struct LogBroadcaster {
    sender: broadcast::Sender<LogEntry>,
}

impl LogBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Send a log entry to all subscribers
    pub fn log(&self, entry: LogEntry) {
        // No subscriber is not an error
        let _ = self.sender.send(entry);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }
}

impl Default for LogBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// Publishes lifecycle events to a broadcaster.
pub struct JobLogListener {
    broadcaster: LogBroadcaster,
}

impl JobLogListener {
    pub fn new(broadcaster: LogBroadcaster) -> Self {
        Self { broadcaster }
    }
}

impl Default for JobLogListener {
    fn default() -> Self {
        Self::new(LOG_BROADCASTER.clone())
    }
}

#[async_trait]
impl LifecycleListener for JobLogListener {
    async fn on_event(&self, event: &LifecycleEvent) -> JobResult<()> {
        self.broadcaster.log(LogEntry::from_event(event));
        Ok(())
    }
}
