//! HTTP API: job submission, inspection, result export and live logs.

pub mod logs;
pub mod server;
pub mod types;

pub use logs::{JobLogListener, LogBroadcaster, LogEntry, LogLevel, LOG_BROADCASTER};
pub use server::{router, start_server, AppState};
pub use types::{error_response, ExportFormat, JobResponse, ResultsQuery, SubmitQuery, SubmitResponse};
