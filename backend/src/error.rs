//! Error types for the resolver job pipeline.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`CsvError`] - CSV reading errors
//! - [`GeoJsonError`] - GeoJSON and coordinate system errors
//! - [`ConfidenceError`] - out of range confidence values
//! - [`StoreError`] / [`RegistryError`] - external collaborator errors
//! - [`InvalidInputData`] / [`PrepareError`] - job preparation errors
//! - [`ResolveError`] - task resolution errors
//! - [`JobError`] - errors surfaced by the lifecycle handlers
//! - [`ExportError`] - result export errors
//! - [`ConfigError`] - environment configuration errors
//! - [`ServerError`] - HTTP layer errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

use crate::models::{JobId, JobStatus};

// =============================================================================
// CSV Reading Errors
// =============================================================================

/// Errors while reading user supplied CSV.
#[derive(Debug, Error)]
pub enum CsvError {
    /// No data at all.
    #[error("CSV input is empty")]
    EmptyFile,

    /// Declared charset is not known.
    #[error("Unknown charset: {0}")]
    UnknownCharset(String),

    /// Delimiter or enclosure outside of the single-byte ASCII range.
    #[error("Unsupported {kind} '{value}': only ASCII characters are allowed")]
    UnsupportedCharacter { kind: &'static str, value: char },

    /// A header cell is blank.
    #[error("Empty header cell in column {column}")]
    EmptyHeaderCell { column: usize },

    /// A data row does not have the header width.
    #[error("Row {row} has {found} cells, expected {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },

    /// Low-level CSV syntax error.
    #[error("Invalid CSV format at row {row}: {message}")]
    Malformed { row: usize, message: String },
}

// =============================================================================
// GeoJSON Errors
// =============================================================================

/// Errors while inspecting GeoJSON payloads.
#[derive(Debug, Error)]
pub enum GeoJsonError {
    /// Payload is not JSON.
    #[error("Invalid GeoJSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// Declared coordinate reference system is not supported.
    #[error("Unsupported coordinate reference system: {0}")]
    UnsupportedCrs(String),

    /// `crs` member present but not in the legacy `name` form.
    #[error("Malformed crs member: {0}")]
    MalformedCrs(String),

    /// Geometry object cannot be interpreted.
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),
}

// =============================================================================
// Value Errors
// =============================================================================

/// Confidence outside of `0..=100`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfidenceError {
    #[error("Confidence must be between 0 and 100, got {0}")]
    OutOfRange(i64),
}

// =============================================================================
// Collaborator Errors
// =============================================================================

/// Errors from the job/task/result storage.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Job does not exist (or was deleted).
    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    /// Storage backend failure.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Errors from the building-entrance registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Transient failure, the query may succeed later.
    #[error("Registry unavailable: {0}")]
    Unavailable(String),

    /// Registry dump could not be loaded.
    #[error("Failed to load registry: {0}")]
    Load(String),

    /// Registry dump is not valid CSV.
    #[error("Registry CSV error: {0}")]
    Csv(#[from] CsvError),

    /// IO error.
    #[error("Registry IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Preparation Errors
// =============================================================================

/// Malformed or semantically invalid raw job input.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct InvalidInputData {
    message: String,
}

impl InvalidInputData {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// A required column is absent from the header.
    pub fn missing_column(column: &str, found: &[String]) -> Self {
        Self::new(format!(
            "Missing required column '{}', found columns: {}",
            column,
            found.join(", ")
        ))
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<CsvError> for InvalidInputData {
    fn from(err: CsvError) -> Self {
        Self::new(err.to_string())
    }
}

impl From<GeoJsonError> for InvalidInputData {
    fn from(err: GeoJsonError) -> Self {
        Self::new(err.to_string())
    }
}

/// Errors raised by a preparer.
#[derive(Debug, Error)]
pub enum PrepareError {
    #[error("Invalid input data: {0}")]
    InvalidInputData(#[from] InvalidInputData),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl From<CsvError> for PrepareError {
    fn from(err: CsvError) -> Self {
        PrepareError::InvalidInputData(err.into())
    }
}

impl From<GeoJsonError> for PrepareError {
    fn from(err: GeoJsonError) -> Self {
        PrepareError::InvalidInputData(err.into())
    }
}

// =============================================================================
// Resolution Errors
// =============================================================================

/// Errors raised by a resolver.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Transient failure; the whole resolving invocation may be re-driven.
    #[error("Retryable resolving error: {0}")]
    Retryable(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Registry error: {0}")]
    Registry(RegistryError),

    /// A stored task cannot be interpreted.
    #[error("Invalid task: {0}")]
    InvalidTask(String),
}

impl From<RegistryError> for ResolveError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Unavailable(message) => ResolveError::Retryable(message),
            other => ResolveError::Registry(other),
        }
    }
}

// =============================================================================
// Lifecycle Errors
// =============================================================================

/// Errors surfaced to whoever triggers preparation or resolving.
#[derive(Debug, Error)]
pub enum JobError {
    /// Job or its raw data is missing.
    #[error("Resolver job not found: {0}")]
    NotFound(JobId),

    /// Recorded on the job, re-thrown so the dispatcher can re-schedule.
    #[error("Retryable resolving error for job {job_id}: {message}")]
    RetryableResolving { job_id: JobId, message: String },

    /// Lifecycle event does not fit the current status.
    #[error("Invalid status transition for job {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: JobId,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Storage error: {0}")]
    Storage(StoreError),
}

impl From<StoreError> for JobError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::JobNotFound(id) => JobError::NotFound(id),
            other => JobError::Storage(other),
        }
    }
}

// =============================================================================
// Export Errors
// =============================================================================

/// Errors while writing results out.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON write error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Config Errors
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: '{value}'")]
    InvalidValue { name: String, value: String },
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

pub type CsvResult<T> = Result<T, CsvError>;

pub type StoreResult<T> = Result<T, StoreError>;

pub type RegistryResult<T> = Result<T, RegistryError>;

pub type PrepareResult<T> = Result<T, PrepareError>;

pub type ResolveResult<T> = Result<T, ResolveError>;

pub type JobResult<T> = Result<T, JobError>;

pub type ExportResult<T> = Result<T, ExportError>;

pub type ServerResult<T> = Result<T, ServerError>;
