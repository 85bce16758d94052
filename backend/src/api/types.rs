//! REST API request and response types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{JobError, ServerError};
use crate::models::{JobId, JobMetadata, JobStatus, JobType, ResolverJob, ResolverJobFailure};
use crate::spatial::Srid;

/// Query parameters of a job submission.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitQuery {
    pub delimiter: Option<char>,
    pub enclosure: Option<char>,
    pub charset: Option<String>,
    pub country: Option<String>,
    /// EPSG code or alias, e.g. `2056` or `EPSG:4326`.
    pub srid: Option<String>,
}

impl SubmitQuery {
    pub fn into_metadata(self) -> Result<JobMetadata, ServerError> {
        let srid = self
            .srid
            .as_deref()
            .map(str::parse::<Srid>)
            .transpose()
            .map_err(|e| ServerError::BadRequest(e.to_string()))?;
        Ok(JobMetadata {
            delimiter: self.delimiter,
            enclosure: self.enclosure,
            charset: self.charset,
            country: self.country,
            srid,
            ..Default::default()
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub job_id: JobId,
    pub status: JobStatus,
}

/// Job as exposed over HTTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    pub id: JobId,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub status: JobStatus,
    pub temporarily_failed: bool,
    pub metadata: JobMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<ResolverJobFailure>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<ResolverJob> for JobResponse {
    fn from(job: ResolverJob) -> Self {
        Self {
            temporarily_failed: job.is_temporarily_failed(),
            id: job.id,
            job_type: job.job_type,
            status: job.status,
            metadata: job.metadata,
            failure: job.failure,
            created_at: job.created_at,
            expires_at: job.expires_at,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultsQuery {
    #[serde(default)]
    pub format: ExportFormat,
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "status": "error",
        "error": error,
    })
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) | ServerError::Job(JobError::NotFound(_)) => StatusCode::NOT_FOUND,
            ServerError::Job(JobError::InvalidTransition { .. }) => StatusCode::CONFLICT,
            ServerError::Job(_) | ServerError::Export(_) | ServerError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (status, Json(error_response(&self.to_string()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobMetadata;

    #[test]
    fn test_query_into_metadata() {
        let query = SubmitQuery {
            delimiter: Some(';'),
            srid: Some("EPSG:2056".to_string()),
            ..Default::default()
        };
        let metadata = query.into_metadata().unwrap();
        assert_eq!(metadata.delimiter, Some(';'));
        assert_eq!(metadata.srid, Some(Srid::Lv95));

        let bad = SubmitQuery {
            srid: Some("EPSG:3857".to_string()),
            ..Default::default()
        };
        assert!(matches!(bad.into_metadata(), Err(ServerError::BadRequest(_))));
    }

    #[test]
    fn test_job_response_flags_temporary_failure() {
        let mut job = ResolverJob::new(JobType::GeoJson, JobMetadata::default(), chrono::Duration::days(1));
        job.status = JobStatus::Resolving;
        job.failure = Some(ResolverJobFailure::resolving_error("timeout", true));

        let json = serde_json::to_value(JobResponse::from(job)).unwrap();
        assert_eq!(json["status"], "resolving");
        assert_eq!(json["temporarilyFailed"], true);
        assert_eq!(json["failure"]["retryable"], true);
        assert_eq!(json["type"], "GEO_JSON");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ServerError::Job(JobError::NotFound(JobId::new())).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServerError::BadRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
